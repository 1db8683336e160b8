use cs_core::{ErrorKind, PipelineError, Stage};
use thiserror::Error;

/// Errors originating from the classifier.
#[derive(Error, Debug)]
pub enum ClassifyError {
    /// Model file missing or rejected by ONNX Runtime.
    #[error("Chargement du modèle impossible : {0}")]
    ModelLoad(String),

    /// No usable label map in the model metadata.
    #[error("Métadonnées de labels invalides : {0}")]
    Metadata(String),

    /// Session run failed or produced an unexpected output.
    #[error("Erreur d'inférence : {0}")]
    Inference(String),

    /// Output width does not match the label count.
    #[error("Sortie de {outputs} scores pour {labels} labels")]
    LabelMismatch {
        /// Scores per crop.
        outputs: usize,
        /// Labels in the map.
        labels: usize,
    },

    /// Nothing to classify.
    #[error("Image vide")]
    EmptyImage,
}

impl From<ClassifyError> for PipelineError {
    fn from(err: ClassifyError) -> Self {
        PipelineError::new(ErrorKind::InvalidModel, Stage::Classify, err.to_string())
    }
}
