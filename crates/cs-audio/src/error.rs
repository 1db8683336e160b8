use cs_core::{ErrorKind, PipelineError, Stage};
use thiserror::Error;

/// Errors originating from the audio module.
#[derive(Error, Debug)]
pub enum AudioError {
    /// Source could not be opened.
    #[error("Impossible d'ouvrir la source audio {name} : {source}")]
    Open {
        /// Source name (path or label).
        name: String,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Container or codec not recognised.
    #[error("Format audio non supporté : {0}")]
    UnsupportedFormat(String),

    /// No decodable track in the container.
    #[error("Aucune piste audio")]
    NoTrack,

    /// Sample rate missing or zero.
    #[error("Fréquence d'échantillonnage invalide")]
    InvalidSampleRate,

    /// Audio decode error.
    #[error("Erreur de décodage : {0}")]
    DecodeError(String),

    /// Decoding produced no samples.
    #[error("Signal vide")]
    Empty,
}

impl From<AudioError> for PipelineError {
    fn from(err: AudioError) -> Self {
        PipelineError::new(ErrorKind::InvalidAudio, Stage::Decode, err.to_string())
    }
}
