use std::path::Path;

use cs_core::Prediction;
use cs_core::config::CROP_SIZE;
use cs_render::RgbRaster;
use ort::ep::{self, ExecutionProviderDispatch};
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::Tensor;

use crate::error::ClassifyError;
use crate::labels::LabelMap;
use crate::preprocess::prepare_crops;
use crate::scores::{decode_prediction, mean_probabilities};

/// Element type accepted by the model input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InputKind {
    U8,
    F32,
}

/// ONNX species classifier. The session is loaded once and reused.
pub struct Classifier {
    session: Session,
    input_name: String,
    input_kind: InputKind,
    labels: LabelMap,
    batch_size: usize,
}

/// `[CUDA, CPU]` with CUDA only when built with the `cuda` feature.
fn execution_providers() -> Vec<ExecutionProviderDispatch> {
    let mut providers = Vec::with_capacity(2);
    #[cfg(feature = "cuda")]
    providers.push(ep::CUDA::default().build().fail_silently());
    providers.push(ep::CPU::default().build());
    providers
}

impl Classifier {
    /// Load the model and its label map.
    ///
    /// # Errors
    /// [`ClassifyError::ModelLoad`] if the file is missing or unreadable,
    /// [`ClassifyError::Metadata`] if no metadata property holds a label map.
    pub fn load(path: &Path, batch_size: usize) -> Result<Self, ClassifyError> {
        if !path.is_file() {
            return Err(ClassifyError::ModelLoad(format!("{} introuvable", path.display())));
        }
        let session = Session::builder()
            .map_err(|e| ClassifyError::ModelLoad(e.to_string()))?
            .with_execution_providers(execution_providers())
            .map_err(|e| ClassifyError::ModelLoad(e.to_string()))?
            .commit_from_file(path)
            .map_err(|e| ClassifyError::ModelLoad(format!("{}: {e}", path.display())))?;

        let labels = read_labels(&session)?;

        let input = session
            .inputs()
            .first()
            .ok_or_else(|| ClassifyError::ModelLoad("modèle sans entrée".into()))?;
        let input_name = input.name().to_string();
        let input_kind = match input.dtype().tensor_type() {
            Some(TensorElementType::Uint8) => InputKind::U8,
            Some(TensorElementType::Float32) => InputKind::F32,
            other => {
                return Err(ClassifyError::ModelLoad(format!(
                    "type d'entrée non supporté : {other:?}"
                )));
            }
        };
        log::info!(
            "Modèle chargé : {} ({} labels, entrée {input_name} {input_kind:?})",
            path.display(),
            labels.len()
        );

        Ok(Self {
            session,
            input_name,
            input_kind,
            labels,
            batch_size: batch_size.max(1),
        })
    }

    #[must_use]
    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Classify a compressed spectrogram.
    ///
    /// # Errors
    /// Propagates preprocessing and ONNX Runtime failures.
    pub fn classify(&mut self, image: &RgbRaster) -> Result<Prediction, ClassifyError> {
        let crops = prepare_crops(image)?;
        let mut outputs = Vec::with_capacity(crops.count * self.labels.len());
        let mut start = 0;
        while start < crops.count {
            let n = self.batch_size.min(crops.count - start);
            outputs.extend(self.run_batch(crops.batch(start, n), n)?);
            start += n;
        }
        log::debug!("{} tuiles classées", crops.count);

        let mean = mean_probabilities(&outputs, self.labels.len())?;
        decode_prediction(&mean, &self.labels)
    }

    fn run_batch(&mut self, batch: &[u8], n: usize) -> Result<Vec<f32>, ClassifyError> {
        let side = CROP_SIZE as usize;
        let outputs = match self.input_kind {
            InputKind::U8 => {
                let tensor = Tensor::from_array(([n, side, side, 3], batch.to_vec())).map_err(inference)?;
                self.session
                    .run(ort::inputs![self.input_name.as_str() => tensor])
                    .map_err(inference)?
            }
            InputKind::F32 => {
                let values: Vec<f32> = batch.iter().copied().map(f32::from).collect();
                let tensor = Tensor::from_array(([n, side, side, 3], values)).map_err(inference)?;
                self.session
                    .run(ort::inputs![self.input_name.as_str() => tensor])
                    .map_err(inference)?
            }
        };
        let (_, data) = outputs[0].try_extract_tensor::<f32>().map_err(inference)?;
        if data.len() != n * self.labels.len() {
            return Err(ClassifyError::LabelMismatch {
                outputs: data.len() / n.max(1),
                labels: self.labels.len(),
            });
        }
        Ok(data.to_vec())
    }
}

fn inference(err: impl std::fmt::Display) -> ClassifyError {
    ClassifyError::Inference(err.to_string())
}

fn read_labels(session: &Session) -> Result<LabelMap, ClassifyError> {
    let metadata = session
        .metadata()
        .map_err(|e| ClassifyError::Metadata(e.to_string()))?;
    let keys = metadata
        .custom_keys()
        .map_err(|e| ClassifyError::Metadata(e.to_string()))?;
    let mut values = Vec::with_capacity(keys.len());
    for key in &keys {
        if let Some(value) = metadata.custom(key) {
            values.push(value);
        }
    }
    LabelMap::from_metadata(values.iter().map(String::as_str))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    /// Models whose logits are the mean R, G, B of each crop divided by 100.
    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
    }

    fn flat(width: u32, height: u32, rgb: [u8; 3]) -> RgbRaster {
        let mut image = RgbRaster::new(width, height);
        for px in image.data.chunks_exact_mut(3) {
            px.copy_from_slice(&rgb);
        }
        image
    }

    /// Red left half, blue right half.
    fn split(width: u32, height: u32) -> RgbRaster {
        let mut image = RgbRaster::new(width, height);
        for (i, px) in image.data.chunks_exact_mut(3).enumerate() {
            let x = i as u32 % width;
            px.copy_from_slice(if x < width / 2 { &[200, 0, 0] } else { &[0, 0, 200] });
        }
        image
    }

    fn softmax3(logits: [f64; 3]) -> [f64; 3] {
        let e = logits.map(f64::exp);
        let sum: f64 = e.iter().sum();
        e.map(|v| v / sum)
    }

    #[test]
    fn missing_model_is_a_load_error() {
        let err = Classifier::load(Path::new("/nonexistent/model.onnx"), 1)
            .err()
            .unwrap();
        assert!(matches!(err, ClassifyError::ModelLoad(_)));
    }

    #[test]
    fn cpu_provider_is_always_last() {
        let providers = execution_providers();
        assert!(!providers.is_empty());
        #[cfg(not(feature = "cuda"))]
        assert_eq!(providers.len(), 1);
    }

    #[test]
    fn labels_come_from_model_metadata() {
        let session = Session::builder()
            .unwrap()
            .commit_from_file(fixture("channel_mean_u8.onnx"))
            .unwrap();
        let labels = read_labels(&session).unwrap();
        assert_eq!(labels.labels(), ["APAL", "EPFU", "LABO"]);
    }

    #[test]
    fn model_without_label_map_is_rejected() {
        let err = Classifier::load(&fixture("channel_mean_unlabelled.onnx"), 1)
            .err()
            .unwrap();
        assert!(matches!(err, ClassifyError::Metadata(_)), "{err}");
    }

    #[test]
    fn uniform_image_gives_softmaxed_channel_means() {
        let mut classifier = Classifier::load(&fixture("channel_mean_u8.onnx"), 2).unwrap();
        assert_eq!(classifier.input_kind, InputKind::U8);
        // 4800×1200 → 448×224 → four windows
        let prediction = classifier.classify(&flat(4800, 1200, [200, 100, 0])).unwrap();
        let expected = softmax3([2.0, 1.0, 0.0]);
        assert_eq!(prediction.label, "APAL");
        assert!((prediction.score - expected[0]).abs() < 0.01, "{prediction:?}");
        assert!((prediction.confs["EPFU"] - expected[1]).abs() < 0.01);
        assert!((prediction.confs["LABO"] - expected[2]).abs() < 0.01);
    }

    #[test]
    fn float_input_models_see_raw_pixel_values() {
        let mut classifier = Classifier::load(&fixture("channel_mean_f32.onnx"), 1).unwrap();
        assert_eq!(classifier.input_kind, InputKind::F32);
        let prediction = classifier.classify(&flat(4800, 1200, [0, 50, 250])).unwrap();
        let expected = softmax3([0.0, 0.5, 2.5]);
        assert_eq!(prediction.label, "LABO");
        assert!((prediction.score - expected[2]).abs() < 0.01, "{prediction:?}");
    }

    #[test]
    fn batch_size_does_not_change_the_mean() {
        let image = split(4800, 1200);
        let single = Classifier::load(&fixture("channel_mean_u8.onnx"), 1)
            .unwrap()
            .classify(&image)
            .unwrap();
        // four crops in batches of 3 leaves a remainder of 1
        let batched = Classifier::load(&fixture("channel_mean_u8.onnx"), 3)
            .unwrap()
            .classify(&image)
            .unwrap();
        assert_eq!(single.label, batched.label);
        for (label, value) in &single.confs {
            assert!((value - batched.confs[label]).abs() < 1e-6, "{label}");
        }
        // windows lean red on the left and blue on the right; green never wins
        assert!(single.confs["EPFU"] < single.confs["APAL"]);
        assert!(single.confs["EPFU"] < single.confs["LABO"]);
        let sum: f64 = single.confs.values().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }
}
