// Species inference on the compressed spectrogram with an ONNX classifier.

pub mod error;
pub mod labels;
pub mod model;
pub mod preprocess;
pub mod scores;

pub use error::ClassifyError;
pub use labels::LabelMap;
pub use model::Classifier;
pub use preprocess::{Crops, prepare_crops};
pub use scores::decode_prediction;
