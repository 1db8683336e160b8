//! Configuration, data model, and shared structures for chirospec.
//!
//! This crate contains the value objects handed from one pipeline stage to
//! the next, the configuration record, the error kinds, and the numeric
//! helpers shared across the workspace.

pub mod assets;
pub mod cancel;
pub mod config;
pub mod error;
pub mod segment;
pub mod signal;
pub mod stats;

pub use assets::{Prediction, SpectrogramAssets};
pub use cancel::CancelToken;
pub use config::PipelineConfig;
pub use error::{ErrorKind, PipelineError, Stage};
pub use segment::Segment;
pub use signal::{AudioSignal, PowerSpectrogram};
