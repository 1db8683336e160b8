// Audio decoding, STFT, and spectrogram denoising for chirospec.

pub mod decode;
pub mod denoise;
pub mod error;
pub mod source;
pub mod stft;

pub use decode::decode;
pub use denoise::{DenoiseOutcome, denoise};
pub use error::AudioError;
pub use source::{AudioSource, FileSource, MemorySource};
pub use stft::{StftEngine, compute_spectrogram, window_size};
