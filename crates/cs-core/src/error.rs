use std::fmt;

use thiserror::Error;

/// Failure category of a pipeline run, mapped onto a process exit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unreadable, empty, or zero-rate audio. Fatal.
    InvalidAudio,
    /// Classifier model missing, unloadable, or with malformed labels.
    InvalidModel,
    /// Spectrogram has no variation. Recovered internally.
    DegenerateSpectrogram,
    /// No segment found at any threshold. Recovered internally.
    NoSegments,
    /// Spline fitting failed. Recovered internally.
    SplineFailure,
    /// Multi-Otsu had too few distinct values. Recovered internally.
    MultiOtsuFailure,
    /// Filesystem failure while writing assets. Fatal.
    Io,
    /// Cooperative cancellation was requested. Fatal.
    Cancelled,
    /// Anything else.
    Unexpected,
}

impl ErrorKind {
    /// Process exit code reported by the CLI for this kind.
    ///
    /// # Example
    /// ```
    /// use cs_core::ErrorKind;
    /// assert_eq!(ErrorKind::InvalidAudio.exit_code(), 2);
    /// assert_eq!(ErrorKind::Cancelled.exit_code(), 5);
    /// ```
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::InvalidAudio => 2,
            Self::InvalidModel => 3,
            Self::Io => 4,
            Self::Cancelled => 5,
            Self::DegenerateSpectrogram
            | Self::NoSegments
            | Self::SplineFailure
            | Self::MultiOtsuFailure
            | Self::Unexpected => 1,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidAudio => "audio invalide",
            Self::InvalidModel => "modèle invalide",
            Self::DegenerateSpectrogram => "spectrogramme dégénéré",
            Self::NoSegments => "aucun segment",
            Self::SplineFailure => "échec de spline",
            Self::MultiOtsuFailure => "échec multi-otsu",
            Self::Io => "erreur d'E/S",
            Self::Cancelled => "annulé",
            Self::Unexpected => "erreur inattendue",
        };
        f.write_str(name)
    }
}

/// Pipeline stage, carried by errors and log lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Decode,
    Stft,
    Denoise,
    Render,
    Segments,
    Compress,
    Contours,
    Classify,
    Assemble,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Decode => "decode",
            Self::Stft => "stft",
            Self::Denoise => "denoise",
            Self::Render => "render",
            Self::Segments => "segments",
            Self::Compress => "compress",
            Self::Contours => "contours",
            Self::Classify => "classify",
            Self::Assemble => "assemble",
        };
        f.write_str(name)
    }
}

/// Error surfaced by a pipeline run.
///
/// # Example
/// ```
/// use cs_core::{ErrorKind, PipelineError, Stage};
/// let err = PipelineError::new(ErrorKind::InvalidAudio, Stage::Decode, "zero samples");
/// assert_eq!(err.to_string(), "[decode] audio invalide : zero samples");
/// ```
#[derive(Error, Debug)]
#[error("[{stage}] {kind} : {message}")]
pub struct PipelineError {
    /// Failure category.
    pub kind: ErrorKind,
    /// Stage that failed.
    pub stage: Stage,
    /// Human readable detail.
    pub message: String,
}

impl PipelineError {
    #[must_use]
    pub fn new(kind: ErrorKind, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage,
            message: message.into(),
        }
    }

    /// Wrap a filesystem error raised while `stage` was running.
    #[must_use]
    pub fn io(stage: Stage, err: &std::io::Error) -> Self {
        Self::new(ErrorKind::Io, stage, err.to_string())
    }

    /// Cancellation observed at `stage`.
    #[must_use]
    pub fn cancelled(stage: Stage) -> Self {
        Self::new(ErrorKind::Cancelled, stage, "annulation demandée")
    }

    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }
}
