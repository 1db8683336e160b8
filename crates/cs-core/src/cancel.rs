use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{PipelineError, Stage};

/// Jeton d'annulation coopérative partagé entre le handler Ctrl+C et le pipeline.
///
/// Le pipeline vérifie le jeton entre chaque étape. Clonable, `Send + Sync`.
///
/// # Example
/// ```
/// use cs_core::CancelToken;
/// use cs_core::error::Stage;
/// let token = CancelToken::new();
/// let handle = token.clone();
/// assert!(token.check(Stage::Stft).is_ok());
/// handle.cancel();
/// assert!(token.check(Stage::Stft).is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Fail with `Cancelled` if cancellation was requested.
    ///
    /// # Errors
    /// Returns a `Cancelled` error tagged with `stage`.
    #[inline]
    pub fn check(&self, stage: Stage) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            Err(PipelineError::cancelled(stage))
        } else {
            Ok(())
        }
    }
}
