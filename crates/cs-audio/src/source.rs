use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use symphonia::core::io::MediaSource;

use crate::error::AudioError;

/// Something the decoder can read an encoded recording from.
///
/// Filesystem paths and in-memory buffers are the two implementations; the
/// decoder only sees a seekable [`MediaSource`] and an optional format hint.
pub trait AudioSource {
    /// Human readable name used in logs and errors.
    fn name(&self) -> String;

    /// Container extension hint (`"wav"`, `"flac"`, ...), if known.
    fn hint(&self) -> Option<String>;

    /// Base name without extension, used to name output tiles.
    fn stem(&self) -> String;

    /// Open a fresh reader positioned at the start of the stream.
    ///
    /// # Errors
    /// Returns `AudioError::Open` if the underlying resource cannot be opened.
    fn open(&self) -> Result<Box<dyn MediaSource>, AudioError>;
}

/// Recording stored on disk.
///
/// # Example
/// ```
/// use cs_audio::{AudioSource, FileSource};
/// let source = FileSource::new("recordings/night_01.WAV");
/// assert_eq!(source.stem(), "night_01");
/// assert_eq!(source.hint().as_deref(), Some("wav"));
/// ```
#[derive(Clone, Debug)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AudioSource for FileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn hint(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }

    fn stem(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("recording")
            .to_string()
    }

    fn open(&self) -> Result<Box<dyn MediaSource>, AudioError> {
        let file = File::open(&self.path).map_err(|source| AudioError::Open {
            name: self.name(),
            source,
        })?;
        Ok(Box::new(file))
    }
}

/// Recording already held in memory (an upload body, a test fixture).
#[derive(Clone, Debug)]
pub struct MemorySource {
    name: String,
    bytes: Vec<u8>,
    hint: Option<String>,
}

impl MemorySource {
    /// `name` may carry an extension; it is used as the hint when present.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let hint = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        Self { name, bytes, hint }
    }

    /// Override the format hint.
    #[must_use]
    pub fn with_hint(mut self, ext: &str) -> Self {
        self.hint = Some(ext.to_ascii_lowercase());
        self
    }
}

impl AudioSource for MemorySource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn hint(&self) -> Option<String> {
        self.hint.clone()
    }

    fn stem(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("recording")
            .to_string()
    }

    fn open(&self) -> Result<Box<dyn MediaSource>, AudioError> {
        Ok(Box::new(Cursor::new(self.bytes.clone())))
    }
}
