//! Exclusive output directory, rollback of partial runs, atomic document write.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use cs_contour::Contour;
use cs_contour::svg::{SvgStyle, render_svg};
use cs_core::{ErrorKind, PipelineError, SpectrogramAssets, Stage};
use tempfile::NamedTempFile;

/// Nom du verrou posé dans le dossier de sortie pendant un run.
pub const LOCK_FILE: &str = ".chirospec.lock";

/// Nom du document résultat.
pub const ASSETS_FILE: &str = "spectrogram_assets.json";

/// Exclusive claim on an output directory, released on drop.
///
/// Directories created by [`OutputLock::acquire`] are removed again on
/// release when the run left them empty.
#[derive(Debug)]
pub struct OutputLock {
    path: PathBuf,
    _file: File,
    /// Directories created for the run, deepest first.
    created: Vec<PathBuf>,
}

impl OutputLock {
    /// Create `dir` if needed and claim it.
    ///
    /// # Errors
    /// `Io` if the directory cannot be created, is already locked, or holds
    /// anything besides the lock.
    pub fn acquire(dir: &Path) -> Result<Self, PipelineError> {
        let created: Vec<PathBuf> = dir
            .ancestors()
            .take_while(|p| !p.as_os_str().is_empty() && !p.exists())
            .map(Path::to_path_buf)
            .collect();
        fs::create_dir_all(dir).map_err(|e| PipelineError::io(Stage::Assemble, &e))?;
        let mut lock = Self::claim(dir)?;
        lock.created = created;

        let foreign = fs::read_dir(dir)
            .map_err(|e| PipelineError::io(Stage::Assemble, &e))?
            .filter_map(Result::ok)
            .any(|entry| entry.file_name() != LOCK_FILE);
        if foreign {
            return Err(PipelineError::new(
                ErrorKind::Io,
                Stage::Assemble,
                format!("{} n'est pas vide", dir.display()),
            ));
        }
        Ok(lock)
    }

    /// Claim an existing, populated directory, to rewrite assets in place.
    ///
    /// # Errors
    /// `Io` if the directory is missing or already locked.
    pub fn acquire_existing(dir: &Path) -> Result<Self, PipelineError> {
        if !dir.is_dir() {
            return Err(PipelineError::new(
                ErrorKind::Io,
                Stage::Assemble,
                format!("{} introuvable", dir.display()),
            ));
        }
        Self::claim(dir)
    }

    fn claim(dir: &Path) -> Result<Self, PipelineError> {
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    PipelineError::new(
                        ErrorKind::Io,
                        Stage::Assemble,
                        format!("{} est déjà utilisé par un autre run", dir.display()),
                    )
                } else {
                    PipelineError::io(Stage::Assemble, &e)
                }
            })?;
        Ok(Self {
            path,
            _file: file,
            created: Vec::new(),
        })
    }
}

impl Drop for OutputLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Verrou non supprimé {} : {e}", self.path.display());
        }
        for dir in &self.created {
            let empty = fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_none());
            if !empty {
                break;
            }
            if let Err(e) = fs::remove_dir(dir) {
                log::warn!("Dossier non supprimé {} : {e}", dir.display());
                break;
            }
        }
    }
}

/// Files and directories created by a run; deleted on drop unless committed.
#[derive(Debug, Default)]
pub struct Rollback {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
    committed: bool,
}

impl Rollback {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_file(&mut self, path: PathBuf) {
        self.files.push(path);
    }

    pub fn track_files(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        self.files.extend(paths);
    }

    /// Register a directory the run is about to create. It is removed with
    /// its whole content, partial tiles included.
    pub fn track_dir(&mut self, path: PathBuf) {
        self.dirs.push(path);
    }

    /// Keep every tracked artifact.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Rollback {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for file in &self.files {
            if let Err(e) = fs::remove_file(file)
                && e.kind() != io::ErrorKind::NotFound
            {
                log::warn!("Rollback : {} non supprimé : {e}", file.display());
            }
        }
        for dir in self.dirs.iter().rev() {
            if let Err(e) = fs::remove_dir_all(dir)
                && e.kind() != io::ErrorKind::NotFound
            {
                log::warn!("Rollback : {} non supprimé : {e}", dir.display());
            }
        }
        if !self.files.is_empty() {
            log::info!("Rollback : {} fichiers supprimés", self.files.len());
        }
    }
}

/// Serialise `assets` to `<dir>/spectrogram_assets.json` through a temp file.
///
/// # Errors
/// `Io` on any serialisation or filesystem failure.
pub fn write_assets(dir: &Path, assets: &SpectrogramAssets) -> Result<PathBuf, PipelineError> {
    let path = dir.join(ASSETS_FILE);
    write_atomic(&path, Stage::Assemble, |writer| {
        serde_json::to_writer_pretty(writer, assets).map_err(io::Error::from)
    })?;
    Ok(path)
}

/// Write `text` to `path` through a temp file in the same directory.
///
/// # Errors
/// `Io` on any filesystem failure, attributed to `stage`.
pub fn write_text(path: &Path, text: &str, stage: Stage) -> Result<(), PipelineError> {
    write_atomic(path, stage, |writer| writer.write_all(text.as_bytes()))
}

/// Write the filled and the level-coloured drawings of `contours` into `dir`
/// as `<stem>_compressed.contours.svg` and `<stem>_compressed.contours.colored.svg`.
///
/// `reference` is the RGB display raster the filled shapes take their colour from.
///
/// # Errors
/// `Io` on any filesystem failure.
pub fn write_contour_svgs(
    dir: &Path,
    stem: &str,
    contours: &[Contour],
    (width, height): (u32, u32),
    reference: &[u8],
) -> Result<Vec<PathBuf>, PipelineError> {
    let (w, h) = (width as usize, height as usize);
    let drawings = [
        (
            format!("{stem}_compressed.contours.svg"),
            render_svg(contours, w, h, SvgStyle::Filled { reference }),
        ),
        (
            format!("{stem}_compressed.contours.colored.svg"),
            render_svg(contours, w, h, SvgStyle::LevelColored),
        ),
    ];
    let mut written = Vec::with_capacity(drawings.len());
    for (name, text) in drawings {
        let path = dir.join(name);
        write_text(&path, &text, Stage::Contours)?;
        log::debug!("SVG écrit : {}", path.display());
        written.push(path);
    }
    Ok(written)
}

fn write_atomic(
    path: &Path,
    stage: Stage,
    body: impl FnOnce(&mut BufWriter<&mut File>) -> io::Result<()>,
) -> Result<(), PipelineError> {
    let io_err = |e: &io::Error| PipelineError::io(stage, e);
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| io_err(&e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        body(&mut writer).map_err(|e| io_err(&e))?;
        writer.flush().map_err(|e| io_err(&e))?;
    }
    tmp.persist(path).map_err(|e| io_err(&e.error))?;
    Ok(())
}
