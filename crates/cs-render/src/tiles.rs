use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use cs_core::config::{JPEG_QUALITY, TILE_MAX_WIDTH};
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use tempfile::NamedTempFile;

use crate::raster::{GrayRaster, RgbRaster};

/// Which family of tiles is being written; decides the file name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileKind {
    /// `<stem>_spectrogram.NN_of_TT.jpg`
    Spectrogram,
    /// `<stem>_compressed.NN_of_TT.jpg`
    Compressed,
    /// `<stem>_compressed.NN_of_TT.mask.jpg`
    Mask,
}

impl TileKind {
    /// File name of tile `index` (1-based) out of `total`.
    ///
    /// # Example
    /// ```
    /// use cs_render::TileKind;
    /// assert_eq!(TileKind::Mask.file_name("rec", 1, 3), "rec_compressed.01_of_03.mask.jpg");
    /// assert_eq!(TileKind::Spectrogram.file_name("rec", 2, 2), "rec_spectrogram.02_of_02.jpg");
    /// ```
    #[must_use]
    pub fn file_name(self, stem: &str, index: usize, total: usize) -> String {
        match self {
            Self::Spectrogram => format!("{stem}_spectrogram.{index:02}_of_{total:02}.jpg"),
            Self::Compressed => format!("{stem}_compressed.{index:02}_of_{total:02}.jpg"),
            Self::Mask => format!("{stem}_compressed.{index:02}_of_{total:02}.mask.jpg"),
        }
    }
}

/// Pixels handed to the tile writer.
#[derive(Clone, Copy, Debug)]
pub enum TileImage<'a> {
    Rgb(&'a RgbRaster),
    Gray(&'a GrayRaster),
}

impl TileImage<'_> {
    fn dims(&self) -> (u32, u32) {
        match self {
            Self::Rgb(r) => (r.width, r.height),
            Self::Gray(r) => (r.width, r.height),
        }
    }

    /// Encoded bytes of columns `[start, stop)`.
    fn columns(&self, start: u32, stop: u32) -> (Vec<u8>, ExtendedColorType) {
        match self {
            Self::Rgb(r) => (r.crop_columns(start, stop).data, ExtendedColorType::Rgb8),
            Self::Gray(r) => (r.crop_columns(start, stop).data, ExtendedColorType::L8),
        }
    }
}

/// Tiles written for one image.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TileSet {
    /// Absolute or caller-relative file paths, in order.
    pub files: Vec<PathBuf>,
    /// Pixel width of each tile.
    pub widths: Vec<u32>,
}

impl TileSet {
    /// Paths as recorded in the result document: `./<file name>`.
    #[must_use]
    pub fn document_paths(&self) -> Vec<String> {
        self.files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .map(|n| format!("./{n}"))
            .collect()
    }
}

/// Column ranges of the tiles: fixed 50 000 px slices, the last one shorter.
///
/// # Example
/// ```
/// use cs_render::tiles::tile_ranges;
/// assert_eq!(tile_ranges(120_000), vec![(0, 50_000), (50_000, 100_000), (100_000, 120_000)]);
/// assert_eq!(tile_ranges(10), vec![(0, 10)]);
/// ```
#[must_use]
pub fn tile_ranges(width: u32) -> Vec<(u32, u32)> {
    if width <= TILE_MAX_WIDTH {
        return vec![(0, width)];
    }
    (0..width)
        .step_by(TILE_MAX_WIDTH as usize)
        .map(|start| (start, (start + TILE_MAX_WIDTH).min(width)))
        .collect()
}

/// Split `image` into JPEG tiles (quality 80) under `dir`.
///
/// Each tile is encoded into a temporary file in `dir` and renamed into
/// place, so a reader never observes a partial tile.
///
/// # Errors
/// Returns an error if the image is empty, or on any encode or IO failure.
pub fn write_tiles(dir: &Path, stem: &str, kind: TileKind, image: TileImage<'_>) -> Result<TileSet> {
    let (width, height) = image.dims();
    if width == 0 || height == 0 {
        bail!("Image vide : {width}×{height}");
    }
    fs::create_dir_all(dir).with_context(|| format!("Impossible de créer {}", dir.display()))?;

    let ranges = tile_ranges(width);
    let total = ranges.len();
    let mut set = TileSet::default();
    for (i, &(start, stop)) in ranges.iter().enumerate() {
        let path = dir.join(kind.file_name(stem, i + 1, total));
        let (bytes, color) = image.columns(start, stop);
        write_jpeg_atomic(&path, &bytes, stop - start, height, color)?;
        log::debug!("Saved tile {}", path.display());
        set.files.push(path);
        set.widths.push(stop - start);
    }
    log::info!("Tiles: {total} x {kind:?} in {}", dir.display());
    Ok(set)
}

fn write_jpeg_atomic(path: &Path, bytes: &[u8], width: u32, height: u32, color: ExtendedColorType) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).with_context(|| format!("Fichier temporaire dans {}", dir.display()))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
            .encode(bytes, width, height, color)
            .with_context(|| format!("Encodage JPEG : {}", path.display()))?;
        writer.flush()?;
    }
    tmp.persist(path)
        .with_context(|| format!("Impossible d'écrire {}", path.display()))?;
    Ok(())
}

/// Read single-channel tiles back and concatenate them left to right.
///
/// # Errors
/// Returns an error if a tile cannot be decoded or heights differ.
pub fn read_tiles(files: &[PathBuf]) -> Result<GrayRaster> {
    let mut parts = Vec::with_capacity(files.len());
    for path in files {
        let luma = open_tile(path)?.to_luma8();
        let (width, height) = luma.dimensions();
        parts.push(GrayRaster {
            data: luma.into_raw(),
            width,
            height,
        });
    }
    GrayRaster::hconcat(&parts)
}

/// Read colour tiles back and concatenate them left to right.
///
/// # Errors
/// Returns an error if a tile cannot be decoded or heights differ.
pub fn read_rgb_tiles(files: &[PathBuf]) -> Result<RgbRaster> {
    let mut parts = Vec::with_capacity(files.len());
    for path in files {
        let rgb = open_tile(path)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        parts.push(RgbRaster {
            data: rgb.into_raw(),
            width,
            height,
        });
    }
    RgbRaster::hconcat(&parts)
}

fn open_tile(path: &Path) -> Result<image::DynamicImage> {
    image::open(path).with_context(|| format!("Impossible de charger {}", path.display()))
}
