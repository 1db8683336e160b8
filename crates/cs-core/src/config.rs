use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Lower edge of the ultrasonic band of interest, in Hz.
pub const FREQ_MIN: f64 = 5_000.0;
/// Upper edge of the ultrasonic band of interest, in Hz.
pub const FREQ_MAX: f64 = 120_000.0;
/// Padding added around the band when rendering, in Hz.
pub const FREQ_PAD: f64 = 2_000.0;

/// Columns of padding added on each side of a detected run.
pub const SEGMENT_BUFFER_PX: usize = 40;
/// Initial amplitude threshold of the segment loop.
pub const THRESHOLD_START: f32 = 0.5;
/// Amount the threshold is lowered after an empty pass.
pub const THRESHOLD_STEP: f32 = 0.05;

/// Rendered pixels per millisecond of recording.
pub const PX_PER_MS: f64 = 8.0;
/// Height of the canonical spectrogram raster.
pub const CANONICAL_HEIGHT: u32 = 1200;
/// Maximum number of STFT frames rendered per chunk.
pub const RENDER_CHUNK_FRAMES: usize = 2_000;
/// Maximum width of one JPEG tile.
pub const TILE_MAX_WIDTH: u32 = 50_000;
/// JPEG quality of every tile.
pub const JPEG_QUALITY: u8 = 80;

/// Contour pre-blur kernel size (square).
pub const BLUR_KERNEL: usize = 15;
/// Contour pre-blur standard deviation.
pub const BLUR_SIGMA: f64 = 3.0;

/// Height (and window width) of classifier crops.
pub const CROP_SIZE: u32 = 224;
/// Horizontal stride between classifier crops.
pub const CROP_STRIDE: u32 = 100;

/// Lowest rendered frequency, `FREQ_MIN - FREQ_PAD`.
#[must_use]
pub fn freq_low() -> u32 {
    (FREQ_MIN - FREQ_PAD) as u32
}

/// Highest rendered frequency, `FREQ_MAX + FREQ_PAD`.
#[must_use]
pub fn freq_high() -> u32 {
    (FREQ_MAX + FREQ_PAD) as u32
}

/// Configuration complète d'un run, immuable une fois chargée.
///
/// Sérialisable en TOML. Chaque champ a une valeur par défaut saine.
///
/// # Example
/// ```
/// use cs_core::config::PipelineConfig;
/// let config = PipelineConfig::default();
/// assert_eq!(config.render.dpi, 520);
/// assert!(config.classifier.run_inference_on_upload);
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct PipelineConfig {
    /// Spectrogram rendering.
    pub render: RenderConfig,
    /// Contour extraction.
    pub contours: ContourConfig,
    /// Species inference.
    pub classifier: ClassifierConfig,
}

/// Rendering options.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RenderConfig {
    /// Colormap of the display tiles. Analysis always runs on grayscale.
    pub colormap: Colormap,
    /// Oversampling of the intermediate raster. Final dimensions are canonical.
    pub dpi: u32,
    /// Fraction of full scale at or below which mask pixels are zeroed [0.0, 1.0).
    pub mask_noise: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            colormap: Colormap::Gray,
            dpi: 520,
            mask_noise: 0.1,
        }
    }
}

/// Display colormap.
///
/// # Example
/// ```
/// use cs_core::config::Colormap;
/// assert_eq!(Colormap::from_name("null"), Some(Colormap::Gray));
/// assert_eq!(Colormap::from_name("turbo"), Some(Colormap::Turbo));
/// assert_eq!(Colormap::from_name("viridis"), None);
/// ```
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum Colormap {
    /// Black background, white energy.
    #[default]
    #[serde(rename = "gray", alias = "null", alias = "none")]
    Gray,
    /// Inverted grayscale: light background, dark energy.
    #[serde(rename = "gist_yarg")]
    GistYarg,
    /// Heatmap for display.
    #[serde(rename = "turbo")]
    Turbo,
}

impl Colormap {
    /// Parse a colormap name as accepted on the command line.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "null" | "none" | "gray" | "grey" => Some(Self::Gray),
            "gist_yarg" => Some(Self::GistYarg),
            "turbo" => Some(Self::Turbo),
            _ => None,
        }
    }
}

/// Strategy used to pick contour iso-levels.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum LevelsMode {
    /// Fixed percentiles of the valid pixel intensities.
    #[default]
    #[serde(rename = "percentile")]
    Percentile,
    /// Multi-level Otsu thresholds.
    #[serde(rename = "multi-otsu")]
    MultiOtsu,
    /// Variance-bounded groups of the smoothed intensity histogram.
    #[serde(rename = "histogram")]
    Histogram,
}

impl LevelsMode {
    /// Parse a mode name as accepted on the command line.
    ///
    /// # Example
    /// ```
    /// use cs_core::config::LevelsMode;
    /// assert_eq!(LevelsMode::from_name("multi-otsu"), Some(LevelsMode::MultiOtsu));
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "percentile" => Some(Self::Percentile),
            "multi-otsu" | "multi_otsu" | "multiotsu" => Some(Self::MultiOtsu),
            "histogram" => Some(Self::Histogram),
            _ => None,
        }
    }
}

/// Contour extraction options.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ContourConfig {
    /// Level selection strategy.
    pub levels_mode: LevelsMode,
    /// Percentiles used by `Percentile` mode (and the multi-Otsu fallback).
    pub percentile_values: Vec<f64>,
    /// Polygons with a smaller area (px²) are dropped.
    pub min_area: f64,
    /// Spline smoothing per point, `s = n * smoothing_factor`.
    pub smoothing_factor: f64,
    /// Pixels below this intensity do not take part in level selection.
    pub min_intensity: f64,
    /// Number of classes of the multi-Otsu split.
    pub multi_otsu_classes: usize,
    /// Histogram bins of `Histogram` mode.
    pub hist_bins: usize,
    /// Gaussian sigma applied to the histogram counts.
    pub hist_sigma: f64,
    /// Weighted variance that closes a histogram group.
    pub hist_variance_threshold: f64,
    /// Maximum number of histogram levels kept.
    pub hist_max_levels: usize,
    /// Mask pixels below this percentage of full scale are zeroed before the
    /// blur. `None` keeps the mask as is.
    pub noise_filter_threshold: Option<f64>,
    /// Also write the contours as SVG next to the compressed tiles.
    pub export_svg: bool,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            levels_mode: LevelsMode::Percentile,
            percentile_values: vec![60.0, 70.0, 80.0, 90.0, 92.0, 94.0, 96.0, 98.0],
            min_area: 30.0,
            smoothing_factor: 0.08,
            min_intensity: 1.0,
            multi_otsu_classes: 4,
            hist_bins: 512,
            hist_sigma: 2.0,
            hist_variance_threshold: 400.0,
            hist_max_levels: 5,
            noise_filter_threshold: None,
            export_svg: false,
        }
    }
}

/// Species inference options.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ClassifierConfig {
    /// Run the classifier after contour extraction.
    pub run_inference_on_upload: bool,
    /// Crops per ONNX call (≥ 1).
    pub batch_size: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            run_inference_on_upload: true,
            batch_size: 1,
        }
    }
}

impl PipelineConfig {
    /// Clamp all numeric fields to their valid ranges.
    /// Called after TOML deserialization to prevent out-of-range values.
    pub fn clamp_all(&mut self) {
        self.render.dpi = self.render.dpi.clamp(72, 2_400);
        self.render.mask_noise = self.render.mask_noise.clamp(0.0, 0.99);

        let c = &mut self.contours;
        c.percentile_values.retain(|p| p.is_finite());
        for p in &mut c.percentile_values {
            *p = p.clamp(0.0, 100.0);
        }
        c.percentile_values.sort_by(f64::total_cmp);
        c.min_area = c.min_area.max(0.0);
        c.smoothing_factor = c.smoothing_factor.max(0.0);
        c.min_intensity = c.min_intensity.clamp(0.0, 255.0);
        c.multi_otsu_classes = c.multi_otsu_classes.clamp(2, 6);
        c.hist_bins = c.hist_bins.clamp(2, 4_096);
        c.hist_sigma = c.hist_sigma.max(0.0);
        c.hist_variance_threshold = c.hist_variance_threshold.max(0.0);
        c.hist_max_levels = c.hist_max_levels.max(1);
        c.noise_filter_threshold = c
            .noise_filter_threshold
            .filter(|t| t.is_finite())
            .map(|t| t.clamp(0.0, 100.0));

        self.classifier.batch_size = self.classifier.batch_size.clamp(1, 256);
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
struct ConfigFile {
    render: Option<RenderSection>,
    contours: Option<ContourSection>,
    classifier: Option<ClassifierSection>,
}

/// Render section of the TOML config, all fields optional for partial override.
#[derive(Deserialize)]
struct RenderSection {
    colormap: Option<Colormap>,
    dpi: Option<u32>,
    mask_noise: Option<f32>,
}

/// Contour section of the TOML config, all fields optional.
#[derive(Deserialize)]
struct ContourSection {
    levels_mode: Option<LevelsMode>,
    percentile_values: Option<Vec<f64>>,
    min_area: Option<f64>,
    smoothing_factor: Option<f64>,
    min_intensity: Option<f64>,
    multi_otsu_classes: Option<usize>,
    hist_bins: Option<usize>,
    hist_sigma: Option<f64>,
    hist_variance_threshold: Option<f64>,
    hist_max_levels: Option<usize>,
    noise_filter_threshold: Option<f64>,
    export_svg: Option<bool>,
}

/// Classifier section of the TOML config, all fields optional.
#[derive(Deserialize)]
struct ClassifierSection {
    run_inference_on_upload: Option<bool>,
    batch_size: Option<usize>,
}

/// Parse un document TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the document is not valid TOML for this schema.
///
/// # Example
/// ```
/// use cs_core::config::{parse_config, LevelsMode};
/// let config = parse_config("[contours]\nlevels_mode = \"histogram\"\n").unwrap();
/// assert_eq!(config.contours.levels_mode, LevelsMode::Histogram);
/// assert_eq!(config.contours.min_area, 30.0);
/// ```
pub fn parse_config(content: &str) -> Result<PipelineConfig> {
    let file: ConfigFile = toml::from_str(content).context("Erreur de parsing TOML")?;
    let mut config = PipelineConfig::default();

    if let Some(r) = file.render {
        if let Some(v) = r.colormap {
            config.render.colormap = v;
        }
        if let Some(v) = r.dpi {
            config.render.dpi = v;
        }
        if let Some(v) = r.mask_noise {
            config.render.mask_noise = v;
        }
    }

    if let Some(c) = file.contours {
        if let Some(v) = c.levels_mode {
            config.contours.levels_mode = v;
        }
        if let Some(v) = c.percentile_values {
            config.contours.percentile_values = v;
        }
        if let Some(v) = c.min_area {
            config.contours.min_area = v;
        }
        if let Some(v) = c.smoothing_factor {
            config.contours.smoothing_factor = v;
        }
        if let Some(v) = c.min_intensity {
            config.contours.min_intensity = v;
        }
        if let Some(v) = c.multi_otsu_classes {
            config.contours.multi_otsu_classes = v;
        }
        if let Some(v) = c.hist_bins {
            config.contours.hist_bins = v;
        }
        if let Some(v) = c.hist_sigma {
            config.contours.hist_sigma = v;
        }
        if let Some(v) = c.hist_variance_threshold {
            config.contours.hist_variance_threshold = v;
        }
        if let Some(v) = c.hist_max_levels {
            config.contours.hist_max_levels = v;
        }
        if let Some(v) = c.noise_filter_threshold {
            config.contours.noise_filter_threshold = Some(v);
        }
        if let Some(v) = c.export_svg {
            config.contours.export_svg = v;
        }
    }

    if let Some(c) = file.classifier {
        if let Some(v) = c.run_inference_on_upload {
            config.classifier.run_inference_on_upload = v;
        }
        if let Some(v) = c.batch_size {
            config.classifier.batch_size = v;
        }
    }

    config.clamp_all();
    Ok(config)
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
/// ```no_run
/// use cs_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Configuration invalide : {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn partial_sections_override_only_named_keys() {
        let config = parse_config(
            r#"
            [render]
            colormap = "turbo"

            [classifier]
            run_inference_on_upload = false
            "#,
        )
        .unwrap();
        assert_eq!(config.render.colormap, Colormap::Turbo);
        assert_eq!(config.render.dpi, 520);
        assert!(!config.classifier.run_inference_on_upload);
        assert_eq!(config.classifier.batch_size, 1);
    }

    #[test]
    fn null_colormap_alias_maps_to_gray() {
        let config = parse_config("[render]\ncolormap = \"null\"\n").unwrap();
        assert_eq!(config.render.colormap, Colormap::Gray);
    }

    #[test]
    fn clamp_sorts_percentiles_and_bounds_values() {
        let config = parse_config(
            r#"
            [contours]
            percentile_values = [98.0, 150.0, 60.0]
            multi_otsu_classes = 40
            hist_max_levels = 0

            [classifier]
            batch_size = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.contours.percentile_values, vec![60.0, 98.0, 100.0]);
        assert_eq!(config.contours.multi_otsu_classes, 6);
        assert_eq!(config.contours.hist_max_levels, 1);
        assert_eq!(config.classifier.batch_size, 1);
    }

    #[test]
    fn noise_filter_is_off_unless_set() {
        assert_eq!(PipelineConfig::default().contours.noise_filter_threshold, None);
        let config = parse_config("[contours]\nnoise_filter_threshold = 140.0\nexport_svg = true\n").unwrap();
        assert_eq!(config.contours.noise_filter_threshold, Some(100.0));
        assert!(config.contours.export_svg);
    }

    #[test]
    fn unknown_levels_mode_is_rejected() {
        assert!(parse_config("[contours]\nlevels_mode = \"kmeans\"\n").is_err());
    }

    #[test]
    fn load_config_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chirospec.toml");
        std::fs::write(&path, "[render]\ndpi = 130\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.render.dpi, 130);
    }

    #[test]
    fn band_edges_include_padding() {
        assert_eq!(freq_low(), 3_000);
        assert_eq!(freq_high(), 122_000);
    }
}
