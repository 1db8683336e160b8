//! Contours-only rerun over the masks of a finished run.
//!
//! The masks listed in `spectrogram_assets.json` are read back, traced with
//! the current contour options and the document is rewritten in place. Tiles,
//! segments and the prediction are left untouched.

use std::fs;
use std::path::{Path, PathBuf};

use cs_contour::{SegmentLayout, group_by_segment, trace_contours};
use cs_core::config::PipelineConfig;
use cs_core::{CancelToken, ErrorKind, PipelineError, SpectrogramAssets, Stage};
use cs_render::{read_rgb_tiles, read_tiles};

use crate::output::{OutputLock, Rollback, write_assets};
use crate::pipeline::{COMPRESSED_DIR, RunOutcome, document_paths, export_svgs, stage_err};

/// Suffix shared by every mask tile name, after `NN_of_TT`.
const MASK_MARKER: &str = "_compressed.";

/// Retrace the contours of the run whose document is `assets_path`.
///
/// The noise filter of `config` wins; without one, the threshold recorded in
/// the document is reused. SVG drawings are written when `export_svg` is set
/// and removed otherwise.
///
/// # Errors
/// `Io` if the directory is locked, the document is unreadable, or a mask
/// is missing or does not match the recorded geometry. `Cancelled` on request.
pub fn rerun_contours(
    assets_path: &Path,
    config: &PipelineConfig,
    cancel: &CancelToken,
) -> Result<RunOutcome, PipelineError> {
    let dir = assets_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let _lock = OutputLock::acquire_existing(dir)?;
    cancel.check(Stage::Contours)?;

    let text = fs::read_to_string(assets_path).map_err(|e| PipelineError::io(Stage::Contours, &e))?;
    let mut assets: SpectrogramAssets = serde_json::from_str(&text).map_err(|e| {
        PipelineError::new(
            ErrorKind::Io,
            Stage::Contours,
            format!("{} illisible : {e}", assets_path.display()),
        )
    })?;

    let compressed_dir = dir.join(COMPRESSED_DIR);
    let mask_files = resolve(&compressed_dir, &assets.compressed.masks)?;
    let mask = read_tiles(&mask_files).map_err(stage_err(ErrorKind::Io, Stage::Contours))?;
    if (mask.width, mask.height) != (assets.compressed.width, assets.compressed.height) {
        return Err(PipelineError::new(
            ErrorKind::Io,
            Stage::Contours,
            format!(
                "masques {}×{}, document {}×{}",
                mask.width, mask.height, assets.compressed.width, assets.compressed.height
            ),
        ));
    }

    let mut contour_config = config.contours.clone();
    if contour_config.noise_filter_threshold.is_none() {
        contour_config.noise_filter_threshold = assets.noise_filter_threshold;
    }
    let layout = SegmentLayout {
        widths: assets.compressed.widths.clone(),
        starts: assets.compressed.starts.clone(),
        stops: assets.compressed.stops.clone(),
        freq_min: f64::from(assets.freq_min),
        freq_max: f64::from(assets.freq_max),
        height: mask.height,
    };
    let contours = trace_contours(
        &mask.data,
        mask.width as usize,
        mask.height as usize,
        &contour_config,
    );
    drop(mask);
    cancel.check(Stage::Contours)?;

    let mut rollback = Rollback::new();
    let stale: Vec<PathBuf> = assets
        .compressed
        .svgs
        .iter()
        .map(|name| compressed_dir.join(name.trim_start_matches("./")))
        .collect();
    let svg_files = if contour_config.export_svg {
        let display_files = resolve(&compressed_dir, &assets.compressed.paths)?;
        let display = read_rgb_tiles(&display_files).map_err(stage_err(ErrorKind::Io, Stage::Contours))?;
        export_svgs(&compressed_dir, &stem_of(&mask_files), &contours, &display)?
    } else {
        Vec::new()
    };
    rollback.track_files(svg_files.iter().filter(|f| !stale.contains(f)).cloned());

    assets.compressed.segments = group_by_segment(&contours, &layout);
    assets.compressed.svgs = document_paths(&svg_files);
    assets.noise_filter_threshold = contour_config.noise_filter_threshold;
    let assets_path = write_assets(dir, &assets)?;
    rollback.commit();

    for file in stale.iter().filter(|f| !svg_files.contains(f)) {
        if let Err(e) = fs::remove_file(file)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            log::warn!("SVG périmé non supprimé {} : {e}", file.display());
        }
    }
    let total: usize = assets.compressed.segments.iter().map(|b| b.contour_count).sum();
    log::info!("Contours recalculés : {total} sur {} segments", assets.compressed.segments.len());

    Ok(RunOutcome {
        assets,
        assets_path,
        model_error: None,
    })
}

/// Files named `./<name>` in the document, under `dir`.
fn resolve(dir: &Path, names: &[String]) -> Result<Vec<PathBuf>, PipelineError> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name.trim_start_matches("./"));
            if path.is_file() {
                Ok(path)
            } else {
                Err(PipelineError::new(
                    ErrorKind::Io,
                    Stage::Contours,
                    format!("{} introuvable", path.display()),
                ))
            }
        })
        .collect()
}

/// Recording stem of the first mask tile: `rec` for `rec_compressed.01_of_01.mask.jpg`.
fn stem_of(mask_files: &[PathBuf]) -> String {
    mask_files
        .first()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .and_then(|n| n.rfind(MASK_MARKER).map(|i| n[..i].to_string()))
        .unwrap_or_else(|| "recording".to_string())
}
