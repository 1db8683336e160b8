use anyhow::Result;
use cs_core::PowerSpectrogram;
use cs_core::config::{CANONICAL_HEIGHT, PX_PER_MS, RENDER_CHUNK_FRAMES, freq_high, freq_low};

use crate::raster::{GrayRaster, RgbRaster};
use crate::resize::Resizer;

/// Canonical spectrogram image: `round(8 · duration_ms)` × 1200, high frequencies on top.
#[derive(Clone, Debug)]
pub struct RenderedSpectrogram {
    pub image: RgbRaster,
    pub duration_ms: f64,
    pub freq_min: u32,
    pub freq_max: u32,
}

/// Canonical raster width for a recording of `duration_ms`.
///
/// # Example
/// ```
/// use cs_render::render::canonical_width;
/// assert_eq!(canonical_width(1000.0), 8000);
/// assert_eq!(canonical_width(0.01), 1);
/// ```
#[must_use]
pub fn canonical_width(duration_ms: f64) -> u32 {
    (PX_PER_MS * duration_ms).round().max(1.0) as u32
}

/// Columns of the intermediate raster per STFT frame.
fn columns_per_frame(dpi: u32) -> usize {
    (dpi / 130).max(1) as usize
}

/// Map each intermediate row to the spectrogram bin it shows, `None` for background.
fn row_bins(spec: &PowerSpectrogram, rows: usize) -> Vec<Option<usize>> {
    let lo = f64::from(freq_low());
    let hi = f64::from(freq_high());
    let bin_hz = spec.bin_frequency(1);
    (0..rows)
        .map(|r| {
            if bin_hz <= 0.0 {
                return None;
            }
            let f = hi - (r as f64 + 0.5) * (hi - lo) / rows as f64;
            let bin = (f / bin_hz).round() as usize;
            (bin < spec.bins && !spec.dead_rows[bin]).then_some(bin)
        })
        .collect()
}

/// Rasterise a denoised spectrogram into the canonical image.
///
/// Frames are drawn in chunks of at most 2000 onto an intermediate raster
/// `3·dpi` px high with `max(1, dpi/130)` columns per frame, normalised by the
/// global min/max with the 256-level gray ramp. Rows above Nyquist and
/// out-of-band rows stay black. The result is Lanczos-resized to the canonical
/// grid.
///
/// # Errors
/// Returns an error if the resize fails.
///
/// # Example
/// ```
/// use cs_core::PowerSpectrogram;
/// use cs_render::render_spectrogram;
/// let spec = PowerSpectrogram::zeros(257, 40, 256_000, 512, 128);
/// let rendered = render_spectrogram(&spec, 20.0, 130).unwrap();
/// assert_eq!((rendered.image.width, rendered.image.height), (160, 1200));
/// ```
pub fn render_spectrogram(spec: &PowerSpectrogram, duration_ms: f64, dpi: u32) -> Result<RenderedSpectrogram> {
    let rows = (3 * dpi.max(1)) as usize;
    let cpf = columns_per_frame(dpi);
    let frames = spec.frames.max(1);
    let inter_width = frames * cpf;

    let (vmin, vmax) = cs_core::stats::min_max(&spec.data).unwrap_or((0.0, 0.0));
    let span = vmax - vmin;
    let level = |v: f32| -> u8 {
        if span <= 0.0 {
            return 0;
        }
        let x = ((v - vmin) / span).clamp(0.0, 1.0);
        ((x * 256.0) as u32).min(255) as u8
    };

    let bins = row_bins(spec, rows);
    let mut inter = GrayRaster::new(inter_width as u32, rows as u32);
    let mut chunk_start = 0;
    let mut chunks = 0;
    while chunk_start < spec.frames {
        let chunk_end = (chunk_start + RENDER_CHUNK_FRAMES).min(spec.frames);
        for (r, bin) in bins.iter().enumerate() {
            let Some(bin) = *bin else { continue };
            let src = &spec.row(bin)[chunk_start..chunk_end];
            let dst = &mut inter.data[r * inter_width..(r + 1) * inter_width];
            for (j, &v) in src.iter().enumerate() {
                let col = (chunk_start + j) * cpf;
                dst[col..col + cpf].fill(level(v));
            }
        }
        chunk_start = chunk_end;
        chunks += 1;
    }

    let width = canonical_width(duration_ms);
    let canonical = Resizer::new().resize_gray(&inter, width, CANONICAL_HEIGHT)?;
    log::info!(
        "Render: {chunks} chunks, {inter_width}x{rows} -> {width}x{CANONICAL_HEIGHT}"
    );

    Ok(RenderedSpectrogram {
        image: canonical.to_rgb(),
        duration_ms,
        freq_min: freq_low(),
        freq_max: freq_high(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 256 kHz, 500 Hz bins, one bright band at 40 kHz in frames [10, 20).
    fn banded_spec() -> PowerSpectrogram {
        let mut spec = PowerSpectrogram::zeros(257, 40, 256_000, 512, 128);
        for bin in 0..10 {
            spec.dead_rows[bin] = true;
        }
        for bin in 78..=82 {
            for frame in 10..20 {
                spec.row_mut(bin)[frame] = 30.0;
            }
        }
        spec
    }

    #[test]
    fn band_lands_at_expected_height() {
        let rendered = render_spectrogram(&banded_spec(), 20.0, 130).unwrap();
        let gray = rendered.image.to_gray();
        // 40 kHz sits (122000 - 40000) / 119000 of the way down
        let y = (82_000.0 / 119_000.0 * 1200.0) as u32;
        let x = 15 * 160 / 40;
        assert!(gray.get(x, y) > 200, "energy expected at ({x}, {y})");
        assert!(gray.get(x, 50) < 20);
        assert!(gray.get(2, y) < 20);
    }

    #[test]
    fn flat_spectrogram_renders_black() {
        let spec = PowerSpectrogram::zeros(257, 8, 256_000, 512, 128);
        let rendered = render_spectrogram(&spec, 4.0, 130).unwrap();
        assert!(rendered.image.data.iter().all(|&v| v == 0));
        assert_eq!((rendered.freq_min, rendered.freq_max), (3_000, 122_000));
    }

    #[test]
    fn rows_above_nyquist_are_background() {
        // 192 kHz: Nyquist 96 kHz, bins of 375 Hz
        let spec = PowerSpectrogram::zeros(257, 4, 192_000, 512, 128);
        let bins = row_bins(&spec, 390);
        assert!(bins[0].is_none());
        assert!(bins[389].is_some());
    }

    #[test]
    fn oversampling_follows_dpi() {
        assert_eq!(columns_per_frame(520), 4);
        assert_eq!(columns_per_frame(72), 1);
    }
}
