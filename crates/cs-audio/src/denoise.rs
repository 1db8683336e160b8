use cs_core::PowerSpectrogram;
use cs_core::config::{FREQ_MAX, FREQ_MIN};
use cs_core::stats::median;

/// What the denoiser learned about the matrix it cleaned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DenoiseOutcome {
    /// No energy left after denoising: segmentation and contours are skipped.
    pub degenerate: bool,
    /// Rows suppressed as out of band.
    pub dead_rows: usize,
}

/// Denoise a dB spectrogram in place and suppress rows outside the bat band.
///
/// 1. subtract each row's median;
/// 2. zero every value at or below the median of the positive values;
/// 3. rows wholly below `FREQ_MIN` or above `FREQ_MAX` are flagged dead;
/// 4. clip at zero.
///
/// # Example
/// ```
/// use cs_audio::denoise;
/// use cs_core::PowerSpectrogram;
/// let mut spec = PowerSpectrogram::zeros(257, 16, 256_000, 512, 128);
/// let outcome = denoise(&mut spec);
/// assert!(outcome.degenerate);
/// assert!(spec.dead_rows[0]);
/// ```
pub fn denoise(spec: &mut PowerSpectrogram) -> DenoiseOutcome {
    for bin in 0..spec.bins {
        let row = spec.row_mut(bin);
        if let Some(m) = median(row) {
            for v in row.iter_mut() {
                *v -= m;
            }
        }
    }

    let positives: Vec<f32> = spec.data.iter().copied().filter(|&v| v > 0.0).collect();
    let mut degenerate = positives.is_empty();
    if let Some(threshold) = median(&positives) {
        log::debug!("Denoise: soft floor at {threshold:.3} dB over median");
        for v in &mut spec.data {
            if *v <= threshold {
                *v = 0.0;
            }
        }
    }

    let mut dead = 0;
    for bin in 0..spec.bins {
        let band_min = spec.bin_frequency(bin);
        let band_max = if bin + 1 < spec.bins {
            spec.bin_frequency(bin + 1)
        } else {
            f64::INFINITY
        };
        if band_max <= FREQ_MIN || FREQ_MAX <= band_min {
            spec.dead_rows[bin] = true;
            spec.row_mut(bin).fill(-1.0);
            dead += 1;
        }
    }

    for v in &mut spec.data {
        *v = v.max(0.0);
    }

    if !degenerate {
        degenerate = spec.data.iter().all(|&v| v <= 0.0);
    }
    if degenerate {
        log::warn!("[denoise] spectrogramme dégénéré : aucune énergie après débruitage");
    } else {
        log::info!("Denoise: {dead} out-of-band rows suppressed");
    }

    DenoiseOutcome {
        degenerate,
        dead_rows: dead,
    }
}
