use std::sync::Arc;

use cs_core::{AudioSignal, PowerSpectrogram};
use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

/// Smallest power reference, as in `power_to_db` (`amin`).
const AMIN: f32 = 1e-10;
/// Dynamic range kept below the peak, dB.
const TOP_DB: f32 = 80.0;

/// STFT window length for `sample_rate`: about 2 ms, a power of two.
///
/// `next_pow2(round(0.001 * sr)) * 2`.
///
/// # Example
/// ```
/// use cs_audio::window_size;
/// assert_eq!(window_size(250_000), 512);
/// assert_eq!(window_size(384_000), 1024);
/// assert_eq!(window_size(1), 2);
/// ```
#[must_use]
pub fn window_size(sample_rate: u32) -> usize {
    let ms = (f64::from(sample_rate) * 0.001).round().max(1.0) as usize;
    ms.next_power_of_two() << 1
}

/// Windowed real STFT with pre-planned FFT and reusable buffers.
///
/// # Example
/// ```
/// use cs_audio::StftEngine;
/// let engine = StftEngine::new(256_000);
/// assert_eq!(engine.n_fft(), 512);
/// assert_eq!(engine.hop(), 128);
/// ```
pub struct StftEngine {
    n_fft: usize,
    hop: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    input_buf: Vec<f32>,
    spectrum_buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    /// Periodic Hamming coefficients.
    window: Vec<f32>,
}

impl StftEngine {
    #[must_use]
    pub fn new(sample_rate: u32) -> Self {
        let n_fft = window_size(sample_rate);
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(n_fft);

        let window = (0..n_fft)
            .map(|i| {
                0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / n_fft as f64).cos()
            })
            .map(|w| w as f32)
            .collect();

        Self {
            n_fft,
            hop: n_fft / 4,
            input_buf: plan.make_input_vec(),
            spectrum_buf: plan.make_output_vec(),
            scratch: plan.make_scratch_vec(),
            plan,
            window,
        }
    }

    #[must_use]
    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    #[must_use]
    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Number of centred frames for `len` samples.
    #[must_use]
    pub fn frame_count(&self, len: usize) -> usize {
        1 + len / self.hop
    }

    /// Power spectrogram in dB of `signal`.
    ///
    /// Frames are centred: the signal is zero-padded by `n_fft / 2` on both
    /// sides. Values are `10·log10(max(|X|², 1e-10))`, floored at `max - 80`.
    pub fn process(&mut self, signal: &AudioSignal) -> PowerSpectrogram {
        let samples = &signal.samples;
        let bins = self.n_fft / 2 + 1;
        let frames = self.frame_count(samples.len());
        let half = self.n_fft / 2;
        let mut spec =
            PowerSpectrogram::zeros(bins, frames, signal.sample_rate, self.n_fft, self.hop);

        for frame in 0..frames {
            // frame centre sits at frame * hop in the unpadded signal
            let origin = (frame * self.hop) as isize - half as isize;
            for (i, slot) in self.input_buf.iter_mut().enumerate() {
                let idx = origin + i as isize;
                let sample = if idx >= 0 && (idx as usize) < samples.len() {
                    samples[idx as usize]
                } else {
                    0.0
                };
                *slot = sample * self.window[i];
            }

            if self
                .plan
                .process_with_scratch(&mut self.input_buf, &mut self.spectrum_buf, &mut self.scratch)
                .is_err()
            {
                log::warn!("STFT frame {frame} failed, left at floor");
                for bin in 0..bins {
                    spec.data[bin * frames + frame] = 10.0 * AMIN.log10();
                }
                continue;
            }

            for (bin, c) in self.spectrum_buf.iter().enumerate() {
                let power = c.re * c.re + c.im * c.im;
                spec.data[bin * frames + frame] = 10.0 * power.max(AMIN).log10();
            }
        }

        let peak = spec.data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let floor = peak - TOP_DB;
        for v in &mut spec.data {
            *v = v.max(floor);
        }

        log::info!(
            "STFT: {bins} bins x {frames} frames (n_fft {}, hop {})",
            self.n_fft,
            self.hop
        );
        spec
    }
}

/// One-shot STFT of `signal` with the window derived from its sample rate.
#[must_use]
pub fn compute_spectrogram(signal: &AudioSignal) -> PowerSpectrogram {
    StftEngine::new(signal.sample_rate).process(signal)
}
