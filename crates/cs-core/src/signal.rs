/// Decoded mono recording.
///
/// # Example
/// ```
/// use cs_core::AudioSignal;
/// let signal = AudioSignal::new(vec![0.0; 250_000], 250_000);
/// assert_eq!(signal.duration_ms(), 1000.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct AudioSignal {
    /// Mono samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Native sample rate, never resampled.
    pub sample_rate: u32,
}

impl AudioSignal {
    #[must_use]
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Recording length in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 * 1000.0 / f64::from(self.sample_rate)
    }

    /// Nyquist frequency in Hz.
    #[must_use]
    pub fn nyquist(&self) -> f64 {
        f64::from(self.sample_rate) / 2.0
    }
}

/// Frequency × time matrix in dB (then denoised in place).
///
/// Row-major: `data[bin * frames + frame]`, bin 0 is DC.
#[derive(Clone, Debug, PartialEq)]
pub struct PowerSpectrogram {
    pub data: Vec<f32>,
    pub bins: usize,
    pub frames: usize,
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop: usize,
    /// Rows outside the band of interest, rendered as black.
    pub dead_rows: Vec<bool>,
}

impl PowerSpectrogram {
    /// Zero-filled spectrogram with every row alive.
    #[must_use]
    pub fn zeros(bins: usize, frames: usize, sample_rate: u32, n_fft: usize, hop: usize) -> Self {
        Self {
            data: vec![0.0; bins * frames],
            bins,
            frames,
            sample_rate,
            n_fft,
            hop,
            dead_rows: vec![false; bins],
        }
    }

    #[inline]
    #[must_use]
    pub fn row(&self, bin: usize) -> &[f32] {
        &self.data[bin * self.frames..(bin + 1) * self.frames]
    }

    #[inline]
    pub fn row_mut(&mut self, bin: usize) -> &mut [f32] {
        &mut self.data[bin * self.frames..(bin + 1) * self.frames]
    }

    #[inline]
    #[must_use]
    pub fn get(&self, bin: usize, frame: usize) -> f32 {
        self.data[bin * self.frames + frame]
    }

    /// Centre frequency of `bin` in Hz, `bin * sr / n_fft`.
    ///
    /// # Example
    /// ```
    /// use cs_core::PowerSpectrogram;
    /// let spec = PowerSpectrogram::zeros(257, 10, 256_000, 512, 128);
    /// assert_eq!(spec.bin_frequency(1), 500.0);
    /// ```
    #[must_use]
    pub fn bin_frequency(&self, bin: usize) -> f64 {
        if self.n_fft == 0 {
            return 0.0;
        }
        bin as f64 * f64::from(self.sample_rate) / self.n_fft as f64
    }

    /// `true` when every value is equal (or the matrix is empty).
    #[must_use]
    pub fn is_flat(&self) -> bool {
        match crate::stats::min_max(&self.data) {
            Some((lo, hi)) => (hi - lo).abs() <= f32::EPSILON,
            None => true,
        }
    }
}
