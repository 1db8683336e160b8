use anyhow::Result;
use cs_core::Segment;
use cs_core::stats::median;

use crate::raster::{GrayRaster, RgbRaster};

/// Concatenation of the segment columns of a canonical image.
#[derive(Clone, Debug)]
pub struct CompressedSpectrogram {
    pub image: RgbRaster,
    /// Width of each segment in compressed space; sums to `image.width`.
    pub widths: Vec<u32>,
    /// Segment start, ms of the original recording.
    pub starts: Vec<u64>,
    /// Segment stop, ms of the original recording.
    pub stops: Vec<u64>,
}

impl CompressedSpectrogram {
    /// Left edge of each segment in compressed pixel space.
    ///
    /// # Example
    /// ```
    /// use cs_render::{CompressedSpectrogram, RgbRaster};
    /// let c = CompressedSpectrogram {
    ///     image: RgbRaster::new(30, 1),
    ///     widths: vec![10, 20],
    ///     starts: vec![0, 50],
    ///     stops: vec![5, 60],
    /// };
    /// assert_eq!(c.offsets(), vec![0, 10]);
    /// ```
    #[must_use]
    pub fn offsets(&self) -> Vec<u32> {
        self.widths
            .iter()
            .scan(0u32, |acc, &w| {
                let start = *acc;
                *acc += w;
                Some(start)
            })
            .collect()
    }
}

/// Stack the columns of every segment, in order.
///
/// # Errors
/// Returns an error if the cropped parts cannot be concatenated.
pub fn compress(image: &RgbRaster, segments: &[Segment]) -> Result<CompressedSpectrogram> {
    let parts: Vec<RgbRaster> = segments
        .iter()
        .map(|s| image.crop_columns(s.start_px, s.stop_px))
        .collect();
    let widths: Vec<u32> = parts.iter().map(|p| p.width).collect();
    let compressed = RgbRaster::hconcat(&parts)?;
    log::info!(
        "Compressed: {} segments, {} -> {} px",
        segments.len(),
        image.width,
        compressed.width
    );
    Ok(CompressedSpectrogram {
        image: compressed,
        widths,
        starts: segments.iter().map(|s| s.start_ms).collect(),
        stops: segments.iter().map(|s| s.stop_ms).collect(),
    })
}

/// Single-channel mask of the compressed image used for contour tracing.
///
/// Grayscale (inverted when the median is light); pixels at or below
/// `255 · mask_noise` become 0, the rest keep their intensity.
///
/// # Example
/// ```
/// use cs_render::{RgbRaster, build_mask};
/// let image = RgbRaster { data: vec![10, 10, 10, 30, 30, 30, 200, 200, 200], width: 3, height: 1 };
/// assert_eq!(build_mask(&image, 0.1).data, vec![0, 30, 200]);
/// ```
#[must_use]
pub fn build_mask(image: &RgbRaster, mask_noise: f32) -> GrayRaster {
    let mut gray = image.to_gray();
    let values: Vec<f32> = gray.data.iter().map(|&v| f32::from(v)).collect();
    if median(&values).is_some_and(|m| m > 128.0) {
        gray.invert();
    }
    let floor = 255.0 * mask_noise;
    for v in &mut gray.data {
        if f32::from(*v) <= floor {
            *v = 0;
        }
    }
    gray
}
