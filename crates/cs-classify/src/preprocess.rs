//! Crop tiling of the compressed spectrogram for the classifier input.

use cs_core::config::{CROP_SIZE, CROP_STRIDE};
use cs_render::RgbRaster;
use cs_render::resize::Resizer;

use crate::error::ClassifyError;

/// Flat NHWC crop stack `[count, 224, 224, 3]`.
#[derive(Clone, Debug)]
pub struct Crops {
    pub data: Vec<u8>,
    pub count: usize,
}

impl Crops {
    /// Bytes of a single crop.
    pub const CROP_LEN: usize = CROP_SIZE as usize * CROP_SIZE as usize * 3;

    /// Crops `[start, start + len)` as one contiguous slice.
    #[must_use]
    pub fn batch(&self, start: usize, len: usize) -> &[u8] {
        let end = (start + len).min(self.count);
        &self.data[start * Self::CROP_LEN..end * Self::CROP_LEN]
    }
}

/// Resized width: the time axis is squeezed twice as much as the frequency axis.
fn scaled_width(width: u32, height: u32) -> u32 {
    let ratio_y = f64::from(CROP_SIZE) / f64::from(height);
    let ratio_x = 0.5 * ratio_y;
    ((f64::from(width) * ratio_x).round() as u32).max(1)
}

/// Left edges of the crop windows over a raster `width` wide (≥ 225).
fn window_starts(width: u32) -> Vec<u32> {
    let last = width - CROP_SIZE;
    let mut starts: Vec<u32> = (0..last).step_by(CROP_STRIDE as usize).collect();
    starts.push(last);
    starts
}

/// Resize the compressed raster to 224 rows and cut stride-100 windows.
///
/// Rasters narrower than one window are right-padded with black to 225 px.
///
/// # Errors
/// Returns [`ClassifyError::EmptyImage`] on a zero-sized raster.
///
/// # Example
/// ```
/// use cs_classify::prepare_crops;
/// use cs_render::RgbRaster;
/// // 1200 rows → 224; 2400 columns → 224 → padded to 225 → two windows.
/// let crops = prepare_crops(&RgbRaster::new(2400, 1200)).unwrap();
/// assert_eq!(crops.count, 2);
/// ```
pub fn prepare_crops(image: &RgbRaster) -> Result<Crops, ClassifyError> {
    if image.width == 0 || image.height == 0 {
        return Err(ClassifyError::EmptyImage);
    }
    let width = scaled_width(image.width, image.height);
    let mut resizer = Resizer::new();
    let resized = resizer
        .resize_rgb(&image.data, image.width, image.height, width, CROP_SIZE)
        .map_err(|e| ClassifyError::Inference(e.to_string()))?;
    let mut raster = RgbRaster { data: resized, width, height: CROP_SIZE };

    if raster.width <= CROP_SIZE {
        let mut padded = RgbRaster::new(CROP_SIZE + 1, CROP_SIZE);
        let row = raster.width as usize * 3;
        let padded_row = padded.width as usize * 3;
        for y in 0..CROP_SIZE as usize {
            padded.data[y * padded_row..y * padded_row + row]
                .copy_from_slice(&raster.data[y * row..(y + 1) * row]);
        }
        raster = padded;
    }

    let starts = window_starts(raster.width);
    let mut data = Vec::with_capacity(starts.len() * Crops::CROP_LEN);
    for &x in &starts {
        data.extend_from_slice(&raster.crop_columns(x, x + CROP_SIZE).data);
    }
    Ok(Crops { data, count: starts.len() })
}
