use anyhow::{Context, Result, bail};
use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer as FirResizer};

use crate::raster::GrayRaster;

/// Resizer Lanczos réutilisable wrappant fast_image_resize.
///
/// # Example
/// ```
/// use cs_render::resize::Resizer;
/// use cs_render::GrayRaster;
/// let mut r = Resizer::new();
/// let out = r.resize_gray(&GrayRaster::new(100, 40), 50, 20).unwrap();
/// assert_eq!((out.width, out.height), (50, 20));
/// ```
pub struct Resizer {
    inner: FirResizer,
    options: ResizeOptions,
    /// Scratch copy of the source (fast_image_resize wants a mutable slice).
    src_buf: Vec<u8>,
}

impl Resizer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: FirResizer::new(),
            options: ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3)),
            src_buf: Vec::new(),
        }
    }

    /// Lanczos resize of a single-channel raster.
    ///
    /// # Errors
    /// Returns an error if a dimension is zero or the resize fails.
    pub fn resize_gray(&mut self, src: &GrayRaster, width: u32, height: u32) -> Result<GrayRaster> {
        let mut data = vec![0u8; width as usize * height as usize];
        self.resize_bytes(&src.data, src.width, src.height, &mut data, width, height, PixelType::U8)?;
        Ok(GrayRaster { data, width, height })
    }

    /// Lanczos resize of interleaved RGB8 bytes.
    ///
    /// # Errors
    /// Returns an error if a dimension is zero or the resize fails.
    pub fn resize_rgb(
        &mut self,
        src: &[u8],
        src_width: u32,
        src_height: u32,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>> {
        let mut data = vec![0u8; width as usize * height as usize * 3];
        self.resize_bytes(src, src_width, src_height, &mut data, width, height, PixelType::U8x3)?;
        Ok(data)
    }

    #[allow(clippy::too_many_arguments)]
    fn resize_bytes(
        &mut self,
        src: &[u8],
        src_width: u32,
        src_height: u32,
        dst: &mut [u8],
        width: u32,
        height: u32,
        pixel: PixelType,
    ) -> Result<()> {
        if src_width == 0 || src_height == 0 || width == 0 || height == 0 {
            bail!("Dimensions nulles : {src_width}×{src_height} -> {width}×{height}");
        }
        if src_width == width && src_height == height {
            dst.copy_from_slice(src);
            return Ok(());
        }

        self.src_buf.clear();
        self.src_buf.extend_from_slice(src);

        let src_image = Image::from_slice_u8(src_width, src_height, &mut self.src_buf, pixel)
            .context("Dimensions source invalides")?;
        let mut dst_image =
            Image::from_slice_u8(width, height, dst, pixel).context("Dimensions destination invalides")?;

        self.inner
            .resize(&src_image, &mut dst_image, Some(&self.options))
            .context("Échec du redimensionnement")?;
        Ok(())
    }
}

impl Default for Resizer {
    fn default() -> Self {
        Self::new()
    }
}
