use anyhow::{Result, bail};

/// Interleaved RGB8 raster, row-major.
///
/// # Example
/// ```
/// use cs_render::RgbRaster;
/// let raster = RgbRaster::new(4, 2);
/// assert_eq!(raster.data.len(), 4 * 2 * 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbRaster {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Single-channel 8-bit raster, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayRaster {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RgbRaster {
    /// Black raster.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0; width as usize * height as usize * 3],
            width,
            height,
        }
    }

    /// BT.601 luma: `0.299 R + 0.587 G + 0.114 B`, rounded.
    ///
    /// # Example
    /// ```
    /// use cs_render::RgbRaster;
    /// let raster = RgbRaster { data: vec![255, 0, 0, 90, 90, 90], width: 2, height: 1 };
    /// assert_eq!(raster.to_gray().data, vec![76, 90]);
    /// ```
    #[must_use]
    pub fn to_gray(&self) -> GrayRaster {
        let data = self
            .data
            .chunks_exact(3)
            .map(|p| {
                let y = 0.299 * f32::from(p[0]) + 0.587 * f32::from(p[1]) + 0.114 * f32::from(p[2]);
                y.round().clamp(0.0, 255.0) as u8
            })
            .collect();
        GrayRaster {
            data,
            width: self.width,
            height: self.height,
        }
    }

    /// Copy of columns `[start, stop)`.
    #[must_use]
    pub fn crop_columns(&self, start: u32, stop: u32) -> Self {
        let stop = stop.min(self.width);
        let start = start.min(stop);
        let w = (stop - start) as usize;
        if w == 0 {
            return Self { data: Vec::new(), width: 0, height: self.height };
        }
        let mut data = Vec::with_capacity(w * self.height as usize * 3);
        for row in self.data.chunks_exact(self.width as usize * 3) {
            data.extend_from_slice(&row[start as usize * 3..stop as usize * 3]);
        }
        Self {
            data,
            width: w as u32,
            height: self.height,
        }
    }

    /// Concatenate rasters of equal height left to right.
    ///
    /// # Errors
    /// Returns an error if heights differ.
    pub fn hconcat(parts: &[Self]) -> Result<Self> {
        let (data, width, height) = hconcat_bytes(
            parts.iter().map(|p| (p.data.as_slice(), p.width, p.height)),
            3,
        )?;
        Ok(Self { data, width, height })
    }
}

impl GrayRaster {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0; width as usize * height as usize],
            width,
            height,
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Replicate the intensity into three equal channels.
    #[must_use]
    pub fn to_rgb(&self) -> RgbRaster {
        RgbRaster {
            data: self.data.iter().flat_map(|&v| [v, v, v]).collect(),
            width: self.width,
            height: self.height,
        }
    }

    /// `255 - v` for every pixel.
    pub fn invert(&mut self) {
        for v in &mut self.data {
            *v = 255 - *v;
        }
    }

    /// Copy of columns `[start, stop)`.
    #[must_use]
    pub fn crop_columns(&self, start: u32, stop: u32) -> Self {
        let stop = stop.min(self.width);
        let start = start.min(stop);
        let w = (stop - start) as usize;
        if w == 0 {
            return Self { data: Vec::new(), width: 0, height: self.height };
        }
        let mut data = Vec::with_capacity(w * self.height as usize);
        for row in self.data.chunks_exact(self.width as usize) {
            data.extend_from_slice(&row[start as usize..stop as usize]);
        }
        Self {
            data,
            width: w as u32,
            height: self.height,
        }
    }

    /// Concatenate rasters of equal height left to right.
    ///
    /// # Errors
    /// Returns an error if heights differ.
    pub fn hconcat(parts: &[Self]) -> Result<Self> {
        let (data, width, height) = hconcat_bytes(
            parts.iter().map(|p| (p.data.as_slice(), p.width, p.height)),
            1,
        )?;
        Ok(Self { data, width, height })
    }
}

fn hconcat_bytes<'a>(
    parts: impl Iterator<Item = (&'a [u8], u32, u32)> + Clone,
    channels: usize,
) -> Result<(Vec<u8>, u32, u32)> {
    let mut height = None;
    let mut width = 0u32;
    for (_, w, h) in parts.clone() {
        match height {
            None => height = Some(h),
            Some(expected) if expected != h => bail!("Hauteurs incompatibles : {expected} vs {h}"),
            Some(_) => {}
        }
        width += w;
    }
    let height = height.unwrap_or(0);
    let mut data = Vec::with_capacity(width as usize * height as usize * channels);
    for y in 0..height as usize {
        for (bytes, w, _) in parts.clone() {
            let stride = w as usize * channels;
            data.extend_from_slice(&bytes[y * stride..(y + 1) * stride]);
        }
    }
    Ok((data, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> GrayRaster {
        let mut r = GrayRaster::new(width, height);
        for y in 0..height {
            for x in 0..width {
                r.data[(y * width + x) as usize] = f(x, y);
            }
        }
        r
    }

    #[test]
    fn crop_then_concat_restores_raster() {
        let r = gray(10, 3, |x, y| (x * 10 + y) as u8);
        let parts = [r.crop_columns(0, 4), r.crop_columns(4, 10)];
        assert_eq!(GrayRaster::hconcat(&parts).unwrap(), r);
    }

    #[test]
    fn crop_is_clamped_to_width() {
        let r = gray(5, 2, |x, _| x as u8);
        let c = r.crop_columns(3, 99);
        assert_eq!(c.width, 2);
        assert_eq!(c.data, vec![3, 4, 3, 4]);
    }

    #[test]
    fn mismatched_heights_are_rejected() {
        assert!(RgbRaster::hconcat(&[RgbRaster::new(2, 2), RgbRaster::new(2, 3)]).is_err());
    }

    #[test]
    fn gray_rgb_roundtrip_is_lossless() {
        let r = gray(7, 2, |x, y| (x * 30 + y * 3) as u8);
        assert_eq!(r.to_rgb().to_gray(), r);
    }
}
