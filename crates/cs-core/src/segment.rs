/// Time interval of the canonical raster judged to contain calls.
///
/// Pixel bounds are half-open `[start_px, stop_px)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    /// Position in left-to-right order.
    pub index: usize,
    pub start_px: u32,
    pub stop_px: u32,
    pub start_ms: u64,
    pub stop_ms: u64,
}

impl Segment {
    /// Build a segment and derive its millisecond bounds from the raster width.
    ///
    /// # Example
    /// ```
    /// use cs_core::Segment;
    /// let seg = Segment::from_pixels(0, 100, 300, 8000, 1000.0);
    /// assert_eq!((seg.start_ms, seg.stop_ms), (13, 38));
    /// assert_eq!(seg.width_px(), 200);
    /// ```
    #[must_use]
    pub fn from_pixels(index: usize, start_px: u32, stop_px: u32, width: u32, duration_ms: f64) -> Self {
        let to_ms = |px: u32| -> u64 {
            if width == 0 {
                return 0;
            }
            (duration_ms * f64::from(px) / f64::from(width)).round().max(0.0) as u64
        };
        Self {
            index,
            start_px,
            stop_px,
            start_ms: to_ms(start_px),
            stop_ms: to_ms(stop_px),
        }
    }

    #[inline]
    #[must_use]
    pub fn width_px(&self) -> u32 {
        self.stop_px.saturating_sub(self.start_px)
    }

    /// Whether pixel column `x` lies in `[start_px, stop_px)`.
    #[inline]
    #[must_use]
    pub fn contains(&self, x: f64) -> bool {
        x >= f64::from(self.start_px) && x < f64::from(self.stop_px)
    }
}
