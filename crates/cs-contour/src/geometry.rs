/// Shoelace area of a polygon given as `(x, y)` points.
///
/// # Example
/// ```
/// use cs_contour::geometry::polygon_area;
/// let square = [(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)];
/// assert_eq!(polygon_area(&square), 16.0);
/// ```
#[must_use]
pub fn polygon_area(points: &[(f64, f64)]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let n = points.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let (x0, y0) = points[i];
            let (x1, y1) = points[(i + 1) % n];
            x0 * y1 - y0 * x1
        })
        .sum();
    0.5 * twice.abs()
}

/// First segment `[start, end)` owning the contour: its centroid x lies in the
/// range, or at least half of its points do.
///
/// # Example
/// ```
/// use cs_contour::geometry::attribute;
/// let bounds = [(0.0, 10.0), (10.0, 30.0)];
/// let pts = [(12.0, 1.0), (14.0, 1.0), (16.0, 2.0)];
/// assert_eq!(attribute(&pts, &bounds), Some(1));
/// assert_eq!(attribute(&[(50.0, 0.0)], &bounds), None);
/// ```
#[must_use]
pub fn attribute(points: &[(f64, f64)], bounds: &[(f64, f64)]) -> Option<usize> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let centre = points.iter().map(|p| p.0).sum::<f64>() / n;
    bounds.iter().position(|&(start, end)| {
        let inside = points.iter().filter(|p| p.0 >= start && p.0 < end).count() as f64;
        (start..end).contains(&centre) || inside / n >= 0.5
    })
}

/// Pixel → (ms, Hz) mapping of one segment of the compressed image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentTransform {
    /// Left edge of the segment in compressed pixels.
    pub offset: f64,
    pub width: f64,
    pub start_ms: f64,
    pub stop_ms: f64,
    pub freq_min: f64,
    pub freq_max: f64,
    pub height: f64,
}

impl SegmentTransform {
    /// Time in ms of compressed column `px`.
    ///
    /// # Example
    /// ```
    /// use cs_contour::geometry::SegmentTransform;
    /// let t = SegmentTransform {
    ///     offset: 100.0, width: 80.0, start_ms: 500.0, stop_ms: 510.0,
    ///     freq_min: 3000.0, freq_max: 122000.0, height: 1200.0,
    /// };
    /// assert_eq!(t.time(140.0), 505.0);
    /// assert_eq!(t.frequency(0.0), 122000.0);
    /// assert_eq!(t.frequency(1200.0), 3000.0);
    /// ```
    #[must_use]
    pub fn time(&self, px: f64) -> f64 {
        if self.width <= 0.0 {
            return self.start_ms;
        }
        (px - self.offset) * (self.stop_ms - self.start_ms) / self.width + self.start_ms
    }

    /// Frequency in Hz of row `py` (row 0 is the top, highest frequency).
    #[must_use]
    pub fn frequency(&self, py: f64) -> f64 {
        if self.height <= 0.0 {
            return self.freq_max;
        }
        self.freq_max - py * (self.freq_max - self.freq_min) / self.height
    }

    /// Keep a point inside the segment's pixel box.
    #[must_use]
    pub fn clamp(&self, (x, y): (f64, f64)) -> (f64, f64) {
        (
            x.clamp(self.offset, self.offset + self.width),
            y.clamp(0.0, self.height.max(0.0)),
        )
    }
}

/// Round to 3 decimals.
#[inline]
#[must_use]
pub fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
