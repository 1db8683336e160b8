use cs_core::Segment;
use cs_core::config::{SEGMENT_BUFFER_PX, THRESHOLD_START, THRESHOLD_STEP};
use cs_core::stats::median;

use crate::raster::RgbRaster;

/// Segments found in a canonical image.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentOutcome {
    /// Sorted, disjoint, non-empty segments. Never empty for a non-empty image.
    pub segments: Vec<Segment>,
    /// Threshold that produced them, `None` when the loop hit its floor.
    pub threshold: Option<f32>,
}

/// Per-column envelope data shared by every threshold pass.
struct Envelope {
    /// Column max, min-max normalised to [0, 1].
    amplitude: Vec<f32>,
    /// Column max of the min-max normalised image, scaled to 0..=255.
    level: Vec<u8>,
}

impl Envelope {
    fn new(image: &RgbRaster) -> Self {
        let mut gray = image.to_gray();
        let values: Vec<f32> = gray.data.iter().map(|&v| f32::from(v)).collect();
        if median(&values).is_some_and(|m| m > 128.0) {
            gray.invert();
        }

        let width = gray.width as usize;
        let mut colmax = vec![0u8; width];
        for row in gray.data.chunks_exact(width.max(1)) {
            for (m, &v) in colmax.iter_mut().zip(row) {
                *m = (*m).max(v);
            }
        }
        let gmin = gray.data.iter().copied().min().unwrap_or(0);
        let gmax = gray.data.iter().copied().max().unwrap_or(0);

        let cmin = colmax.iter().copied().min().unwrap_or(0);
        let cmax = colmax.iter().copied().max().unwrap_or(0);
        let amplitude = colmax
            .iter()
            .map(|&c| {
                let a = f32::from(c - cmin);
                if cmax > cmin { a / f32::from(cmax - cmin) } else { a }
            })
            .collect();

        let level = colmax
            .iter()
            .map(|&c| {
                if gmax > gmin {
                    (255.0 * f32::from(c - gmin) / f32::from(gmax - gmin)).round() as u8
                } else {
                    0
                }
            })
            .collect();

        Self { amplitude, level }
    }

    /// Thresholded, median-filtered column mask.
    fn mask(&self, threshold: f32) -> Vec<u8> {
        let raw: Vec<u8> = self
            .amplitude
            .iter()
            .zip(&self.level)
            .map(|(&a, &l)| if a >= threshold && a > 0.0 { l } else { 0 })
            .collect();
        let mut mask = median3(&raw);
        if let Some(first) = mask.first_mut() {
            *first = 0;
        }
        if let Some(last) = mask.last_mut() {
            *last = 0;
        }
        mask
    }
}

/// Width-3 median filter with zero padding.
fn median3(values: &[u8]) -> Vec<u8> {
    let n = values.len();
    (0..n)
        .map(|i| {
            let a = if i > 0 { values[i - 1] } else { 0 };
            let b = values[i];
            let c = if i + 1 < n { values[i + 1] } else { 0 };
            a.max(b).min(a.min(b).max(c))
        })
        .collect()
}

/// Rising edges → starts, last nonzero column of each run → stops (inclusive).
fn runs(mask: &[u8]) -> Vec<(i64, i64)> {
    let mut starts = Vec::new();
    let mut stops = Vec::new();
    for i in 1..mask.len().saturating_sub(1) {
        if mask[i] != 0 {
            if mask[i - 1] == 0 {
                starts.push(i as i64);
            }
            if mask[i + 1] == 0 {
                stops.push(i as i64);
            }
        }
    }
    starts.into_iter().zip(stops).collect()
}

/// Buffer every run, union overlapping ones, clip to `[0, width]`, drop empties.
///
/// # Example
/// ```
/// use cs_render::segments::merge_intervals;
/// // buffered to (-30, 60), (60, 150), (110, 200): touching and overlapping
/// let merged = merge_intervals(&[(10, 20), (100, 110), (150, 160)], 40, 400);
/// assert_eq!(merged, vec![(0, 200)]);
///
/// // buffered to (-30, 60) and (260, 350): a gap remains
/// let apart = merge_intervals(&[(10, 20), (300, 310)], 40, 400);
/// assert_eq!(apart, vec![(0, 60), (260, 350)]);
/// ```
#[must_use]
pub fn merge_intervals(runs: &[(i64, i64)], buffer: i64, width: u32) -> Vec<(u32, u32)> {
    let mut buffered: Vec<(i64, i64)> = runs.iter().map(|&(s, e)| (s - buffer, e + buffer)).collect();
    buffered.sort_unstable();

    let mut merged: Vec<(i64, i64)> = Vec::with_capacity(buffered.len());
    for (start, stop) in buffered {
        match merged.last_mut() {
            Some(last) if last.1 >= start => last.1 = last.1.max(stop),
            _ => merged.push((start, stop)),
        }
    }

    let w = i64::from(width);
    merged
        .into_iter()
        .map(|(s, e)| (s.clamp(0, w) as u32, e.clamp(0, w) as u32))
        .filter(|(s, e)| e > s)
        .collect()
}

/// Find the time regions of `image` that contain call energy.
///
/// The amplitude threshold starts at 0.5 and drops by 0.05 until some run
/// survives; below zero the whole image is one segment.
///
/// # Example
/// ```
/// use cs_render::{RgbRaster, extract_segments};
/// let silent = RgbRaster::new(800, 16);
/// let outcome = extract_segments(&silent, 100.0);
/// assert_eq!(outcome.segments.len(), 1);
/// assert_eq!((outcome.segments[0].start_ms, outcome.segments[0].stop_ms), (0, 100));
/// assert!(outcome.threshold.is_none());
/// ```
#[must_use]
pub fn extract_segments(image: &RgbRaster, duration_ms: f64) -> SegmentOutcome {
    let width = image.width;
    let envelope = Envelope::new(image);
    let buffer = SEGMENT_BUFFER_PX as i64;
    let steps = (THRESHOLD_START / THRESHOLD_STEP).round() as i32;

    for k in 0..=steps {
        let threshold = THRESHOLD_START - k as f32 * THRESHOLD_STEP;
        let intervals = merge_intervals(&runs(&envelope.mask(threshold)), buffer, width);
        log::debug!("Segments: threshold {threshold:.2} -> {} intervals", intervals.len());
        if !intervals.is_empty() {
            let segments = to_segments(&intervals, width, duration_ms);
            log::info!("Segments: {} at threshold {threshold:.2}", segments.len());
            return SegmentOutcome {
                segments,
                threshold: Some(threshold),
            };
        }
    }

    log::warn!("[segments] aucun segment : image entière conservée");
    SegmentOutcome {
        segments: whole_image(width, duration_ms),
        threshold: None,
    }
}

/// The single segment covering the whole image.
#[must_use]
pub fn whole_image(width: u32, duration_ms: f64) -> Vec<Segment> {
    to_segments(&[(0, width)], width, duration_ms)
}

fn to_segments(intervals: &[(u32, u32)], width: u32, duration_ms: f64) -> Vec<Segment> {
    intervals
        .iter()
        .enumerate()
        .map(|(i, &(s, e))| Segment::from_pixels(i, s, e, width, duration_ms))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Black raster with white columns in each `[start, stop)` range.
    fn with_blobs(width: u32, blobs: &[(u32, u32)], value: u8) -> RgbRaster {
        let height = 12;
        let mut raster = RgbRaster::new(width, height);
        for y in 4..8 {
            for &(s, e) in blobs {
                for x in s..e {
                    let i = ((y * width + x) * 3) as usize;
                    raster.data[i..i + 3].fill(value);
                }
            }
        }
        raster
    }

    #[test]
    fn single_blob_is_buffered() {
        let outcome = extract_segments(&with_blobs(400, &[(100, 120)], 255), 50.0);
        let seg = outcome.segments[0];
        assert_eq!(outcome.segments.len(), 1);
        assert_eq!((seg.start_px, seg.stop_px), (60, 159));
        assert_eq!(outcome.threshold, Some(0.5));
    }

    #[test]
    fn distant_blobs_stay_apart() {
        let outcome = extract_segments(&with_blobs(800, &[(100, 110), (500, 510)], 255), 100.0);
        let px: Vec<(u32, u32)> = outcome.segments.iter().map(|s| (s.start_px, s.stop_px)).collect();
        assert_eq!(px, vec![(60, 149), (460, 549)]);
        assert!(outcome.segments[0].stop_ms < outcome.segments[1].start_ms);
        assert_eq!(outcome.segments[1].index, 1);
    }

    #[test]
    fn close_blobs_merge() {
        let outcome = extract_segments(&with_blobs(800, &[(100, 110), (130, 140)], 255), 100.0);
        assert_eq!(outcome.segments.len(), 1);
        assert_eq!((outcome.segments[0].start_px, outcome.segments[0].stop_px), (60, 179));
    }

    #[test]
    fn edge_blob_is_clipped() {
        let outcome = extract_segments(&with_blobs(300, &[(0, 10), (290, 300)], 255), 30.0);
        let px: Vec<(u32, u32)> = outcome.segments.iter().map(|s| (s.start_px, s.stop_px)).collect();
        assert_eq!(px, vec![(0, 49), (250, 300)]);
    }

    #[test]
    fn light_background_is_inverted() {
        let mut raster = with_blobs(400, &[(100, 120)], 0);
        for (i, v) in raster.data.iter_mut().enumerate() {
            let px = i / 3;
            let (x, y) = (px % 400, px / 400);
            if !((4..8).contains(&y) && (100..120).contains(&x)) {
                *v = 255;
            }
        }
        let outcome = extract_segments(&raster, 50.0);
        assert_eq!((outcome.segments[0].start_px, outcome.segments[0].stop_px), (60, 159));
    }

    #[test]
    fn weak_blob_below_threshold_is_ignored() {
        let mut raster = with_blobs(800, &[(100, 110)], 255);
        let weak = with_blobs(800, &[(500, 510)], 60);
        for (d, s) in raster.data.iter_mut().zip(&weak.data) {
            *d = (*d).max(*s);
        }
        let outcome = extract_segments(&raster, 100.0);
        assert_eq!(outcome.segments.len(), 1);
        assert_eq!(outcome.threshold, Some(0.5));
    }

    #[test]
    fn threshold_drops_when_only_spikes_pass() {
        // the lone bright column is removed by the median filter; the
        // dimmer blob only clears the threshold once it falls below 0.39
        let mut raster = with_blobs(800, &[(50, 51)], 255);
        let blob = with_blobs(800, &[(100, 110)], 100);
        for (d, s) in raster.data.iter_mut().zip(&blob.data) {
            *d = (*d).max(*s);
        }
        let outcome = extract_segments(&raster, 100.0);
        let threshold = outcome.threshold.unwrap();
        assert!(threshold > 0.3 && threshold < 0.4, "threshold {threshold}");
        assert_eq!((outcome.segments[0].start_px, outcome.segments[0].stop_px), (60, 149));
    }

    #[test]
    fn isolated_column_is_filtered_out() {
        let outcome = extract_segments(&with_blobs(200, &[(50, 51)], 255), 25.0);
        assert!(outcome.threshold.is_none());
        assert_eq!((outcome.segments[0].start_px, outcome.segments[0].stop_px), (0, 200));
    }

    #[test]
    fn median3_keeps_plateaus() {
        assert_eq!(median3(&[0, 5, 5, 5, 0, 9, 0]), vec![0, 5, 5, 5, 5, 0, 0]);
    }

    #[test]
    fn buffered_runs_chain_into_one_interval() {
        // each buffered run reaches the next one, so all three fuse
        assert_eq!(merge_intervals(&[(10, 20), (100, 110), (150, 160)], 40, 400), vec![(0, 200)]);
        assert_eq!(merge_intervals(&[(100, 110), (191, 200)], 40, 400), vec![(60, 150), (151, 240)]);
        assert_eq!(merge_intervals(&[(100, 110), (190, 200)], 40, 400), vec![(60, 240)]);
    }
}
