//! Multi-level call contours of the compressed spectrogram.
//!
//! The mask is optionally noise-filtered and blurred once, iso-levels are
//! chosen from its intensities, and every level is traced with marching
//! squares. Small polygons are dropped and the rest are spline-smoothed,
//! attributed to a segment and mapped to (ms, Hz). [`svg`] draws the traced
//! polygons for inspection.

pub mod blur;
pub mod geometry;
pub mod levels;
pub mod marching;
pub mod spline;
pub mod svg;

use std::borrow::Cow;

use cs_core::assets::{ContourRecord, SegmentContours};
use cs_core::config::{BLUR_KERNEL, BLUR_SIGMA, ContourConfig};

use crate::geometry::{SegmentTransform, attribute, polygon_area, round3};

/// Closed iso-intensity polygon in compressed pixel space, `(x, y)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Contour {
    pub points: Vec<(f64, f64)>,
    pub level: f64,
}

/// Segment geometry of the compressed image.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentLayout {
    pub widths: Vec<u32>,
    pub starts: Vec<u64>,
    pub stops: Vec<u64>,
    pub freq_min: f64,
    pub freq_max: f64,
    pub height: u32,
}

impl SegmentLayout {
    fn transforms(&self) -> Vec<SegmentTransform> {
        let mut offset = 0.0;
        self.widths
            .iter()
            .zip(self.starts.iter().zip(&self.stops))
            .map(|(&w, (&start, &stop))| {
                let t = SegmentTransform {
                    offset,
                    width: f64::from(w),
                    start_ms: start as f64,
                    stop_ms: stop as f64,
                    freq_min: self.freq_min,
                    freq_max: self.freq_max,
                    height: f64::from(self.height),
                };
                offset += f64::from(w);
                t
            })
            .collect()
    }
}

/// Zero every pixel below `percent` of full scale.
///
/// # Example
/// ```
/// use cs_contour::noise_filter;
/// // 20 % of 255 is 51
/// assert_eq!(noise_filter(&[0, 50, 51, 200], 20.0), vec![0, 0, 51, 200]);
/// ```
#[must_use]
pub fn noise_filter(mask: &[u8], percent: f64) -> Vec<u8> {
    let threshold = percent.clamp(0.0, 100.0) / 100.0 * 255.0;
    mask.iter()
        .map(|&v| if f64::from(v) < threshold { 0 } else { v })
        .collect()
}

/// Blur `mask`, select levels, and trace every closed contour above `min_area`.
///
/// With `noise_filter_threshold` set, faint pixels are zeroed first (see
/// [`noise_filter`]). Contours come back sorted by ascending level; each is
/// closed and smoothed, or the raw polygon when smoothing fails.
#[must_use]
pub fn trace_contours(mask: &[u8], width: usize, height: usize, config: &ContourConfig) -> Vec<Contour> {
    let mask = match config.noise_filter_threshold {
        Some(percent) => {
            log::debug!("Noise filter: {percent}% of full scale");
            Cow::Owned(noise_filter(mask, percent))
        }
        None => Cow::Borrowed(mask),
    };
    let blurred = blur::gaussian_blur(&mask, width, height, BLUR_KERNEL, BLUR_SIGMA);
    let levels = levels::select_levels(&blurred, config);

    let mut contours = Vec::new();
    let mut spline_failures = 0usize;
    for &level in &levels {
        for line in marching::find_contours(&blurred, width, height, level) {
            let mut xy: Vec<(f64, f64)> = line.into_iter().map(|(r, c)| (c, r)).collect();
            if let (Some(&first), Some(&last)) = (xy.first(), xy.last())
                && first != last
            {
                xy.push(first);
            }
            if polygon_area(&xy) < config.min_area {
                continue;
            }
            let points = match spline::smooth_closed(&xy, config.smoothing_factor) {
                Ok(smooth) => smooth,
                Err(e) => {
                    log::debug!("Spline: {e}, raw polygon kept");
                    spline_failures += 1;
                    xy
                }
            };
            contours.push(Contour { points, level });
        }
    }
    if spline_failures > 0 {
        log::warn!("[contours] échec de spline sur {spline_failures} contours, polygones bruts conservés");
    }
    contours.sort_by(|a, b| a.level.total_cmp(&b.level));
    contours
}

/// Contours of the compressed mask grouped by segment, in (ms, Hz).
///
/// Contours owned by no segment are dropped; points are clamped to their
/// segment's pixel box before the transform.
///
/// # Example
/// ```
/// use cs_core::config::ContourConfig;
/// use cs_contour::{SegmentLayout, extract_contours};
/// let layout = SegmentLayout {
///     widths: vec![40], starts: vec![0], stops: vec![5],
///     freq_min: 3000.0, freq_max: 122000.0, height: 30,
/// };
/// let segments = extract_contours(&vec![0u8; 40 * 30], 40, 30, &layout, &ContourConfig::default());
/// assert_eq!(segments.len(), 1);
/// assert_eq!(segments[0].contour_count, 0);
/// assert!(segments[0].freq_min.is_none());
/// ```
#[must_use]
pub fn extract_contours(
    mask: &[u8],
    width: usize,
    height: usize,
    layout: &SegmentLayout,
    config: &ContourConfig,
) -> Vec<SegmentContours> {
    group_by_segment(&trace_contours(mask, width, height, config), layout)
}

/// Attribute traced pixel-space contours to segments and map them to (ms, Hz).
#[must_use]
pub fn group_by_segment(contours: &[Contour], layout: &SegmentLayout) -> Vec<SegmentContours> {
    let transforms = layout.transforms();
    let bounds: Vec<(f64, f64)> = transforms.iter().map(|t| (t.offset, t.offset + t.width)).collect();

    let mut owned: Vec<Vec<&Contour>> = vec![Vec::new(); transforms.len()];
    let mut dropped = 0usize;
    for contour in contours {
        match attribute(&contour.points, &bounds) {
            Some(i) => owned[i].push(contour),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        log::debug!("Contours: {dropped} outside every segment");
    }

    let out: Vec<SegmentContours> = transforms
        .iter()
        .zip(owned)
        .enumerate()
        .map(|(i, (t, contours))| {
            let mut y_min = f64::INFINITY;
            let mut y_max = f64::NEG_INFINITY;
            let records: Vec<ContourRecord> = contours
                .into_iter()
                .enumerate()
                .map(|(index, c)| {
                    let curve = c
                        .points
                        .iter()
                        .map(|&p| {
                            let (x, y) = t.clamp(p);
                            y_min = y_min.min(y);
                            y_max = y_max.max(y);
                            [round3(t.time(x)), round3(t.frequency(y))]
                        })
                        .collect();
                    ContourRecord {
                        level: c.level,
                        curve,
                        index,
                    }
                })
                .collect();
            let has = !records.is_empty();
            SegmentContours {
                segment_index: i,
                contour_count: records.len(),
                freq_min: has.then(|| round3(t.frequency(y_max))),
                freq_max: has.then(|| round3(t.frequency(y_min))),
                width_px: layout.widths[i],
                start_ms: layout.starts[i],
                stop_ms: layout.stops[i],
                contours: records,
            }
        })
        .collect();

    let total: usize = out.iter().map(|s| s.contour_count).sum();
    log::info!("Contours: {total} across {} segments", out.len());
    out
}
