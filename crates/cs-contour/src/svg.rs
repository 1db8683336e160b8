//! SVG drawings of traced contours, in compressed pixel space.

use std::fmt::Write;

use crate::Contour;

/// Fill colours used when a polygon covers no reference pixel.
const PALETTE: [&str; 6] = ["#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#F7B267", "#CDB4DB"];

/// How each contour is painted.
#[derive(Clone, Copy, Debug)]
pub enum SvgStyle<'a> {
    /// Unfilled strokes whose hue runs from blue (lowest level) to red (highest).
    LevelColored,
    /// Filled shapes taking the mean colour of the RGB `reference` pixels
    /// they enclose. `reference` has the drawing's dimensions.
    Filled { reference: &'a [u8] },
}

/// Draw `contours` on a `width × height` canvas.
///
/// Lower levels are drawn first so higher ones sit on top. Polygons with
/// fewer than three points are skipped.
///
/// # Example
/// ```
/// use cs_contour::Contour;
/// use cs_contour::svg::{SvgStyle, render_svg};
/// let square = Contour {
///     points: vec![(1.0, 1.0), (5.0, 1.0), (5.0, 5.0), (1.0, 5.0), (1.0, 1.0)],
///     level: 120.0,
/// };
/// let svg = render_svg(&[square], 8, 6, SvgStyle::LevelColored);
/// assert!(svg.contains(r#"width="8" height="6""#));
/// assert!(svg.contains("M 1.000,1.000 L 5.000,1.000"));
/// ```
#[must_use]
pub fn render_svg(contours: &[Contour], width: usize, height: usize, style: SvgStyle<'_>) -> String {
    let mut ordered: Vec<&Contour> = contours.iter().filter(|c| c.points.len() >= 3).collect();
    ordered.sort_by(|a, b| a.level.total_cmp(&b.level));

    let (lo, hi) = ordered
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| (lo.min(c.level), hi.max(c.level)));
    let span = if hi > lo { hi - lo } else { 1.0 };

    let mut svg = String::new();
    let _ = writeln!(svg, r#"<?xml version="1.0" encoding="utf-8" ?>"#);
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1" width="{width}" height="{height}">"#
    );
    for (i, contour) in ordered.iter().enumerate() {
        let d = path_data(&contour.points);
        match style {
            SvgStyle::LevelColored => {
                let color = level_color((contour.level - lo) / span);
                let _ = writeln!(
                    svg,
                    r#"<path d="{d}" fill="none" stroke="{color}" stroke-width="1.0" />"#
                );
            }
            SvgStyle::Filled { reference } => {
                let color = mean_color(&contour.points, reference, width, height)
                    .unwrap_or_else(|| PALETTE[i % PALETTE.len()].to_string());
                let _ = writeln!(
                    svg,
                    r#"<path d="{d}" fill="{color}" fill-opacity="0.6" fill-rule="evenodd" stroke="{color}" stroke-opacity="0.9" stroke-width="1.0" />"#
                );
            }
        }
    }
    svg.push_str("</svg>\n");
    log::debug!("SVG: {} paths on {width}x{height}", ordered.len());
    svg
}

/// Straight-segment closed path.
fn path_data(points: &[(f64, f64)]) -> String {
    let mut d = String::with_capacity(points.len() * 20);
    for (i, (x, y)) in points.iter().enumerate() {
        let op = if i == 0 { 'M' } else { 'L' };
        let _ = write!(d, "{op} {x:.3},{y:.3} ");
    }
    d.push('Z');
    d
}

/// Hue 240° → 0° at full saturation and value, for `t` in `[0, 1]`.
///
/// # Example
/// ```
/// use cs_contour::svg::level_color;
/// assert_eq!(level_color(0.0), "#0000ff");
/// assert_eq!(level_color(0.5), "#00ff00");
/// assert_eq!(level_color(1.0), "#ff0000");
/// ```
#[must_use]
pub fn level_color(t: f64) -> String {
    let h = (240.0 - 240.0 * t.clamp(0.0, 1.0)) / 60.0;
    let sector = h.floor();
    let f = h - sector;
    let (r, g, b) = match sector as i64 % 6 {
        0 => (1.0, f, 0.0),
        1 => (1.0 - f, 1.0, 0.0),
        2 => (0.0, 1.0, f),
        3 => (0.0, 1.0 - f, 1.0),
        4 => (f, 0.0, 1.0),
        _ => (1.0, 0.0, 1.0 - f),
    };
    let byte = |c: f64| (c * 255.0) as u8;
    format!("#{:02x}{:02x}{:02x}", byte(r), byte(g), byte(b))
}

/// Even-odd membership of `(x, y)` in a closed polygon.
fn contains(points: &[(f64, f64)], x: f64, y: f64) -> bool {
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let (xi, yi) = points[i];
        let (xj, yj) = points[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Mean RGB of the reference pixels whose centres fall inside the polygon.
fn mean_color(points: &[(f64, f64)], reference: &[u8], width: usize, height: usize) -> Option<String> {
    if reference.len() != width * height * 3 || width == 0 || height == 0 {
        return None;
    }
    let (mut x0, mut y0, mut x1, mut y1) = (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &(x, y) in points {
        x0 = x0.min(x);
        y0 = y0.min(y);
        x1 = x1.max(x);
        y1 = y1.max(y);
    }
    let clamp_x = |v: f64| (v.max(0.0) as usize).min(width - 1);
    let clamp_y = |v: f64| (v.max(0.0) as usize).min(height - 1);

    let mut sum = [0u64; 3];
    let mut count = 0u64;
    for y in clamp_y(y0.floor())..=clamp_y(y1.ceil()) {
        for x in clamp_x(x0.floor())..=clamp_x(x1.ceil()) {
            if contains(points, x as f64, y as f64) {
                let px = &reference[(y * width + x) * 3..(y * width + x) * 3 + 3];
                for (s, &v) in sum.iter_mut().zip(px) {
                    *s += u64::from(v);
                }
                count += 1;
            }
        }
    }
    (count > 0).then(|| {
        let [r, g, b] = sum.map(|s| (s / count) as u8);
        format!("#{r:02X}{g:02X}{b:02X}")
    })
}
