//! Marching squares iso-contours with `find_contours` conventions.
//!
//! Points are `(row, col)`; a pixel is "inside" when strictly greater than
//! the level. Saddles are resolved with the low values connected.

use std::collections::HashMap;
use std::collections::VecDeque;

pub type Point = (f64, f64);

#[inline]
fn fraction(from: f64, to: f64, level: f64) -> f64 {
    if to == from {
        return 0.0;
    }
    (level - from) / (to - from)
}

/// Line segments of the iso-line at `level`, cell by cell in row-major order.
fn segments(data: &[u8], width: usize, height: usize, level: f64) -> Vec<(Point, Point)> {
    let mut out = Vec::new();
    let at = |r: usize, c: usize| f64::from(data[r * width + c]);
    for r0 in 0..height.saturating_sub(1) {
        let r1 = r0 + 1;
        for c0 in 0..width.saturating_sub(1) {
            let c1 = c0 + 1;
            let ul = at(r0, c0);
            let ur = at(r0, c1);
            let ll = at(r1, c0);
            let lr = at(r1, c1);

            let case = u8::from(ul > level)
                | u8::from(ur > level) << 1
                | u8::from(ll > level) << 2
                | u8::from(lr > level) << 3;
            if case == 0 || case == 15 {
                continue;
            }

            let (r0f, c0f) = (r0 as f64, c0 as f64);
            let top = (r0f, c0f + fraction(ul, ur, level));
            let bottom = (r0f + 1.0, c0f + fraction(ll, lr, level));
            let left = (r0f + fraction(ul, ll, level), c0f);
            let right = (r0f + fraction(ur, lr, level), c0f + 1.0);

            match case {
                1 => out.push((top, left)),
                2 => out.push((right, top)),
                3 => out.push((right, left)),
                4 => out.push((left, bottom)),
                5 => out.push((top, bottom)),
                6 => {
                    out.push((right, top));
                    out.push((left, bottom));
                }
                7 => out.push((right, bottom)),
                8 => out.push((bottom, right)),
                9 => {
                    out.push((top, left));
                    out.push((bottom, right));
                }
                10 => out.push((bottom, top)),
                11 => out.push((bottom, left)),
                12 => out.push((left, right)),
                13 => out.push((top, right)),
                14 => out.push((left, top)),
                _ => {}
            }
        }
    }
    out
}

/// Hashable identity of a point; `-0.0` and `0.0` collapse.
#[inline]
fn key(p: Point) -> (u64, u64) {
    ((p.0 + 0.0).to_bits(), (p.1 + 0.0).to_bits())
}

/// Chain segments into polylines, joining on shared end points.
fn assemble(segments: Vec<(Point, Point)>) -> Vec<Vec<Point>> {
    let mut contours: Vec<Option<VecDeque<Point>>> = Vec::new();
    let mut starts: HashMap<(u64, u64), usize> = HashMap::new();
    let mut ends: HashMap<(u64, u64), usize> = HashMap::new();

    for (from, to) in segments {
        if key(from) == key(to) {
            continue;
        }
        let tail = starts.remove(&key(to));
        let head = ends.remove(&key(from));

        match (tail, head) {
            (Some(t), Some(h)) if t == h => {
                if let Some(c) = contours[h].as_mut() {
                    c.push_back(to);
                }
            }
            (Some(t), Some(h)) => {
                if t > h {
                    // tail is newer: append it to head
                    let Some(tail_pts) = contours[t].take() else { continue };
                    let Some(head_pts) = contours[h].as_mut() else { continue };
                    head_pts.extend(tail_pts);
                    if let (Some(&first), Some(&last)) = (head_pts.front(), head_pts.back()) {
                        starts.insert(key(first), h);
                        ends.insert(key(last), h);
                    }
                } else {
                    // head is newer: prepend it to tail
                    let Some(head_pts) = contours[h].take() else { continue };
                    if let Some(&first) = head_pts.front() {
                        starts.remove(&key(first));
                    }
                    let Some(tail_pts) = contours[t].as_mut() else { continue };
                    for p in head_pts.into_iter().rev() {
                        tail_pts.push_front(p);
                    }
                    if let (Some(&first), Some(&last)) = (tail_pts.front(), tail_pts.back()) {
                        starts.insert(key(first), t);
                        ends.insert(key(last), t);
                    }
                }
            }
            (None, None) => {
                let id = contours.len();
                contours.push(Some(VecDeque::from([from, to])));
                starts.insert(key(from), id);
                ends.insert(key(to), id);
            }
            (Some(t), None) => {
                if let Some(c) = contours[t].as_mut() {
                    c.push_front(from);
                }
                starts.insert(key(from), t);
            }
            (None, Some(h)) => {
                if let Some(c) = contours[h].as_mut() {
                    c.push_back(to);
                }
                ends.insert(key(to), h);
            }
        }
    }

    contours
        .into_iter()
        .flatten()
        .map(Vec::from)
        .collect()
}

/// Iso-contours of `data` (`width × height`, row-major) at `level`.
///
/// Returned polylines are `(row, col)` points in creation order. Closed
/// contours repeat their first point at the end.
///
/// # Example
/// ```
/// use cs_contour::marching::find_contours;
/// let mut data = vec![0u8; 5 * 5];
/// data[2 * 5 + 2] = 10;
/// let contours = find_contours(&data, 5, 5, 5.0);
/// assert_eq!(contours.len(), 1);
/// let c = &contours[0];
/// assert_eq!(c.first(), c.last());
/// assert_eq!(c.len(), 5);
/// ```
#[must_use]
pub fn find_contours(data: &[u8], width: usize, height: usize, level: f64) -> Vec<Vec<Point>> {
    assemble(segments(data, width, height, level))
}
