//! Small order statistics shared by the denoiser, the segmenter and the level selectors.

/// Median of `values`. The mean of the two middle values for even lengths.
/// `None` for an empty slice.
///
/// # Example
/// ```
/// use cs_core::stats::median;
/// assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
/// assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
/// assert_eq!(median(&[]), None);
/// ```
#[must_use]
pub fn median(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut buf = values.to_vec();
    let n = buf.len();
    let mid = n / 2;
    let (lower, upper, _) = buf.select_nth_unstable_by(mid, f32::total_cmp);
    let upper = *upper;
    if n % 2 == 1 {
        return Some(upper);
    }
    let lower_max = lower.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    Some((lower_max + upper) * 0.5)
}

/// Linear-interpolated percentile of already sorted data (`q` in [0, 100]).
///
/// Index `q/100 * (n-1)`, interpolated between the neighbouring samples.
///
/// # Example
/// ```
/// use cs_core::stats::percentile_sorted;
/// let data = [0.0, 10.0, 20.0, 30.0, 40.0];
/// assert_eq!(percentile_sorted(&data, 50.0), Some(20.0));
/// assert_eq!(percentile_sorted(&data, 90.0), Some(36.0));
/// ```
#[must_use]
pub fn percentile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let last = sorted.len() - 1;
    let pos = (q.clamp(0.0, 100.0) / 100.0) * last as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(last);
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Minimum and maximum of `values`, ignoring NaN. `None` if nothing finite remains.
#[must_use]
pub fn min_max(values: &[f32]) -> Option<(f32, f32)> {
    let mut it = values.iter().copied().filter(|v| !v.is_nan());
    let first = it.next()?;
    Some(it.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_single_value() {
        assert_eq!(median(&[7.5]), Some(7.5));
    }

    #[test]
    fn median_even_length_is_midpoint() {
        assert_eq!(median(&[0.0, 0.0, 10.0, 10.0]), Some(5.0));
    }

    #[test]
    fn percentile_extremes_are_min_and_max() {
        let data = [1.0, 2.0, 5.0];
        assert_eq!(percentile_sorted(&data, 0.0), Some(1.0));
        assert_eq!(percentile_sorted(&data, 100.0), Some(5.0));
    }

    #[test]
    fn min_max_skips_nan() {
        assert_eq!(min_max(&[f32::NAN, 2.0, -1.0]), Some((-1.0, 2.0)));
        assert_eq!(min_max(&[f32::NAN]), None);
    }
}
