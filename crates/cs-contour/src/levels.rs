use cs_core::config::{ContourConfig, LevelsMode};
use cs_core::stats::percentile_sorted;
use thiserror::Error;

/// Multi-Otsu could not split the data into the requested classes.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("Multi-Otsu : {distinct} valeurs distinctes pour {classes} classes")]
pub struct MultiOtsuError {
    pub distinct: usize,
    pub classes: usize,
}

/// Pick iso-levels for `data` (blurred intensities) according to `config`.
///
/// Only values `≥ min_intensity` take part; none left means no levels.
/// A multi-Otsu failure falls back to percentiles.
///
/// # Example
/// ```
/// use cs_core::config::ContourConfig;
/// use cs_contour::levels::select_levels;
/// let data: Vec<u8> = (0..=100).collect();
/// let mut config = ContourConfig::default();
/// config.percentile_values = vec![50.0, 90.0];
/// let levels = select_levels(&data, &config);
/// assert!((levels[0] - 50.5).abs() < 1e-9);
/// assert!((levels[1] - 90.1).abs() < 1e-9);
/// ```
#[must_use]
pub fn select_levels(data: &[u8], config: &ContourConfig) -> Vec<f64> {
    let mut valid: Vec<f64> = data
        .iter()
        .map(|&v| f64::from(v))
        .filter(|&v| v >= config.min_intensity)
        .collect();
    if valid.is_empty() {
        log::debug!("Levels: no pixel above {}", config.min_intensity);
        return Vec::new();
    }
    valid.sort_by(f64::total_cmp);

    let levels = match config.levels_mode {
        LevelsMode::Percentile => percentile_levels(&valid, &config.percentile_values),
        LevelsMode::MultiOtsu => match multi_otsu(&valid, config.multi_otsu_classes) {
            Ok(levels) => levels,
            Err(e) => {
                log::warn!("[contours] {e}, repli sur les percentiles");
                percentile_levels(&valid, &config.percentile_values)
            }
        },
        LevelsMode::Histogram => histogram_levels(
            &valid,
            config.hist_bins,
            config.hist_sigma,
            config.hist_variance_threshold,
            config.hist_max_levels,
        ),
    };
    log::debug!("Levels ({:?}): {levels:?}", config.levels_mode);
    levels
}

/// Linear-interpolated percentiles of sorted data, in ascending order of `q`.
#[must_use]
pub fn percentile_levels(sorted: &[f64], percentiles: &[f64]) -> Vec<f64> {
    let mut qs = percentiles.to_vec();
    qs.sort_by(f64::total_cmp);
    qs.iter().filter_map(|&q| percentile_sorted(sorted, q)).collect()
}

/// Multi-level Otsu thresholds over an integer histogram of `[min, max]`.
///
/// Maximises the between-class variance over all splits into `classes`
/// contiguous groups. Thresholds are the top value of each lower class.
///
/// # Errors
/// Fails when fewer distinct values than `classes` are present.
///
/// # Example
/// ```
/// use cs_contour::levels::multi_otsu;
/// let data = [10.0, 10.0, 10.0, 50.0, 50.0, 50.0, 90.0, 90.0, 90.0];
/// assert_eq!(multi_otsu(&data, 3).unwrap(), vec![10.0, 50.0]);
/// assert!(multi_otsu(&[1.0, 2.0], 3).is_err());
/// ```
pub fn multi_otsu(sorted: &[f64], classes: usize) -> Result<Vec<f64>, MultiOtsuError> {
    let classes = classes.max(2);
    let (Some(&lo), Some(&hi)) = (sorted.first(), sorted.last()) else {
        return Err(MultiOtsuError { distinct: 0, classes });
    };
    let lo = lo.round() as i64;
    let hi = hi.round() as i64;
    let bins = (hi - lo + 1).max(1) as usize;
    let mut hist = vec![0f64; bins];
    for &v in sorted {
        let idx = (v.round() as i64 - lo).clamp(0, bins as i64 - 1) as usize;
        hist[idx] += 1.0;
    }
    let total: f64 = hist.iter().sum();
    for h in &mut hist {
        *h /= total;
    }

    let distinct = hist.iter().filter(|&&p| p > 0.0).count();
    if distinct < classes {
        return Err(MultiOtsuError { distinct, classes });
    }
    let centre = |idx: usize| (lo + idx as i64) as f64;
    if distinct == classes {
        let nonzero: Vec<usize> = (0..bins).filter(|&i| hist[i] > 0.0).collect();
        return Ok(nonzero[..classes - 1].iter().map(|&i| centre(i)).collect());
    }

    // prefix sums of p and i·p
    let mut cum_p = vec![0f64; bins + 1];
    let mut cum_m = vec![0f64; bins + 1];
    for i in 0..bins {
        cum_p[i + 1] = cum_p[i] + hist[i];
        cum_m[i + 1] = cum_m[i] + i as f64 * hist[i];
    }
    let score = |a: usize, b: usize| -> f64 {
        let w = cum_p[b + 1] - cum_p[a];
        if w <= 0.0 {
            return 0.0;
        }
        let m = cum_m[b + 1] - cum_m[a];
        m * m / w
    };

    // best[k][j]: best score of bins 0..=j split into k+1 classes
    let mut best = vec![vec![f64::NEG_INFINITY; bins]; classes];
    let mut split = vec![vec![0usize; bins]; classes];
    for j in 0..bins {
        best[0][j] = score(0, j);
    }
    for k in 1..classes {
        for j in k..bins {
            for t in (k - 1)..j {
                let candidate = best[k - 1][t] + score(t + 1, j);
                if candidate > best[k][j] {
                    best[k][j] = candidate;
                    split[k][j] = t;
                }
            }
        }
    }

    let mut thresholds = Vec::with_capacity(classes - 1);
    let mut j = bins - 1;
    for k in (1..classes).rev() {
        let t = split[k][j];
        thresholds.push(centre(t));
        j = t;
    }
    thresholds.reverse();
    Ok(thresholds)
}

/// scipy `reflect` (half-sample symmetric) index.
fn reflect(mut i: isize, n: usize) -> usize {
    let n = n as isize;
    loop {
        if i < 0 {
            i = -i - 1;
        } else if i >= n {
            i = 2 * n - 1 - i;
        } else {
            return i as usize;
        }
    }
}

/// Gaussian smoothing of histogram counts, radius `round(4σ)`.
fn smooth_counts(counts: &[f64], sigma: f64) -> Vec<f64> {
    if sigma <= 0.0 || counts.is_empty() {
        return counts.to_vec();
    }
    let radius = (4.0 * sigma + 0.5) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|x| (-((x * x) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();
    let norm: f64 = weights.iter().sum();
    (0..counts.len())
        .map(|i| {
            weights
                .iter()
                .enumerate()
                .map(|(k, w)| w * counts[reflect(i as isize + k as isize - radius, counts.len())])
                .sum::<f64>()
                / norm
        })
        .collect()
}

fn weighted_mean(values: &[f64], weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().sum();
    values.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>() / total
}

fn weighted_variance(values: &[f64], weights: &[f64]) -> f64 {
    let mean = weighted_mean(values, weights);
    let total: f64 = weights.iter().sum();
    values
        .iter()
        .zip(weights)
        .map(|(v, w)| w * (v - mean) * (v - mean))
        .sum::<f64>()
        / total
}

/// Levels from variance-bounded groups of the smoothed intensity histogram.
///
/// Bin centres are walked in order, accumulating a weighted group; when the
/// group's weighted variance exceeds `variance_threshold`, it is closed
/// without its last centre and a new group starts from that centre. Group
/// means are sorted, the lowest is dropped, and at most `max_levels` are kept
/// (evenly spaced). Spare slots then go to the top gap, see
/// [`subdivide_high_end`].
#[must_use]
pub fn histogram_levels(
    sorted: &[f64],
    bins: usize,
    sigma: f64,
    variance_threshold: f64,
    max_levels: usize,
) -> Vec<f64> {
    let (Some(&first), Some(&last)) = (sorted.first(), sorted.last()) else {
        return Vec::new();
    };
    let bins = bins.max(1);
    let (lo, hi) = if first == last { (first - 0.5, last + 0.5) } else { (first, last) };
    let step = (hi - lo) / bins as f64;

    let mut counts = vec![0f64; bins];
    for &v in sorted {
        let idx = (((v - lo) / step) as usize).min(bins - 1);
        counts[idx] += 1.0;
    }
    let counts = smooth_counts(&counts, sigma);

    let mut groups: Vec<f64> = Vec::new();
    let mut centres: Vec<f64> = Vec::new();
    let mut weights: Vec<f64> = Vec::new();
    for (i, &count) in counts.iter().enumerate() {
        if count <= 0.0 {
            continue;
        }
        centres.push(lo + (i as f64 + 0.5) * step);
        weights.push(count.max(1e-9));

        if centres.len() > 1 && weighted_variance(&centres, &weights) > variance_threshold {
            let (Some(c), Some(w)) = (centres.pop(), weights.pop()) else {
                continue;
            };
            groups.push(weighted_mean(&centres, &weights));
            centres = vec![c];
            weights = vec![w];
        }
    }
    if !centres.is_empty() {
        groups.push(weighted_mean(&centres, &weights));
    }

    groups.sort_by(f64::total_cmp);
    groups.dedup();
    if groups.len() <= 1 {
        return groups;
    }
    groups.remove(0);

    if max_levels > 0 && groups.len() > max_levels {
        let n = groups.len();
        groups = (0..max_levels)
            .map(|k| {
                let idx = if max_levels == 1 {
                    0
                } else {
                    (k as f64 * (n - 1) as f64 / (max_levels - 1) as f64) as usize
                };
                groups[idx]
            })
            .collect();
    }
    subdivide_high_end(groups, max_levels)
}

/// Put up to two extra levels inside the top gap when it is the widest one.
///
/// Call ridges sit at the bright end, so that is where the spare level
/// budget (`max_levels - len`, or `len` when unbounded) is spent.
///
/// # Example
/// ```
/// use cs_contour::levels::subdivide_high_end;
/// assert_eq!(subdivide_high_end(vec![10.0, 20.0, 50.0], 5), vec![10.0, 20.0, 30.0, 40.0, 50.0]);
/// // widest gap at the bottom: unchanged
/// assert_eq!(subdivide_high_end(vec![10.0, 40.0, 50.0], 5), vec![10.0, 40.0, 50.0]);
/// ```
#[must_use]
pub fn subdivide_high_end(mut levels: Vec<f64>, max_levels: usize) -> Vec<f64> {
    let n = levels.len();
    if n < 2 {
        return levels;
    }
    let mut widest = 0;
    for i in 1..n - 1 {
        if levels[i + 1] - levels[i] > levels[widest + 1] - levels[widest] {
            widest = i;
        }
    }
    let spare = if max_levels > 0 { max_levels.saturating_sub(n) } else { n };
    let subdivisions = spare.min(2);
    if subdivisions > 0 && widest == n - 2 {
        let (low, high) = (levels[n - 2], levels[n - 1]);
        let stride = (high - low) / (subdivisions + 1) as f64;
        levels.pop();
        levels.extend((1..=subdivisions).map(|k| low + stride * k as f64));
        levels.push(high);
        log::debug!("Levels: {subdivisions} added between {low:.1} and {high:.1}");
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mode: LevelsMode) -> ContourConfig {
        ContourConfig {
            levels_mode: mode,
            ..ContourConfig::default()
        }
    }

    #[test]
    fn no_valid_pixels_means_no_levels() {
        assert!(select_levels(&[0, 0, 0], &config(LevelsMode::Percentile)).is_empty());
    }

    #[test]
    fn default_percentiles_are_ascending() {
        let data: Vec<u8> = (1..=200).collect();
        let levels = select_levels(&data, &config(LevelsMode::Percentile));
        assert_eq!(levels.len(), 8);
        assert!(levels.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn multi_otsu_separates_four_clusters() {
        let mut data = Vec::new();
        for v in [20u8, 80, 140, 220] {
            for d in 0..5 {
                data.extend(std::iter::repeat_n(v + d, 10));
            }
        }
        let levels = select_levels(&data, &config(LevelsMode::MultiOtsu));
        assert_eq!(levels.len(), 3);
        assert!(levels[0] >= 24.0 && levels[0] < 80.0);
        assert!(levels[1] >= 84.0 && levels[1] < 140.0);
        assert!(levels[2] >= 144.0 && levels[2] < 220.0);
    }

    #[test]
    fn multi_otsu_failure_falls_back_to_percentiles() {
        let data = [10u8, 10, 200, 200];
        let otsu = select_levels(&data, &config(LevelsMode::MultiOtsu));
        let pct = select_levels(&data, &config(LevelsMode::Percentile));
        assert_eq!(otsu, pct);
    }

    #[test]
    fn histogram_groups_distant_modes() {
        let mut data = Vec::new();
        for v in [10.0, 100.0, 200.0] {
            data.extend(std::iter::repeat_n(v, 50));
        }
        data.sort_by(f64::total_cmp);
        let levels = histogram_levels(&data, 512, 2.0, 400.0, 5);
        // lowest group dropped; smoothed tails of the next mode pull each mean up a little.
        // The single remaining gap is the top one, so it gets two extra levels.
        assert_eq!(levels.len(), 4);
        assert!((levels[0] - 100.0).abs() < 6.0, "{levels:?}");
        assert!((levels[3] - 200.0).abs() < 6.0, "{levels:?}");
        let third = (levels[3] - levels[0]) / 3.0;
        assert!((levels[1] - (levels[0] + third)).abs() < 1e-9);
        assert!((levels[2] - (levels[0] + 2.0 * third)).abs() < 1e-9);
    }

    fn modes(centres: &[f64]) -> Vec<f64> {
        let mut data: Vec<f64> = centres.iter().flat_map(|&v| std::iter::repeat_n(v, 50)).collect();
        data.sort_by(f64::total_cmp);
        data
    }

    #[test]
    fn wide_top_gap_gets_the_spare_levels() {
        let levels = histogram_levels(&modes(&[10.0, 80.0, 150.0, 250.0]), 512, 2.0, 400.0, 5);
        assert_eq!(levels.len(), 5, "{levels:?}");
        assert!((levels[1] - 150.0).abs() < 8.0, "{levels:?}");
        assert!((levels[4] - 250.0).abs() < 8.0, "{levels:?}");
        // both extra levels sit above the top split, evenly spaced
        let stride = levels[2] - levels[1];
        assert!(stride > 0.0);
        assert!((levels[3] - levels[2] - stride).abs() < 1e-9);
        assert!((levels[4] - levels[3] - stride).abs() < 1e-9);
    }

    #[test]
    fn wide_low_gap_adds_nothing() {
        let levels = histogram_levels(&modes(&[10.0, 100.0, 200.0, 260.0]), 512, 2.0, 400.0, 5);
        assert_eq!(levels.len(), 3, "{levels:?}");
    }

    #[test]
    fn full_budget_adds_nothing() {
        assert_eq!(subdivide_high_end(vec![1.0, 2.0, 9.0], 3), vec![1.0, 2.0, 9.0]);
        assert_eq!(subdivide_high_end(vec![1.0, 2.0, 9.0], 4).len(), 4);
        // unbounded: up to two more
        assert_eq!(subdivide_high_end(vec![1.0, 2.0, 9.0], 0).len(), 5);
    }

    #[test]
    fn histogram_single_value_is_kept() {
        let levels = histogram_levels(&[42.0; 10], 512, 2.0, 400.0, 5);
        assert_eq!(levels.len(), 1);
        assert!((levels[0] - 42.0).abs() < 0.01);
    }

    #[test]
    fn histogram_levels_are_subsampled() {
        let data: Vec<f64> = (0..1000).map(|i| f64::from(i) * 0.25).collect();
        let levels = histogram_levels(&data, 512, 2.0, 10.0, 5);
        assert_eq!(levels.len(), 5);
        assert!(levels.windows(2).all(|w| w[0] < w[1]));
    }
}
