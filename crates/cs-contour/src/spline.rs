//! Periodic cubic smoothing spline for closed contours.
//!
//! A uniform periodic cubic B-spline is fitted by penalised least squares
//! over a chord-length parameterisation. The penalty weight is searched so
//! that the residual sum of squares lands on the smoothing target `s`.

use thiserror::Error;

/// Spline fitting failure; the caller keeps the raw polygon.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SplineError {
    #[error("Trop peu de points : {0}")]
    TooFewPoints(usize),
    #[error("Contour de longueur nulle")]
    ZeroLength,
    #[error("Système non défini positif")]
    NotPositiveDefinite,
    #[error("Valeur non finie")]
    NonFinite,
}

const MIN_CONTROL: usize = 4;
const MAX_CONTROL: usize = 96;
const BISECTION_STEPS: usize = 30;

/// Uniform cubic B-spline weights at local parameter `tau` in [0, 1).
#[inline]
fn basis(tau: f64) -> [f64; 4] {
    let t2 = tau * tau;
    let t3 = t2 * tau;
    [
        (1.0 - tau).powi(3) / 6.0,
        (3.0 * t3 - 6.0 * t2 + 4.0) / 6.0,
        (-3.0 * t3 + 3.0 * t2 + 3.0 * tau + 1.0) / 6.0,
        t3 / 6.0,
    ]
}

/// Control indices and weights of the periodic spline at `u` in [0, 1].
#[inline]
fn stencil(u: f64, k: usize) -> ([usize; 4], [f64; 4]) {
    let x = u.rem_euclid(1.0) * k as f64;
    let seg = (x.floor() as usize).min(k - 1);
    let tau = x - seg as f64;
    let idx = [(seg + k - 1) % k, seg, (seg + 1) % k, (seg + 2) % k];
    (idx, basis(tau))
}

/// In-place Cholesky factorisation of a dense symmetric `n × n` matrix.
fn cholesky(a: &mut [f64], n: usize) -> Result<(), SplineError> {
    for j in 0..n {
        let mut d = a[j * n + j];
        for k in 0..j {
            d -= a[j * n + k] * a[j * n + k];
        }
        if d <= 0.0 || !d.is_finite() {
            return Err(SplineError::NotPositiveDefinite);
        }
        let d = d.sqrt();
        a[j * n + j] = d;
        for i in (j + 1)..n {
            let mut s = a[i * n + j];
            for k in 0..j {
                s -= a[i * n + k] * a[j * n + k];
            }
            a[i * n + j] = s / d;
        }
    }
    Ok(())
}

fn cholesky_solve(l: &[f64], n: usize, b: &mut [f64]) {
    for i in 0..n {
        let mut s = b[i];
        for k in 0..i {
            s -= l[i * n + k] * b[k];
        }
        b[i] = s / l[i * n + i];
    }
    for i in (0..n).rev() {
        let mut s = b[i];
        for k in (i + 1)..n {
            s -= l[k * n + i] * b[k];
        }
        b[i] = s / l[i * n + i];
    }
}

/// Least-squares problem shared by every penalty weight.
struct Fit {
    k: usize,
    /// BᵀB
    gram: Vec<f64>,
    /// DᵀD, periodic second differences.
    penalty: Vec<f64>,
    rhs_x: Vec<f64>,
    rhs_y: Vec<f64>,
    stencils: Vec<([usize; 4], [f64; 4])>,
    points: Vec<(f64, f64)>,
}

impl Fit {
    fn new(points: &[(f64, f64)], params: &[f64], k: usize) -> Self {
        let mut gram = vec![0.0; k * k];
        let mut rhs_x = vec![0.0; k];
        let mut rhs_y = vec![0.0; k];
        let mut stencils = Vec::with_capacity(points.len());
        for (&(x, y), &u) in points.iter().zip(params) {
            let (idx, w) = stencil(u, k);
            for a in 0..4 {
                rhs_x[idx[a]] += w[a] * x;
                rhs_y[idx[a]] += w[a] * y;
                for b in 0..4 {
                    gram[idx[a] * k + idx[b]] += w[a] * w[b];
                }
            }
            stencils.push((idx, w));
        }

        let mut penalty = vec![0.0; k * k];
        for i in 0..k {
            let rows = [((i + k - 1) % k, 1.0), (i, -2.0), ((i + 1) % k, 1.0)];
            for &(a, wa) in &rows {
                for &(b, wb) in &rows {
                    penalty[a * k + b] += wa * wb;
                }
            }
        }

        Self {
            k,
            gram,
            penalty,
            rhs_x,
            rhs_y,
            stencils,
            points: points.to_vec(),
        }
    }

    /// Control points and residual sum of squares for penalty `lambda`.
    fn solve(&self, lambda: f64) -> Result<(Vec<f64>, Vec<f64>, f64), SplineError> {
        let k = self.k;
        let mut a: Vec<f64> = self
            .gram
            .iter()
            .zip(&self.penalty)
            .map(|(g, p)| g + lambda * p)
            .collect();
        for i in 0..k {
            a[i * k + i] += 1e-9;
        }
        cholesky(&mut a, k)?;
        let mut cx = self.rhs_x.clone();
        let mut cy = self.rhs_y.clone();
        cholesky_solve(&a, k, &mut cx);
        cholesky_solve(&a, k, &mut cy);

        let mut fp = 0.0;
        for ((idx, w), &(x, y)) in self.stencils.iter().zip(&self.points) {
            let (sx, sy) = eval(&cx, &cy, idx, w);
            fp += (sx - x).powi(2) + (sy - y).powi(2);
        }
        if !fp.is_finite() {
            return Err(SplineError::NonFinite);
        }
        Ok((cx, cy, fp))
    }
}

#[inline]
fn eval(cx: &[f64], cy: &[f64], idx: &[usize; 4], w: &[f64; 4]) -> (f64, f64) {
    let mut x = 0.0;
    let mut y = 0.0;
    for a in 0..4 {
        x += w[a] * cx[idx[a]];
        y += w[a] * cy[idx[a]];
    }
    (x, y)
}

/// Smooth a closed polygon with a periodic cubic spline.
///
/// `points` may or may not repeat the first point at the end. The smoothing
/// target is `s = n · smoothing_factor` with `n` the closed point count. The
/// result has `max(n, 100)` points, the last equal to the first.
///
/// # Errors
/// Fails on fewer than 4 distinct points, zero perimeter, or numerical breakdown.
///
/// # Example
/// ```
/// use cs_contour::spline::smooth_closed;
/// let square: Vec<(f64, f64)> = (0..40)
///     .map(|i| {
///         let a = i as f64 / 40.0 * std::f64::consts::TAU;
///         (10.0 * a.cos(), 10.0 * a.sin())
///     })
///     .collect();
/// let smooth = smooth_closed(&square, 0.08).unwrap();
/// assert_eq!(smooth.len(), 100);
/// assert_eq!(smooth.first(), smooth.last());
/// ```
pub fn smooth_closed(points: &[(f64, f64)], smoothing_factor: f64) -> Result<Vec<(f64, f64)>, SplineError> {
    let mut closed = points.to_vec();
    if let (Some(&first), Some(&last)) = (closed.first(), closed.last())
        && first != last
    {
        closed.push(first);
    }
    let n = closed.len();
    let m = n.saturating_sub(1);
    if m < MIN_CONTROL {
        return Err(SplineError::TooFewPoints(m));
    }

    // chord-length parameter over the closed loop
    let mut cumulative = Vec::with_capacity(n);
    cumulative.push(0.0);
    for w in closed.windows(2) {
        let d = ((w[1].0 - w[0].0).powi(2) + (w[1].1 - w[0].1).powi(2)).sqrt();
        cumulative.push(cumulative[cumulative.len() - 1] + d);
    }
    let perimeter = cumulative[n - 1];
    if perimeter <= 0.0 || !perimeter.is_finite() {
        return Err(SplineError::ZeroLength);
    }
    let params: Vec<f64> = cumulative[..m].iter().map(|c| c / perimeter).collect();

    let k = (m / 3).clamp(MIN_CONTROL, MAX_CONTROL).min(m);
    let fit = Fit::new(&closed[..m], &params, k);
    let target = n as f64 * smoothing_factor;

    let (mut cx, mut cy, fp0) = fit.solve(0.0)?;
    if fp0 < target {
        let (hx, hy, fp_hi) = fit.solve(1e8)?;
        if fp_hi <= target {
            (cx, cy) = (hx, hy);
        } else {
            let (mut lo, mut hi) = (-8.0f64, 8.0f64);
            for _ in 0..BISECTION_STEPS {
                let mid = 0.5 * (lo + hi);
                let (mx, my, fp) = fit.solve(10f64.powf(mid))?;
                if fp > target {
                    hi = mid;
                } else {
                    lo = mid;
                    (cx, cy) = (mx, my);
                }
            }
        }
    }

    let samples = n.max(100);
    let mut out: Vec<(f64, f64)> = (0..samples)
        .map(|i| {
            let u = i as f64 / (samples - 1) as f64;
            let (idx, w) = stencil(u, k);
            eval(&cx, &cy, &idx, &w)
        })
        .collect();
    if out.iter().any(|p| !p.0.is_finite() || !p.1.is_finite()) {
        return Err(SplineError::NonFinite);
    }
    out[samples - 1] = out[0];
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle(n: usize, r: f64) -> Vec<(f64, f64)> {
        (0..n)
            .map(|i| {
                let a = i as f64 / n as f64 * std::f64::consts::TAU;
                (50.0 + r * a.cos(), 40.0 + r * a.sin())
            })
            .collect()
    }

    #[test]
    fn circle_stays_close_to_its_radius() {
        let smooth = smooth_closed(&circle(120, 20.0), 0.08).unwrap();
        assert_eq!(smooth.len(), 121);
        for &(x, y) in &smooth {
            let r = ((x - 50.0).powi(2) + (y - 40.0).powi(2)).sqrt();
            assert!((r - 20.0).abs() < 1.0, "radius {r}");
        }
    }

    #[test]
    fn noisy_circle_is_smoothed() {
        let noisy: Vec<(f64, f64)> = circle(200, 15.0)
            .into_iter()
            .enumerate()
            .map(|(i, (x, y))| if i % 2 == 0 { (x + 0.4, y) } else { (x - 0.4, y) })
            .collect();
        let smooth = smooth_closed(&noisy, 0.08).unwrap();
        assert_eq!(smooth.first(), smooth.last());
        for &(x, y) in &smooth {
            let r = ((x - 50.0).powi(2) + (y - 40.0).powi(2)).sqrt();
            assert!((r - 15.0).abs() < 1.0);
        }
    }

    #[test]
    fn degenerate_inputs_fail() {
        assert_eq!(smooth_closed(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)], 0.08), Err(SplineError::TooFewPoints(3)));
        assert_eq!(smooth_closed(&[(2.0, 2.0); 8], 0.08), Err(SplineError::ZeroLength));
    }

    #[test]
    fn cholesky_solves_spd_system() {
        let mut a = vec![4.0, 2.0, 2.0, 3.0];
        cholesky(&mut a, 2).unwrap();
        let mut b = vec![2.0, 1.0];
        cholesky_solve(&a, 2, &mut b);
        // 4x + 2y = 2, 2x + 3y = 1 → x = 0.5, y = 0
        assert!((b[0] - 0.5).abs() < 1e-12);
        assert!(b[1].abs() < 1e-12);
    }
}
