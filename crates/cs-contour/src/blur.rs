//! Separable Gaussian pre-blur applied to the mask before level selection.

/// Normalised 1-D Gaussian kernel of odd `size`.
///
/// # Example
/// ```
/// use cs_contour::blur::gaussian_kernel;
/// let k = gaussian_kernel(15, 3.0);
/// assert_eq!(k.len(), 15);
/// assert!((k.iter().sum::<f64>() - 1.0).abs() < 1e-12);
/// assert!(k[7] > k[6] && k[6] == k[8]);
/// ```
#[must_use]
pub fn gaussian_kernel(size: usize, sigma: f64) -> Vec<f64> {
    let size = size.max(1) | 1;
    let half = (size / 2) as f64;
    let mut kernel: Vec<f64> = (0..size)
        .map(|i| {
            let x = i as f64 - half;
            if sigma > 0.0 {
                (-(x * x) / (2.0 * sigma * sigma)).exp()
            } else if x == 0.0 {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Reflect-101 border: `... 2 1 | 0 1 2 ... n-1 | n-2 n-3 ...`.
#[inline]
fn reflect101(mut i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * n - 2 - i;
        } else {
            return i as usize;
        }
    }
}

/// Gaussian blur of a `width × height` u8 image, rounded back to u8.
///
/// # Example
/// ```
/// use cs_contour::blur::gaussian_blur;
/// let flat = vec![42u8; 20 * 10];
/// assert_eq!(gaussian_blur(&flat, 20, 10, 15, 3.0), flat);
/// ```
#[must_use]
pub fn gaussian_blur(data: &[u8], width: usize, height: usize, size: usize, sigma: f64) -> Vec<u8> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let kernel = gaussian_kernel(size, sigma);
    let half = (kernel.len() / 2) as isize;

    let mut horizontal = vec![0f64; width * height];
    for y in 0..height {
        let row = &data[y * width..(y + 1) * width];
        for x in 0..width {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let sx = reflect101(x as isize + k as isize - half, width);
                acc += w * f64::from(row[sx]);
            }
            horizontal[y * width + x] = acc;
        }
    }

    let mut out = vec![0u8; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let sy = reflect101(y as isize + k as isize - half, height);
                acc += w * horizontal[sy * width + x];
            }
            out[y * width + x] = acc.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflect101_mirrors_without_edge_repeat() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(-3, 5), 3);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(6, 5), 2);
        assert_eq!(reflect101(-20, 3), 0);
    }

    #[test]
    fn impulse_spreads_symmetrically() {
        let mut img = vec![0u8; 31 * 31];
        img[15 * 31 + 15] = 255;
        let out = gaussian_blur(&img, 31, 31, 15, 3.0);
        let c = out[15 * 31 + 15];
        assert!(c > 0 && c < 255);
        assert_eq!(out[15 * 31 + 12], out[15 * 31 + 18]);
        assert_eq!(out[12 * 31 + 15], out[18 * 31 + 15]);
        assert_eq!(out[0], 0);
    }

    #[test]
    fn tiny_images_do_not_panic() {
        assert_eq!(gaussian_blur(&[9], 1, 1, 15, 3.0), vec![9]);
        assert_eq!(gaussian_blur(&[0, 255], 2, 1, 15, 3.0).len(), 2);
    }
}
