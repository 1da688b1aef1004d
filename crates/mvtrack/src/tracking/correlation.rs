//! Pattern sampling and patch similarity measures.

use crate::raster::FloatImage;

/// Sample the `(2 * half + 1)²` pattern centred at `center` (bilinear,
/// row-major). Returns `None` if any sample falls outside the image.
pub fn sample_pattern(image: &FloatImage, center: [f64; 2], half: usize) -> Option<Vec<f32>> {
    let h = half as isize;
    let mut out = Vec::with_capacity((2 * half + 1) * (2 * half + 1));
    for dy in -h..=h {
        for dx in -h..=h {
            out.push(image.sample_bilinear(center[0] + dx as f64, center[1] + dy as f64)?);
        }
    }
    Some(out)
}

/// Sum of squared differences.
pub fn ssd(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = (x - y) as f64;
            d * d
        })
        .sum()
}

/// Zero-mean normalized cross-correlation in [-1, 1].
///
/// Flat patches have no defined correlation and score 0.
pub fn normalized_cross_correlation(a: &[f32], b: &[f32]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let mean_a = a[..n].iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let (mut sab, mut saa, mut sbb) = (0.0, 0.0, 0.0);
    for (&x, &y) in a[..n].iter().zip(&b[..n]) {
        let da = x as f64 - mean_a;
        let db = y as f64 - mean_b;
        sab += da * db;
        saa += da * da;
        sbb += db * db;
    }
    let denom = (saa * sbb).sqrt();
    if denom <= 1e-12 {
        return 0.0;
    }
    (sab / denom).clamp(-1.0, 1.0)
}
