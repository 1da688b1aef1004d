//! Blur, derivative and decimation filters on channel 0, backed by
//! `imageproc`.

use imageproc::filter::{filter3x3, gaussian_blur_f32, separable_filter_equal};

use super::float_image::FloatImage;

/// Central difference along x, row-major 3x3.
const DX_KERNEL: [f32; 9] = [0.0, 0.0, 0.0, -0.5, 0.0, 0.5, 0.0, 0.0, 0.0];
/// Central difference along y, row-major 3x3.
const DY_KERNEL: [f32; 9] = [0.0, -0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.5, 0.0];
const BINOMIAL: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];

/// Gaussian blur of channel 0. `sigma <= 0` returns a mono copy.
pub fn blur(img: &FloatImage, sigma: f32) -> FloatImage {
    if sigma <= 0.0 || !sigma.is_finite() || img.is_empty() {
        return img.to_mono();
    }
    let smoothed = gaussian_blur_f32(&img.to_luma32(), sigma);
    FloatImage::from_luma32(&smoothed)
}

/// Blur with `sigma`, then take central differences.
///
/// Returns `(blurred, d/dx, d/dy)`. Borders replicate the edge pixel, so
/// the derivative across the outermost pixel is half a one-sided step.
pub fn blurred_gradients(img: &FloatImage, sigma: f32) -> (FloatImage, FloatImage, FloatImage) {
    let blurred = blur(img, sigma);
    if blurred.is_empty() {
        let (w, h) = (blurred.width(), blurred.height());
        return (blurred, FloatImage::new(w, h, 1), FloatImage::new(w, h, 1));
    }
    let buf = blurred.to_luma32();
    let dx = filter3x3::<_, f32, f32>(&buf, &DX_KERNEL);
    let dy = filter3x3::<_, f32, f32>(&buf, &DY_KERNEL);
    (
        blurred,
        FloatImage::from_luma32(&dx),
        FloatImage::from_luma32(&dy),
    )
}

/// Blur with the binomial [1, 4, 6, 4, 1] / 16 kernel and keep every second
/// pixel: output pixel `(i, j)` sits at input `(2i, 2j)`.
pub fn downsample_2x(img: &FloatImage) -> FloatImage {
    let (nw, nh) = (img.width().div_ceil(2), img.height().div_ceil(2));
    if img.is_empty() {
        return FloatImage::new(nw, nh, 1);
    }
    let smooth = separable_filter_equal(&img.to_luma32(), &BINOMIAL);
    FloatImage::from_fn(nw, nh, |x, y| smooth.get_pixel(2 * x as u32, 2 * y as u32)[0])
}
