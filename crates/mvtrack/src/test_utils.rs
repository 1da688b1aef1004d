//! Shared synthetic images for tracking tests.

use image::{GrayImage, Luma};

use crate::raster::FloatImage;

/// Smooth, non-periodic texture value at `(x, y)`.
///
/// A sum of incommensurate sinusoids plus a gentle ramp: every pattern
/// position is unique, gradients stay well conditioned at half resolution and
/// values stay inside [0, 1] for images up to 128 px.
pub(crate) fn texture(x: f64, y: f64) -> f64 {
    0.35 + 0.12 * (0.30 * x + 0.12 * y).sin()
        + 0.10 * (0.10 * x - 0.26 * y + 0.7).cos()
        + 0.07 * (0.17 * x + 0.21 * y + 1.3).sin()
        + 0.0015 * x
        + 0.001 * y
}

/// Render [`texture`] with its content moved by `shift`.
pub(crate) fn textured_image(w: usize, h: usize, shift: [f64; 2]) -> FloatImage {
    FloatImage::from_fn(w, h, |x, y| {
        texture(x as f64 - shift[0], y as f64 - shift[1]) as f32
    })
}

/// Reference image and a copy whose content is moved by `shift` (sub-pixel
/// shifts are rendered exactly).
pub(crate) fn shifted_texture(w: usize, h: usize, shift: [f64; 2]) -> (FloatImage, FloatImage) {
    (
        textured_image(w, h, [0.0, 0.0]),
        textured_image(w, h, shift),
    )
}

/// 8-bit version of [`textured_image`], blurred via `imageproc` to mimic
/// camera optics.
pub(crate) fn textured_gray(w: u32, h: u32, shift: [f64; 2], sigma: f32) -> GrayImage {
    let mut f = image::ImageBuffer::<Luma<f32>, Vec<f32>>::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let v = texture(x as f64 - shift[0], y as f64 - shift[1]) as f32;
            f.put_pixel(x, y, Luma([v.clamp(0.0, 1.0)]));
        }
    }
    let blurred = if sigma > 0.0 {
        imageproc::filter::gaussian_blur_f32(&f, sigma)
    } else {
        f
    };
    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let v = blurred.get_pixel(x, y)[0].clamp(0.0, 1.0);
            out.put_pixel(x, y, Luma([(v * 255.0).round() as u8]));
        }
    }
    out
}
