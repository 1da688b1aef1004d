//! Dense row-major `f32` image with interleaved channels.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};

/// Single-channel `f32` buffer in the layout `imageproc` filters expect.
pub type Luma32Image = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Row-major float image, `depth` interleaved channels per pixel.
///
/// Pixel `(x, y)` is centred on integer coordinates; bilinear sampling is
/// defined on `[0, width - 1] × [0, height - 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatImage {
    width: usize,
    height: usize,
    depth: usize,
    data: Vec<f32>,
}

impl FloatImage {
    /// Zero-filled image.
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            width,
            height,
            depth,
            data: vec![0.0; width * height * depth],
        }
    }

    /// Wrap an existing buffer. Returns `None` if the length does not match.
    pub fn from_vec(width: usize, height: usize, depth: usize, data: Vec<f32>) -> Option<Self> {
        (data.len() == width * height * depth).then_some(Self {
            width,
            height,
            depth,
            data,
        })
    }

    /// Single-channel image from a per-pixel function.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            depth: 1,
            data,
        }
    }

    /// Single-channel image with values scaled to [0, 1].
    pub fn from_gray(gray: &GrayImage) -> Self {
        let (w, h) = gray.dimensions();
        Self {
            width: w as usize,
            height: h as usize,
            depth: 1,
            data: gray.as_raw().iter().map(|&v| v as f32 / 255.0).collect(),
        }
    }

    /// Four-channel RGBA image with values scaled to [0, 1].
    pub fn from_rgba(img: &DynamicImage) -> Self {
        let rgba = img.to_rgba8();
        let (w, h) = rgba.dimensions();
        Self {
            width: w as usize,
            height: h as usize,
            depth: 4,
            data: rgba.as_raw().iter().map(|&v| v as f32 / 255.0).collect(),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, c: usize) -> f32 {
        self.data[(y * self.width + x) * self.depth + c]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, c: usize, v: f32) {
        self.data[(y * self.width + x) * self.depth + c] = v;
    }

    /// Border-clamped access to channel 0.
    #[inline]
    pub fn get_clamped(&self, x: isize, y: isize) -> f32 {
        let cx = x.clamp(0, self.width as isize - 1) as usize;
        let cy = y.clamp(0, self.height as isize - 1) as usize;
        self.get(cx, cy, 0)
    }

    /// Average of the colour channels (alpha, if present, is ignored).
    pub fn to_mono(&self) -> FloatImage {
        if self.depth == 1 {
            return self.clone();
        }
        let colour = if self.depth == 4 { 3 } else { self.depth };
        let data = self
            .data
            .chunks_exact(self.depth)
            .map(|px| px[..colour].iter().sum::<f32>() / colour as f32)
            .collect();
        FloatImage {
            width: self.width,
            height: self.height,
            depth: 1,
            data,
        }
    }

    /// Copy of the `width × height` window starting at `(x0, y0)`.
    ///
    /// Returns `None` unless the window lies entirely inside the image.
    pub fn crop(&self, x0: i64, y0: i64, width: usize, height: usize) -> Option<FloatImage> {
        if x0 < 0
            || y0 < 0
            || !(x0 as usize).checked_add(width).is_some_and(|e| e <= self.width)
            || !(y0 as usize).checked_add(height).is_some_and(|e| e <= self.height)
        {
            return None;
        }
        let (x0, y0) = (x0 as usize, y0 as usize);
        let mut data = Vec::with_capacity(width * height * self.depth);
        for y in y0..y0 + height {
            let start = (y * self.width + x0) * self.depth;
            data.extend_from_slice(&self.data[start..start + width * self.depth]);
        }
        Some(FloatImage {
            width,
            height,
            depth: self.depth,
            data,
        })
    }

    /// Bilinear sample of channel 0; `None` outside the sampling domain.
    pub fn sample_bilinear(&self, x: f64, y: f64) -> Option<f32> {
        if !(x.is_finite() && y.is_finite()) || self.is_empty() {
            return None;
        }
        let max_x = (self.width - 1) as f64;
        let max_y = (self.height - 1) as f64;
        if x < 0.0 || y < 0.0 || x > max_x || y > max_y {
            return None;
        }
        let x0 = (x.floor() as usize).min(self.width.saturating_sub(2));
        let y0 = (y.floor() as usize).min(self.height.saturating_sub(2));
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = (x - x0 as f64) as f32;
        let fy = (y - y0 as f64) as f32;

        let p00 = self.get(x0, y0, 0);
        let p10 = self.get(x1, y0, 0);
        let p01 = self.get(x0, y1, 0);
        let p11 = self.get(x1, y1, 0);
        let top = p00 + fx * (p10 - p00);
        let bottom = p01 + fx * (p11 - p01);
        Some(top + fy * (bottom - top))
    }

    /// Channel 0 as an `imageproc`-compatible buffer.
    pub fn to_luma32(&self) -> Luma32Image {
        ImageBuffer::from_fn(self.width as u32, self.height as u32, |x, y| {
            Luma([self.get(x as usize, y as usize, 0)])
        })
    }

    /// Mono image from an `imageproc` buffer.
    pub fn from_luma32(buf: &Luma32Image) -> Self {
        Self {
            width: buf.width() as usize,
            height: buf.height() as usize,
            depth: 1,
            data: buf.as_raw().clone(),
        }
    }

    /// Channel 0 quantized to 8 bits.
    pub fn to_gray(&self) -> GrayImage {
        let mut out = GrayImage::new(self.width as u32, self.height as u32);
        for y in 0..self.height {
            for x in 0..self.width {
                let v = (self.get(x, y, 0).clamp(0.0, 1.0) * 255.0).round() as u8;
                out.put_pixel(x as u32, y as u32, Luma([v]));
            }
        }
        out
    }
}
