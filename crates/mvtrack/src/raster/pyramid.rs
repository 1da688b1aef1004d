//! Lazily built image pyramid with per-level blurred gradients.

use std::sync::OnceLock;

use super::filters::{blurred_gradients, downsample_2x};
use super::float_image::FloatImage;

/// Blurred image and its x/y derivatives, all single-channel, same size.
#[derive(Debug, Clone)]
pub struct Gradients {
    pub blurred: FloatImage,
    pub dx: FloatImage,
    pub dy: FloatImage,
}

/// One resolution level: the raw mono image plus gradients computed on first
/// access.
#[derive(Debug, Clone)]
pub struct ImageLevel {
    image: FloatImage,
    sigma: f32,
    gradients: OnceLock<Gradients>,
}

impl ImageLevel {
    /// Wrap `image` (reduced to mono); `sigma` is the pre-derivative blur.
    pub fn new(image: &FloatImage, sigma: f32) -> Self {
        Self {
            image: image.to_mono(),
            sigma,
            gradients: OnceLock::new(),
        }
    }

    pub fn image(&self) -> &FloatImage {
        &self.image
    }

    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    pub fn width(&self) -> usize {
        self.image.width()
    }

    pub fn height(&self) -> usize {
        self.image.height()
    }

    pub fn gradients(&self) -> &Gradients {
        self.gradients.get_or_init(|| {
            let (blurred, dx, dy) = blurred_gradients(&self.image, self.sigma);
            Gradients { blurred, dx, dy }
        })
    }

    pub fn has_gradients(&self) -> bool {
        self.gradients.get().is_some()
    }

    /// Next coarser level (half resolution, same sigma).
    pub fn downsample(&self) -> ImageLevel {
        ImageLevel {
            image: downsample_2x(&self.image),
            sigma: self.sigma,
            gradients: OnceLock::new(),
        }
    }
}

/// Half-resolution pyramid; level `l` has coordinates `x / 2^l`.
///
/// Coarser levels are decimated on first access only.
#[derive(Debug, Clone)]
pub struct LazyPyramid {
    levels: Vec<ImageLevel>,
}

impl LazyPyramid {
    pub fn new(base: ImageLevel) -> Self {
        Self { levels: vec![base] }
    }

    /// Number of levels built so far.
    pub fn built_levels(&self) -> usize {
        self.levels.len()
    }

    /// Level `l`, building every missing level up to it.
    pub fn level(&mut self, l: usize) -> &ImageLevel {
        while self.levels.len() <= l {
            let next = self.levels[self.levels.len() - 1].downsample();
            self.levels.push(next);
        }
        &self.levels[l]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_and_gradients_are_built_on_demand() {
        let img = FloatImage::from_fn(64, 48, |x, y| ((x + y) % 7) as f32 / 7.0);
        let mut pyr = LazyPyramid::new(ImageLevel::new(&img, 0.9));
        assert_eq!(pyr.built_levels(), 1);

        let l2 = pyr.level(2);
        assert_eq!((l2.width(), l2.height()), (16, 12));
        assert!(!l2.has_gradients());
        let g = l2.gradients();
        assert_eq!((g.dx.width(), g.dy.height()), (16, 12));
        assert!(l2.has_gradients());

        assert_eq!(pyr.built_levels(), 3);
        pyr.level(1);
        assert_eq!(pyr.built_levels(), 3);
    }
}
