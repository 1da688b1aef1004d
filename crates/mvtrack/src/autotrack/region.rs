use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle `[min, max)`.
///
/// Either relative to a point (a search window such as `-31..31`) or, after
/// [`Region::offset`], in absolute frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Region {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Self { min, max }
    }

    /// Square window `[-half, half)` around the origin.
    pub fn square(half: f64) -> Self {
        Self::new([-half, -half], [half, half])
    }

    /// Translate by `p`.
    pub fn offset(&self, p: [f64; 2]) -> Self {
        Self {
            min: [self.min[0] + p[0], self.min[1] + p[1]],
            max: [self.max[0] + p[0], self.max[1] + p[1]],
        }
    }

    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }

    pub fn is_empty(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    pub fn contains(&self, p: [f64; 2]) -> bool {
        p[0] >= self.min[0] && p[0] < self.max[0] && p[1] >= self.min[1] && p[1] < self.max[1]
    }

    /// Smallest integer pixel rectangle covering the region.
    pub fn to_pixel_rect(&self) -> PixelRect {
        let x0 = self.min[0].floor();
        let y0 = self.min[1].floor();
        let x1 = self.max[0].ceil().max(x0);
        let y1 = self.max[1].ceil().max(y0);
        PixelRect {
            x: x0 as i64,
            y: y0 as i64,
            width: (x1 - x0) as usize,
            height: (y1 - y0) as usize,
        }
    }
}

/// Integer pixel rectangle: columns `x..x + width`, rows `y..y + height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: usize,
    pub height: usize,
}

impl PixelRect {
    /// Whether the rectangle lies inside a `width × height` frame.
    pub fn fits_in(&self, width: usize, height: usize) -> bool {
        self.x >= 0
            && self.y >= 0
            && (self.x as usize).checked_add(self.width).is_some_and(|e| e <= width)
            && (self.y as usize).checked_add(self.height).is_some_and(|e| e <= height)
    }
}
