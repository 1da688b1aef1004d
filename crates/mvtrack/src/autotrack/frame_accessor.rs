//! Key-based, reference-counted access to frame pixels.

use std::collections::HashMap;

use image::DynamicImage;
use parking_lot::Mutex;

use super::region::PixelRect;
use crate::raster::FloatImage;

/// Channel layout requested from a [`FrameAccessor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputMode {
    Mono,
    Rgba,
}

/// Handle to a cached image; pass back to [`FrameAccessor::release_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameKey(u64);

/// Deterministic image operation applied after cropping.
pub trait FrameTransform: Send + Sync {
    /// Identifies the transform in cache keys.
    fn key(&self) -> i64;
    fn run(&self, input: &FloatImage) -> FloatImage;
}

/// Source of frame pixels.
///
/// Every `Some` returned by `get_image` holds a reference that must be
/// released exactly once; `None` holds nothing.
pub trait FrameAccessor: Send + Sync {
    fn get_image(
        &self,
        clip: i32,
        frame: i32,
        mode: InputMode,
        region: Option<&PixelRect>,
        transform: Option<&dyn FrameTransform>,
    ) -> Option<(FrameKey, FloatImage)>;

    fn release_image(&self, key: FrameKey);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    clip: i32,
    frame: i32,
    mode: InputMode,
    region: Option<PixelRect>,
    transform: Option<i64>,
}

struct CacheEntry {
    lookup: CacheKey,
    image: FloatImage,
    refs: usize,
}

#[derive(Default)]
struct Cache {
    next_key: u64,
    entries: HashMap<FrameKey, CacheEntry>,
    index: HashMap<CacheKey, FrameKey>,
}

/// [`FrameAccessor`] over decoded frames held in memory.
#[derive(Default)]
pub struct InMemoryFrameAccessor {
    frames: HashMap<(i32, i32), DynamicImage>,
    cache: Mutex<Cache>,
}

impl InMemoryFrameAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_frame(&mut self, clip: i32, frame: i32, image: DynamicImage) {
        self.frames.insert((clip, frame), image);
    }

    pub fn with_frame(mut self, clip: i32, frame: i32, image: DynamicImage) -> Self {
        self.insert_frame(clip, frame, image);
        self
    }

    /// Number of cache entries with outstanding references.
    pub fn cached_entries(&self) -> usize {
        self.cache.lock().entries.len()
    }

    fn load(
        &self,
        clip: i32,
        frame: i32,
        mode: InputMode,
        region: Option<&PixelRect>,
    ) -> Option<FloatImage> {
        let img = self.frames.get(&(clip, frame))?;
        let cropped = match region {
            Some(r) => {
                if r.width == 0
                    || r.height == 0
                    || !r.fits_in(img.width() as usize, img.height() as usize)
                {
                    tracing::debug!(clip, frame, ?r, "region outside frame");
                    return None;
                }
                img.crop_imm(r.x as u32, r.y as u32, r.width as u32, r.height as u32)
            }
            None => img.clone(),
        };
        Some(match mode {
            InputMode::Mono => FloatImage::from_gray(&cropped.to_luma8()),
            InputMode::Rgba => FloatImage::from_rgba(&cropped),
        })
    }
}

impl FrameAccessor for InMemoryFrameAccessor {
    fn get_image(
        &self,
        clip: i32,
        frame: i32,
        mode: InputMode,
        region: Option<&PixelRect>,
        transform: Option<&dyn FrameTransform>,
    ) -> Option<(FrameKey, FloatImage)> {
        let lookup = CacheKey {
            clip,
            frame,
            mode,
            region: region.copied(),
            transform: transform.map(|t| t.key()),
        };
        {
            let mut cache = self.cache.lock();
            let hit = cache.index.get(&lookup).copied();
            if let Some(key) = hit {
                if let Some(entry) = cache.entries.get_mut(&key) {
                    entry.refs += 1;
                    return Some((key, entry.image.clone()));
                }
            }
        }

        // Decode outside the lock; a concurrent miss on the same key yields a
        // second entry, which is harmless.
        let mut image = self.load(clip, frame, mode, region)?;
        if let Some(t) = transform {
            image = t.run(&image);
        }

        let mut cache = self.cache.lock();
        let key = FrameKey(cache.next_key);
        cache.next_key += 1;
        cache.index.insert(lookup, key);
        cache.entries.insert(
            key,
            CacheEntry {
                lookup,
                image: image.clone(),
                refs: 1,
            },
        );
        Some((key, image))
    }

    fn release_image(&self, key: FrameKey) {
        let mut cache = self.cache.lock();
        let Some(entry) = cache.entries.get_mut(&key) else {
            tracing::warn!(?key, "release of unknown frame key");
            return;
        };
        entry.refs -= 1;
        if entry.refs == 0 {
            let lookup = entry.lookup;
            cache.entries.remove(&key);
            if cache.index.get(&lookup) == Some(&key) {
                cache.index.remove(&lookup);
            }
        }
    }
}
