use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;

use crate::document::{DocumentBackend, RenderImage, RenderRequest};
use crate::error::ViewerError;

pub const DEFAULT_CAPACITY: usize = 10;

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
struct CacheKey {
    page_index: usize,
    scale_milli: u32,
    dark_mode: bool,
}

impl CacheKey {
    fn new(page_index: usize, scale: f32, dark_mode: bool) -> Self {
        Self {
            page_index,
            scale_milli: quantize_scale(scale),
            dark_mode,
        }
    }

    fn distance(&self, reference_page: usize) -> usize {
        self.page_index.abs_diff(reference_page)
    }
}

fn quantize_scale(scale: f32) -> u32 {
    let scaled = (scale * 1000.0).round();
    if !scaled.is_finite() || scaled <= 0.0 {
        1
    } else if scaled > u32::MAX as f32 {
        u32::MAX
    } else {
        scaled as u32
    }
}

/// Rasterised pages of the active document. Rendering at a new render scale or
/// theme misses; once over capacity the pages farthest from the reading position
/// are dropped.
pub struct PageCache {
    entries: Mutex<HashMap<CacheKey, Arc<RenderImage>>>,
    capacity: usize,
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl PageCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// `page_index` and `reference_page` are 0-based.
    pub fn get_or_render(
        &self,
        backend: &dyn DocumentBackend,
        page_index: usize,
        scale: f32,
        dark_mode: bool,
        reference_page: usize,
    ) -> Result<Arc<RenderImage>> {
        let page_count = backend.info().page_count;
        if page_index >= page_count {
            return Err(ViewerError::PageOutOfRange {
                page: page_index + 1,
                page_count,
            }
            .into());
        }

        let key = CacheKey::new(page_index, scale, dark_mode);
        if let Some(image) = self.entries.lock().get(&key) {
            return Ok(Arc::clone(image));
        }

        let image = Arc::new(backend.render_page(RenderRequest {
            page_index,
            scale,
            dark_mode,
        })?);
        self.store(key, Arc::clone(&image), reference_page);
        Ok(image)
    }

    fn store(&self, key: CacheKey, image: Arc<RenderImage>, reference_page: usize) {
        let mut cache = self.entries.lock();
        cache.insert(key, image);

        if cache.len() > self.capacity {
            let mut keys: Vec<_> = cache.keys().cloned().collect();
            keys.sort_by_key(|k| k.distance(reference_page));
            for stale in keys.into_iter().skip(self.capacity) {
                cache.remove(&stale);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::testing::FakeBackend;

    #[test]
    fn repeated_requests_hit_the_cache() {
        let backend = FakeBackend::new("a.pdf", 5);
        let cache = PageCache::new(4);
        let first = cache.get_or_render(&backend, 2, 1.5, false, 2).unwrap();
        let second = cache.get_or_render(&backend, 2, 1.5004, false, 2).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        cache.get_or_render(&backend, 2, 1.5, true, 2).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn eviction_prefers_distant_pages() {
        let backend = FakeBackend::new("a.pdf", 20);
        let cache = PageCache::new(3);
        for page in [0, 1, 2] {
            cache.get_or_render(&backend, page, 1.0, false, page).unwrap();
        }
        cache.get_or_render(&backend, 3, 1.0, false, 3).unwrap();
        assert_eq!(cache.len(), 3);
        let kept = cache.entries.lock();
        assert!(!kept.contains_key(&CacheKey::new(0, 1.0, false)));
        assert!(kept.contains_key(&CacheKey::new(3, 1.0, false)));
    }

    #[test]
    fn out_of_range_pages_are_rejected() {
        let backend = FakeBackend::new("a.pdf", 2);
        let cache = PageCache::default();
        assert!(cache.get_or_render(&backend, 2, 1.0, false, 0).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn quantize_handles_degenerate_scales() {
        assert_eq!(quantize_scale(f32::NAN), 1);
        assert_eq!(quantize_scale(-1.0), 1);
        assert_eq!(quantize_scale(1.25), 1250);
    }
}
