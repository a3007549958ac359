//! Per-vertex continental blend cache: avoids re-resolving the exemplar
//! blend (region match, UV, weighted sample) for a vertex whose terrain
//! classification and UV are unchanged since the last amplification pass.
//! Invalidated wholesale whenever `AmplificationDataSerial` bumps, which the
//! engine does on any topology or surface change that could affect these
//! inputs (spec §4.11, "a per-vertex blend cache ... invalidated whenever an
//! Amplification data-serial counter bumps").

#[derive(Debug, Clone, Copy)]
pub struct CachedBlend {
    pub cached_serial: u64,
    pub has_reference_mean: bool,
    pub reference_mean_m: f64,
    pub blended_height_m: f64,
}

/// Sparse per-vertex cache, indexed by vertex id. A missing or
/// serial-stale entry is treated as a cache miss.
#[derive(Debug, Clone, Default)]
pub struct ContinentalBlendCache {
    entries: Vec<Option<CachedBlend>>,
}

impl ContinentalBlendCache {
    pub fn with_capacity(vertex_count: usize) -> Self {
        Self { entries: vec![None; vertex_count] }
    }

    /// Resize to track a new vertex count, discarding all entries — called
    /// after re-tessellation or LOD change, when vertex ids are no longer
    /// meaningful against the old cache.
    pub fn reset(&mut self, vertex_count: usize) {
        self.entries = vec![None; vertex_count];
    }

    pub fn get(&self, vertex: u32, current_serial: u64) -> Option<CachedBlend> {
        let entry = self.entries.get(vertex as usize)?.as_ref()?;
        if entry.cached_serial == current_serial {
            Some(*entry)
        } else {
            None
        }
    }

    pub fn put(&mut self, vertex: u32, blend: CachedBlend) {
        if let Some(slot) = self.entries.get_mut(vertex as usize) {
            *slot = Some(blend);
        }
    }

    /// Drop every cached entry without resizing — equivalent to bumping the
    /// serial counter the cache is keyed on, for callers that want an
    /// immediate hard invalidation rather than a lazy stale-check.
    pub fn invalidate_all(&mut self) {
        for entry in &mut self.entries {
            *entry = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_on_empty_cache() {
        let cache = ContinentalBlendCache::with_capacity(4);
        assert!(cache.get(0, 1).is_none());
    }

    #[test]
    fn hit_after_put_with_matching_serial() {
        let mut cache = ContinentalBlendCache::with_capacity(4);
        let blend = CachedBlend { cached_serial: 5, has_reference_mean: true, reference_mean_m: 1000.0, blended_height_m: 1200.0 };
        cache.put(2, blend);
        let fetched = cache.get(2, 5).expect("entry should be present");
        assert_eq!(fetched.blended_height_m, 1200.0);
    }

    #[test]
    fn miss_when_serial_has_advanced() {
        let mut cache = ContinentalBlendCache::with_capacity(4);
        let blend = CachedBlend { cached_serial: 5, has_reference_mean: true, reference_mean_m: 1000.0, blended_height_m: 1200.0 };
        cache.put(2, blend);
        assert!(cache.get(2, 6).is_none());
    }

    #[test]
    fn invalidate_all_clears_every_entry() {
        let mut cache = ContinentalBlendCache::with_capacity(2);
        cache.put(0, CachedBlend { cached_serial: 1, has_reference_mean: false, reference_mean_m: 0.0, blended_height_m: 0.0 });
        cache.put(1, CachedBlend { cached_serial: 1, has_reference_mean: false, reference_mean_m: 0.0, blended_height_m: 0.0 });
        cache.invalidate_all();
        assert!(cache.get(0, 1).is_none());
        assert!(cache.get(1, 1).is_none());
    }

    #[test]
    fn reset_changes_capacity() {
        let mut cache = ContinentalBlendCache::with_capacity(2);
        cache.put(1, CachedBlend { cached_serial: 1, has_reference_mean: false, reference_mean_m: 0.0, blended_height_m: 0.0 });
        cache.reset(10);
        assert!(cache.get(1, 1).is_none());
        assert!(cache.get(9, 1).is_none());
    }
}
