// procedural/cache.rs — LRU cache of preview grids
//
// Keyed by a hash of the procedure's serialized form plus the request, so
// two structurally identical procedures share entries and any parameter
// edit misses. Results are stored behind `Arc`; a hit is a reference count
// bump rather than a copy of the sample buffers.

use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;
use rustc_hash::FxHasher;

use super::image::ImageLibrary;
use super::preview::{evaluate_preview, PreviewRequest, PreviewResult};
use super::procedure::Procedure;
use crate::error::Result;

/// Thread-safe preview cache.
pub struct PreviewCache {
    entries: Mutex<LruCache<u64, Arc<PreviewResult>>>,
}

impl PreviewCache {
    /// A cache holding at most `capacity` grids (at least one).
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<u64, Arc<PreviewResult>>> {
        // A panic while holding the lock cannot leave the LRU half-updated in
        // a way that matters for a cache.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: u64) -> Option<Arc<PreviewResult>> {
        self.lock().get(&key).cloned()
    }

    pub fn put(&self, key: u64, result: PreviewResult) -> Arc<PreviewResult> {
        let result = Arc::new(result);
        self.lock().put(key, Arc::clone(&result));
        result
    }

    /// Cached preview for `request`, evaluating and inserting on a miss.
    pub fn get_or_evaluate(
        &self,
        procedure: &Procedure,
        images: &ImageLibrary,
        request: &PreviewRequest,
    ) -> Result<Arc<PreviewResult>> {
        let key = hash_preview_request(procedure, images, request)?;
        if let Some(hit) = self.get(key) {
            log::trace!("preview cache hit {key:016x}");
            return Ok(hit);
        }
        Ok(self.put(key, evaluate_preview(procedure, request)))
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Deterministic key for a procedure and preview request.
pub fn hash_preview_request(procedure: &Procedure, images: &ImageLibrary, request: &PreviewRequest) -> Result<u64> {
    let mut bytes = Vec::new();
    procedure.write_to(&mut bytes, images)?;
    let mut hasher = FxHasher::default();
    "preview".hash(&mut hasher);
    bytes.hash(&mut hasher);
    for output in procedure.outputs() {
        output.name.hash(&mut hasher);
        output.value_type.hash(&mut hasher);
        output.default_value.to_bits().hash(&mut hasher);
        let c = output.default_color;
        for channel in [c.red, c.green, c.blue] {
            channel.to_bits().hash(&mut hasher);
        }
    }
    request.output.hash(&mut hasher);
    request.resolution.hash(&mut hasher);
    request.range_min.to_bits().hash(&mut hasher);
    request.range_max.to_bits().hash(&mut hasher);
    request.z.to_bits().hash(&mut hasher);
    request.time.to_bits().hash(&mut hasher);
    Ok(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedural::module::{Module, OutputModule};
    use crate::math::RGBColor;
    use crate::procedural::modules::NumberModule;

    fn constant(value: f64) -> Procedure {
        let mut p = Procedure::new(vec![OutputModule::number("out", 0.0)]);
        let n = p.add_module(Module::new(NumberModule { value }));
        p.connect_output(n, 0, 0).unwrap();
        p
    }

    #[test]
    fn identical_procedures_share_a_key() {
        let images = ImageLibrary::new();
        let req = PreviewRequest::default();
        let a = hash_preview_request(&constant(1.0), &images, &req).unwrap();
        let b = hash_preview_request(&constant(1.0), &images, &req).unwrap();
        let c = hash_preview_request(&constant(2.0), &images, &req).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        let d = hash_preview_request(&constant(1.0), &images, &PreviewRequest { z: 1.0, ..req }).unwrap();
        assert_ne!(a, d);
    }

    #[test]
    fn second_request_hits() {
        let cache = PreviewCache::new(4);
        let images = ImageLibrary::new();
        let p = constant(7.0);
        let req = PreviewRequest { resolution: 4, ..PreviewRequest::default() };
        let first = cache.get_or_evaluate(&p, &images, &req).unwrap();
        let second = cache.get_or_evaluate(&p, &images, &req).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert!(first.values.iter().all(|&v| v == 7.0));
    }

    #[test]
    fn unwired_color_defaults_are_part_of_the_key() {
        let images = ImageLibrary::new();
        let req = PreviewRequest { resolution: 2, ..PreviewRequest::default() };
        let red = Procedure::new(vec![OutputModule::color("out", RGBColor::new(1.0, 0.0, 0.0))]);
        let blue = Procedure::new(vec![OutputModule::color("out", RGBColor::new(0.0, 0.0, 1.0))]);
        assert_ne!(
            hash_preview_request(&red, &images, &req).unwrap(),
            hash_preview_request(&blue, &images, &req).unwrap()
        );

        let cache = PreviewCache::new(4);
        cache.get_or_evaluate(&red, &images, &req).unwrap();
        let preview = cache.get_or_evaluate(&blue, &images, &req).unwrap();
        let colors = preview.colors.as_ref().unwrap();
        assert!(colors.iter().all(|c| *c == [0.0, 0.0, 1.0]));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let cache = PreviewCache::new(1);
        let images = ImageLibrary::new();
        let req = PreviewRequest { resolution: 1, ..PreviewRequest::default() };
        cache.get_or_evaluate(&constant(1.0), &images, &req).unwrap();
        cache.get_or_evaluate(&constant(2.0), &images, &req).unwrap();
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
