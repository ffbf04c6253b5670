// procedural/worker.rs — per-worker procedure copies
//
// Evaluation mutates a procedure's memo, so concurrent renderers never share
// one. Each worker owns a `WorkerProcedures` map from a template key (a
// texture or material id) to its private copy, stamped with the template
// revision it was built from. A lookup with a newer template rebuilds the
// copy in place.

use std::collections::hash_map::Entry;
use std::hash::Hash;

use log::debug;
use rustc_hash::FxHashMap;

use super::procedure::Procedure;

#[derive(Debug)]
struct Slot {
    revision: u64,
    procedure: Procedure,
}

/// Worker-owned copies of template procedures, keyed by template.
#[derive(Debug)]
pub struct WorkerProcedures<K> {
    slots: FxHashMap<K, Slot>,
}

impl<K> Default for WorkerProcedures<K> {
    fn default() -> Self {
        Self {
            slots: FxHashMap::default(),
        }
    }
}

impl<K: Eq + Hash> WorkerProcedures<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// This worker's copy of `template`, rebuilt if the template changed
    /// since the copy was made.
    pub fn get(&mut self, key: K, template: &Procedure) -> &mut Procedure {
        match self.slots.entry(key) {
            Entry::Occupied(e) => {
                let slot = e.into_mut();
                if slot.revision != template.revision() {
                    debug!("rebuilding worker copy: revision {} -> {}", slot.revision, template.revision());
                    if slot.procedure.copy_from(template).is_err() {
                        slot.procedure = template.worker_copy();
                    }
                    slot.revision = template.revision();
                }
                &mut slot.procedure
            }
            Entry::Vacant(e) => {
                let slot = e.insert(Slot {
                    revision: template.revision(),
                    procedure: template.worker_copy(),
                });
                &mut slot.procedure
            }
        }
    }

    /// Revision of the template the copy under `key` was built from.
    pub fn revision(&self, key: &K) -> Option<u64> {
        self.slots.get(key).map(|s| s.revision)
    }

    pub fn remove(&mut self, key: &K) -> Option<Procedure> {
        self.slots.remove(key).map(|s| s.procedure)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
