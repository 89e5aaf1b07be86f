use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::types::EntityIdentity;

#[derive(Debug, Default)]
struct DirtySet {
    /// Entity to the sequence number of its latest mark.
    entities: BTreeMap<EntityIdentity, u64>,
    next_mark: u64,
}

/// Marks taken by a publish, cleared again once it succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DirtyMarks(Vec<(EntityIdentity, u64)>);

impl DirtyMarks {
    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Cheap, cloneable handle used to mark entities whose journal records changed.
#[derive(Debug, Clone, Default)]
pub struct MirrorHandle {
    dirty: Arc<Mutex<DirtySet>>,
}

impl MirrorHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn dirty(&self) -> MutexGuard<'_, DirtySet> {
        self.dirty.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mark_dirty(&self, identity: &EntityIdentity) {
        let mut dirty = self.dirty();
        dirty.next_mark += 1;
        let mark = dirty.next_mark;
        dirty.entities.insert(identity.clone(), mark);
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty().entities.is_empty()
    }

    /// Returns the dirty entities in sorted order.
    pub fn dirty_entities(&self) -> Vec<EntityIdentity> {
        self.dirty().entities.keys().cloned().collect()
    }

    pub(crate) fn marks(&self) -> DirtyMarks {
        let dirty = self.dirty();
        DirtyMarks(
            dirty
                .entities
                .iter()
                .map(|(identity, mark)| (identity.clone(), *mark))
                .collect(),
        )
    }

    /// Clears the entities in `published` that were not marked again since.
    pub(crate) fn clear(&self, published: &DirtyMarks) {
        let mut dirty = self.dirty();
        for (identity, mark) in &published.0 {
            if dirty.entities.get(identity) == Some(mark) {
                dirty.entities.remove(identity);
            }
        }
    }
}
