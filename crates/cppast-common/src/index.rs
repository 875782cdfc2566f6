use crate::ast::{CppEntityKind, EntityId, NodeId};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::sync::RwLock;

/// Where a registered entity lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    pub file: SmolStr,
    pub node: NodeId,
    pub kind: CppEntityKind,
}

/// Thread-safe registry of entities across files.
///
/// Parsers register every entity carrying an [`EntityId`]; later passes use
/// it to link references between files. The same id may be registered more
/// than once (a declaration and its definition, or the same header entity
/// seen from two files).
#[derive(Debug, Default)]
pub struct EntityIndex {
    map: RwLock<FxHashMap<EntityId, Vec<IndexEntry>>>,
}

impl EntityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: EntityId, entry: IndexEntry) {
        let mut map = self.map.write().unwrap_or_else(|e| e.into_inner());
        map.entry(id).or_default().push(entry);
    }

    /// Every registration of `id`, in registration order.
    pub fn lookup(&self, id: &EntityId) -> Vec<IndexEntry> {
        let map = self.map.read().unwrap_or_else(|e| e.into_inner());
        map.get(id).cloned().unwrap_or_default()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        let map = self.map.read().unwrap_or_else(|e| e.into_inner());
        map.contains_key(id)
    }

    /// Number of distinct ids.
    pub fn len(&self) -> usize {
        self.map.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of registrations, counting repeated ids.
    pub fn registrations(&self) -> usize {
        let map = self.map.read().unwrap_or_else(|e| e.into_inner());
        map.values().map(Vec::len).sum()
    }
}
