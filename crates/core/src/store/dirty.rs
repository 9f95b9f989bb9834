//! Durable dirty tracking: which locally-held entities have edits not yet
//! acknowledged by the remote store.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::sync::EntityKind;

/// Set of dirty ids per entity kind. Serializes as a plain map of kind name
/// to id list so it stays readable independently of the entity payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirtySet {
    inner: BTreeMap<EntityKind, BTreeSet<String>>,
}

impl DirtySet {
    pub fn insert(&mut self, kind: EntityKind, id: impl Into<String>) {
        self.inner.entry(kind).or_default().insert(id.into());
    }

    pub fn remove(&mut self, kind: EntityKind, id: &str) {
        if let Some(ids) = self.inner.get_mut(&kind) {
            ids.remove(id);
            if ids.is_empty() {
                self.inner.remove(&kind);
            }
        }
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        self.inner.get(&kind).is_some_and(|ids| ids.contains(id))
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.values().map(BTreeSet::len).sum()
    }

    /// All dirty (kind, id) pairs in deterministic order.
    pub fn entries(&self) -> Vec<(EntityKind, String)> {
        self.inner
            .iter()
            .flat_map(|(kind, ids)| ids.iter().map(|id| (*kind, id.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_remove_lifecycle() {
        let mut dirty = DirtySet::default();
        assert!(dirty.is_empty());

        dirty.insert(EntityKind::Task, "t1");
        dirty.insert(EntityKind::Task, "t1");
        dirty.insert(EntityKind::Goal, "g1");
        assert_eq!(dirty.len(), 2);
        assert!(dirty.contains(EntityKind::Task, "t1"));

        dirty.remove(EntityKind::Task, "t1");
        assert!(!dirty.contains(EntityKind::Task, "t1"));
        assert_eq!(dirty.len(), 1);
    }

    #[test]
    fn serializes_as_kind_to_id_list_map() {
        let mut dirty = DirtySet::default();
        dirty.insert(EntityKind::Task, "t2");
        dirty.insert(EntityKind::Task, "t1");
        let value = serde_json::to_value(&dirty).unwrap();
        assert_eq!(value, serde_json::json!({ "task": ["t1", "t2"] }));

        let restored: DirtySet = serde_json::from_value(value).unwrap();
        assert_eq!(restored, dirty);
    }
}
