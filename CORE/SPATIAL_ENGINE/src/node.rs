// ═══════════════════════════════════════════════════════════════════════════════
// FILE: node.rs | CORE/SPATIAL_ENGINE/src/node.rs
// PURPOSE: Tree nodes and the sorted concurrent node map
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// Locking discipline: the map's structure (which keys exist) is guarded by
// one reader-preferring lock; range scans and lookups take it shared,
// node creation/removal and bulk splices take it exclusive. Membership
// changes inside an existing node go through the node's own lock and never
// touch the structural lock. Nodes are created lazily on first insertion and
// removed when they become empty.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::entity::EntityId;
use sfc_engine::SpatialKey;

/// Balancing state machine: STABLE → SPLITTING → STABLE and
/// STABLE → MERGING → STABLE, serialized per node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeState {
    Stable = 0,
    Splitting = 1,
    Merging = 2,
}

/// One occupied cell: the set of resident entity ids plus a version stamp
/// advanced on every membership change.
pub struct Node {
    entities: RwLock<HashSet<EntityId>>,
    state: AtomicU8,
    stamp: AtomicU64,
}

impl Node {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashSet::new()),
            state: AtomicU8::new(NodeState::Stable as u8),
            stamp: AtomicU64::new(0),
        }
    }

    /// Add a reference; true if it was not present before
    pub fn add(&self, id: EntityId) -> bool {
        let added = self.entities.write().insert(id);
        if added {
            self.stamp.fetch_add(1, Ordering::Release);
        }
        added
    }

    /// Drop a reference; true if it was present
    pub fn remove(&self, id: EntityId) -> bool {
        let removed = self.entities.write().remove(&id);
        if removed {
            self.stamp.fetch_add(1, Ordering::Release);
        }
        removed
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.read().contains(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }

    /// Copy of the resident id set
    pub fn snapshot(&self) -> Vec<EntityId> {
        self.entities.read().iter().copied().collect()
    }

    pub fn stamp(&self) -> u64 {
        self.stamp.load(Ordering::Acquire)
    }

    pub fn state(&self) -> NodeState {
        match self.state.load(Ordering::Acquire) {
            1 => NodeState::Splitting,
            2 => NodeState::Merging,
            _ => NodeState::Stable,
        }
    }

    /// Try STABLE → (SPLITTING | MERGING); false if another balancing
    /// operation holds the node
    pub fn try_begin(&self, target: NodeState) -> bool {
        self.state
            .compare_exchange(
                NodeState::Stable as u8,
                target as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Return to STABLE after a balancing operation
    pub fn settle(&self) {
        self.state.store(NodeState::Stable as u8, Ordering::Release);
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

/// Sorted concurrent map from key to node. Sorted order backs the bulk
/// loader's splices and the range planner's interval scans.
pub struct NodeMap<K: SpatialKey> {
    tree: RwLock<BTreeMap<K, Arc<Node>>>,
}

impl<K: SpatialKey> NodeMap<K> {
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<Arc<Node>> {
        self.tree.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.tree.read().contains_key(key)
    }

    /// Node at `key`, created if absent
    pub fn get_or_insert(&self, key: K) -> Arc<Node> {
        if let Some(node) = self.get(&key) {
            return node;
        }
        let mut tree = self.tree.write();
        Arc::clone(tree.entry(key).or_insert_with(|| Arc::new(Node::new())))
    }

    /// Remove the node if it is empty and stable. Returns true on removal.
    pub fn remove_if_empty(&self, key: &K) -> bool {
        let mut tree = self.tree.write();
        if let Some(node) = tree.get(key) {
            if node.is_empty() && node.state() == NodeState::Stable {
                tree.remove(key);
                return true;
            }
        }
        false
    }

    /// Remove a node unconditionally (split/merge teardown)
    pub fn remove(&self, key: &K) -> Option<Arc<Node>> {
        self.tree.write().remove(key)
    }

    /// Splice a batch of pre-built nodes in one exclusive section; existing
    /// nodes receive the incoming ids instead of being replaced.
    pub fn splice(&self, batch: Vec<(K, Vec<EntityId>)>) {
        let mut tree = self.tree.write();
        for (key, ids) in batch {
            let node = tree.entry(key).or_insert_with(|| Arc::new(Node::new()));
            for id in ids {
                node.add(id);
            }
        }
    }

    /// Nodes with keys in `[lo, hi]`, in key order
    pub fn scan(&self, lo: &K, hi: &K) -> Vec<(K, Arc<Node>)> {
        self.tree
            .read()
            .range(*lo..=*hi)
            .map(|(k, n)| (*k, Arc::clone(n)))
            .collect()
    }

    /// True if any key exists in `[lo, hi]`
    pub fn any_in_range(&self, lo: &K, hi: &K) -> bool {
        self.tree.read().range(*lo..=*hi).next().is_some()
    }

    pub fn len(&self) -> usize {
        self.tree.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.read().is_empty()
    }

    pub fn keys(&self) -> Vec<K> {
        self.tree.read().keys().copied().collect()
    }

    /// Key/occupancy snapshot without cloning the id sets
    pub fn occupancy(&self) -> Vec<(K, usize)> {
        self.tree
            .read()
            .iter()
            .map(|(k, n)| (*k, n.len()))
            .collect()
    }
}

impl<K: SpatialKey> Default for NodeMap<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use sfc_engine::MortonKey;

    #[test]
    fn test_node_membership_and_stamp() {
        let node = Node::new();
        let id = EntityId::Seq(1);
        assert!(node.add(id));
        assert!(!node.add(id), "duplicate add is a no-op");
        assert_eq!(node.len(), 1);
        let stamp = node.stamp();
        assert!(node.remove(id));
        assert!(node.stamp() > stamp);
        assert!(node.is_empty());
    }

    #[test]
    fn test_node_state_machine() {
        let node = Node::new();
        assert!(node.try_begin(NodeState::Splitting));
        // a concurrent merge cannot start while splitting
        assert!(!node.try_begin(NodeState::Merging));
        node.settle();
        assert!(node.try_begin(NodeState::Merging));
        node.settle();
        assert_eq!(node.state(), NodeState::Stable);
    }

    #[test]
    fn test_map_lazy_create_and_remove_empty() {
        let map: NodeMap<MortonKey> = NodeMap::new();
        let key = MortonKey::encode(Vec3::splat(100.0), 5).unwrap();
        assert!(map.get(&key).is_none());
        let node = map.get_or_insert(key);
        node.add(EntityId::Seq(1));
        assert!(!map.remove_if_empty(&key), "occupied node stays");
        node.remove(EntityId::Seq(1));
        assert!(map.remove_if_empty(&key));
        assert!(map.get(&key).is_none());
    }

    #[test]
    fn test_scan_in_key_order() {
        let map: NodeMap<MortonKey> = NodeMap::new();
        let mut keys = Vec::new();
        for i in 0..10 {
            let key = MortonKey::encode(Vec3::splat(1000.0 * (i + 1) as f32), 10).unwrap();
            map.get_or_insert(key);
            keys.push(key);
        }
        keys.sort();
        let all = map.scan(&keys[0], keys.last().unwrap());
        let scanned: Vec<_> = all.iter().map(|(k, _)| *k).collect();
        let mut sorted = scanned.clone();
        sorted.sort();
        assert_eq!(scanned, sorted);
        assert_eq!(scanned.len(), keys.len());
    }

    #[test]
    fn test_subtree_scan_via_sfc_range() {
        let map: NodeMap<MortonKey> = NodeMap::new();
        let parent = MortonKey::encode(Vec3::splat(50_000.0), 4).unwrap();
        let inside = parent.child(3).unwrap().child(5).unwrap();
        let outside = MortonKey::encode(Vec3::splat(1_900_000.0), 6).unwrap();
        map.get_or_insert(inside);
        map.get_or_insert(outside);
        let (lo, hi) = parent.sfc_range();
        let hits = map.scan(&lo, &hi);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, inside);
        assert!(map.any_in_range(&lo, &hi));
    }
}
