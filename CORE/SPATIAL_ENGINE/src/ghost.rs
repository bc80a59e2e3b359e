// ═══════════════════════════════════════════════════════════════════════════════
// FILE: ghost.rs | CORE/SPATIAL_ENGINE/src/ghost.rs
// PURPOSE: Ghost element storage for distributed collaborators
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// A ghost is a local stand-in for a cell owned by a remote peer, letting
// queries near a partition boundary see remote occupancy without conforming
// the mesh. The store is a plain concurrent map keyed like the node map but
// completely outside subdivision: ghosts never split, merge, or count toward
// occupancy. Serialization of payloads is the distributor's concern; the
// engine only holds the bytes.

use dashmap::DashMap;

use sfc_engine::SpatialKey;

/// Opaque remote-cell payload
#[derive(Clone, Debug, PartialEq)]
pub struct GhostElement {
    /// Identifier of the owning peer
    pub owner: u32,
    /// Payload bytes as handed over by the distributor
    pub payload: Vec<u8>,
}

/// Concurrent key → ghost map
pub struct GhostStore<K: SpatialKey> {
    ghosts: DashMap<K, GhostElement>,
}

impl<K: SpatialKey> GhostStore<K> {
    pub fn new() -> Self {
        Self {
            ghosts: DashMap::new(),
        }
    }

    pub fn add(&self, key: K, ghost: GhostElement) {
        self.ghosts.insert(key, ghost);
    }

    pub fn lookup(&self, key: &K) -> Option<GhostElement> {
        self.ghosts.get(key).map(|g| g.clone())
    }

    pub fn remove(&self, key: &K) -> Option<GhostElement> {
        self.ghosts.remove(key).map(|(_, g)| g)
    }

    pub fn len(&self) -> usize {
        self.ghosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ghosts.is_empty()
    }

    pub fn keys(&self) -> Vec<K> {
        self.ghosts.iter().map(|e| *e.key()).collect()
    }
}

impl<K: SpatialKey> Default for GhostStore<K> {
    fn default() -> Self {
        Self::new()
    }
}
