// ═══════════════════════════════════════════════════════════════════════════════
// FILE: entity.rs | CORE/SPATIAL_ENGINE/src/entity.rs
// PURPOSE: Entity identity, records, dynamics, and the concurrent entity store
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// Records are immutable once published: an update builds a new record with
// version + 1 and swaps it in only if the stored version still matches.
// Concurrent readers therefore observe the old or the new record, never a
// torn mix. Uniqueness of ids is the store's invariant; content is opaque to
// the engine.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::IdGenerator;
use sfc_engine::Aabb;

/// Entity identity, stable for the entity's lifetime
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityId {
    Seq(u64),
    Uuid(Uuid),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Seq(n) => write!(f, "#{n}"),
            EntityId::Uuid(u) => write!(f, "{u}"),
        }
    }
}

/// Motion state carried for moving entities; history is a bounded ring of
/// (position, record version) samples
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dynamics {
    pub velocity: Vec3,
    pub acceleration: Vec3,
    history: VecDeque<(Vec3, u64)>,
}

impl Dynamics {
    pub const HISTORY_CAPACITY: usize = 16;

    pub fn new(velocity: Vec3, acceleration: Vec3) -> Self {
        Self {
            velocity,
            acceleration,
            history: VecDeque::with_capacity(Self::HISTORY_CAPACITY),
        }
    }

    /// Record a position sample, dropping the oldest past capacity
    pub fn record(&mut self, position: Vec3, version: u64) {
        if self.history.len() == Self::HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back((position, version));
    }

    pub fn history(&self) -> impl Iterator<Item = &(Vec3, u64)> {
        self.history.iter()
    }

    /// Ballistic position prediction `dt` ahead of the given position
    pub fn advance(&self, from: Vec3, dt: f32) -> Vec3 {
        from + self.velocity * dt + self.acceleration * (0.5 * dt * dt)
    }
}

impl Default for Dynamics {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::ZERO)
    }
}

/// One immutable published state of an entity
#[derive(Clone, Debug)]
pub struct EntityRecord<C> {
    pub id: EntityId,
    pub point: Vec3,
    pub content: C,
    pub bounds: Option<Aabb>,
    pub dynamics: Option<Dynamics>,
    /// Monotonic per-entity state version, advanced by every mutation
    pub version: u64,
}

/// Outcome of a conditional publish
#[derive(Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// The stored version no longer matches the expectation
    Stale,
    Missing,
}

/// Concurrent id → record map with pluggable id generation
pub struct EntityStore<C> {
    records: DashMap<EntityId, Arc<EntityRecord<C>>>,
    generator: IdGenerator,
    next_seq: AtomicU64,
}

impl<C> EntityStore<C> {
    pub fn new(generator: IdGenerator) -> Self {
        Self {
            records: DashMap::new(),
            generator,
            next_seq: AtomicU64::new(1),
        }
    }

    /// Mint a fresh unique id
    pub fn mint(&self) -> EntityId {
        match self.generator {
            IdGenerator::Sequential => {
                EntityId::Seq(self.next_seq.fetch_add(1, Ordering::Relaxed))
            }
            IdGenerator::Uuid => EntityId::Uuid(Uuid::new_v4()),
        }
    }

    pub fn get(&self, id: EntityId) -> Option<Arc<EntityRecord<C>>> {
        self.records.get(&id).map(|r| Arc::clone(&r))
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.records.contains_key(&id)
    }

    /// Insert a brand-new record. Returns false if the id is already taken.
    pub fn insert_new(&self, record: EntityRecord<C>) -> bool {
        match self.records.entry(record.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(record));
                true
            }
        }
    }

    pub fn remove(&self, id: EntityId) -> Option<Arc<EntityRecord<C>>> {
        self.records.remove(&id).map(|(_, r)| r)
    }

    /// Compare-and-swap publish: install `next` only while the stored version
    /// still equals `expected_version`. The shard entry lock makes the
    /// check-and-swap atomic per record without a global lock.
    pub fn publish_if(
        &self,
        id: EntityId,
        expected_version: u64,
        next: EntityRecord<C>,
    ) -> PublishOutcome {
        match self.records.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(mut slot) => {
                if slot.get().version != expected_version {
                    return PublishOutcome::Stale;
                }
                slot.insert(Arc::new(next));
                PublishOutcome::Published
            }
            dashmap::mapref::entry::Entry::Vacant(_) => PublishOutcome::Missing,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Visit every record under the shard read locks
    pub fn for_each(&self, mut f: impl FnMut(&Arc<EntityRecord<C>>)) {
        for entry in self.records.iter() {
            f(entry.value());
        }
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.records.iter().map(|e| *e.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: EntityId, version: u64) -> EntityRecord<i32> {
        EntityRecord {
            id,
            point: Vec3::splat(1.0),
            content: 7,
            bounds: None,
            dynamics: None,
            version,
        }
    }

    #[test]
    fn test_sequential_ids_unique() {
        let store: EntityStore<i32> = EntityStore::new(IdGenerator::Sequential);
        let a = store.mint();
        let b = store.mint();
        assert_ne!(a, b);
    }

    #[test]
    fn test_uuid_ids() {
        let store: EntityStore<i32> = EntityStore::new(IdGenerator::Uuid);
        assert!(matches!(store.mint(), EntityId::Uuid(_)));
    }

    #[test]
    fn test_publish_if_guards_version() {
        let store: EntityStore<i32> = EntityStore::new(IdGenerator::Sequential);
        let id = store.mint();
        store.insert_new(record(id, 0));

        assert_eq!(store.publish_if(id, 0, record(id, 1)), PublishOutcome::Published);
        assert_eq!(store.get(id).unwrap().version, 1);
        // stale expectation loses
        assert_eq!(store.publish_if(id, 0, record(id, 2)), PublishOutcome::Stale);
        assert_eq!(store.get(id).unwrap().version, 1);
        // missing entity reported as such
        let ghost = store.mint();
        assert_eq!(store.publish_if(ghost, 0, record(ghost, 1)), PublishOutcome::Missing);
    }

    #[test]
    fn test_dynamics_history_bounded() {
        let mut dynamics = Dynamics::new(Vec3::X, Vec3::ZERO);
        for i in 0..40 {
            dynamics.record(Vec3::splat(i as f32), i);
        }
        assert_eq!(dynamics.history().count(), Dynamics::HISTORY_CAPACITY);
        // oldest entries dropped
        let first = dynamics.history().next().unwrap();
        assert_eq!(first.1, 40 - Dynamics::HISTORY_CAPACITY as u64);
    }

    #[test]
    fn test_dynamics_advance() {
        let dynamics = Dynamics::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 4.0, 0.0));
        let p = dynamics.advance(Vec3::ZERO, 1.0);
        assert_eq!(p, Vec3::new(2.0, 2.0, 0.0));
    }
}
