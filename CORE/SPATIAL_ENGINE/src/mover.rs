// ═══════════════════════════════════════════════════════════════════════════════
// FILE: mover.rs | CORE/SPATIAL_ENGINE/src/mover.rs
// PURPOSE: Four-phase entity relocation - insert-both, publish, then remove
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// The protocol keeps an entity findable from at least one correct cell at
// every instant:
//
//   PREPARE  read the current record and its version, derive old/new keys
//   INSERT   reference the entity from the new cells (now in both places)
//   UPDATE   publish the new record iff the version is unchanged (CAS);
//            on failure roll the new references back and retry with backoff
//   REMOVE   drop the references that are no longer wanted
//
// Queries between INSERT and REMOVE can see the entity twice and dedupe by
// id. The CAS totally orders updates per entity, making each move
// linearizable; moves of distinct entities are independent. Batch moves are
// grouped single-entity protocols with no cross-entity atomicity.

use std::time::{Duration, Instant};

use glam::Vec3;

use crate::engine::SpatialIndex;
use crate::entity::{Dynamics, EntityId, EntityRecord, PublishOutcome};
use crate::error::Error;
use crate::events::{MoverPhase, MutationEvent};
use crate::subdivision::OpKind;
use sfc_engine::SpatialKey;

const MAX_ATTEMPTS: u32 = 8;

/// One requested relocation in a batch
#[derive(Clone, Debug)]
pub struct MoveRequest {
    pub id: EntityId,
    pub point: Vec3,
    pub level: Option<u8>,
}

impl<K: SpatialKey, C: Clone + Send + Sync + 'static> SpatialIndex<K, C> {
    /// Move an entity to a new position (and optionally a new level).
    ///
    /// Linearizable per entity; concurrent lookups observe the old or the
    /// new position, never neither.
    pub fn update(
        &self,
        id: EntityId,
        new_point: Vec3,
        new_level: Option<u8>,
    ) -> Result<(), Error> {
        let started = Instant::now();
        self.guard_open()?;

        for attempt in 0..MAX_ATTEMPTS {
            // ── PREPARE ────────────────────────────────────────────────────
            let record = self.store.get(id).ok_or(Error::EntityNotFound(id))?;
            let expected_version = record.version;
            let old_point = record.point;
            let level = match new_level {
                Some(level) => level,
                None => self
                    .placements
                    .get(&id)
                    .and_then(|keys| keys.first().map(|k| k.level()))
                    .unwrap_or(self.options().max_level),
            };
            if level > self.options().max_level {
                return Err(Error::Key(sfc_engine::KeyError::InvalidLevel { level }));
            }
            // bounds travel with the entity
            let new_bounds = record.bounds.map(|b| {
                let delta = new_point - old_point;
                sfc_engine::Aabb::new(b.min + delta, b.max + delta)
            });
            let new_keys = self.placement_keys(new_point, level, new_bounds.as_ref())?;
            self.emit(MutationEvent::MoveProgress {
                id,
                phase: MoverPhase::Prepare,
            });

            // ── INSERT ─────────────────────────────────────────────────────
            let old_keys: Vec<K> = self
                .placements
                .get(&id)
                .map(|keys| keys.clone())
                .unwrap_or_default();
            let added: Vec<K> = new_keys
                .iter()
                .filter(|k| !old_keys.contains(k))
                .copied()
                .collect();
            for key in &added {
                self.nodes.get_or_insert(*key).add(id);
            }
            self.emit(MutationEvent::MoveProgress {
                id,
                phase: MoverPhase::Insert,
            });

            // ── UPDATE ─────────────────────────────────────────────────────
            let mut dynamics = record.dynamics.clone().unwrap_or_else(Dynamics::default);
            dynamics.record(old_point, expected_version);
            let next = EntityRecord {
                id,
                point: new_point,
                content: record.content.clone(),
                bounds: new_bounds,
                dynamics: Some(dynamics),
                version: expected_version + 1,
            };
            match self.store.publish_if(id, expected_version, next) {
                PublishOutcome::Published => {}
                PublishOutcome::Stale => {
                    // lost the race: undo INSERT and retry
                    for key in &added {
                        if let Some(node) = self.nodes.get(key) {
                            node.remove(id);
                            self.nodes.remove_if_empty(key);
                        }
                    }
                    std::thread::sleep(Duration::from_micros(1u64 << attempt));
                    continue;
                }
                PublishOutcome::Missing => {
                    for key in &added {
                        if let Some(node) = self.nodes.get(key) {
                            node.remove(id);
                            self.nodes.remove_if_empty(key);
                        }
                    }
                    return Err(Error::EntityNotFound(id));
                }
            }
            self.emit(MutationEvent::MoveProgress {
                id,
                phase: MoverPhase::Update,
            });

            // ── REMOVE ─────────────────────────────────────────────────────
            // swap the placement set under the entry lock so balancers see a
            // consistent reference list, then drop the stale references
            let stale: Vec<K> = {
                let mut entry = self.placements.entry(id).or_default();
                let current = entry.clone();
                *entry = new_keys.clone();
                current
                    .into_iter()
                    .filter(|k| !new_keys.contains(k))
                    .collect()
            };
            for key in &stale {
                if let Some(node) = self.nodes.get(key) {
                    node.remove(id);
                    if node.is_empty() {
                        self.nodes.remove_if_empty(key);
                        self.evaluate_merge(key.parent());
                    }
                }
            }
            self.bump_version();
            self.emit(MutationEvent::MoveProgress {
                id,
                phase: MoverPhase::Remove,
            });
            self.emit(MutationEvent::Moved {
                id,
                from: old_point,
                to: new_point,
            });
            for key in new_keys {
                self.maybe_split(key);
            }
            self.policy
                .read()
                .observe_latency(OpKind::Insert, started.elapsed().as_nanos() as u64);
            return Ok(());
        }
        Err(Error::EntityConflict(id, MAX_ATTEMPTS))
    }

    /// Apply many moves, one protocol each; the result list is positionally
    /// aligned with the requests
    pub fn update_batch(&self, requests: Vec<MoveRequest>) -> Vec<Result<(), Error>> {
        requests
            .into_iter()
            .map(|req| self.update(req.id, req.point, req.level))
            .collect()
    }
}
