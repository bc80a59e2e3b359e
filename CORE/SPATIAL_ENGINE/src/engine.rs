// ═══════════════════════════════════════════════════════════════════════════════
// FILE: engine.rs | CORE/SPATIAL_ENGINE/src/engine.rs
// PURPOSE: The generic spatial index engine shared by all variants
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// SpatialIndex is generic over the key type; everything variant-specific is
// key algebra. Ownership is arena-style: the node map owns nodes by key,
// nodes hold entity ids, the entity store owns records by id, and the
// placements map tracks which keys reference each id. No cyclic ownership
// anywhere.
//
// The global version advances on every mutation and is the k-NN cache's
// invalidation signal. Split and merge run under the per-node state machine
// with per-entity placement locking, so queries racing a balancing operation
// observe every entity in at least one reachable cell.

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use glam::Vec3;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::config::{IndexOptions, SpanningPolicy};
use crate::entity::{EntityId, EntityRecord, EntityStore};
use crate::error::Error;
use crate::events::{MutationEvent, MutationListener};
use crate::ghost::{GhostElement, GhostStore};
use crate::knn_cache::{KnnCache, KnnCacheKey};
use crate::node::{NodeMap, NodeState};
use crate::query::{
    self, CollisionDetector, CollisionPair, KnnHit, QueryCtx, RayCastMode, RayHit,
};
use crate::stats::IndexStatistics;
use crate::subdivision::{self, BalancePolicy, OpKind, RebalanceSignal};
use crate::traverse::{self, TraversalStrategy, Visitor};
use sfc_engine::{
    cell_extent, grid_range, Aabb, Frustum, KeyCache, Plane, Ray, SpatialKey,
};

const STATE_OPERATING: u8 = 0;
const STATE_CLOSING: u8 = 1;

/// Generic multi-variant spatial index
pub struct SpatialIndex<K: SpatialKey, C: Clone + Send + Sync + 'static> {
    pub(crate) options: IndexOptions,
    /// Spanning is switchable at runtime; it only affects placements made
    /// after the change.
    pub(crate) spanning: RwLock<SpanningPolicy>,
    pub(crate) store: EntityStore<C>,
    pub(crate) nodes: NodeMap<K>,
    /// id → keys currently referencing the entity. Mutations of one entity's
    /// references serialize on this map's entry lock.
    pub(crate) placements: DashMap<EntityId, Vec<K>>,
    pub(crate) version: AtomicU64,
    pub(crate) key_cache: Arc<KeyCache>,
    pub(crate) knn_cache: KnnCache,
    pub(crate) policy: RwLock<Box<dyn BalancePolicy>>,
    pub(crate) listeners: RwLock<Vec<MutationListener<K>>>,
    pub(crate) ghosts: GhostStore<K>,
    pub(crate) detector: RwLock<Option<Arc<dyn CollisionDetector<C>>>>,
    pub(crate) splits: AtomicU64,
    pub(crate) merges: AtomicU64,
    pub(crate) last_rebalance_ms: AtomicU64,
    pub(crate) epoch: Instant,
    pub(crate) state: AtomicU8,
    pub(crate) inflight_bulk: AtomicUsize,
}

impl<K: SpatialKey, C: Clone + Send + Sync + 'static> SpatialIndex<K, C> {
    pub fn new(options: IndexOptions) -> Self {
        let options = options.sanitized();
        Self {
            spanning: RwLock::new(options.spanning_policy),
            store: EntityStore::new(options.id_generator),
            nodes: NodeMap::new(),
            placements: DashMap::new(),
            version: AtomicU64::new(0),
            key_cache: Arc::new(KeyCache::default()),
            knn_cache: KnnCache::new(options.knn_cache_capacity),
            policy: RwLock::new(subdivision::policy_for(options.balancing_strategy)),
            listeners: RwLock::new(Vec::new()),
            ghosts: GhostStore::new(),
            detector: RwLock::new(None),
            splits: AtomicU64::new(0),
            merges: AtomicU64::new(0),
            last_rebalance_ms: AtomicU64::new(0),
            epoch: Instant::now(),
            state: AtomicU8::new(STATE_OPERATING),
            inflight_bulk: AtomicUsize::new(0),
            options,
        }
    }

    // ── lifecycle ───────────────────────────────────────────────────────────

    pub(crate) fn guard_open(&self) -> Result<(), Error> {
        if self.state.load(Ordering::Acquire) == STATE_CLOSING {
            return Err(Error::ShutDown);
        }
        Ok(())
    }

    /// Stop accepting mutations and drain in-flight bulk operations
    pub fn shutdown(&self) {
        self.state.store(STATE_CLOSING, Ordering::Release);
        while self.inflight_bulk.load(Ordering::Acquire) > 0 {
            std::thread::yield_now();
        }
        debug!(variant = K::NAME, "engine shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_CLOSING
    }

    // ── versioning and events ───────────────────────────────────────────────

    #[inline]
    pub(crate) fn bump_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    #[inline]
    pub fn global_version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub(crate) fn emit(&self, event: MutationEvent<K>) {
        for listener in self.listeners.read().iter() {
            listener(&event);
        }
    }

    pub fn register_mutation_listener(&self, listener: MutationListener<K>) {
        self.listeners.write().push(listener);
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    // ── configuration hooks ─────────────────────────────────────────────────

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    pub fn set_subdivision_strategy(&self, policy: Box<dyn BalancePolicy>) {
        *self.policy.write() = policy;
    }

    pub fn set_spanning_policy(&self, policy: SpanningPolicy) {
        *self.spanning.write() = policy;
    }

    pub fn spanning_policy(&self) -> SpanningPolicy {
        *self.spanning.read()
    }

    pub fn set_collision_detector(&self, detector: Arc<dyn CollisionDetector<C>>) {
        *self.detector.write() = Some(detector);
    }

    pub fn key_cache(&self) -> &KeyCache {
        &self.key_cache
    }

    // ── placement helpers ───────────────────────────────────────────────────

    /// Keys that must reference an entity at `point` with optional bounds
    pub(crate) fn placement_keys(
        &self,
        point: Vec3,
        level: u8,
        bounds: Option<&Aabb>,
    ) -> Result<Vec<K>, Error> {
        let primary = K::encode_with(point, level, &self.key_cache)?;
        let mut keys = vec![primary];
        if let Some(bounds) = bounds {
            let span_level = match self.spanning_policy() {
                SpanningPolicy::None => return Ok(keys),
                SpanningPolicy::Strict => level,
                // conservative cover at the planner's coarser level
                SpanningPolicy::AabbApprox => {
                    sfc_engine::range_plan::cover_level(bounds).min(level)
                }
            };
            if let Some((lo, hi)) = grid_range(bounds, span_level) {
                let e = cell_extent(span_level);
                for x in lo[0]..=hi[0] {
                    for y in lo[1]..=hi[1] {
                        for z in lo[2]..=hi[2] {
                            for key in K::cell_keys([x * e, y * e, z * e], span_level) {
                                if key.cell_bounds().intersects(bounds) && !keys.contains(&key)
                                {
                                    keys.push(key);
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(keys)
    }

    fn check_level(&self, level: u8) -> Result<(), Error> {
        if level > self.options.max_level {
            return Err(Error::Key(sfc_engine::KeyError::InvalidLevel { level }));
        }
        Ok(())
    }

    // ── mutators ────────────────────────────────────────────────────────────

    /// Insert new content at a position. A fresh id is minted.
    pub fn insert(
        &self,
        point: Vec3,
        level: u8,
        content: C,
        bounds: Option<Aabb>,
    ) -> Result<EntityId, Error> {
        let id = self.store.mint();
        self.insert_with_id(id, point, level, content, bounds)?;
        Ok(id)
    }

    /// Insert under a caller-chosen id; fails if the id is taken
    pub fn insert_with_id(
        &self,
        id: EntityId,
        point: Vec3,
        level: u8,
        content: C,
        bounds: Option<Aabb>,
    ) -> Result<(), Error> {
        let started = Instant::now();
        self.guard_open()?;
        self.check_level(level)?;
        let keys = self.placement_keys(point, level, bounds.as_ref())?;

        let record = EntityRecord {
            id,
            point,
            content,
            bounds,
            dynamics: None,
            version: 0,
        };
        if !self.store.insert_new(record) {
            return Err(Error::internal(format!("entity id {id} already present")));
        }
        // placements first: balancers treat an id without a placement entry
        // as already departed
        self.placements.insert(id, keys.clone());
        for key in &keys {
            self.nodes.get_or_insert(*key).add(id);
        }

        self.bump_version();
        let primary = keys[0];
        trace!(variant = K::NAME, %id, level, "inserted entity");
        self.emit(MutationEvent::Inserted {
            id,
            key: primary,
            point,
        });
        for key in keys {
            self.maybe_split(key);
        }
        self.policy
            .read()
            .observe_latency(OpKind::Insert, started.elapsed().as_nanos() as u64);
        Ok(())
    }

    /// Remove an entity and every reference to it
    pub fn remove(&self, id: EntityId) -> Result<(), Error> {
        self.guard_open()?;
        let Some((_, keys)) = self.placements.remove(&id) else {
            return Err(Error::EntityNotFound(id));
        };
        for key in &keys {
            if let Some(node) = self.nodes.get(key) {
                node.remove(id);
                if node.is_empty() {
                    self.nodes.remove_if_empty(key);
                    self.evaluate_merge(key.parent());
                }
            }
        }
        self.store
            .remove(id)
            .ok_or_else(|| Error::internal(format!("record for {id} vanished")))?;
        self.bump_version();
        trace!(variant = K::NAME, %id, "removed entity");
        self.emit(MutationEvent::Removed { id });
        Ok(())
    }

    /// Set or replace an entity's motion state. Published like any other
    /// record mutation: copy-on-write with a version CAS.
    pub fn set_dynamics(
        &self,
        id: EntityId,
        velocity: Vec3,
        acceleration: Vec3,
    ) -> Result<(), Error> {
        self.guard_open()?;
        for _ in 0..8 {
            let record = self.store.get(id).ok_or(Error::EntityNotFound(id))?;
            let mut next = (*record).clone();
            let mut dynamics = next.dynamics.take().unwrap_or_default();
            dynamics.velocity = velocity;
            dynamics.acceleration = acceleration;
            next.dynamics = Some(dynamics);
            next.version = record.version + 1;
            match self.store.publish_if(id, record.version, next) {
                crate::entity::PublishOutcome::Published => {
                    self.bump_version();
                    return Ok(());
                }
                crate::entity::PublishOutcome::Stale => continue,
                crate::entity::PublishOutcome::Missing => {
                    return Err(Error::EntityNotFound(id))
                }
            }
        }
        Err(Error::EntityConflict(id, 8))
    }

    // ── readers ─────────────────────────────────────────────────────────────

    /// Position, content, and bounds of an entity
    pub fn lookup(&self, id: EntityId) -> Option<(Vec3, C, Option<Aabb>)> {
        self.store
            .get(id)
            .map(|r| (r.point, r.content.clone(), r.bounds))
    }

    /// Full current record of an entity
    pub fn record(&self, id: EntityId) -> Option<Arc<EntityRecord<C>>> {
        self.store.get(id)
    }

    pub fn contains_entity(&self, id: EntityId) -> bool {
        self.store.contains(id)
    }

    pub fn entity_count(&self) -> usize {
        self.store.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn query_ctx(&self) -> QueryCtx<'_, K, C> {
        QueryCtx {
            nodes: &self.nodes,
            store: &self.store,
            placements: &self.placements,
        }
    }

    /// Ids of entities whose stored point or bounds intersect the box
    pub fn entities_in_region(&self, region: &Aabb) -> Vec<EntityId> {
        let started = Instant::now();
        let out = query::range::entities_in_region(&self.query_ctx(), region);
        self.policy
            .read()
            .observe_latency(OpKind::Query, started.elapsed().as_nanos() as u64);
        out
    }

    /// k nearest entities by position, ascending distance, ties by id
    pub fn k_nearest(&self, point: Vec3, k: usize, max_distance: f32) -> Vec<KnnHit> {
        let started = Instant::now();
        let version = self.global_version();
        let cache_key = self.options.knn_cache_enabled.then(|| {
            let cell = K::encode(point, self.options.max_level.min(10))
                .map(|key| {
                    use std::hash::{Hash, Hasher};
                    let mut hasher = std::collections::hash_map::DefaultHasher::new();
                    key.hash(&mut hasher);
                    hasher.finish()
                })
                .unwrap_or(u64::MAX);
            KnnCacheKey {
                cell,
                k,
                distance_bucket: KnnCacheKey::bucket_for(max_distance),
            }
        });
        if let Some(ref cache_key) = cache_key {
            if let Some(hits) = self.knn_cache.lookup(cache_key, version) {
                return hits;
            }
        }
        let mut version = version;
        let mut hits = query::knn::k_nearest(&self.query_ctx(), point, k, max_distance);
        if self.options.optimistic_reads && self.global_version() != version {
            // optimistic stamp failed validation: one pessimistic retry
            // against the newer tree
            version = self.global_version();
            hits = query::knn::k_nearest(&self.query_ctx(), point, k, max_distance);
        }
        if let Some(cache_key) = cache_key {
            // only cache results computed against an unchanged tree
            if self.global_version() == version {
                self.knn_cache.store(cache_key, version, hits.clone());
            }
        }
        self.policy
            .read()
            .observe_latency(OpKind::Query, started.elapsed().as_nanos() as u64);
        hits
    }

    /// Cast a ray; see `RayCastMode` for what is reported
    pub fn ray_cast(&self, ray: Ray, mode: RayCastMode) -> Vec<RayHit> {
        query::raycast::ray_cast(&self.query_ctx(), ray, mode)
    }

    /// Entities inside or intersecting the frustum
    pub fn frustum_cull(&self, frustum: &Frustum) -> Vec<EntityId> {
        query::frustum::frustum_cull(&self.query_ctx(), frustum)
    }

    /// Entities whose stored state straddles the plane
    pub fn plane_query(&self, plane: &Plane) -> Vec<EntityId> {
        query::frustum::plane_query(&self.query_ctx(), plane)
    }

    /// Broad-phase collision candidates, refined by the registered detector
    pub fn collision_pairs(&self) -> Vec<CollisionPair> {
        let detector = self.detector.read().clone();
        query::collision::collision_pairs(&self.query_ctx(), detector.as_deref())
    }

    /// Walk the occupied tree with a visitor
    pub fn traverse(&self, strategy: TraversalStrategy, visitor: &mut dyn Visitor<K>) -> bool {
        traverse::traverse(&self.nodes, strategy, visitor)
    }

    // ── subdivision ─────────────────────────────────────────────────────────

    /// Split `key` if occupancy demands it and the state machine allows it
    pub(crate) fn maybe_split(&self, key: K) {
        let Some(node) = self.nodes.get(&key) else { return };
        let threshold = self
            .policy
            .read()
            .split_threshold(key.level(), self.options.max_entities_per_node);
        if node.len() < threshold || key.level() >= self.options.max_level {
            return;
        }
        if !node.try_begin(NodeState::Splitting) {
            return; // another balancing operation owns this node
        }
        let mut moved = 0usize;
        let mut touched: Vec<K> = Vec::new();
        for id in node.snapshot() {
            // serialize against movers and other balancers per entity
            let Some(mut placement) = self.placements.get_mut(&id) else {
                node.remove(id);
                continue;
            };
            if !placement.contains(&key) {
                // the entity moved away while we were deciding
                node.remove(id);
                continue;
            }
            let Some(record) = self.store.get(id) else {
                node.remove(id);
                continue;
            };
            let targets: Vec<K> = match (record.bounds, self.spanning_policy()) {
                (Some(bounds), SpanningPolicy::Strict | SpanningPolicy::AabbApprox) => key
                    .children()
                    .into_iter()
                    .filter(|c| c.cell_bounds().intersects(&bounds))
                    .collect(),
                _ => match K::encode_with(record.point, key.level() + 1, &self.key_cache) {
                    Ok(child) => vec![child],
                    Err(_) => Vec::new(),
                },
            };
            if targets.is_empty() {
                continue;
            }
            for target in &targets {
                self.nodes.get_or_insert(*target).add(id);
            }
            node.remove(id);
            placement.retain(|k| k != &key);
            for target in targets {
                if !placement.contains(&target) {
                    placement.push(target);
                }
                if !touched.contains(&target) {
                    touched.push(target);
                }
            }
            moved += 1;
        }
        node.settle();
        self.nodes.remove_if_empty(&key);
        self.splits.fetch_add(1, Ordering::Relaxed);
        self.bump_version();
        debug!(variant = K::NAME, level = key.level(), moved, "split node");
        self.emit(MutationEvent::Split {
            key,
            redistributed: moved,
        });
        // a child can inherit enough of the population to need its own split
        for child in touched {
            self.maybe_split(child);
        }
    }

    /// Merge the children of `parent` back into it when the whole sibling
    /// set fits under the merge threshold
    pub(crate) fn evaluate_merge(&self, parent: Option<K>) {
        let Some(parent) = parent else { return };
        if parent.is_root() {
            return;
        }
        let threshold = self
            .policy
            .read()
            .merge_threshold(parent.level() + 1, self.options.max_entities_per_node);
        let siblings: Vec<(K, Arc<crate::node::Node>)> = parent
            .children()
            .into_iter()
            .filter_map(|k| self.nodes.get(&k).map(|n| (k, n)))
            .collect();
        if siblings.is_empty() {
            return;
        }
        // deeper structure below any sibling blocks the merge
        for (key, _) in &siblings {
            let (lo, hi) = key.sfc_range();
            if self.nodes.scan(&lo, &hi).len() > 1 {
                return;
            }
        }
        let total: usize = siblings.iter().map(|(_, n)| n.len()).sum();
        if total > threshold {
            return;
        }
        // claim every sibling or abort
        let mut claimed = Vec::new();
        for (key, node) in &siblings {
            if node.try_begin(NodeState::Merging) {
                claimed.push((*key, Arc::clone(node)));
            } else {
                for (_, n) in &claimed {
                    n.settle();
                }
                return;
            }
        }
        let parent_node = self.nodes.get_or_insert(parent);
        let mut coalesced = 0usize;
        for (key, node) in &claimed {
            for id in node.snapshot() {
                let Some(mut placement) = self.placements.get_mut(&id) else {
                    node.remove(id);
                    continue;
                };
                if !placement.contains(key) {
                    node.remove(id);
                    continue;
                }
                parent_node.add(id);
                node.remove(id);
                placement.retain(|k| k != key);
                if !placement.contains(&parent) {
                    placement.push(parent);
                }
                coalesced += 1;
            }
            node.settle();
            self.nodes.remove_if_empty(key);
        }
        self.merges.fetch_add(1, Ordering::Relaxed);
        self.bump_version();
        debug!(variant = K::NAME, level = parent.level(), coalesced, "merged siblings");
        self.emit(MutationEvent::Merged {
            key: parent,
            coalesced,
        });
    }

    /// Tree-wide rebalance pass: split everything oversized, merge every
    /// underfull complete sibling set. Runs only when the policy agrees.
    pub fn rebalance(&self) -> bool {
        let occupancy = self.nodes.occupancy();
        let node_count = occupancy.len();
        if node_count == 0 {
            return false;
        }
        let capacity = self.options.max_entities_per_node;
        let mean =
            occupancy.iter().map(|(_, n)| *n).sum::<usize>() as f32 / node_count as f32;
        let variance = occupancy
            .iter()
            .map(|(_, n)| {
                let d = *n as f32 - mean;
                d * d
            })
            .sum::<f32>()
            / node_count as f32;
        let sparse = occupancy
            .iter()
            .filter(|(_, n)| *n < capacity / 4)
            .count() as f32
            / node_count as f32;
        let signal = RebalanceSignal {
            node_count,
            entity_count: self.store.len(),
            sparse_ratio: sparse,
            occupancy_variance: variance,
            millis_since_last: self
                .now_ms()
                .saturating_sub(self.last_rebalance_ms.load(Ordering::Relaxed)),
        };
        if !self.policy.read().should_rebalance(&signal) {
            return false;
        }
        self.force_rebalance();
        true
    }

    /// The rebalance pass itself, unconditionally
    pub fn force_rebalance(&self) {
        for (key, _) in self.nodes.occupancy() {
            self.maybe_split(key);
        }
        let mut parents: Vec<K> = self
            .nodes
            .keys()
            .into_iter()
            .filter_map(|k| k.parent())
            .collect();
        parents.sort_unstable();
        parents.dedup();
        for parent in parents {
            self.evaluate_merge(Some(parent));
        }
        self.last_rebalance_ms.store(self.now_ms(), Ordering::Relaxed);
    }

    // ── ghosts and boundaries ───────────────────────────────────────────────

    /// Occupied cells with at least one face on the domain boundary
    pub fn boundary_elements(&self) -> Vec<K> {
        self.nodes
            .keys()
            .into_iter()
            .filter(|k| k.on_domain_boundary())
            .collect()
    }

    pub fn add_ghost(&self, key: K, ghost: GhostElement) {
        self.ghosts.add(key, ghost);
    }

    pub fn lookup_ghost(&self, key: &K) -> Option<GhostElement> {
        self.ghosts.lookup(key)
    }

    pub fn remove_ghost(&self, key: &K) -> Option<GhostElement> {
        self.ghosts.remove(key)
    }

    /// Same-level, parent-level, and child-level neighbors of a key that
    /// currently hold nodes - the non-conforming adjacency used by ghost
    /// layers
    pub fn multi_level_neighbors(
        &self,
        key: &K,
        kind: sfc_engine::TopologyKind,
    ) -> Vec<(K, sfc_engine::LevelRelation)> {
        use sfc_engine::LevelRelation;
        let mut out = Vec::new();
        for same in key.neighbors(kind) {
            if self.nodes.contains_key(&same) {
                out.push((same, LevelRelation::SameLevel));
            }
            if let Some(parent) = same.parent() {
                if self.nodes.contains_key(&parent) {
                    let entry = (parent, LevelRelation::ParentLevel);
                    if !out.contains(&entry) {
                        out.push(entry);
                    }
                }
            }
            for child in same.children() {
                if self.nodes.contains_key(&child) {
                    out.push((child, LevelRelation::ChildLevel));
                }
            }
        }
        out
    }

    // ── introspection ───────────────────────────────────────────────────────

    pub fn statistics(&self) -> IndexStatistics {
        let occupancy = self.nodes.occupancy();
        let mut per_level: std::collections::BTreeMap<u8, usize> = Default::default();
        let mut total = 0usize;
        let mut max_depth = 0u8;
        for (key, n) in &occupancy {
            *per_level.entry(key.level()).or_default() += 1;
            total += n;
            max_depth = max_depth.max(key.level());
        }
        let cache_stats = self.knn_cache.stats();
        IndexStatistics {
            entity_count: self.store.len(),
            node_count: occupancy.len(),
            ghost_count: self.ghosts.len(),
            max_depth,
            nodes_per_level: per_level.into_iter().collect(),
            avg_entities_per_node: if occupancy.is_empty() {
                0.0
            } else {
                total as f32 / occupancy.len() as f32
            },
            knn_cache_hits: cache_stats.hits,
            knn_cache_misses: cache_stats.misses,
            splits: self.splits.load(Ordering::Relaxed),
            merges: self.merges.load(Ordering::Relaxed),
            global_version: self.global_version(),
        }
    }

    /// Structural invariant check; returns human-readable violations,
    /// empty when healthy
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();
        for key in self.nodes.keys() {
            if let Err(err) = key.validate() {
                violations.push(format!("invalid key in node map: {err}"));
            }
            if key.level() > self.options.max_level {
                violations.push(format!(
                    "node at level {} exceeds configured max {}",
                    key.level(),
                    self.options.max_level
                ));
            }
            if let Some(node) = self.nodes.get(&key) {
                if node.state() != NodeState::Stable {
                    violations.push(format!(
                        "node at level {} not STABLE at rest",
                        key.level()
                    ));
                }
                for id in node.snapshot() {
                    if !self.store.contains(id) {
                        violations.push(format!("node references unknown entity {id}"));
                    }
                    match self.placements.get(&id) {
                        Some(keys) if keys.contains(&key) => {}
                        _ => violations
                            .push(format!("placement map misses reference {id}")),
                    }
                }
            }
        }
        for entry in self.placements.iter() {
            let id = *entry.key();
            if !self.store.contains(id) {
                violations.push(format!("placement for unknown entity {id}"));
            }
            for key in entry.value() {
                match self.nodes.get(key) {
                    Some(node) if node.contains(id) => {}
                    _ => violations.push(format!("dangling placement for {id}")),
                }
            }
        }
        violations
    }
}
