// ═══════════════════════════════════════════════════════════════════════════════
// FILE: config.rs | CORE/SPATIAL_ENGINE/src/config.rs
// PURPOSE: Engine construction options
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};

use sfc_engine::MAX_LEVEL;

/// How entities with bounds are placed across cells
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SpanningPolicy {
    /// Single node at the entity's position; bounds ignored for placement
    #[default]
    None,
    /// A reference in every cell the bounds intersect, at the insert level
    Strict,
    /// Conservative cover: the cells of the bounds' enclosing box
    AabbApprox,
}

/// Split/merge threshold family
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BalancingStrategy {
    /// Split at 80% of capacity, merge at 20%
    #[default]
    Default,
    /// Tight thresholds for dense, frequently-moving populations
    Aggressive,
    /// Loose thresholds for write-heavy workloads
    Conservative,
    /// Self-tuning from observed operation latencies
    Adaptive,
}

/// Entity id generation scheme
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum IdGenerator {
    #[default]
    Sequential,
    Uuid,
}

/// Engine construction options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Node occupancy driving subdivision decisions
    pub max_entities_per_node: usize,
    /// Deepest level this engine will refine to (≤ 21)
    pub max_level: u8,
    pub spanning_policy: SpanningPolicy,
    pub balancing_strategy: BalancingStrategy,
    /// Entities per bulk-load batch
    pub bulk_batch_size: usize,
    /// Fan bulk batches out over a worker pool
    pub bulk_parallel: bool,
    pub knn_cache_capacity: usize,
    pub knn_cache_enabled: bool,
    /// Validate read snapshots against the global version instead of
    /// pessimistically locking
    pub optimistic_reads: bool,
    pub id_generator: IdGenerator,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            max_entities_per_node: 32,
            max_level: MAX_LEVEL,
            spanning_policy: SpanningPolicy::default(),
            balancing_strategy: BalancingStrategy::default(),
            bulk_batch_size: 2048,
            bulk_parallel: false,
            knn_cache_capacity: 256,
            knn_cache_enabled: true,
            optimistic_reads: true,
            id_generator: IdGenerator::default(),
        }
    }
}

impl IndexOptions {
    /// Clamp out-of-range values to usable ones
    pub fn sanitized(mut self) -> Self {
        self.max_level = self.max_level.min(MAX_LEVEL);
        self.max_entities_per_node = self.max_entities_per_node.max(1);
        self.bulk_batch_size = self.bulk_batch_size.max(1);
        self
    }
}
