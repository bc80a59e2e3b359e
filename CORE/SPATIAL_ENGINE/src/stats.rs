// ═══════════════════════════════════════════════════════════════════════════════
// FILE: stats.rs | CORE/SPATIAL_ENGINE/src/stats.rs
// PURPOSE: Engine statistics snapshot
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};

/// Point-in-time engine statistics
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStatistics {
    pub entity_count: usize,
    pub node_count: usize,
    pub ghost_count: usize,
    pub max_depth: u8,
    /// (level, node count) for every level holding nodes
    pub nodes_per_level: Vec<(u8, usize)>,
    pub avg_entities_per_node: f32,
    pub knn_cache_hits: u64,
    pub knn_cache_misses: u64,
    pub splits: u64,
    pub merges: u64,
    pub global_version: u64,
}

impl IndexStatistics {
    /// Share of k-NN lookups answered from cache
    pub fn knn_cache_hit_rate(&self) -> f32 {
        let total = self.knn_cache_hits + self.knn_cache_misses;
        if total == 0 {
            0.0
        } else {
            self.knn_cache_hits as f32 / total as f32
        }
    }
}
