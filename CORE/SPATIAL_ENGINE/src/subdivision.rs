// ═══════════════════════════════════════════════════════════════════════════════
// FILE: subdivision.rs | CORE/SPATIAL_ENGINE/src/subdivision.rs
// PURPOSE: Pluggable split/merge/rebalance threshold policies
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// A policy only answers questions; the engine performs the actual split and
// merge under the node state machine. Splits fire when a node's occupancy
// reaches the split threshold and the node is above the deepest level;
// merges fire when a full sibling set fits under the merge threshold.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::BalancingStrategy;

/// Operation classes the adaptive policy samples
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpKind {
    Insert,
    Query,
}

/// Tree-wide signals consulted before a global rebalance pass
#[derive(Clone, Copy, Debug, Default)]
pub struct RebalanceSignal {
    pub node_count: usize,
    pub entity_count: usize,
    /// Share of nodes holding fewer than a quarter of capacity
    pub sparse_ratio: f32,
    /// Population variance of node occupancy
    pub occupancy_variance: f32,
    pub millis_since_last: u64,
}

/// Subdivision and balancing policy
pub trait BalancePolicy: Send + Sync {
    /// Occupancy at which a node should split (given the configured capacity)
    fn split_threshold(&self, level: u8, capacity: usize) -> usize;

    /// Combined sibling occupancy at or under which a full sibling set
    /// should merge into its parent
    fn merge_threshold(&self, level: u8, capacity: usize) -> usize;

    fn should_rebalance(&self, signal: &RebalanceSignal) -> bool;

    /// Latency feedback; only the adaptive policy listens
    fn observe_latency(&self, _op: OpKind, _nanos: u64) {}
}

/// Split at 80% of capacity, merge at 20%
pub struct DefaultPolicy;

impl BalancePolicy for DefaultPolicy {
    fn split_threshold(&self, _level: u8, capacity: usize) -> usize {
        ((capacity * 4) / 5).max(2)
    }

    fn merge_threshold(&self, _level: u8, capacity: usize) -> usize {
        capacity / 5
    }

    fn should_rebalance(&self, signal: &RebalanceSignal) -> bool {
        signal.millis_since_last >= 1_000
            && (signal.sparse_ratio > 0.5 || signal.occupancy_variance > 64.0)
    }
}

/// Tight thresholds for dense dynamic populations
pub struct AggressivePolicy;

impl BalancePolicy for AggressivePolicy {
    fn split_threshold(&self, _level: u8, capacity: usize) -> usize {
        ((capacity * 3) / 5).max(2)
    }

    fn merge_threshold(&self, _level: u8, capacity: usize) -> usize {
        (capacity * 3) / 10
    }

    fn should_rebalance(&self, signal: &RebalanceSignal) -> bool {
        signal.millis_since_last >= 250
            && (signal.sparse_ratio > 0.3 || signal.occupancy_variance > 16.0)
    }
}

/// Loose thresholds for write-heavy workloads
pub struct ConservativePolicy;

impl BalancePolicy for ConservativePolicy {
    fn split_threshold(&self, _level: u8, capacity: usize) -> usize {
        capacity.max(2)
    }

    fn merge_threshold(&self, _level: u8, capacity: usize) -> usize {
        capacity / 10
    }

    fn should_rebalance(&self, signal: &RebalanceSignal) -> bool {
        signal.millis_since_last >= 10_000 && signal.sparse_ratio > 0.8
    }
}

/// Self-tuning policy: skews the split threshold by the ratio of observed
/// query to insert latency. Slow queries favor smaller nodes (earlier
/// splits); slow inserts favor fewer structural changes.
pub struct AdaptivePolicy {
    insert_ewma_nanos: AtomicU64,
    query_ewma_nanos: AtomicU64,
}

impl AdaptivePolicy {
    const ALPHA_SHIFT: u32 = 3; // ewma weight 1/8

    pub fn new() -> Self {
        Self {
            insert_ewma_nanos: AtomicU64::new(0),
            query_ewma_nanos: AtomicU64::new(0),
        }
    }

    fn update(cell: &AtomicU64, sample: u64) {
        let prev = cell.load(Ordering::Relaxed);
        let next = if prev == 0 {
            sample
        } else {
            prev - (prev >> Self::ALPHA_SHIFT) + (sample >> Self::ALPHA_SHIFT)
        };
        cell.store(next, Ordering::Relaxed);
    }

    fn pressure(&self) -> f64 {
        let insert = self.insert_ewma_nanos.load(Ordering::Relaxed).max(1) as f64;
        let query = self.query_ewma_nanos.load(Ordering::Relaxed).max(1) as f64;
        query / insert
    }
}

impl Default for AdaptivePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl BalancePolicy for AdaptivePolicy {
    fn split_threshold(&self, _level: u8, capacity: usize) -> usize {
        // pressure > 1: queries dominate, split earlier; < 1: inserts
        // dominate, tolerate fuller nodes
        let factor = if self.pressure() > 2.0 {
            0.6
        } else if self.pressure() < 0.5 {
            1.0
        } else {
            0.8
        };
        ((capacity as f64 * factor) as usize).max(2)
    }

    fn merge_threshold(&self, _level: u8, capacity: usize) -> usize {
        capacity / 5
    }

    fn should_rebalance(&self, signal: &RebalanceSignal) -> bool {
        signal.millis_since_last >= 1_000 && signal.occupancy_variance > 32.0
    }

    fn observe_latency(&self, op: OpKind, nanos: u64) {
        match op {
            OpKind::Insert => Self::update(&self.insert_ewma_nanos, nanos),
            OpKind::Query => Self::update(&self.query_ewma_nanos, nanos),
        }
    }
}

/// Policy instance for a configured strategy
pub fn policy_for(strategy: BalancingStrategy) -> Box<dyn BalancePolicy> {
    match strategy {
        BalancingStrategy::Default => Box::new(DefaultPolicy),
        BalancingStrategy::Aggressive => Box::new(AggressivePolicy),
        BalancingStrategy::Conservative => Box::new(ConservativePolicy),
        BalancingStrategy::Adaptive => Box::new(AdaptivePolicy::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let p = DefaultPolicy;
        assert_eq!(p.split_threshold(5, 32), 25);
        assert_eq!(p.merge_threshold(5, 32), 6);
    }

    #[test]
    fn test_ordering_of_strategies() {
        // aggressive splits sooner than default, conservative later
        let capacity = 32;
        assert!(
            AggressivePolicy.split_threshold(3, capacity)
                < DefaultPolicy.split_threshold(3, capacity)
        );
        assert!(
            DefaultPolicy.split_threshold(3, capacity)
                < ConservativePolicy.split_threshold(3, capacity)
        );
    }

    #[test]
    fn test_adaptive_reacts_to_latency() {
        let p = AdaptivePolicy::new();
        // query-heavy pain: many slow queries, fast inserts
        for _ in 0..64 {
            p.observe_latency(OpKind::Query, 1_000_000);
            p.observe_latency(OpKind::Insert, 1_000);
        }
        let query_heavy = p.split_threshold(4, 32);

        let p = AdaptivePolicy::new();
        for _ in 0..64 {
            p.observe_latency(OpKind::Query, 1_000);
            p.observe_latency(OpKind::Insert, 1_000_000);
        }
        let insert_heavy = p.split_threshold(4, 32);
        assert!(query_heavy < insert_heavy);
    }

    #[test]
    fn test_rebalance_interval_gate() {
        let signal = RebalanceSignal {
            sparse_ratio: 0.9,
            occupancy_variance: 100.0,
            millis_since_last: 10,
            ..RebalanceSignal::default()
        };
        assert!(!DefaultPolicy.should_rebalance(&signal));
        let later = RebalanceSignal {
            millis_since_last: 5_000,
            ..signal
        };
        assert!(DefaultPolicy.should_rebalance(&later));
    }
}
