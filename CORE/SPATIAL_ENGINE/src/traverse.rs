// ═══════════════════════════════════════════════════════════════════════════════
// FILE: traverse.rs | CORE/SPATIAL_ENGINE/src/traverse.rs
// PURPOSE: Visitor-based tree traversal in five orders
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// Traversal walks the key hierarchy, delivering callbacks only for keys that
// actually hold a node. Empty subtrees are pruned with a sorted-map range
// probe. The visitor can cut a subtree (SkipChildren) or end the walk (Stop).

use crate::entity::EntityId;
use crate::node::NodeMap;
use sfc_engine::SpatialKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TraversalStrategy {
    #[default]
    DepthFirst,
    BreadthFirst,
    PostOrder,
    /// Ascending key order straight off the sorted map
    SfcOrder,
    /// Shallow levels before deep ones, key-ordered within a level
    LevelOrder,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum VisitAction {
    #[default]
    Continue,
    SkipChildren,
    Stop,
}

/// Traversal callbacks. Default implementations make any subset overridable.
pub trait Visitor<K> {
    fn enter_node(&mut self, _key: &K, _occupancy: usize) -> VisitAction {
        VisitAction::Continue
    }

    fn visit_entity(&mut self, _key: &K, _id: EntityId) -> VisitAction {
        VisitAction::Continue
    }

    fn leave_node(&mut self, _key: &K) {}
}

/// Walk `nodes` with the given strategy. Returns false when the visitor
/// stopped the walk early.
pub fn traverse<K: SpatialKey>(
    nodes: &NodeMap<K>,
    strategy: TraversalStrategy,
    visitor: &mut dyn Visitor<K>,
) -> bool {
    match strategy {
        TraversalStrategy::DepthFirst => {
            for root in K::roots() {
                if !walk_depth_first(nodes, root, visitor, false) {
                    return false;
                }
            }
            true
        }
        TraversalStrategy::PostOrder => {
            for root in K::roots() {
                if !walk_depth_first(nodes, root, visitor, true) {
                    return false;
                }
            }
            true
        }
        TraversalStrategy::BreadthFirst => walk_breadth_first(nodes, visitor),
        TraversalStrategy::SfcOrder => {
            let keys = nodes.keys();
            walk_listed(nodes, keys, visitor)
        }
        TraversalStrategy::LevelOrder => {
            let mut keys = nodes.keys();
            keys.sort_by_key(|k| (k.level(), *k));
            walk_listed(nodes, keys, visitor)
        }
    }
}

/// Deliver one node's callbacks; false to stop the whole walk, and
/// `skip_children` reports a SkipChildren request outward.
fn deliver<K: SpatialKey>(
    nodes: &NodeMap<K>,
    key: &K,
    visitor: &mut dyn Visitor<K>,
    skip_children: &mut bool,
) -> bool {
    let Some(node) = nodes.get(key) else {
        return true;
    };
    match visitor.enter_node(key, node.len()) {
        VisitAction::Stop => return false,
        VisitAction::SkipChildren => *skip_children = true,
        VisitAction::Continue => {}
    }
    for id in node.snapshot() {
        match visitor.visit_entity(key, id) {
            VisitAction::Stop => return false,
            VisitAction::SkipChildren => *skip_children = true,
            VisitAction::Continue => {}
        }
    }
    visitor.leave_node(key);
    true
}

fn walk_depth_first<K: SpatialKey>(
    nodes: &NodeMap<K>,
    key: K,
    visitor: &mut dyn Visitor<K>,
    post_order: bool,
) -> bool {
    let (lo, hi) = key.sfc_range();
    if !nodes.any_in_range(&lo, &hi) {
        return true;
    }
    let mut skip_children = false;
    if !post_order && !deliver(nodes, &key, visitor, &mut skip_children) {
        return false;
    }
    if !skip_children {
        for child in key.children() {
            if !walk_depth_first(nodes, child, visitor, post_order) {
                return false;
            }
        }
    }
    if post_order && !deliver(nodes, &key, visitor, &mut skip_children) {
        return false;
    }
    true
}

fn walk_breadth_first<K: SpatialKey>(nodes: &NodeMap<K>, visitor: &mut dyn Visitor<K>) -> bool {
    let mut frontier: Vec<K> = K::roots();
    while !frontier.is_empty() {
        let mut next = Vec::new();
        for key in frontier {
            let (lo, hi) = key.sfc_range();
            if !nodes.any_in_range(&lo, &hi) {
                continue;
            }
            let mut skip_children = false;
            if !deliver(nodes, &key, visitor, &mut skip_children) {
                return false;
            }
            if !skip_children {
                next.extend(key.children());
            }
        }
        frontier = next;
    }
    true
}

fn walk_listed<K: SpatialKey>(
    nodes: &NodeMap<K>,
    keys: Vec<K>,
    visitor: &mut dyn Visitor<K>,
) -> bool {
    for key in keys {
        let mut skip = false;
        if !deliver(nodes, &key, visitor, &mut skip) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use sfc_engine::MortonKey;

    struct Collector {
        entered: Vec<MortonKey>,
        entities: usize,
        stop_after: Option<usize>,
    }

    impl Visitor<MortonKey> for Collector {
        fn enter_node(&mut self, key: &MortonKey, _occupancy: usize) -> VisitAction {
            self.entered.push(*key);
            match self.stop_after {
                Some(n) if self.entered.len() >= n => VisitAction::Stop,
                _ => VisitAction::Continue,
            }
        }

        fn visit_entity(&mut self, _key: &MortonKey, _id: EntityId) -> VisitAction {
            self.entities += 1;
            VisitAction::Continue
        }
    }

    fn build_map() -> (NodeMap<MortonKey>, Vec<MortonKey>) {
        let map = NodeMap::new();
        let mut keys = Vec::new();
        for (i, level) in [(1u64, 3u8), (2, 5), (3, 5), (4, 8)] {
            let key =
                MortonKey::encode(Vec3::splat(10_000.0 * i as f32 + 5.0), level).unwrap();
            let node = map.get_or_insert(key);
            node.add(EntityId::Seq(i));
            keys.push(key);
        }
        (map, keys)
    }

    #[test]
    fn test_depth_first_visits_all_nodes() {
        let (map, keys) = build_map();
        let mut visitor = Collector {
            entered: Vec::new(),
            entities: 0,
            stop_after: None,
        };
        assert!(traverse(&map, TraversalStrategy::DepthFirst, &mut visitor));
        assert_eq!(visitor.entered.len(), keys.len());
        assert_eq!(visitor.entities, keys.len());
    }

    #[test]
    fn test_sfc_order_is_sorted() {
        let (map, _) = build_map();
        let mut visitor = Collector {
            entered: Vec::new(),
            entities: 0,
            stop_after: None,
        };
        assert!(traverse(&map, TraversalStrategy::SfcOrder, &mut visitor));
        let mut sorted = visitor.entered.clone();
        sorted.sort();
        assert_eq!(visitor.entered, sorted);
    }

    #[test]
    fn test_level_order_shallow_first() {
        let (map, _) = build_map();
        let mut visitor = Collector {
            entered: Vec::new(),
            entities: 0,
            stop_after: None,
        };
        assert!(traverse(&map, TraversalStrategy::LevelOrder, &mut visitor));
        let levels: Vec<u8> = visitor.entered.iter().map(|k| k.level()).collect();
        let mut sorted = levels.clone();
        sorted.sort_unstable();
        assert_eq!(levels, sorted);
    }

    #[test]
    fn test_stop_cuts_walk() {
        let (map, _) = build_map();
        let mut visitor = Collector {
            entered: Vec::new(),
            entities: 0,
            stop_after: Some(2),
        };
        assert!(!traverse(&map, TraversalStrategy::BreadthFirst, &mut visitor));
        assert_eq!(visitor.entered.len(), 2);
    }
}
