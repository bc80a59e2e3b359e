// ═══════════════════════════════════════════════════════════════════════════════
// FILE: events.rs | CORE/SPATIAL_ENGINE/src/events.rs
// PURPOSE: Mutation events delivered to registered listeners
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// Listeners are the hook point for external collaborators: occlusion cullers
// track movement and invalidate their visibility state, and ghost
// distributors watch boundary churn. Callbacks run synchronously on the
// mutating thread, so they must stay short.

use glam::Vec3;

use crate::entity::EntityId;

/// Phase marker of the four-phase mover protocol
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoverPhase {
    Prepare,
    Insert,
    Update,
    Remove,
}

/// A structural or entity mutation of the index
#[derive(Clone, Debug, PartialEq)]
pub enum MutationEvent<K> {
    Inserted {
        id: EntityId,
        key: K,
        point: Vec3,
    },
    Removed {
        id: EntityId,
    },
    Moved {
        id: EntityId,
        from: Vec3,
        to: Vec3,
    },
    /// Progress marker inside an in-flight move; the entity may currently be
    /// referenced from both its old and new cells
    MoveProgress {
        id: EntityId,
        phase: MoverPhase,
    },
    Split {
        key: K,
        redistributed: usize,
    },
    Merged {
        key: K,
        coalesced: usize,
    },
    BulkCompleted {
        inserted: usize,
        failed: usize,
    },
}

/// Listener callback type
pub type MutationListener<K> = Box<dyn Fn(&MutationEvent<K>) + Send + Sync>;
