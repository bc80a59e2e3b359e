// ═══════════════════════════════════════════════════════════════════════════════
// FILE: lib.rs | CORE/SPATIAL_ENGINE/src/lib.rs
// PURPOSE: Generic multi-variant spatial index engine over SFC keys
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// SPATIAL_ENGINE is the shared engine behind the three index variants. The
// engine is generic over the key type; a variant contributes nothing beyond
// its key algebra from SFC_ENGINE.
//
// ┌─────────────────────────────────────────────────────────────────────────────┐
// │ ARCHITECTURE                                                                │
// ├─────────────────────────────────────────────────────────────────────────────┤
// │                                                                             │
// │   SpatialIndex<K, C>                                                        │
// │       │                                                                     │
// │       ├── EntityStore        id → record, per-record version CAS            │
// │       ├── NodeMap<K>         sorted concurrent key → node map               │
// │       ├── BalancePolicy      split/merge/rebalance thresholds               │
// │       ├── query::*           k-NN, range, ray, frustum, plane, collision    │
// │       ├── bulk               sort/batch/defer loading pipeline              │
// │       ├── mover              four-phase entity relocation                   │
// │       ├── KnnCache           version-keyed LRU of k-NN results              │
// │       └── ghost              boundary elements + remote cell payloads       │
// │                                                                             │
// └─────────────────────────────────────────────────────────────────────────────┘
//
// DEPENDS ON:
//   • CORE/SFC_ENGINE → key algebra and geometry
//
// Concurrency: the node map's structure is guarded by one reader-preferring
// lock; entity membership of an existing node uses the node's own lock;
// entity records publish through compare-and-swap on a version stamp. No
// async anywhere; every operation completes on the calling thread.

pub mod bulk;
pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod events;
pub mod ghost;
pub mod knn_cache;
pub mod mover;
pub mod node;
pub mod query;
pub mod stats;
pub mod subdivision;
pub mod traverse;

pub use bulk::{BulkItem, CancelToken};
pub use config::{BalancingStrategy, IdGenerator, IndexOptions, SpanningPolicy};
pub use engine::SpatialIndex;
pub use entity::{Dynamics, EntityId, EntityRecord};
pub use error::Error;
pub use events::{MoverPhase, MutationEvent};
pub use mover::MoveRequest;
pub use ghost::GhostElement;
pub use query::{CollisionDetector, CollisionPair, KnnHit, RayCastMode, RayHit};
pub use stats::IndexStatistics;
pub use subdivision::BalancePolicy;
pub use traverse::{TraversalStrategy, VisitAction, Visitor};

use sfc_engine::{MortonKey, PrismKey, TetKey};

/// Cubic Morton-keyed index
pub type Octree<C> = SpatialIndex<MortonKey, C>;

/// Tetrahedral TM-SFC-keyed index
pub type Tetree<C> = SpatialIndex<TetKey, C>;

/// Anisotropic prism-keyed index
pub type Prism<C> = SpatialIndex<PrismKey, C>;
