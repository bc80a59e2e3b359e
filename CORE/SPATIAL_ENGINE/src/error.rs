// ═══════════════════════════════════════════════════════════════════════════════
// FILE: error.rs | CORE/SPATIAL_ENGINE/src/error.rs
// PURPOSE: Engine error taxonomy - every public failure is a value, never a panic
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════

use thiserror::Error;

use crate::entity::EntityId;
use sfc_engine::KeyError;

/// Engine operation failures.
///
/// All are fatal to the operation, never to the engine; `EntityConflict` is
/// additionally retryable by the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Coordinate outside [0, 2^21)³, level outside [0, 21], or an invalid
    /// simplex type
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("entity {0} not found")]
    EntityNotFound(EntityId),

    /// Concurrent-update retries exhausted in the mover
    #[error("entity {0} lost its update race after {1} attempts")]
    EntityConflict(EntityId, u32),

    #[error("bulk operation cancelled")]
    Cancelled,

    #[error("engine is shut down")]
    ShutDown,

    /// Invariant violation; should not occur
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl Error {
    pub fn internal(context: impl Into<String>) -> Self {
        Self::Internal(context.into())
    }
}
