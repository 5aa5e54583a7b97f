//! Error types for the document and topology planes.
//!
//! Fatal classes abort the whole command and leave the document untouched;
//! soft conditions never surface here — they are collected in run reports.

use thiserror::Error;

use crate::entity::EntityId;

/// Fatal topology inconsistencies. Any of these aborts the command and the
/// pending transaction is discarded.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("inconsistent adjacency on entity #{id}: {detail}")]
    InconsistentAdjacency { id: EntityId, detail: String },

    /// An unreferenced ("NA") group has no reachable anchor bound to a real
    /// reference curve, so no topology curve can be synthesized.
    #[error("no connecting node found for unreferenced group containing entity #{id}")]
    NoConnectingNode { id: EntityId },

    /// Two pipe-runs are directly adjacent inside a length-check segment;
    /// runs must be separated by fittings.
    #[error("pipe-run #{id} is directly adjacent to another pipe-run; runs must be separated by fittings")]
    SegmentStructure { id: EntityId },
}

/// Attribute resolution failures. Size arrays must be total, so an entity
/// whose size attributes cannot be resolved from either side is fatal.
#[derive(Debug, Error)]
pub enum AttributeError {
    #[error("size attributes unresolved on both sides of entity #{id}")]
    Unresolved { id: EntityId },
}

/// Errors raised while parsing the compact adjacency relation string.
#[derive(Debug, Error)]
pub enum AdjacencyParseError {
    #[error("invalid adjacency record `{record}` on entity #{id}")]
    InvalidRecord { id: EntityId, record: String },

    #[error("adjacency record `{record}` on entity #{id} references non-numeric entity id")]
    BadEntityId { id: EntityId, record: String },
}

/// Document snapshot load/store errors.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Adjacency(#[from] AdjacencyParseError),

    #[error("duplicate entity id #{id} in snapshot")]
    DuplicateEntity { id: EntityId },

    #[error("adjacency on entity #{id} references unknown entity #{other}")]
    UnknownNeighbor { id: EntityId, other: EntityId },
}
