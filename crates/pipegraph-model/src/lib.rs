//! pipegraph-model — pipe-network data model and document plane.
//!
//! This crate defines everything the topology algorithms consume:
//!
//! - entities (pipe-runs and fittings) as an exhaustive tagged union,
//! - 2D polyline geometry with arc-length stationing,
//! - the compact adjacency relation and its symmetrized index,
//! - the document snapshot with transactional, atomic mutation,
//! - stock-length configuration and named tolerances.
//!
//! The CAD document host itself is an external collaborator; the JSON
//! snapshot here plays its role for batch use and tests.

pub mod adjacency;
pub mod attrs;
pub mod config;
pub mod document;
pub mod entity;
pub mod error;
pub mod geometry;
pub mod stock;

pub use adjacency::{format_adjacency, parse_adjacency, AdjacencyEdge};
pub use config::Tolerances;
pub use document::{Document, DocumentChange, DocumentTransaction, EntityRecord, Snapshot};
pub use entity::{
    EntityId, FittingInstance, FittingKind, PipeElement, PipeRun, Port, PortRole,
};
pub use error::{AdjacencyParseError, AttributeError, DocumentError, TopologyError};
pub use geometry::{dist, Point2, Polyline, Projection, Vertex};
pub use stock::{StockTable, DEFAULT_ZONE};
