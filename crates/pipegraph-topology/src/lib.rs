//! pipegraph-topology — pipe-network topology reconstruction.
//!
//! From an entity soup whose only authoritative connectivity is the
//! external adjacency relation, this crate rebuilds the logical network and
//! derives the engineering artifacts:
//!
//! 1. **Assembly** – group entities into named pipelines; synthesize a
//!    topology curve for unreferenced groups.
//! 2. **Forest** – cluster pipelines by endpoint coincidence and root each
//!    cluster at the supply side.
//! 3. **Direction** – reorient pipe-runs to canonical root→leaves flow.
//! 4. **Size arrays** – piecewise-constant DN/system/series segmentation.
//! 5. **Length check** – stock-length compliance, reducer-delimited.
//! 6. **Welds** – stride cuts + fitting-port welds, spatially clustered.
//!
//! The network is assumed to be a tree (no meshed topology). All stages are
//! synchronous and single-threaded over one document snapshot.

pub mod assembler;
pub mod direction;
pub mod forest;
pub mod length;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod size_array;
pub mod weld;

pub use assembler::assemble;
pub use direction::{normalize, DirectionOutcome};
pub use forest::{build_forest, is_connected_to, NodeId, PipelineForest, PipelineNode};
pub use length::{
    check_lengths, segments, CorrectionCandidate, LengthMismatch, LengthReport, MismatchKind,
};
pub use pipeline::{Member, Pipeline, SizeArray, SizeEntry};
pub use report::RunReport;
pub use runner::{full_run, RunOutcome};
pub use weld::{place_welds, MaterializedWeld, WeldMarker, WeldPlacement};
