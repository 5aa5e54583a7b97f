//! Named tolerance configuration.
//!
//! All geometric tolerances used by the topology algorithms are named
//! configuration values with defaults; algorithm code never hard-codes a
//! literal. Units are the document's length units (meters).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    /// Endpoint-coincidence tolerance for pipeline connectivity tests.
    pub connectivity: f64,
    /// Weld-marker clustering radius (5 mm).
    pub weld_cluster: f64,
    /// Stock-length remainder tolerance (1 mm).
    pub length: f64,
    /// Slack under which a final short stride merges into the end marker
    /// instead of producing a near-duplicate weld (5 mm).
    pub weld_stride_slack: f64,
    /// Station window in which a leading/trailing material-transition marker
    /// is treated as a spurious termination artifact and trimmed.
    pub end_marker_trim: f64,
    /// Joint tolerance when splicing synthesized topology curves.
    pub curve_joint: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            connectivity: 0.05,
            weld_cluster: 0.005,
            length: 0.001,
            weld_stride_slack: 0.005,
            end_marker_trim: 0.05,
            curve_joint: 0.001,
        }
    }
}
