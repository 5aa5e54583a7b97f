//! Pipe-network entity model.
//!
//! Entities are either pipe-runs (polyline geometry) or discrete fittings
//! (ported point objects). The union is exhaustive by construction: unknown
//! fitting kinds are carried explicitly as [`FittingKind::Other`] so nothing
//! is silently dropped by downstream dispatch.

use serde::{Deserialize, Serialize};

use crate::geometry::{Point2, Polyline};

pub type EntityId = u32;

// ============================================================================
// Pipe elements
// ============================================================================

/// A spatial primitive of the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "element", rename_all = "snake_case")]
pub enum PipeElement {
    Run(PipeRun),
    Fitting(FittingInstance),
}

impl PipeElement {
    pub fn as_run(&self) -> Option<&PipeRun> {
        match self {
            PipeElement::Run(r) => Some(r),
            PipeElement::Fitting(_) => None,
        }
    }

    pub fn as_fitting(&self) -> Option<&FittingInstance> {
        match self {
            PipeElement::Run(_) => None,
            PipeElement::Fitting(f) => Some(f),
        }
    }

    /// A representative position used for station ordering: a run's first
    /// vertex, a fitting's main (or first) port.
    pub fn anchor_point(&self) -> Option<Point2> {
        match self {
            PipeElement::Run(r) => r.curve.start(),
            PipeElement::Fitting(f) => f.anchor_port().map(|p| p.position),
        }
    }
}

/// A pipe-run: an open polyline with length-bearing geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeRun {
    pub curve: Polyline,
}

impl PipeRun {
    pub fn length(&self) -> f64 {
        self.curve.length()
    }
}

/// Role of a fitting port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortRole {
    Main,
    Branch,
    Neutral,
}

/// A labeled connection point on a fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    pub position: Point2,
    pub role: PortRole,
}

/// Fitting classification.
///
/// `Other` keeps the raw kind string for fittings outside the known set;
/// matches over this enum stay exhaustive, so new kinds surface at compile
/// time instead of falling through a default branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FittingKind {
    Elbow,
    Reducer,
    Tee,
    Wye,
    MaterialTransition,
    SizeMarker,
    Weld,
    Cap,
    Other(String),
}

impl FittingKind {
    /// Does this fitting delimit size-array ranges along a pipeline?
    pub fn delimits_size_range(&self) -> bool {
        matches!(
            self,
            FittingKind::Reducer
                | FittingKind::MaterialTransition
                | FittingKind::SizeMarker
                | FittingKind::Tee
                | FittingKind::Wye
        )
    }

    /// Does the fitting declare its diameter directly (as opposed to the
    /// ambiguous before/after transitions)?
    pub fn carries_diameter(&self) -> bool {
        matches!(
            self,
            FittingKind::SizeMarker | FittingKind::Tee | FittingKind::Wye
        )
    }

    /// Transition fittings whose two sides carry different paired values.
    pub fn is_ambiguous_transition(&self) -> bool {
        matches!(self, FittingKind::Reducer | FittingKind::MaterialTransition)
    }
}

/// A discrete fitting with its connection ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittingInstance {
    pub kind: FittingKind,
    #[serde(default)]
    pub ports: Vec<Port>,
}

impl FittingInstance {
    /// The main port if present, else the first declared port.
    pub fn anchor_port(&self) -> Option<&Port> {
        self.ports
            .iter()
            .find(|p| p.role == PortRole::Main)
            .or_else(|| self.ports.first())
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vertex;

    #[test]
    fn element_round_trips_through_json() {
        let run = PipeElement::Run(PipeRun {
            curve: Polyline::new(vec![Vertex::new(0.0, 0.0), Vertex::new(1.0, 0.0)]),
        });
        let json = serde_json::to_string(&run).unwrap();
        let back: PipeElement = serde_json::from_str(&json).unwrap();
        assert_eq!(run, back);

        let fitting = PipeElement::Fitting(FittingInstance {
            kind: FittingKind::Reducer,
            ports: vec![Port {
                name: "P1".into(),
                position: [1.0, 0.0],
                role: PortRole::Main,
            }],
        });
        let json = serde_json::to_string(&fitting).unwrap();
        let back: PipeElement = serde_json::from_str(&json).unwrap();
        assert_eq!(fitting, back);
    }

    #[test]
    fn size_range_classification() {
        assert!(FittingKind::Reducer.delimits_size_range());
        assert!(FittingKind::SizeMarker.carries_diameter());
        assert!(!FittingKind::Elbow.delimits_size_range());
        assert!(FittingKind::MaterialTransition.is_ambiguous_transition());
        assert!(!FittingKind::Other("drain".into()).delimits_size_range());
    }
}
