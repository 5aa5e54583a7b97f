//! Pipelines and size arrays.
//!
//! A pipeline is a named group of entities bound to one topology curve (the
//! authored reference curve, or a synthesized one for unreferenced groups)
//! with a monotonic station axis over `[0, end_station]`.

use serde::{Deserialize, Serialize};

use pipegraph_model::attrs::{parse_dn, ATTR_DN};
use pipegraph_model::{Document, EntityId, PipeElement, Point2, Polyline};

/// A pipeline member with its station on the topology curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: EntityId,
    pub station: f64,
}

/// A named pipeline over one topology curve.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub name: String,
    /// Members in ascending station order.
    pub members: Vec<Member>,
    pub curve: Polyline,
    pub end_station: f64,
    /// True when the curve was synthesized for an unreferenced group.
    pub synthesized: bool,
}

impl Pipeline {
    pub fn new(name: String, mut members: Vec<Member>, curve: Polyline, synthesized: bool) -> Self {
        members.sort_by(|a, b| {
            a.station
                .partial_cmp(&b.station)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        let end_station = curve.length();
        Self {
            name,
            members,
            curve,
            end_station,
            synthesized,
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.members.iter().any(|m| m.id == id)
    }

    pub fn station_of(&self, id: EntityId) -> Option<f64> {
        self.members.iter().find(|m| m.id == id).map(|m| m.station)
    }

    pub fn member_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.members.iter().map(|m| m.id)
    }

    /// Member pipe-runs in station order.
    pub fn run_members<'d>(&self, doc: &'d Document) -> Vec<(Member, &'d pipegraph_model::PipeRun)> {
        self.members
            .iter()
            .filter_map(|m| doc.run(m.id).map(|r| (*m, r)))
            .collect()
    }

    pub fn endpoints(&self) -> Option<(Point2, Point2)> {
        Some((self.curve.start()?, self.curve.end()?))
    }

    /// Maximum nominal diameter declared across the members, if any.
    pub fn max_diameter(&self, doc: &Document) -> Option<f64> {
        self.members
            .iter()
            .filter_map(|m| doc.read_attribute(m.id, ATTR_DN).and_then(parse_dn))
            .fold(None, |acc, dn| Some(acc.map_or(dn, |a: f64| a.max(dn))))
    }

    /// Diameter near one of the curve ends, read from the run member whose
    /// station is closest to it.
    pub fn diameter_near(&self, doc: &Document, station: f64) -> Option<f64> {
        let mut best: Option<(f64, f64)> = None;
        for m in &self.members {
            if doc.run(m.id).is_none() {
                continue;
            }
            let Some(dn) = doc.read_attribute(m.id, ATTR_DN).and_then(parse_dn) else {
                continue;
            };
            let d = (m.station - station).abs();
            if best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, dn));
            }
        }
        best.map(|(_, dn)| dn)
    }

    /// Fitting members in station order.
    pub fn fitting_members<'d>(
        &self,
        doc: &'d Document,
    ) -> Vec<(Member, &'d pipegraph_model::FittingInstance)> {
        self.members
            .iter()
            .filter_map(|m| match doc.record(m.id).map(|r| &r.element) {
                Some(PipeElement::Fitting(f)) => Some((*m, f)),
                _ => None,
            })
            .collect()
    }
}

// ============================================================================
// Size arrays
// ============================================================================

/// One constant-attribute station range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeEntry {
    pub dn: f64,
    pub start_station: f64,
    pub end_station: f64,
    pub system: String,
    pub series: String,
}

/// Ordered, gap-free list of constant-attribute ranges covering exactly
/// `[0, end_station]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SizeArray {
    pub entries: Vec<SizeEntry>,
}

impl SizeArray {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The entry covering the given station.
    pub fn value_at(&self, station: f64) -> Option<&SizeEntry> {
        self.entries
            .iter()
            .find(|e| station >= e.start_station && station <= e.end_station)
            .or_else(|| {
                // Clamp queries slightly outside the axis to the outer entries.
                if station < 0.0 {
                    self.entries.first()
                } else {
                    self.entries.last()
                }
            })
    }

    /// Check the partition invariant: contiguous entries covering
    /// `[0, end_station]` with no gap or overlap larger than `eps`.
    pub fn partitions(&self, end_station: f64, eps: f64) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        if self.entries[0].start_station.abs() > eps {
            return false;
        }
        for w in self.entries.windows(2) {
            if (w[0].end_station - w[1].start_station).abs() > eps {
                return false;
            }
        }
        (self.entries[self.entries.len() - 1].end_station - end_station).abs() <= eps
    }
}
