//! Stock-length checking.
//!
//! Pipe-runs must consume whole stock lengths; a remainder outside the
//! length tolerance is either correctable (a reducer borders the run and
//! could shift to absorb the gap) or a soft mismatch to report. Segments
//! are reducer-delimited: any other fitting bounds the correctable zone.
//!
//! Only detection is performed here. A correction candidate records the
//! reducer and the missing length; actually repositioning the reducer is a
//! policy decision left to the caller.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use pipegraph_model::attrs::{parse_dn, ATTR_DN, ATTR_SERIES, ATTR_SYSTEM, ATTR_ZONE};
use pipegraph_model::{Document, EntityId, FittingKind, StockTable, Tolerances, TopologyError};

use crate::pipeline::Pipeline;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MismatchKind {
    /// No stock length configured for the run's zone/system/series/DN.
    NoStockLength,
    /// Remainder out of tolerance with no correctable boundary.
    Remainder { stock: f64, remainder: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LengthMismatch {
    pub run: EntityId,
    pub length: f64,
    #[serde(flatten)]
    pub kind: MismatchKind,
}

/// A non-compliant run that a bordering reducer could absorb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionCandidate {
    pub run: EntityId,
    pub reducer: EntityId,
    /// Length the reducer would have to shift for the run to consume whole
    /// stock lengths.
    pub missing: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LengthReport {
    pub pipeline: String,
    pub ok: usize,
    pub mismatches: Vec<LengthMismatch>,
    pub candidates: Vec<CorrectionCandidate>,
}

/// Stock length for a pipe-run, resolved through its attributes.
pub fn stock_for(doc: &Document, stock: &StockTable, id: EntityId) -> Option<f64> {
    let dn = doc.read_attribute(id, ATTR_DN).and_then(parse_dn)?;
    let system = doc.read_attribute(id, ATTR_SYSTEM)?;
    let series = doc.read_attribute(id, ATTR_SERIES)?;
    let zone = doc.read_attribute(id, ATTR_ZONE);
    stock.stock_length(zone, system, series, dn)
}

/// Reducer-delimited member segments, each in station order.
///
/// DFS over adjacency restricted to the pipeline's members; traversal
/// passes through runs and reducers only, so any other fitting terminates
/// the segment it borders.
pub fn segments(pipeline: &Pipeline, doc: &Document) -> Vec<Vec<EntityId>> {
    let in_segment = |id: EntityId| -> bool {
        if doc.run(id).is_some() {
            return true;
        }
        matches!(doc.fitting(id).map(|f| &f.kind), Some(FittingKind::Reducer))
    };

    let mut visited: Vec<EntityId> = Vec::new();
    let mut out = Vec::new();

    for member in &pipeline.members {
        if visited.contains(&member.id) || !in_segment(member.id) {
            continue;
        }
        let mut segment = Vec::new();
        let mut stack = vec![member.id];
        while let Some(id) = stack.pop() {
            if visited.contains(&id) {
                continue;
            }
            visited.push(id);
            segment.push(id);
            for edge in doc.neighbors(id) {
                let n = edge.other_id;
                if pipeline.contains(n) && in_segment(n) && !visited.contains(&n) {
                    stack.push(n);
                }
            }
        }
        segment.sort_by(|a, b| {
            let sa = pipeline.station_of(*a).unwrap_or(0.0);
            let sb = pipeline.station_of(*b).unwrap_or(0.0);
            sa.partial_cmp(&sb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(b))
        });
        out.push(segment);
    }
    out
}

/// Check every run of the pipeline against stock lengths, walking each
/// reducer-delimited segment outward from the anchor station in both
/// directions. Never silently drops an inconsistency.
pub fn check_lengths(
    pipeline: &Pipeline,
    anchor_station: f64,
    doc: &Document,
    stock: &StockTable,
    tol: &Tolerances,
) -> Result<LengthReport> {
    let mut report = LengthReport {
        pipeline: pipeline.name.clone(),
        ..Default::default()
    };

    for segment in segments(pipeline, doc) {
        // Index whose member sits closest to the anchor.
        let anchor_idx = segment
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = (pipeline.station_of(**a).unwrap_or(0.0) - anchor_station).abs();
                let db = (pipeline.station_of(**b).unwrap_or(0.0) - anchor_station).abs();
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
            .unwrap_or(0);

        // The anchor member joins the walk on the side it extends toward.
        let anchor_member_station = pipeline
            .station_of(segment[anchor_idx])
            .unwrap_or(anchor_station);
        let anchor_goes_up = anchor_member_station >= anchor_station;
        let down: Vec<usize> = if anchor_goes_up {
            (0..anchor_idx).rev().collect()
        } else {
            (0..=anchor_idx).rev().collect()
        };
        let up: Vec<usize> = if anchor_goes_up {
            (anchor_idx..segment.len()).collect()
        } else {
            (anchor_idx + 1..segment.len()).collect()
        };

        for order in [down, up] {
            walk_segment(&segment, &order, pipeline, doc, stock, tol, &mut report)?;
        }
    }

    Ok(report)
}

fn walk_segment(
    segment: &[EntityId],
    order: &[usize],
    pipeline: &Pipeline,
    doc: &Document,
    stock: &StockTable,
    tol: &Tolerances,
    report: &mut LengthReport,
) -> Result<()> {
    for (pos, &idx) in order.iter().enumerate() {
        let id = segment[idx];
        let Some(run) = doc.run(id) else {
            continue; // reducers carry no length constraint of their own
        };
        let length = run.length();

        let Some(stock_len) = stock_for(doc, stock, id) else {
            report.mismatches.push(LengthMismatch {
                run: id,
                length,
                kind: MismatchKind::NoStockLength,
            });
            continue;
        };

        let remainder = length % stock_len;
        if remainder < tol.length || stock_len - remainder < tol.length {
            report.ok += 1;
            continue;
        }

        // Non-compliant: what comes next in walk order decides.
        let next = order
            .get(pos + 1)
            .map(|&i| segment[i])
            .or_else(|| boundary_beyond(id, segment, pipeline, doc));

        match next.map(|n| (n, doc.record(n).map(|r| &r.element))) {
            None => {
                // Free end: nothing to absorb the remainder.
                report.mismatches.push(LengthMismatch {
                    run: id,
                    length,
                    kind: MismatchKind::Remainder {
                        stock: stock_len,
                        remainder,
                    },
                });
                break;
            }
            Some((_, Some(pipegraph_model::PipeElement::Run(_)))) => {
                // Two runs with nothing between them violates the
                // reducer-delimited segment invariant.
                return Err(TopologyError::SegmentStructure { id }.into());
            }
            Some((n, Some(pipegraph_model::PipeElement::Fitting(f)))) => {
                if f.kind == FittingKind::Reducer {
                    report.candidates.push(CorrectionCandidate {
                        run: id,
                        reducer: n,
                        missing: stock_len - remainder,
                    });
                } else {
                    // Boundary of the correctable zone.
                    report.mismatches.push(LengthMismatch {
                        run: id,
                        length,
                        kind: MismatchKind::Remainder {
                            stock: stock_len,
                            remainder,
                        },
                    });
                    break;
                }
            }
            Some((_, None)) => {}
        }
    }
    Ok(())
}

/// The pipeline member just beyond the segment's end in walk direction:
/// an adjacency neighbor of `id` that is a member but not in the segment
/// (i.e. the terminating fitting), if any.
fn boundary_beyond(
    id: EntityId,
    segment: &[EntityId],
    pipeline: &Pipeline,
    doc: &Document,
) -> Option<EntityId> {
    doc.neighbors(id)
        .iter()
        .map(|e| e.other_id)
        .find(|n| pipeline.contains(*n) && !segment.contains(n))
}
