//! Flow-direction normalization.
//!
//! Supply flow enters each pipeline at its connection point (toward the
//! parent, or the supply end for a root) and runs outward in both station
//! directions. Pipe-runs on the low-station side of the connection must be
//! oriented against the station axis, runs beyond it with the axis; any run
//! violating this is reversed in place via the transaction.
//!
//! A pipeline whose connection point cannot be determined is skipped and
//! reported — not silently ignored.

use pipegraph_model::{Document, DocumentTransaction, EntityId, Tolerances};

use crate::forest::{NodeId, PipelineForest};
use crate::pipeline::Pipeline;

/// Result of one normalization pass.
#[derive(Debug, Default)]
pub struct DirectionOutcome {
    pub reversed: Vec<EntityId>,
    /// Names of pipelines skipped for want of a connection point.
    pub skipped: Vec<String>,
    /// Connection station per forest node, reused downstream as the length
    /// check anchor.
    pub connection_stations: Vec<Option<f64>>,
}

/// Normalize every pipeline in the forest, buffering reversals in `txn`.
pub fn normalize(
    forest: &PipelineForest,
    doc: &Document,
    txn: &mut DocumentTransaction,
    tol: &Tolerances,
) -> DirectionOutcome {
    let mut outcome = DirectionOutcome {
        reversed: Vec::new(),
        skipped: Vec::new(),
        connection_stations: vec![None; forest.len()],
    };

    for node_id in forest.depth_first() {
        let pipeline = &forest.node(node_id).pipeline;
        match connection_station(forest, node_id, doc, tol) {
            Some(station) => {
                outcome.connection_stations[node_id] = Some(station);
                normalize_pipeline(pipeline, station, doc, txn, &mut outcome.reversed);
            }
            None => {
                tracing::warn!(
                    pipeline = %pipeline.name,
                    "no connection point found; direction left as authored"
                );
                outcome.skipped.push(pipeline.name.clone());
            }
        }
    }

    outcome
}

/// Station (on the node's own curve) where supply enters the pipeline.
pub fn connection_station(
    forest: &PipelineForest,
    node_id: NodeId,
    doc: &Document,
    tol: &Tolerances,
) -> Option<f64> {
    let node = forest.node(node_id);
    let pipeline = &node.pipeline;
    let (start, end) = pipeline.endpoints()?;

    match node.parent {
        Some(parent_id) => {
            let parent = &forest.node(parent_id).pipeline;
            let mut best: Option<(f64, f64)> = None;

            // Coincidence of one of our ends with the parent curve.
            for (point, station) in [(start, 0.0), (end, pipeline.end_station)] {
                if let Some(d) = parent.curve.distance_to(point) {
                    if d <= tol.connectivity && best.map_or(true, |(bd, _)| d < bd) {
                        best = Some((d, station));
                    }
                }
            }
            // Branch-off: a parent end projected onto our curve.
            if let Some((p_start, p_end)) = parent.endpoints() {
                for point in [p_start, p_end] {
                    if let Some(pr) = pipeline.curve.project(point) {
                        if pr.distance <= tol.connectivity
                            && best.map_or(true, |(bd, _)| pr.distance < bd)
                        {
                            best = Some((pr.distance, pr.station));
                        }
                    }
                }
            }
            best.map(|(_, station)| station)
        }
        None => {
            if node.children.is_empty() {
                // Leaf root: supply sits at the max-diameter end.
                return Some(max_diameter_end(pipeline, doc));
            }
            // Root with children: the end not shared with any child.
            let child_curves: Vec<&Pipeline> = node
                .children
                .iter()
                .map(|&c| &forest.node(c).pipeline)
                .collect();
            let free = |p| {
                !child_curves
                    .iter()
                    .any(|c| c.curve.distance_to(p).map_or(false, |d| d <= tol.connectivity))
            };
            match (free(start), free(end)) {
                (true, false) => Some(0.0),
                (false, true) => Some(pipeline.end_station),
                (true, true) => Some(max_diameter_end(pipeline, doc)),
                (false, false) => None,
            }
        }
    }
}

fn max_diameter_end(pipeline: &Pipeline, doc: &Document) -> f64 {
    let near_start = pipeline.diameter_near(doc, 0.0).unwrap_or(0.0);
    let near_end = pipeline.diameter_near(doc, pipeline.end_station).unwrap_or(0.0);
    if near_end > near_start {
        pipeline.end_station
    } else {
        0.0
    }
}

/// Reverse every member run whose local orientation disagrees with the flow
/// implied by the connection station.
fn normalize_pipeline(
    pipeline: &Pipeline,
    connection: f64,
    doc: &Document,
    txn: &mut DocumentTransaction,
    reversed: &mut Vec<EntityId>,
) {
    for (member, run) in pipeline.run_members(doc) {
        let (Some(start), Some(end)) = (run.curve.start(), run.curve.end()) else {
            continue;
        };
        let (Some(s_start), Some(s_end)) = (
            pipeline.curve.project(start).map(|p| p.station),
            pipeline.curve.project(end).map(|p| p.station),
        ) else {
            continue;
        };

        let mid = (s_start + s_end) / 2.0;
        let with_flow = s_end > s_start;
        let should_be_with_flow = mid >= connection;

        if with_flow != should_be_with_flow {
            txn.reverse_run(member.id);
            reversed.push(member.id);
        }
    }
}
