//! Weld placement.
//!
//! Candidate weld markers come from two sources: stride cuts along every
//! pipe-run (one per consumed stock length, plus the true end) and the
//! named ports of every fitting. Candidates are then clustered by spatial
//! proximity; a cluster materializes into a single weld fitting when two or
//! more candidates coincide, or when a lone candidate sits mid-run (a
//! genuine cut weld). Lone free-end candidates are discarded.
//!
//! The pass is deterministic and idempotent for identical input and
//! tolerances. Materialization is chunked purely for progress feedback;
//! the whole pass commits through one transaction.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use pipegraph_model::attrs::{
    parse_dn, ATTR_DN, ATTR_DN_SECONDARY, ATTR_PIPELINE, ATTR_SERIES, ATTR_SYSTEM,
};
use pipegraph_model::geometry::dist;
use pipegraph_model::{
    Document, DocumentTransaction, EntityId, FittingInstance, FittingKind, Point2, Port, PortRole,
    StockTable, Tolerances,
};

use crate::forest::PipelineForest;
use crate::length::stock_for;
use crate::pipeline::{Pipeline, SizeArray};

/// Batch size for progress feedback during materialization. Not a commit
/// boundary: the whole pass is one transaction.
const MATERIALIZE_CHUNK: usize = 25;

/// A candidate weld location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeldMarker {
    pub position: Point2,
    pub pipeline: String,
    pub station: f64,
    pub dn: Option<f64>,
    pub system: Option<String>,
    pub series: Option<String>,
    /// True for stride cuts in the interior of a run; a lone interior
    /// marker still materializes (mid-run weld).
    pub interior: bool,
    pub source: EntityId,
}

/// A cluster that survived materialization rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializedWeld {
    pub position: Point2,
    pub pipeline: String,
    pub dn: f64,
    pub system: String,
    pub series: String,
    pub members: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeldPlacement {
    pub markers: Vec<WeldMarker>,
    pub welds: Vec<MaterializedWeld>,
    /// Clusters skipped for missing required attributes.
    pub skipped: usize,
}

/// Compute weld candidates for the whole forest and cluster them.
pub fn place_welds(
    forest: &PipelineForest,
    doc: &Document,
    size_arrays: &BTreeMap<String, SizeArray>,
    stock: &StockTable,
    tol: &Tolerances,
) -> Result<WeldPlacement> {
    let mut markers = Vec::new();

    for node_id in forest.depth_first() {
        let pipeline = &forest.node(node_id).pipeline;
        let sizes = size_arrays.get(&pipeline.name);
        run_markers(pipeline, sizes, doc, stock, tol, &mut markers);
        fitting_markers(pipeline, sizes, doc, &mut markers);
    }

    let (welds, skipped) = cluster(&mut markers, tol);
    Ok(WeldPlacement {
        markers,
        welds,
        skipped,
    })
}

// ============================================================================
// Candidates
// ============================================================================

/// Stride cuts along each pipe-run plus the true end marker.
fn run_markers(
    pipeline: &Pipeline,
    sizes: Option<&SizeArray>,
    doc: &Document,
    stock: &StockTable,
    tol: &Tolerances,
    out: &mut Vec<WeldMarker>,
) {
    for (member, run) in pipeline.run_members(doc) {
        let length = run.length();
        if length <= 0.0 {
            continue;
        }

        if let Some(stride) = stock_for(doc, stock, member.id) {
            let mut local = stride;
            // A final remainder within the slack of a full stride extends
            // the last stride to the end instead of leaving a sliver.
            while local < length - tol.weld_stride_slack {
                push_run_marker(pipeline, sizes, doc, member.id, run, local, true, out);
                local += stride;
            }
        } else {
            tracing::warn!(
                run = member.id,
                pipeline = %pipeline.name,
                "no stock length configured; emitting end marker only"
            );
        }

        push_run_marker(pipeline, sizes, doc, member.id, run, length, false, out);
    }
}

#[allow(clippy::too_many_arguments)]
fn push_run_marker(
    pipeline: &Pipeline,
    sizes: Option<&SizeArray>,
    doc: &Document,
    id: EntityId,
    run: &pipegraph_model::PipeRun,
    local_station: f64,
    interior: bool,
    out: &mut Vec<WeldMarker>,
) {
    let Some(position) = run.curve.point_at(local_station) else {
        return;
    };
    let station = pipeline
        .curve
        .project(position)
        .map(|p| p.station)
        .unwrap_or(0.0);
    let entry = sizes.and_then(|s| s.value_at(station));
    out.push(WeldMarker {
        position,
        pipeline: pipeline.name.clone(),
        station,
        dn: entry
            .map(|e| e.dn)
            .or_else(|| doc.read_attribute(id, ATTR_DN).and_then(parse_dn)),
        system: entry
            .map(|e| e.system.clone())
            .or_else(|| doc.read_attribute(id, ATTR_SYSTEM).map(str::to_string)),
        series: entry
            .map(|e| e.series.clone())
            .or_else(|| doc.read_attribute(id, ATTR_SERIES).map(str::to_string)),
        interior,
        source: id,
    });
}

/// One weld candidate per named fitting port. The diameter depends on the
/// port role and the fitting:
/// - branch ports read the fitting's secondary diameter,
/// - reducer ports read the size array at the port's station,
/// - main/neutral ports read the primary diameter.
fn fitting_markers(
    pipeline: &Pipeline,
    sizes: Option<&SizeArray>,
    doc: &Document,
    out: &mut Vec<WeldMarker>,
) {
    for (member, fitting) in pipeline.fitting_members(doc) {
        // Existing weld fittings are output of a previous pass, not input.
        if fitting.kind == FittingKind::Weld {
            continue;
        }
        for port in &fitting.ports {
            let station = pipeline
                .curve
                .project(port.position)
                .map(|p| p.station)
                .unwrap_or(member.station);
            let entry = sizes.and_then(|s| s.value_at(station));

            let dn = match (port.role, &fitting.kind) {
                (PortRole::Branch, _) => doc
                    .read_attribute(member.id, ATTR_DN_SECONDARY)
                    .and_then(parse_dn),
                (_, FittingKind::Reducer) => entry.map(|e| e.dn),
                _ => doc.read_attribute(member.id, ATTR_DN).and_then(parse_dn),
            };

            out.push(WeldMarker {
                position: port.position,
                pipeline: pipeline.name.clone(),
                station,
                dn,
                system: entry
                    .map(|e| e.system.clone())
                    .or_else(|| doc.read_attribute(member.id, ATTR_SYSTEM).map(str::to_string)),
                series: entry
                    .map(|e| e.series.clone())
                    .or_else(|| doc.read_attribute(member.id, ATTR_SERIES).map(str::to_string)),
                interior: false,
                source: member.id,
            });
        }
    }
}

// ============================================================================
// Clustering
// ============================================================================

/// Sort markers by position and group them greedily by proximity, then
/// apply the materialization rules. Returns welds plus the skip count.
fn cluster(markers: &mut Vec<WeldMarker>, tol: &Tolerances) -> (Vec<MaterializedWeld>, usize) {
    markers.sort_by(|a, b| {
        a.position
            .partial_cmp(&b.position)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.source.cmp(&b.source))
    });

    let n = markers.len();
    let mut cluster_of = vec![usize::MAX; n];
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    for i in 0..n {
        if cluster_of[i] != usize::MAX {
            continue;
        }
        let id = clusters.len();
        cluster_of[i] = id;
        let mut members = vec![i];
        for j in (i + 1)..n {
            if cluster_of[j] == usize::MAX
                && dist(markers[i].position, markers[j].position) <= tol.weld_cluster
            {
                cluster_of[j] = id;
                members.push(j);
            }
        }
        clusters.push(members);
    }

    let mut welds = Vec::new();
    let mut skipped = 0;

    for members in clusters {
        let seed = &markers[members[0]];
        let lone_free_end = members.len() == 1 && !seed.interior;
        if lone_free_end {
            continue;
        }

        // Representative attributes: first non-default value found in
        // cluster order for each required attribute.
        let dn = members.iter().find_map(|&i| markers[i].dn);
        let system = members
            .iter()
            .find_map(|&i| markers[i].system.clone().filter(|s| !s.is_empty()));
        let series = members
            .iter()
            .find_map(|&i| markers[i].series.clone().filter(|s| !s.is_empty()));

        match (dn, system, series) {
            (Some(dn), Some(system), Some(series)) => welds.push(MaterializedWeld {
                position: seed.position,
                pipeline: seed.pipeline.clone(),
                dn,
                system,
                series,
                members: members.len(),
            }),
            _ => {
                tracing::warn!(
                    position = ?seed.position,
                    pipeline = %seed.pipeline,
                    "weld cluster missing required attributes; skipped"
                );
                skipped += 1;
            }
        }
    }

    (welds, skipped)
}

// ============================================================================
// Materialization
// ============================================================================

/// Buffer one weld fitting per materialized cluster. Chunked progress
/// logging only; the caller commits the transaction once.
pub fn materialize(placement: &WeldPlacement, txn: &mut DocumentTransaction) -> Vec<EntityId> {
    let mut created = Vec::with_capacity(placement.welds.len());

    for chunk in placement.welds.chunks(MATERIALIZE_CHUNK) {
        for weld in chunk {
            let mut attrs = BTreeMap::new();
            attrs.insert(ATTR_PIPELINE.to_string(), weld.pipeline.clone());
            attrs.insert(ATTR_DN.to_string(), format!("{}", weld.dn));
            attrs.insert(ATTR_SYSTEM.to_string(), weld.system.clone());
            attrs.insert(ATTR_SERIES.to_string(), weld.series.clone());
            let id = txn.create_fitting(
                FittingInstance {
                    kind: FittingKind::Weld,
                    ports: vec![Port {
                        name: "W1".to_string(),
                        position: weld.position,
                        role: PortRole::Neutral,
                    }],
                },
                attrs,
            );
            created.push(id);
        }
        tracing::info!(
            placed = created.len(),
            total = placement.welds.len(),
            "weld materialization progress"
        );
    }

    created
}
