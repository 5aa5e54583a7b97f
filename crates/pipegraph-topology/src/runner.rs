//! Full-run orchestration.
//!
//! Stages run strictly in dependency order: assemble → forest → direction →
//! size arrays → length check → weld placement. Mutation is buffered per
//! stage and committed to the in-memory document between stages; nothing is
//! persisted here, so a fatal error anywhere leaves the caller's snapshot
//! untouched.

use std::collections::BTreeMap;

use anyhow::Result;

use pipegraph_model::{Document, DocumentTransaction, StockTable, Tolerances};

use crate::forest::{build_forest, PipelineForest};
use crate::pipeline::SizeArray;
use crate::report::RunReport;
use crate::{assembler, direction, length, size_array, weld};

#[derive(Debug)]
pub struct RunOutcome {
    pub forest: PipelineForest,
    pub size_arrays: BTreeMap<String, SizeArray>,
    pub report: RunReport,
    pub placement: weld::WeldPlacement,
}

/// Execute the whole pipeline over an in-memory document.
pub fn full_run(doc: &mut Document, stock: &StockTable, tol: &Tolerances) -> Result<RunOutcome> {
    let mut report = RunReport::new();

    let pipelines = assembler::assemble(doc, tol)?;
    report.pipelines = pipelines.len();
    tracing::info!(pipelines = pipelines.len(), "assembly complete");

    let forest = build_forest(pipelines, doc, tol)?;
    report.roots = forest.roots.len();

    let mut txn = DocumentTransaction::new(doc);
    let outcome = direction::normalize(&forest, doc, &mut txn, tol);
    report.reversed_runs = outcome.reversed.len();
    report.direction_skipped = outcome.skipped.clone();
    txn.commit(doc)?;

    let mut size_arrays = BTreeMap::new();
    for node_id in forest.depth_first() {
        let pipeline = &forest.node(node_id).pipeline;
        let sizes = size_array::compute(pipeline, doc, tol)?;
        report.size_entries += sizes.len();
        size_arrays.insert(pipeline.name.clone(), sizes);
    }

    for node_id in forest.depth_first() {
        let pipeline = &forest.node(node_id).pipeline;
        let anchor = outcome.connection_stations[node_id].unwrap_or(0.0);
        report
            .length
            .push(length::check_lengths(pipeline, anchor, doc, stock, tol)?);
    }

    let placement = weld::place_welds(&forest, doc, &size_arrays, stock, tol)?;
    report.welds_placed = placement.welds.len();
    report.welds_skipped = placement.skipped;

    let mut txn = DocumentTransaction::new(doc);
    weld::materialize(&placement, &mut txn);
    txn.commit(doc)?;

    Ok(RunOutcome {
        forest,
        size_arrays,
        report,
        placement,
    })
}
