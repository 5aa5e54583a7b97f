//! End-of-run reporting.
//!
//! Fatal errors abort the command; everything softer lands here and is
//! rendered as a textual summary (and serialized to JSON on request).

use serde::{Deserialize, Serialize};

use crate::length::{LengthReport, MismatchKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub timestamp: String,
    pub pipelines: usize,
    pub roots: usize,
    pub reversed_runs: usize,
    /// Pipelines skipped during direction normalization.
    pub direction_skipped: Vec<String>,
    pub size_entries: usize,
    pub length: Vec<LengthReport>,
    pub welds_placed: usize,
    pub welds_skipped: usize,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            ..Default::default()
        }
    }

    pub fn soft_error_count(&self) -> usize {
        self.direction_skipped.len()
            + self.welds_skipped
            + self
                .length
                .iter()
                .map(|l| l.mismatches.len())
                .sum::<usize>()
    }

    /// Plain-text summary; the CLI adds color on top.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!(
            "{} pipelines in {} trees, {} size entries",
            self.pipelines, self.roots, self.size_entries
        ));
        lines.push(format!("{} pipe-runs reversed", self.reversed_runs));
        for name in &self.direction_skipped {
            lines.push(format!(
                "warning: {name}: no connection point, direction left as authored"
            ));
        }
        for report in &self.length {
            let compliant = report.ok;
            lines.push(format!(
                "{}: {compliant} runs at stock length, {} mismatches, {} correctable at reducers",
                report.pipeline,
                report.mismatches.len(),
                report.candidates.len()
            ));
            for m in &report.mismatches {
                match &m.kind {
                    MismatchKind::NoStockLength => {
                        lines.push(format!(
                            "  run #{}: no stock length configured (length {:.3})",
                            m.run, m.length
                        ));
                    }
                    MismatchKind::Remainder { stock, remainder } => {
                        lines.push(format!(
                            "  run #{}: length {:.3} leaves {:.3} over stock {:.1}",
                            m.run, m.length, remainder, stock
                        ));
                    }
                }
            }
            for c in &report.candidates {
                lines.push(format!(
                    "  run #{}: reducer #{} could shift {:.3}",
                    c.run, c.reducer, c.missing
                ));
            }
        }
        lines.push(format!(
            "{} welds placed, {} clusters skipped",
            self.welds_placed, self.welds_skipped
        ));
        lines.join("\n")
    }
}
