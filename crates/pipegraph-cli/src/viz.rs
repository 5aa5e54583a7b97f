//! Visualization / exploration helpers.
//!
//! This module intentionally lives in the CLI crate: it is tooling and can
//! evolve without touching the topology semantics. The goal is to make the
//! supply forest easy to inspect with external tools.
//!
//! Output formats:
//! - Graphviz DOT (best-in-class layout, external tooling)
//! - JSON (for custom frontends)

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use pipegraph_model::Document;
use pipegraph_topology::PipelineForest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VizFormat {
    Dot,
    Json,
}

impl VizFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dot" => Ok(Self::Dot),
            "json" => Ok(Self::Json),
            other => Err(anyhow!("unknown viz format `{other}` (expected dot|json)")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VizNode {
    pub id: usize,
    pub name: String,
    pub members: usize,
    pub synthesized: bool,
    pub root: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_dn: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VizEdge {
    pub from: usize,
    pub to: usize,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VizGraph {
    pub nodes: Vec<VizNode>,
    pub edges: Vec<VizEdge>,
}

/// Build the supply-forest graph description.
pub fn forest_graph(forest: &PipelineForest, doc: &Document) -> VizGraph {
    let mut nodes = Vec::with_capacity(forest.len());
    let mut edges = Vec::new();

    for (id, node) in forest.nodes.iter().enumerate() {
        nodes.push(VizNode {
            id,
            name: node.pipeline.name.clone(),
            members: node.pipeline.members.len(),
            synthesized: node.pipeline.synthesized,
            root: node.parent.is_none(),
            max_dn: node.pipeline.max_diameter(doc),
        });
        for &child in &node.children {
            edges.push(VizEdge {
                from: id,
                to: child,
                label: "supplies".to_string(),
            });
        }
    }

    VizGraph { nodes, edges }
}

pub fn render(graph: &VizGraph, format: VizFormat) -> Result<String> {
    match format {
        VizFormat::Dot => Ok(to_dot(graph)),
        VizFormat::Json => Ok(serde_json::to_string_pretty(graph)?),
    }
}

fn to_dot(graph: &VizGraph) -> String {
    let mut out = String::from("digraph pipegraph {\n  rankdir=TB;\n  node [shape=box];\n");
    for node in &graph.nodes {
        let mut label = format!("{} ({} members)", node.name, node.members);
        if let Some(dn) = node.max_dn {
            label.push_str(&format!("\\nDN{dn}"));
        }
        let style = if node.root {
            ", style=bold"
        } else if node.synthesized {
            ", style=dashed"
        } else {
            ""
        };
        out.push_str(&format!("  n{} [label=\"{}\"{}];\n", node.id, label, style));
    }
    for edge in &graph.edges {
        out.push_str(&format!(
            "  n{} -> n{} [label=\"{}\"];\n",
            edge.from, edge.to, edge.label
        ));
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parse() {
        assert_eq!(VizFormat::parse("DOT").unwrap(), VizFormat::Dot);
        assert_eq!(VizFormat::parse(" json ").unwrap(), VizFormat::Json);
        assert!(VizFormat::parse("html").is_err());
    }

    #[test]
    fn dot_output_contains_nodes_and_edges() {
        let graph = VizGraph {
            nodes: vec![
                VizNode {
                    id: 0,
                    name: "L100".into(),
                    members: 3,
                    synthesized: false,
                    root: true,
                    max_dn: Some(300.0),
                },
                VizNode {
                    id: 1,
                    name: "NA-1".into(),
                    members: 2,
                    synthesized: true,
                    root: false,
                    max_dn: None,
                },
            ],
            edges: vec![VizEdge {
                from: 0,
                to: 1,
                label: "supplies".into(),
            }],
        };
        let dot = to_dot(&graph);
        assert!(dot.contains("n0 -> n1"));
        assert!(dot.contains("L100"));
        assert!(dot.contains("style=dashed"));
    }
}
