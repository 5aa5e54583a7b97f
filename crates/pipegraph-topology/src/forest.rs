//! Supply-flow forest construction.
//!
//! Pipelines are clustered by endpoint coincidence and each cluster becomes
//! one rooted tree: the root is the supply side (maximum diameter, free-end
//! preferred), children attach by frontier expansion. Nodes live in an
//! arena and refer to each other by index, so the parent/child structure
//! carries no aliased references.
//!
//! The network is assumed to be a tree; a true cycle yields an arbitrary
//! (but deterministic) spanning assignment.

use std::collections::VecDeque;

use anyhow::Result;

use pipegraph_model::{Document, Tolerances};

use crate::pipeline::Pipeline;

pub type NodeId = usize;

#[derive(Debug)]
pub struct PipelineNode {
    pub pipeline: Pipeline,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Default)]
pub struct PipelineForest {
    pub nodes: Vec<PipelineNode>,
    pub roots: Vec<NodeId>,
}

impl PipelineForest {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &PipelineNode {
        &self.nodes[id]
    }

    pub fn pipeline_named(&self, name: &str) -> Option<&PipelineNode> {
        self.nodes.iter().find(|n| n.pipeline.name == name)
    }

    /// Node ids in depth-first order, each root's subtree in turn.
    pub fn depth_first(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        for &root in &self.roots {
            let mut stack = vec![root];
            while let Some(id) = stack.pop() {
                order.push(id);
                for &child in self.nodes[id].children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        order
    }
}

/// Endpoint coincidence within `eps`: an endpoint of either pipeline lies on
/// the other's topology curve. Symmetric by construction.
pub fn is_connected_to(a: &Pipeline, b: &Pipeline, eps: f64) -> bool {
    endpoint_on_curve(a, b, eps) || endpoint_on_curve(b, a, eps)
}

fn endpoint_on_curve(a: &Pipeline, b: &Pipeline, eps: f64) -> bool {
    let Some((start, end)) = a.endpoints() else {
        return false;
    };
    [start, end]
        .iter()
        .any(|&p| b.curve.distance_to(p).map_or(false, |d| d <= eps))
}

/// Build the supply forest over all pipelines.
pub fn build_forest(
    mut pipelines: Vec<Pipeline>,
    doc: &Document,
    tol: &Tolerances,
) -> Result<PipelineForest> {
    pipelines.sort_by(|a, b| a.name.cmp(&b.name));
    let n = pipelines.len();

    // Pairwise connectivity once, reused by clustering and attachment.
    let mut connected = vec![vec![false; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            if is_connected_to(&pipelines[i], &pipelines[j], tol.connectivity) {
                connected[i][j] = true;
                connected[j][i] = true;
            }
        }
    }

    let mut forest = PipelineForest {
        nodes: pipelines
            .into_iter()
            .map(|pipeline| PipelineNode {
                pipeline,
                parent: None,
                children: Vec::new(),
            })
            .collect(),
        roots: Vec::new(),
    };

    let mut assigned = vec![false; n];
    for start in 0..n {
        if assigned[start] {
            continue;
        }

        // Connected component of `start`.
        let mut cluster = Vec::new();
        let mut stack = vec![start];
        let mut in_cluster = vec![false; n];
        while let Some(i) = stack.pop() {
            if in_cluster[i] {
                continue;
            }
            in_cluster[i] = true;
            cluster.push(i);
            for j in 0..n {
                if connected[i][j] && !in_cluster[j] {
                    stack.push(j);
                }
            }
        }
        cluster.sort_unstable();

        let root = select_root(&cluster, &forest, &connected, doc, tol);
        forest.roots.push(root);
        assigned[root] = true;

        // Frontier expansion: attach unassigned connected members as
        // children until the cluster is exhausted.
        let mut frontier = VecDeque::from([root]);
        while let Some(node) = frontier.pop_front() {
            for &other in &cluster {
                if !assigned[other] && connected[node][other] {
                    assigned[other] = true;
                    forest.nodes[other].parent = Some(node);
                    forest.nodes[node].children.push(other);
                    frontier.push_back(other);
                }
            }
        }

        // A disconnected straggler inside the cluster cannot happen by
        // construction, but a cycle has now been spanned arbitrarily.
        for &i in &cluster {
            if !assigned[i] {
                assigned[i] = true;
                forest.roots.push(i);
            }
        }
    }

    tracing::debug!(
        pipelines = forest.nodes.len(),
        roots = forest.roots.len(),
        "supply forest built"
    );
    Ok(forest)
}

/// Root choice: maximum diameter across the cluster; among ties prefer a
/// pipeline whose max-diameter end is not shared with another cluster
/// member at that diameter (a true source), else the first candidate.
fn select_root(
    cluster: &[usize],
    forest: &PipelineForest,
    connected: &[Vec<bool>],
    doc: &Document,
    tol: &Tolerances,
) -> NodeId {
    let dn_of = |i: usize| forest.nodes[i].pipeline.max_diameter(doc).unwrap_or(0.0);
    let max_dn = cluster.iter().map(|&i| dn_of(i)).fold(0.0, f64::max);
    let candidates: Vec<usize> = cluster
        .iter()
        .copied()
        .filter(|&i| (dn_of(i) - max_dn).abs() < 1e-9)
        .collect();

    if candidates.len() == 1 {
        return candidates[0];
    }

    for &i in &candidates {
        if has_free_end_at(i, max_dn, cluster, forest, connected, doc, tol) {
            return i;
        }
    }
    candidates[0]
}

/// Does pipeline `i` have a curve end that no same-diameter cluster member
/// touches?
fn has_free_end_at(
    i: usize,
    max_dn: f64,
    cluster: &[usize],
    forest: &PipelineForest,
    connected: &[Vec<bool>],
    doc: &Document,
    tol: &Tolerances,
) -> bool {
    let Some((start, end)) = forest.nodes[i].pipeline.endpoints() else {
        return false;
    };
    'ends: for p in [start, end] {
        for &j in cluster {
            if j == i || !connected[i][j] {
                continue;
            }
            let other = &forest.nodes[j].pipeline;
            let same_dn = other
                .max_diameter(doc)
                .map_or(false, |dn| (dn - max_dn).abs() < 1e-9);
            if same_dn && other.curve.distance_to(p).map_or(false, |d| d <= tol.connectivity) {
                continue 'ends;
            }
        }
        return true;
    }
    false
}
