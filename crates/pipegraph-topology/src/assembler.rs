//! Pipeline assembly.
//!
//! Groups raw entities into pipelines. Entities naming a known reference
//! curve are bound to it; unreferenced ("NA") groups get a topology curve
//! synthesized by walking the group's own adjacency, anchored at the
//! nearest reference-bound neighborhood.
//!
//! Guarantees: every entity lands in exactly one pipeline, and the result
//! is deterministic for identical adjacency input (entities are visited in
//! ascending id order throughout).

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;

use pipegraph_model::attrs::{ATTR_PIPELINE, UNREFERENCED_GROUP};
use pipegraph_model::geometry::dist;
use pipegraph_model::{
    Document, EntityId, FittingInstance, PipeElement, Point2, Polyline, Tolerances, TopologyError,
    Vertex,
};

use crate::pipeline::{Member, Pipeline};

/// Group all document entities into pipelines.
pub fn assemble(doc: &Document, tol: &Tolerances) -> Result<Vec<Pipeline>> {
    let mut bound: BTreeMap<String, Vec<EntityId>> = BTreeMap::new();
    let mut unreferenced: BTreeSet<EntityId> = BTreeSet::new();

    for id in doc.ids() {
        let name = pipeline_name(doc, id);
        if name != UNREFERENCED_GROUP {
            if doc.reference_curve(&name).is_some() {
                bound.entry(name).or_default().push(id);
                continue;
            }
            tracing::warn!(
                entity = id,
                pipeline = %name,
                "no reference curve for named pipeline; treating as unreferenced"
            );
        }
        unreferenced.insert(id);
    }

    let mut pipelines = Vec::new();

    for (name, ids) in bound {
        let curve = doc
            .reference_curve(&name)
            .cloned()
            .unwrap_or_default();
        let members = project_members(&ids, &curve, doc);
        pipelines.push(Pipeline::new(name, members, curve, false));
    }

    for (index, component) in na_components(&unreferenced, doc).into_iter().enumerate() {
        let curve = synthesize_curve(&component, doc, tol)?;
        let ids: Vec<EntityId> = component.iter().copied().collect();
        let members = project_members(&ids, &curve, doc);
        pipelines.push(Pipeline::new(
            format!("{}-{}", UNREFERENCED_GROUP, index + 1),
            members,
            curve,
            true,
        ));
    }

    Ok(pipelines)
}

fn pipeline_name(doc: &Document, id: EntityId) -> String {
    doc.read_attribute(id, ATTR_PIPELINE)
        .unwrap_or(UNREFERENCED_GROUP)
        .to_string()
}

fn project_members(ids: &[EntityId], curve: &Polyline, doc: &Document) -> Vec<Member> {
    ids.iter()
        .filter_map(|&id| {
            let point = doc.record(id)?.element.anchor_point()?;
            let station = curve.project(point).map(|p| p.station).unwrap_or(0.0);
            Some(Member { id, station })
        })
        .collect()
}

/// Connected components of the unreferenced entity set, via adjacency
/// restricted to that set.
fn na_components(unreferenced: &BTreeSet<EntityId>, doc: &Document) -> Vec<BTreeSet<EntityId>> {
    let mut components = Vec::new();
    let mut seen: BTreeSet<EntityId> = BTreeSet::new();

    for &start in unreferenced {
        if seen.contains(&start) {
            continue;
        }
        let mut component = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if !component.insert(id) {
                continue;
            }
            seen.insert(id);
            for edge in doc.neighbors(id) {
                if unreferenced.contains(&edge.other_id) && !component.contains(&edge.other_id) {
                    stack.push(edge.other_id);
                }
            }
        }
        components.push(component);
    }
    components
}

// ============================================================================
// Topology-curve synthesis for unreferenced groups
// ============================================================================

/// Find an entity outside the component that is bound to a real reference
/// curve, reachable through adjacency (possibly through other unreferenced
/// groups, since NA subtrees nest). Returns the anchor together with the
/// component member the anchoring chain hangs off.
fn find_anchor(
    component: &BTreeSet<EntityId>,
    doc: &Document,
) -> Result<(EntityId, EntityId), TopologyError> {
    let mut visited: BTreeSet<EntityId> = component.clone();

    for &member in component {
        for edge in doc.neighbors(member) {
            if visited.contains(&edge.other_id) {
                continue;
            }
            let mut stack = vec![edge.other_id];
            while let Some(id) = stack.pop() {
                if !visited.insert(id) {
                    continue;
                }
                let name = pipeline_name(doc, id);
                if name != UNREFERENCED_GROUP && doc.reference_curve(&name).is_some() {
                    return Ok((id, member));
                }
                for next in doc.neighbors(id) {
                    if !visited.contains(&next.other_id) {
                        stack.push(next.other_id);
                    }
                }
            }
        }
    }

    Err(TopologyError::NoConnectingNode {
        id: component.iter().next().copied().unwrap_or(0),
    })
}

/// Walk the component's members from the anchor side, splicing pipe-run
/// vertices directly and bridging fitting ports with straight connectors.
fn synthesize_curve(
    component: &BTreeSet<EntityId>,
    doc: &Document,
    tol: &Tolerances,
) -> Result<Polyline> {
    let (anchor, entry) = find_anchor(component, doc)?;
    let anchor_point = doc
        .record(anchor)
        .and_then(|r| r.element.anchor_point())
        .unwrap_or([0.0, 0.0]);

    let mut curve = Polyline::default();
    let mut cur = anchor_point;
    let mut visited: BTreeSet<EntityId> = BTreeSet::new();
    let mut stack = vec![entry];
    let mut last_fitting: Option<&FittingInstance> = None;

    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        let Some(record) = doc.record(id) else {
            continue;
        };
        match &record.element {
            PipeElement::Run(run) => {
                last_fitting = None;
                cur = splice_run(&mut curve, &run.curve, cur, tol);
            }
            PipeElement::Fitting(fitting) => {
                last_fitting = Some(fitting);
                cur = splice_fitting(&mut curve, fitting, cur, component, &visited, doc, tol);
            }
        }

        // Descending push order so the smallest unvisited neighbor
        // continues the walk first.
        let mut next: Vec<EntityId> = doc
            .neighbors(id)
            .iter()
            .map(|e| e.other_id)
            .filter(|n| component.contains(n) && !visited.contains(n))
            .collect();
        next.sort_unstable();
        for n in next.into_iter().rev() {
            stack.push(n);
        }
    }

    // All members visited but the curve still ends inside the last fitting:
    // close the dangling end with the port farthest from the current point.
    if let Some(fitting) = last_fitting {
        if let Some(far) = farthest_port(fitting, cur) {
            if dist(far, cur) > tol.curve_joint {
                curve.push(Vertex::new(far[0], far[1]));
            }
        }
    }

    Ok(curve)
}

/// Append a run's vertices oriented away from the current point.
fn splice_run(curve: &mut Polyline, run: &Polyline, cur: Point2, tol: &Tolerances) -> Point2 {
    let (Some(start), Some(end)) = (run.start(), run.end()) else {
        return cur;
    };
    let mut oriented = run.clone();
    if dist(end, cur) < dist(start, cur) {
        oriented.reverse();
    }
    if curve.vertices.is_empty() {
        curve.vertices = oriented.vertices;
    } else {
        curve.extend_with(&oriented, tol.curve_joint);
    }
    curve.end().unwrap_or(cur)
}

/// Append the fitting's entry port and, when the walk continues, the exit
/// port nearest the next unvisited member. Consecutive ports become
/// straight connector segments.
fn splice_fitting(
    curve: &mut Polyline,
    fitting: &FittingInstance,
    cur: Point2,
    component: &BTreeSet<EntityId>,
    visited: &BTreeSet<EntityId>,
    doc: &Document,
    tol: &Tolerances,
) -> Point2 {
    let Some(entry) = nearest_port(fitting, cur) else {
        return cur;
    };
    let mut cur = push_point(curve, entry, cur, tol);

    // Anchor point of the closest unvisited component member, if any.
    let next_point = component
        .iter()
        .filter(|id| !visited.contains(id))
        .filter_map(|&id| doc.record(id)?.element.anchor_point())
        .min_by(|a, b| {
            dist(*a, cur)
                .partial_cmp(&dist(*b, cur))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

    if let Some(target) = next_point {
        let exit = fitting
            .ports
            .iter()
            .map(|p| p.position)
            .filter(|p| dist(*p, cur) > tol.curve_joint)
            .min_by(|a, b| {
                dist(*a, target)
                    .partial_cmp(&dist(*b, target))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        if let Some(exit) = exit {
            cur = push_point(curve, exit, cur, tol);
        }
    }
    cur
}

fn push_point(curve: &mut Polyline, p: Point2, cur: Point2, tol: &Tolerances) -> Point2 {
    if curve.vertices.is_empty() || dist(p, curve.end().unwrap_or(cur)) > tol.curve_joint {
        curve.push(Vertex::new(p[0], p[1]));
    }
    p
}

fn nearest_port(fitting: &FittingInstance, p: Point2) -> Option<Point2> {
    fitting
        .ports
        .iter()
        .map(|port| port.position)
        .min_by(|a, b| {
            dist(*a, p)
                .partial_cmp(&dist(*b, p))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

fn farthest_port(fitting: &FittingInstance, p: Point2) -> Option<Point2> {
    fitting
        .ports
        .iter()
        .map(|port| port.position)
        .max_by(|a, b| {
            dist(*a, p)
                .partial_cmp(&dist(*b, p))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}
