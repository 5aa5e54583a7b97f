//! Size-array computation.
//!
//! Segments a pipeline into constant-attribute (DN / system / series)
//! station ranges covering exactly `[0, end_station]`. Strategy is chosen
//! by content inspection:
//!
//! 1. a single pipe-run with no size-delimiting fittings — one entry read
//!    from that run;
//! 2. no size-delimiting fittings at all — one entry, resolved by scanning
//!    members in station order with pipe-run attributes preferred;
//! 3. explicit markers — per-interval resolution, with the complementary
//!    paired-value rule at ambiguous transition fittings.
//!
//! An entry that cannot be resolved on either side is fatal: downstream
//! stages assume total resolution.

use anyhow::Result;

use pipegraph_model::attrs::{
    parse_dn, parse_dn_pair, ATTR_DN, ATTR_DN_SECONDARY, ATTR_SERIES, ATTR_SYSTEM,
    ATTR_SYSTEM_SECONDARY,
};
use pipegraph_model::{AttributeError, Document, EntityId, FittingKind, Tolerances};

use crate::pipeline::{Member, Pipeline, SizeArray, SizeEntry};

/// Compute the size array for one pipeline.
pub fn compute(pipeline: &Pipeline, doc: &Document, tol: &Tolerances) -> Result<SizeArray> {
    let markers = size_markers(pipeline, doc, tol);

    if markers.is_empty() {
        return single_entry(pipeline, doc);
    }
    marker_intervals(pipeline, doc, &markers)
}

/// Size-delimiting fittings in station order, with spurious termination
/// artifacts (a material transition sitting on the axis boundary) trimmed.
fn size_markers(pipeline: &Pipeline, doc: &Document, tol: &Tolerances) -> Vec<(Member, FittingKind)> {
    let mut markers: Vec<(Member, FittingKind)> = pipeline
        .fitting_members(doc)
        .into_iter()
        .filter(|(_, f)| f.kind.delimits_size_range())
        .map(|(m, f)| (m, f.kind.clone()))
        .collect();

    let spurious_head = markers.first().map_or(false, |(m, kind)| {
        *kind == FittingKind::MaterialTransition && m.station <= tol.end_marker_trim
    });
    if spurious_head {
        markers.remove(0);
    }
    let spurious_tail = markers.last().map_or(false, |(m, kind)| {
        *kind == FittingKind::MaterialTransition
            && m.station >= pipeline.end_station - tol.end_marker_trim
    });
    if spurious_tail {
        markers.pop();
    }
    markers
}

// ============================================================================
// Strategies 1 & 2: no markers
// ============================================================================

fn single_entry(pipeline: &Pipeline, doc: &Document) -> Result<SizeArray> {
    let runs = pipeline.run_members(doc);
    let offender = pipeline
        .members
        .first()
        .map(|m| m.id)
        .unwrap_or_default();

    let resolved = if runs.len() == 1 && pipeline.members.len() == 1 {
        // Lone pipe-run: read it directly.
        resolve_from(&[runs[0].0], doc)
    } else {
        // Mixed members: runs first, then fittings, in station order.
        let run_members: Vec<Member> = runs.iter().map(|(m, _)| *m).collect();
        let fitting_members: Vec<Member> = pipeline
            .fitting_members(doc)
            .iter()
            .map(|(m, _)| *m)
            .collect();
        let mut r = resolve_from(&run_members, doc);
        r.fill_from(&resolve_from(&fitting_members, doc));
        r
    };

    let entry = resolved
        .into_entry(0.0, pipeline.end_station)
        .ok_or(AttributeError::Unresolved { id: offender })?;
    Ok(SizeArray {
        entries: vec![entry],
    })
}

// ============================================================================
// Strategy 3: explicit markers
// ============================================================================

fn marker_intervals(
    pipeline: &Pipeline,
    doc: &Document,
    markers: &[(Member, FittingKind)],
) -> Result<SizeArray> {
    // Interval k spans boundaries[k]..boundaries[k + 1]; marker k sits
    // between intervals k and k + 1.
    let mut boundaries = vec![0.0];
    boundaries.extend(markers.iter().map(|(m, _)| m.station));
    boundaries.push(pipeline.end_station);

    let marker_ids: Vec<EntityId> = markers.iter().map(|(m, _)| m.id).collect();
    let mut intervals: Vec<Resolved> = boundaries
        .windows(2)
        .map(|w| {
            let inside: Vec<Member> = pipeline
                .members
                .iter()
                .filter(|m| !marker_ids.contains(&m.id))
                .filter(|m| m.station >= w[0] - 1e-9 && m.station <= w[1] + 1e-9)
                .copied()
                .collect();
            let runs: Vec<Member> = inside
                .iter()
                .filter(|m| doc.run(m.id).is_some())
                .copied()
                .collect();
            let fittings: Vec<Member> = inside
                .iter()
                .filter(|m| doc.fitting(m.id).is_some())
                .copied()
                .collect();
            let mut r = resolve_from(&runs, doc);
            r.fill_from(&resolve_from(&fittings, doc));
            r
        })
        .collect();

    // Propagate across markers until nothing changes. Two sweeps usually
    // suffice; the loop is bounded by the attribute count per interval.
    let mut changed = true;
    while changed {
        changed = false;
        for (k, (member, kind)) in markers.iter().enumerate() {
            let (left, right) = split_pair(&mut intervals, k);
            changed |= apply_marker(member.id, kind, doc, left, right);
        }
    }

    for (k, res) in intervals.iter().enumerate() {
        if !res.complete() {
            // Name the fitting bounding the unresolved interval.
            let offender = if k < markers.len() {
                markers[k].0.id
            } else {
                markers[k - 1].0.id
            };
            return Err(AttributeError::Unresolved { id: offender }.into());
        }
    }

    let entries = intervals
        .into_iter()
        .enumerate()
        .filter_map(|(k, res)| res.into_entry(boundaries[k], boundaries[k + 1]))
        .collect();
    Ok(SizeArray { entries })
}

fn split_pair(intervals: &mut [Resolved], k: usize) -> (&mut Resolved, &mut Resolved) {
    let (a, b) = intervals.split_at_mut(k + 1);
    (&mut a[k], &mut b[0])
}

/// Propagate/resolve the two intervals around one marker. Returns whether
/// anything changed.
fn apply_marker(
    id: EntityId,
    kind: &FittingKind,
    doc: &Document,
    left: &mut Resolved,
    right: &mut Resolved,
) -> bool {
    let mut changed = false;

    match kind {
        FittingKind::SizeMarker => {
            // Before/after pair read directly, orientation as declared.
            if let Some((before, after)) = dn_pair(doc, id) {
                changed |= left.set_dn(before);
                changed |= right.set_dn(after);
            }
            changed |= propagate_system(left, right);
            changed |= propagate_series(left, right);
        }
        FittingKind::Tee | FittingKind::Wye => {
            // The main-run diameter continues through; the secondary value
            // belongs to the lateral.
            if let Some(dn) = doc.read_attribute(id, ATTR_DN).and_then(parse_dn) {
                changed |= left.set_dn(dn);
                changed |= right.set_dn(dn);
            }
            changed |= propagate_system(left, right);
            changed |= propagate_series(left, right);
        }
        FittingKind::Reducer => {
            // Which declared value sits on which side is not trusted:
            // resolve one side from its entities, take the complement.
            if let Some(pair) = dn_pair(doc, id) {
                match (left.dn, right.dn) {
                    (Some(near), None) => {
                        if let Some(c) = complement_dn(pair, near) {
                            changed |= right.set_dn(c);
                        }
                    }
                    (None, Some(far)) => {
                        if let Some(c) = complement_dn(pair, far) {
                            changed |= left.set_dn(c);
                        }
                    }
                    _ => {}
                }
            }
            changed |= propagate_system(left, right);
            changed |= propagate_series(left, right);
        }
        FittingKind::MaterialTransition => {
            if let Some(pair) = system_pair(doc, id) {
                match (left.system.clone(), right.system.clone()) {
                    (Some(near), None) => {
                        if let Some(c) = complement_str(&pair, &near) {
                            changed |= right.set_system(c);
                        }
                    }
                    (None, Some(far)) => {
                        if let Some(c) = complement_str(&pair, &far) {
                            changed |= left.set_system(c);
                        }
                    }
                    _ => {}
                }
            }
            changed |= propagate_dn(left, right);
            changed |= propagate_series(left, right);
        }
        // Exhaustive on purpose: anything else never delimits ranges.
        FittingKind::Elbow
        | FittingKind::Weld
        | FittingKind::Cap
        | FittingKind::Other(_) => {}
    }
    changed
}

fn propagate_dn(a: &mut Resolved, b: &mut Resolved) -> bool {
    match (a.dn, b.dn) {
        (Some(v), None) => b.set_dn(v),
        (None, Some(v)) => a.set_dn(v),
        _ => false,
    }
}

fn propagate_system(a: &mut Resolved, b: &mut Resolved) -> bool {
    match (a.system.clone(), b.system.clone()) {
        (Some(v), None) => b.set_system(v),
        (None, Some(v)) => a.set_system(v),
        _ => false,
    }
}

fn propagate_series(a: &mut Resolved, b: &mut Resolved) -> bool {
    match (a.series.clone(), b.series.clone()) {
        (Some(v), None) => b.set_series(v),
        (None, Some(v)) => a.set_series(v),
        _ => false,
    }
}

fn complement_dn(pair: (f64, f64), value: f64) -> Option<f64> {
    if (value - pair.0).abs() < 1e-9 {
        Some(pair.1)
    } else if (value - pair.1).abs() < 1e-9 {
        Some(pair.0)
    } else {
        None
    }
}

fn complement_str(pair: &(String, String), value: &str) -> Option<String> {
    if value == pair.0 {
        Some(pair.1.clone())
    } else if value == pair.1 {
        Some(pair.0.clone())
    } else {
        None
    }
}

fn dn_pair(doc: &Document, id: EntityId) -> Option<(f64, f64)> {
    let primary = doc.read_attribute(id, ATTR_DN)?;
    if primary.contains('/') {
        return parse_dn_pair(primary);
    }
    let v1 = parse_dn(primary)?;
    let v2 = doc
        .read_attribute(id, ATTR_DN_SECONDARY)
        .and_then(parse_dn)
        .unwrap_or(v1);
    Some((v1, v2))
}

fn system_pair(doc: &Document, id: EntityId) -> Option<(String, String)> {
    let primary = doc.read_attribute(id, ATTR_SYSTEM)?;
    if let Some((a, b)) = primary.split_once('/') {
        return Some((a.trim().to_string(), b.trim().to_string()));
    }
    let v2 = doc
        .read_attribute(id, ATTR_SYSTEM_SECONDARY)
        .unwrap_or(primary);
    Some((primary.to_string(), v2.to_string()))
}

// ============================================================================
// Attribute resolution
// ============================================================================

#[derive(Debug, Clone, Default)]
struct Resolved {
    dn: Option<f64>,
    system: Option<String>,
    series: Option<String>,
}

impl Resolved {
    fn complete(&self) -> bool {
        self.dn.is_some() && self.system.is_some() && self.series.is_some()
    }

    fn set_dn(&mut self, v: f64) -> bool {
        if self.dn.is_none() {
            self.dn = Some(v);
            true
        } else {
            false
        }
    }

    fn set_system(&mut self, v: String) -> bool {
        if self.system.is_none() {
            self.system = Some(v);
            true
        } else {
            false
        }
    }

    fn set_series(&mut self, v: String) -> bool {
        if self.series.is_none() {
            self.series = Some(v);
            true
        } else {
            false
        }
    }

    fn fill_from(&mut self, other: &Resolved) {
        if self.dn.is_none() {
            self.dn = other.dn;
        }
        if self.system.is_none() {
            self.system = other.system.clone();
        }
        if self.series.is_none() {
            self.series = other.series.clone();
        }
    }

    fn into_entry(self, start: f64, end: f64) -> Option<SizeEntry> {
        Some(SizeEntry {
            dn: self.dn?,
            start_station: start,
            end_station: end,
            system: self.system?,
            series: self.series?,
        })
    }
}

/// First parseable value per attribute over the given members, in order.
fn resolve_from(members: &[Member], doc: &Document) -> Resolved {
    let mut r = Resolved::default();
    for m in members {
        if r.dn.is_none() {
            // Paired values on transition fittings are not a plain reading.
            if let Some(raw) = doc.read_attribute(m.id, ATTR_DN) {
                if !raw.contains('/') {
                    r.dn = parse_dn(raw);
                }
            }
        }
        if r.system.is_none() {
            if let Some(raw) = doc.read_attribute(m.id, ATTR_SYSTEM) {
                if !raw.contains('/') {
                    r.system = Some(raw.to_string());
                }
            }
        }
        if r.series.is_none() {
            if let Some(raw) = doc.read_attribute(m.id, ATTR_SERIES) {
                r.series = Some(raw.to_string());
            }
        }
        if r.complete() {
            break;
        }
    }
    r
}
