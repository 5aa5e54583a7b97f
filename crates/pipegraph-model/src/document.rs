//! The document plane: snapshot, reads, and the command transaction.
//!
//! One immutable snapshot is read per command invocation. All mutation
//! (orientation flips, attribute writes, weld-fitting creation) is buffered
//! in a [`DocumentTransaction`] and applied at the end of a successful
//! command; a fatal error simply drops the buffer, leaving the document
//! unchanged. Persistence is atomic (temp file + rename), so a crash during
//! save cannot leave a half-written snapshot either.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::adjacency::{parse_adjacency, AdjacencyEdge};
use crate::entity::{EntityId, FittingInstance, PipeElement, PipeRun};
use crate::error::DocumentError;
use crate::geometry::Polyline;

// ============================================================================
// Snapshot (serde surface)
// ============================================================================

/// One entity as stored in the snapshot: geometry plus the flat attribute
/// map and the compact adjacency string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    #[serde(flatten)]
    pub element: PipeElement,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub adjacency: String,
}

/// The on-disk document snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub entities: Vec<EntityRecord>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reference_curves: BTreeMap<String, Polyline>,
}

// ============================================================================
// Document
// ============================================================================

/// In-memory document: validated records, symmetrized adjacency, reference
/// curves. Reads are cheap and unrestricted; writes go through
/// [`DocumentTransaction`].
#[derive(Debug, Clone, Default)]
pub struct Document {
    records: BTreeMap<EntityId, EntityRecord>,
    /// Symmetrized adjacency: if A declares B, B sees A with ports swapped.
    edges: BTreeMap<EntityId, Vec<AdjacencyEdge>>,
    reference_curves: BTreeMap<String, Polyline>,
}

impl Document {
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, DocumentError> {
        let mut records = BTreeMap::new();
        for rec in snapshot.entities {
            let id = rec.id;
            if records.insert(id, rec).is_some() {
                return Err(DocumentError::DuplicateEntity { id });
            }
        }

        let mut edges: BTreeMap<EntityId, Vec<AdjacencyEdge>> = BTreeMap::new();
        for (&id, rec) in &records {
            for edge in parse_adjacency(id, &rec.adjacency)? {
                if !records.contains_key(&edge.other_id) {
                    return Err(DocumentError::UnknownNeighbor {
                        id,
                        other: edge.other_id,
                    });
                }
                edges.entry(id).or_default().push(edge);
            }
        }

        // Symmetrize: the relation is authored one-sided but connectivity
        // queries must see both directions.
        let declared: Vec<(EntityId, AdjacencyEdge)> = edges
            .iter()
            .flat_map(|(&id, es)| es.iter().cloned().map(move |e| (id, e)))
            .collect();
        for (id, edge) in declared {
            let back = edges.entry(edge.other_id).or_default();
            let already = back
                .iter()
                .any(|e| e.other_id == id && e.own_port == edge.other_port);
            if !already {
                back.push(AdjacencyEdge {
                    own_port: edge.other_port.clone(),
                    other_port: edge.own_port.clone(),
                    other_id: id,
                });
            }
        }

        Ok(Self {
            records,
            edges,
            reference_curves: snapshot.reference_curves,
        })
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            entities: self.records.values().cloned().collect(),
            reference_curves: self.reference_curves.clone(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let json = fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&json)?;
        Self::from_snapshot(snapshot)
    }

    /// Persist atomically: write a sibling temp file, then rename over the
    /// target. A fatal error earlier in the command means this is never
    /// called, so the on-disk snapshot stays untouched.
    pub fn save_atomic(&self, path: &Path) -> Result<(), DocumentError> {
        let json = serde_json::to_string_pretty(&self.to_snapshot())?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), entities = self.records.len(), "snapshot saved");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Entity ids in ascending order; the iteration order behind every
    /// deterministic guarantee the algorithms make.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.records.keys().copied()
    }

    pub fn record(&self, id: EntityId) -> Option<&EntityRecord> {
        self.records.get(&id)
    }

    pub fn run(&self, id: EntityId) -> Option<&PipeRun> {
        self.records.get(&id).and_then(|r| r.element.as_run())
    }

    pub fn fitting(&self, id: EntityId) -> Option<&FittingInstance> {
        self.records.get(&id).and_then(|r| r.element.as_fitting())
    }

    pub fn read_attribute(&self, id: EntityId, key: &str) -> Option<&str> {
        self.records
            .get(&id)
            .and_then(|r| r.attrs.get(key))
            .map(String::as_str)
    }

    pub fn neighbors(&self, id: EntityId) -> &[AdjacencyEdge] {
        self.edges.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn are_adjacent(&self, a: EntityId, b: EntityId) -> bool {
        self.neighbors(a).iter().any(|e| e.other_id == b)
    }

    pub fn reference_curve(&self, name: &str) -> Option<&Polyline> {
        self.reference_curves.get(name)
    }

    fn max_id(&self) -> EntityId {
        self.records.keys().next_back().copied().unwrap_or(0)
    }
}

// ============================================================================
// Transaction
// ============================================================================

/// A buffered document mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentChange {
    SetAttribute {
        id: EntityId,
        key: String,
        value: String,
    },
    /// Flip a pipe-run's vertex order (direction normalization).
    ReverseRun { id: EntityId },
    /// Materialize a new fitting (weld placement).
    CreateFitting {
        id: EntityId,
        fitting: FittingInstance,
        attrs: BTreeMap<String, String>,
    },
}

/// Buffers all mutation for one logical command. Dropping the transaction
/// discards everything; [`DocumentTransaction::commit`] applies the whole
/// buffer in order.
#[derive(Debug)]
pub struct DocumentTransaction {
    changes: Vec<DocumentChange>,
    next_id: EntityId,
}

impl DocumentTransaction {
    pub fn new(doc: &Document) -> Self {
        Self {
            changes: Vec::new(),
            next_id: doc.max_id() + 1,
        }
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn set_attribute(&mut self, id: EntityId, key: &str, value: &str) {
        self.changes.push(DocumentChange::SetAttribute {
            id,
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    pub fn reverse_run(&mut self, id: EntityId) {
        self.changes.push(DocumentChange::ReverseRun { id });
    }

    /// Allocate an id and buffer a new fitting record.
    pub fn create_fitting(
        &mut self,
        fitting: FittingInstance,
        attrs: BTreeMap<String, String>,
    ) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        self.changes.push(DocumentChange::CreateFitting { id, fitting, attrs });
        id
    }

    /// Apply the whole buffer. Returns the number of changes applied.
    pub fn commit(self, doc: &mut Document) -> Result<usize, DocumentError> {
        let count = self.changes.len();
        for change in self.changes {
            match change {
                DocumentChange::SetAttribute { id, key, value } => {
                    if let Some(rec) = doc.records.get_mut(&id) {
                        rec.attrs.insert(key, value);
                    }
                }
                DocumentChange::ReverseRun { id } => {
                    if let Some(rec) = doc.records.get_mut(&id) {
                        if let PipeElement::Run(run) = &mut rec.element {
                            run.curve.reverse();
                        }
                    }
                }
                DocumentChange::CreateFitting { id, fitting, attrs } => {
                    if doc.records.contains_key(&id) {
                        return Err(DocumentError::DuplicateEntity { id });
                    }
                    doc.records.insert(
                        id,
                        EntityRecord {
                            id,
                            element: PipeElement::Fitting(fitting),
                            attrs,
                            adjacency: String::new(),
                        },
                    );
                }
            }
        }
        tracing::debug!(changes = count, "transaction committed");
        Ok(count)
    }
}
