//! Compact adjacency relation parsing.
//!
//! The document host stores per-entity connectivity as a compact string of
//! `;`-separated records:
//!
//! ```text
//! ownPort:otherPort:otherId;ownPort:otherPort:otherId;...
//! ```
//!
//! The relation is authored one-sided but treated as bidirectional: if A
//! references B, connectivity queries see both directions.

use regex::Regex;

use crate::entity::EntityId;
use crate::error::AdjacencyParseError;

/// One parsed adjacency record, read from the owning entity's side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjacencyEdge {
    pub own_port: String,
    pub other_port: String,
    pub other_id: EntityId,
}

/// Parse the compact adjacency string of entity `id`.
///
/// Empty segments (trailing `;`, blank input) are skipped; a record that
/// does not match `port:port:id` is fatal.
pub fn parse_adjacency(id: EntityId, raw: &str) -> Result<Vec<AdjacencyEdge>, AdjacencyParseError> {
    let re = Regex::new(r"^([A-Za-z0-9_\- ]+):([A-Za-z0-9_\- ]+):(\d+)$")
        .expect("adjacency record pattern is valid");

    let mut edges = Vec::new();
    for rec in raw.split(';') {
        let rec = rec.trim();
        if rec.is_empty() {
            continue;
        }
        let Some(caps) = re.captures(rec) else {
            return Err(AdjacencyParseError::InvalidRecord {
                id,
                record: rec.to_string(),
            });
        };
        let other_id: EntityId =
            caps[3]
                .parse()
                .map_err(|_| AdjacencyParseError::BadEntityId {
                    id,
                    record: rec.to_string(),
                })?;
        edges.push(AdjacencyEdge {
            own_port: caps[1].to_string(),
            other_port: caps[2].to_string(),
            other_id,
        });
    }
    Ok(edges)
}

/// Render edges back into the compact string form.
pub fn format_adjacency(edges: &[AdjacencyEdge]) -> String {
    edges
        .iter()
        .map(|e| format!("{}:{}:{}", e.own_port, e.other_port, e.other_id))
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multi_record_strings() {
        let edges = parse_adjacency(7, "Main:P1:12;Branch:Main:30;").unwrap();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].own_port, "Main");
        assert_eq!(edges[0].other_port, "P1");
        assert_eq!(edges[0].other_id, 12);
        assert_eq!(edges[1].other_id, 30);
    }

    #[test]
    fn empty_input_is_no_edges() {
        assert!(parse_adjacency(1, "").unwrap().is_empty());
        assert!(parse_adjacency(1, " ; ").unwrap().is_empty());
    }

    #[test]
    fn malformed_record_is_fatal() {
        assert!(parse_adjacency(1, "Main:12").is_err());
        assert!(parse_adjacency(1, "Main:P1:xyz").is_err());
    }

    #[test]
    fn format_round_trip() {
        let raw = "Main:P1:12;Branch:Main:30";
        let edges = parse_adjacency(7, raw).unwrap();
        assert_eq!(format_adjacency(&edges), raw);
    }
}
