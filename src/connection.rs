//! Connections: typed, located attachment points on pieces.
//!
//! A connection is one endpoint of a (potential) graph edge. It sits at a
//! [`PolarVector`] offset from its owner and is either paired with exactly
//! one other connection or registered as *open* in its container's
//! [`OpenConnections`] registry. Pairing symmetry and registry membership
//! are maintained atomically by [`Board`](crate::board::Board); this module
//! holds the data types, the registry, and the serialized record shape.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::component::PieceId;
use crate::geometry::PolarVector;

/// String-backed connection identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One attachment point, owned by exactly one piece.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub owner: PieceId,
    /// Where this connector sits relative to the owner's pose.
    pub offset: PolarVector,
    /// Connector type; only equal kinds mate.
    pub kind: i32,
    /// Position of this connector in the owner's connector list.
    pub connection_index: i32,
    /// Index of the connector a continuation piece should mate with.
    pub next_connection_index: i32,
    /// The partner connection, if paired. Symmetric: if A points at B then
    /// B points at A.
    pub paired_with: Option<ConnectionId>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        owner: PieceId,
        offset: PolarVector,
        kind: i32,
        connection_index: i32,
        next_connection_index: i32,
    ) -> Self {
        Self {
            id,
            owner,
            offset,
            kind,
            connection_index,
            next_connection_index,
            paired_with: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.paired_with.is_none()
    }
}

/// Per-container registry of unpaired connections.
///
/// Invariant: a connection id is a member iff that connection exists on the
/// container and has `paired_with == None`. Every pairing, unpairing, piece
/// deletion and id rebind updates this set in the same operation.
#[derive(Debug, Default, Clone)]
pub struct OpenConnections {
    ids: HashSet<ConnectionId>,
}

impl OpenConnections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: ConnectionId) {
        self.ids.insert(id);
    }

    pub fn deregister(&mut self, id: &ConnectionId) -> bool {
        self.ids.remove(id)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectionId> {
        self.ids.iter()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Serialized form of a connection endpoint.
///
/// `other_connection` is the partner's id, or the empty string when the
/// connection is open — the original save format uses the empty string, not
/// an absent field, so the record keeps that shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub id: String,
    #[serde(default)]
    pub other_connection: String,
}

impl ConnectionRecord {
    pub fn new(id: impl Into<String>, other_connection: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            other_connection: other_connection.into(),
        }
    }

    /// A record is well-formed iff its id is a valid id and
    /// `other_connection` is either empty or itself a valid id.
    pub fn is_valid(&self) -> bool {
        is_valid_id(&self.id)
            && (self.other_connection.is_empty() || is_valid_id(&self.other_connection))
    }
}

/// Id shape accepted by the importer: non-empty, ASCII alphanumeric plus
/// `-` and `_` (covers uuid-style ids).
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_membership() {
        let mut open = OpenConnections::new();
        open.register(ConnectionId::new("c1"));
        assert!(open.contains(&ConnectionId::new("c1")));
        assert!(open.deregister(&ConnectionId::new("c1")));
        assert!(!open.deregister(&ConnectionId::new("c1")));
        assert!(open.is_empty());
    }

    #[test]
    fn record_validation() {
        assert!(ConnectionRecord::new("a1b2-c3", "").is_valid());
        assert!(ConnectionRecord::new("a1b2-c3", "d4e5_f6").is_valid());
        assert!(!ConnectionRecord::new("", "").is_valid());
        assert!(!ConnectionRecord::new("ok", "has space").is_valid());
        assert!(!ConnectionRecord::new("naïve", "").is_valid());
    }
}
