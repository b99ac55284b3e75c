//! Piece groups: recursive aggregates with unified move/rotate/lock
//! semantics.
//!
//! A group's members are either leaf pieces or nested groups, modeled as a
//! tagged union rather than runtime type checks. The group itself is plain
//! state plus its local invariants; cross-entity algorithms (membership
//! changes, movement, rotation, cloning, index sync) live on
//! [`Board`](crate::board::Board), which can see every entity at once.
//!
//! Temporary groups are ephemeral selections: their lock state propagates
//! to direct leaf members and they are not persisted as named entities.
//! Permanent groups are durable aggregates whose lock is local to the group
//! node.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::component::PieceId;
use crate::connection::{is_valid_id, ConnectionId};
use crate::container::ContainerId;
use crate::geometry::Pose;

/// String-backed group identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A direct member of a group.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupMember {
    Leaf(PieceId),
    Nested(GroupId),
}

/// Drag anchor recorded at drag start.
///
/// `start` is the pointer position relative to the anchor connection (or to
/// the group centroid when no connection is near); `offset` is the delta
/// between the group's own pose and the anchor connection's pose, zero in
/// the centroid case.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragAnchor {
    pub start: Pose,
    pub offset: Pose,
}

/// Recursive aggregate of pieces and nested groups.
#[derive(Debug, Clone)]
pub struct PieceGroup {
    pub id: GroupId,
    members: Vec<GroupMember>,
    /// Aggregate index of the direct leaf members' connections, by id.
    pub(crate) connections: HashMap<ConnectionId, PieceId>,
    /// The container every leaf member (direct or transitive) lives on.
    /// Fixed by the first member added.
    pub parent_container: Option<ContainerId>,
    /// Set when this group is a member of another group.
    pub nested_in: Option<GroupId>,
    pub temporary: bool,
    pub locked: bool,
    pub destroyed: bool,
    pub dragging: bool,
    pub drag_anchor: Option<DragAnchor>,
}

impl PieceGroup {
    pub fn new(id: GroupId, temporary: bool) -> Self {
        Self {
            id,
            members: Vec::new(),
            connections: HashMap::new(),
            parent_container: None,
            nested_in: None,
            temporary,
            locked: false,
            destroyed: false,
            dragging: false,
            drag_anchor: None,
        }
    }

    /// Snapshot of the direct members. Callers never get a handle to the
    /// backing store.
    pub fn members(&self) -> Vec<GroupMember> {
        self.members.clone()
    }

    /// Member count; a destroyed group reports 0 regardless of history.
    pub fn size(&self) -> usize {
        if self.destroyed {
            0
        } else {
            self.members.len()
        }
    }

    pub fn contains(&self, member: &GroupMember) -> bool {
        self.members.contains(member)
    }

    pub(crate) fn push_member(&mut self, member: GroupMember) {
        self.members.push(member);
    }

    pub(crate) fn remove_member(&mut self, member: &GroupMember) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != member);
        self.members.len() != before
    }

    pub(crate) fn take_members(&mut self) -> Vec<GroupMember> {
        std::mem::take(&mut self.members)
    }

    /// Connection ids of the direct leaf members.
    pub fn connection_ids(&self) -> impl Iterator<Item = &ConnectionId> {
        self.connections.keys()
    }
}

/// Serialized form of a group: minimal-diff encoding.
///
/// `group` appears only when nested, `locked` only when true (encoded as
/// `1`). A plain unlocked top-level group round-trips as just `{ id }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<u8>,
}

impl GroupRecord {
    pub fn is_valid(&self) -> bool {
        is_valid_id(&self.id)
            && self.group.as_deref().map_or(true, is_valid_id)
            && self.locked.map_or(true, |l| l == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destroyed_group_reports_zero_size() {
        let mut g = PieceGroup::new(GroupId::new("g1"), false);
        g.push_member(GroupMember::Leaf(PieceId::new("p1")));
        assert_eq!(g.size(), 1);
        g.destroyed = true;
        assert_eq!(g.size(), 0);
    }

    #[test]
    fn member_removal_is_by_equality() {
        let mut g = PieceGroup::new(GroupId::new("g1"), true);
        g.push_member(GroupMember::Leaf(PieceId::new("p1")));
        g.push_member(GroupMember::Nested(GroupId::new("g2")));
        assert!(g.remove_member(&GroupMember::Nested(GroupId::new("g2"))));
        assert!(!g.remove_member(&GroupMember::Nested(GroupId::new("g2"))));
        assert_eq!(g.size(), 1);
    }

    #[test]
    fn record_validation() {
        let rec = GroupRecord {
            id: "g1".into(),
            group: None,
            locked: None,
        };
        assert!(rec.is_valid());
        let rec = GroupRecord {
            id: "g1".into(),
            group: Some("bad id".into()),
            locked: Some(1),
        };
        assert!(!rec.is_valid());
        let rec = GroupRecord {
            id: "g1".into(),
            group: Some("g2".into()),
            locked: Some(2),
        };
        assert!(!rec.is_valid());
    }
}
