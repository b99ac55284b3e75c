//! The piece: the leaf entity of the layout.
//!
//! A piece owns a pose, its sprite-local bounds, and a list of connection
//! ids. Grouping, pairing, and index synchronization are all orchestrated by
//! [`Board`](crate::board::Board); the piece itself is plain state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::connection::ConnectionId;
use crate::container::ContainerId;
use crate::geometry::{BoundingBox, Pose};
use crate::group::GroupId;

/// String-backed piece identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PieceId(String);

impl PieceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A placed piece.
#[derive(Debug, Clone)]
pub struct Piece {
    pub id: PieceId,
    /// Piece type; clone matching pairs connectors across pieces of the
    /// same kind.
    pub kind: i32,
    /// The container (layer) this piece lives on. Fixed at placement.
    pub container: ContainerId,
    pub pose: Pose,
    /// Sprite-local bounds, relative to the pose position.
    pub local_bounds: BoundingBox,
    /// Connections owned by this piece, in declaration order.
    pub connections: Vec<ConnectionId>,
    /// Back-reference to the owning group, if any.
    pub group: Option<GroupId>,
    pub locked: bool,
    pub dragging: bool,
}

impl Piece {
    pub fn new(
        id: PieceId,
        kind: i32,
        container: ContainerId,
        pose: Pose,
        local_bounds: BoundingBox,
    ) -> Self {
        Self {
            id,
            kind,
            container,
            pose,
            local_bounds,
            connections: Vec::new(),
            group: None,
            locked: false,
            dragging: false,
        }
    }

    /// Sprite-local bounds offset by the current position. This is the box
    /// that goes into the spatial index.
    pub fn world_bounds(&self) -> BoundingBox {
        self.local_bounds.translated(self.pose.x, self.pose.y)
    }

    pub fn width(&self) -> f64 {
        self.local_bounds.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_bounds_track_the_pose() {
        let mut piece = Piece::new(
            PieceId::new("p1"),
            0,
            ContainerId::new("layer"),
            Pose::new(100.0, 50.0, 0.0),
            BoundingBox::new(-10.0, -5.0, 20.0, 10.0),
        );
        assert_eq!(piece.world_bounds(), BoundingBox::new(90.0, 45.0, 20.0, 10.0));
        piece.pose = Pose::new(0.0, 0.0, 0.0);
        assert_eq!(piece.world_bounds(), piece.local_bounds);
    }
}
