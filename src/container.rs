//! Containers: the layers pieces are placed on.
//!
//! A container owns the world-to-local transform for its layer, the draw
//! order of its children, its spatial index, and the open-connection
//! registry used for snap matching. Every leaf member of a group must live
//! on the same container; that invariant is enforced by
//! [`Board::add_to_group`](crate::board::Board::add_to_group).

use std::fmt;

use crate::component::PieceId;
use crate::connection::OpenConnections;
use crate::geometry::Point;
use crate::spatial::{LinearIndex, SpatialIndex};

/// String-backed container identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A layer holding pieces.
pub struct Container {
    pub id: ContainerId,
    /// World-space position of this layer's origin. `to_local` subtracts it.
    pub origin: Point,
    children: Vec<PieceId>,
    /// Collision index over this layer's pieces.
    pub tree: Box<dyn SpatialIndex>,
    /// Unpaired connections on this layer.
    pub open_connections: OpenConnections,
}

impl Container {
    /// Create a container backed by the linear reference index.
    pub fn new(id: ContainerId, origin: Point) -> Self {
        Self::with_index(id, origin, Box::new(LinearIndex::new()))
    }

    /// Create a container with an explicit index backend.
    pub fn with_index(id: ContainerId, origin: Point, tree: Box<dyn SpatialIndex>) -> Self {
        Self {
            id,
            origin,
            children: Vec::new(),
            tree,
            open_connections: OpenConnections::new(),
        }
    }

    /// Map a world-space point into this layer's coordinates.
    pub fn to_local(&self, point: Point) -> Point {
        Point::new(point.x - self.origin.x, point.y - self.origin.y)
    }

    /// Draw-order index of a child, if present.
    pub fn child_index(&self, id: &PieceId) -> Option<usize> {
        self.children.iter().position(|c| c == id)
    }

    /// Move a child to a new draw-order slot. Out-of-range indices clamp to
    /// the end; unknown children are ignored.
    pub fn set_child_index(&mut self, id: &PieceId, index: usize) {
        if let Some(current) = self.child_index(id) {
            let child = self.children.remove(current);
            let index = index.min(self.children.len());
            self.children.insert(index, child);
        }
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn children(&self) -> &[PieceId] {
        &self.children
    }

    pub(crate) fn push_child(&mut self, id: PieceId) {
        self.children.push(id);
    }

    pub(crate) fn remove_child(&mut self, id: &PieceId) {
        self.children.retain(|c| c != id);
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.id)
            .field("origin", &self.origin)
            .field("children", &self.children)
            .field("indexed", &self.tree.len())
            .field("open_connections", &self.open_connections.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_local_subtracts_origin() {
        let c = Container::new(ContainerId::new("layer"), Point::new(10.0, 20.0));
        assert_eq!(c.to_local(Point::new(15.0, 20.0)), Point::new(5.0, 0.0));
    }

    #[test]
    fn child_reordering() {
        let mut c = Container::new(ContainerId::new("layer"), Point::default());
        for id in ["a", "b", "c"] {
            c.push_child(PieceId::new(id));
        }
        c.set_child_index(&PieceId::new("c"), 0);
        assert_eq!(c.child_index(&PieceId::new("c")), Some(0));
        assert_eq!(c.child_index(&PieceId::new("a")), Some(1));
        // Out-of-range clamps to the end.
        c.set_child_index(&PieceId::new("c"), 99);
        assert_eq!(c.child_index(&PieceId::new("c")), Some(2));
        assert_eq!(c.child_count(), 3);
    }
}
