//! Spatial index interface for collision queries.
//!
//! Each container keeps an index of axis-aligned boxes, one per placed
//! piece, keyed by piece id. The core never reads the index mid-mutation:
//! every structural operation follows the remove → mutate → reinsert
//! protocol, so a backend is free to rebalance on `load`.
//!
//! The real editor plugs in an R-tree; [`LinearIndex`] is a plain-scan
//! backend with identical semantics, used by the test suite and the CLI.

use crate::component::PieceId;
use crate::geometry::BoundingBox;

/// One entry in the index: a piece id and its world-space bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionBox {
    pub id: PieceId,
    pub bounds: BoundingBox,
}

impl CollisionBox {
    pub fn new(id: PieceId, bounds: BoundingBox) -> Self {
        Self { id, bounds }
    }
}

/// Bounding-box index over placed pieces.
///
/// Removal is by id equality, never by entry identity: callers routinely
/// rebuild `CollisionBox` values from current piece state, so structurally
/// distinct copies of the same entry must compare equal for removal.
pub trait SpatialIndex {
    /// Insert a single entry.
    fn insert(&mut self, item: CollisionBox);

    /// Remove the entry with the given id. Returns false if absent.
    fn remove(&mut self, id: &PieceId) -> bool;

    /// Bulk-insert a batch of entries (the reinsert half of the sync
    /// protocol; backends may treat this as a rebuild opportunity).
    fn load(&mut self, items: Vec<CollisionBox>);

    /// Ids of all entries whose box intersects `area`.
    fn search(&self, area: &BoundingBox) -> Vec<PieceId>;

    /// Number of entries currently indexed.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Linear-scan reference backend.
#[derive(Debug, Default)]
pub struct LinearIndex {
    items: Vec<CollisionBox>,
}

impl LinearIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpatialIndex for LinearIndex {
    fn insert(&mut self, item: CollisionBox) {
        self.items.push(item);
    }

    fn remove(&mut self, id: &PieceId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != *id);
        self.items.len() != before
    }

    fn load(&mut self, items: Vec<CollisionBox>) {
        self.items.extend(items);
    }

    fn search(&self, area: &BoundingBox) -> Vec<PieceId> {
        self.items
            .iter()
            .filter(|item| item.bounds.intersects(area))
            .map(|item| item.id.clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
