//! Trackplan — the geometric and structural core of a 2D piece-based
//! layout editor.
//!
//! Pieces expose typed connection points; the core maintains the graph of
//! which points are mated, the rigid-body poses that place pieces in world
//! space, and hierarchical groups that move, rotate, clone, lock and
//! serialize as a unit while keeping a per-layer spatial index in sync.
//!
//! # Example
//!
//! ```rust
//! use trackplan::{Board, BoundingBox, Container, ContainerId, Point, Pose};
//!
//! let mut board = Board::new();
//! let layer = board.add_container(Container::new(
//!     ContainerId::new("layer"),
//!     Point::new(0.0, 0.0),
//! ));
//! let piece = board
//!     .place_piece(0, &layer, Pose::new(0.0, 0.0, 0.0), BoundingBox::new(-10.0, -5.0, 20.0, 10.0))
//!     .unwrap();
//! assert!(board.piece(&piece).is_some());
//! ```
//!
//! Rendering, asset loading, pointer gesture handling and persistence
//! orchestration are external collaborators; the core exposes the state
//! transitions they drive ([`Board::start_drag`], [`Board::take_dirty`],
//! the record types) and nothing more.

pub mod board;
pub mod component;
pub mod connection;
pub mod container;
pub mod error;
pub mod geometry;
pub mod group;
pub mod spatial;

pub use board::{Board, BoardConfig, ImportContext, LayoutFile, DEFAULT_ROTATE_STEP};
pub use component::{Piece, PieceId};
pub use connection::{Connection, ConnectionId, ConnectionRecord, OpenConnections};
pub use container::{Container, ContainerId};
pub use error::{LayoutFileError, StructuralError};
pub use geometry::{normalize_angle, BoundingBox, Point, PolarVector, Pose};
pub use group::{DragAnchor, GroupId, GroupMember, GroupRecord, PieceGroup};
pub use spatial::{CollisionBox, LinearIndex, SpatialIndex};
