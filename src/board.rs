//! The board: owner of every container, piece, connection and group, and
//! home of all cross-entity operations.
//!
//! The original editor is an object graph with mutable back-references; here
//! the same topology is an id-keyed arena. All mutation goes through `Board`
//! methods, which lets each operation uphold the cross-entity invariants in
//! one place:
//!
//! - pairing symmetry and open-registry membership ([`connect`](Board::connect),
//!   [`disconnect`](Board::disconnect), [`rebind_connection_id`](Board::rebind_connection_id)),
//! - single-container groups ([`add_to_group`](Board::add_to_group)),
//! - the spatial-index sync protocol: remove before mutate, insert after
//!   mutate, with reinsertion deferred to drag end while a drag is active.
//!
//! Everything here runs synchronously to completion on the calling thread;
//! nothing suspends mid-protocol.

use std::collections::{HashMap, HashSet};
use std::f64::consts::{FRAC_PI_8, PI};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::component::{Piece, PieceId};
use crate::connection::{Connection, ConnectionId, ConnectionRecord};
use crate::container::{Container, ContainerId};
use crate::error::StructuralError;
use crate::geometry::{normalize_angle, BoundingBox, Point, PolarVector, Pose};
use crate::group::{DragAnchor, GroupId, GroupMember, GroupRecord, PieceGroup};
use crate::spatial::CollisionBox;

/// Default rotation step (π/8) for user-issued rotate commands.
pub const DEFAULT_ROTATE_STEP: f64 = FRAC_PI_8;

/// Tunables for board operations.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    /// Half-width of the axis-aligned snap box used when matching open
    /// connections.
    pub snap_radius: f64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self { snap_radius: 10.0 }
    }
}

/// Deserialization-scoped map from imported connection id strings to live
/// connection ids. Passed explicitly through the import call tree; there is
/// no global registry.
#[derive(Debug, Default)]
pub struct ImportContext {
    resolved: HashMap<String, ConnectionId>,
}

impl ImportContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, id: &str) -> Option<&ConnectionId> {
        self.resolved.get(id)
    }
}

/// Serialized layout: the structural fields needed to round-trip topology.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutFile {
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
    #[serde(default)]
    pub groups: Vec<GroupRecord>,
}

impl LayoutFile {
    pub fn from_toml(source: &str) -> Result<Self, crate::error::LayoutFileError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::error::LayoutFileError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }
}

/// The id-keyed arena and operation surface of the core.
#[derive(Debug)]
pub struct Board {
    config: BoardConfig,
    containers: HashMap<ContainerId, Container>,
    pieces: HashMap<PieceId, Piece>,
    connections: HashMap<ConnectionId, Connection>,
    groups: HashMap<GroupId, PieceGroup>,
    /// Connections whose visual state needs a refresh; drained by the
    /// renderer via [`take_dirty`](Board::take_dirty).
    dirty: HashSet<ConnectionId>,
    next_id: u64,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self::with_config(BoardConfig::default())
    }

    pub fn with_config(config: BoardConfig) -> Self {
        Self {
            config,
            containers: HashMap::new(),
            pieces: HashMap::new(),
            connections: HashMap::new(),
            groups: HashMap::new(),
            dirty: HashSet::new(),
            next_id: 0,
        }
    }

    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    // ----- lookups ------------------------------------------------------

    pub fn container(&self, id: &ContainerId) -> Option<&Container> {
        self.containers.get(id)
    }

    pub fn piece(&self, id: &PieceId) -> Option<&Piece> {
        self.pieces.get(id)
    }

    pub fn connection(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    pub fn group(&self, id: &GroupId) -> Option<&PieceGroup> {
        self.groups.get(id)
    }

    fn require_piece(&self, id: &PieceId) -> Result<&Piece, StructuralError> {
        self.pieces
            .get(id)
            .ok_or_else(|| StructuralError::unknown("piece", id.as_str()))
    }

    fn require_group(&self, id: &GroupId) -> Result<&PieceGroup, StructuralError> {
        self.groups
            .get(id)
            .ok_or_else(|| StructuralError::unknown("group", id.as_str()))
    }

    /// Drain the set of connections whose visuals need refreshing.
    pub fn take_dirty(&mut self) -> Vec<ConnectionId> {
        self.dirty.drain().collect()
    }

    // ----- containers and pieces ---------------------------------------

    pub fn add_container(&mut self, container: Container) -> ContainerId {
        let id = container.id.clone();
        self.containers.insert(id.clone(), container);
        id
    }

    /// Place a new piece on a container and index its bounding box.
    pub fn place_piece(
        &mut self,
        kind: i32,
        container: &ContainerId,
        pose: Pose,
        local_bounds: BoundingBox,
    ) -> Result<PieceId, StructuralError> {
        if !self.containers.contains_key(container) {
            return Err(StructuralError::unknown("container", container.as_str()));
        }
        let id = PieceId::new(self.fresh_id("piece"));
        let piece = Piece::new(id.clone(), kind, container.clone(), pose, local_bounds);
        let item = CollisionBox::new(id.clone(), piece.world_bounds());
        self.pieces.insert(id.clone(), piece);
        let layer = self.containers.get_mut(container).expect("checked above");
        layer.push_child(id.clone());
        layer.tree.insert(item);
        Ok(id)
    }

    /// Add a connection to a piece and register it as open.
    pub fn add_connection(
        &mut self,
        piece: &PieceId,
        offset: PolarVector,
        kind: i32,
        connection_index: i32,
        next_connection_index: i32,
    ) -> Result<ConnectionId, StructuralError> {
        let container = self.require_piece(piece)?.container.clone();
        let id = ConnectionId::new(self.fresh_id("conn"));
        let conn = Connection::new(
            id.clone(),
            piece.clone(),
            offset,
            kind,
            connection_index,
            next_connection_index,
        );
        self.connections.insert(id.clone(), conn);
        let owner = self.pieces.get_mut(piece).expect("checked above");
        owner.connections.push(id.clone());
        if let Some(gid) = owner.group.clone() {
            if let Some(group) = self.groups.get_mut(&gid) {
                group.connections.insert(id.clone(), piece.clone());
            }
        }
        if let Some(layer) = self.containers.get_mut(&container) {
            layer.open_connections.register(id.clone());
        }
        Ok(id)
    }

    /// Delete a piece: unpair and deregister its connections, drop its
    /// collision box, evict it from its group and container.
    pub fn delete_piece(&mut self, id: &PieceId) -> bool {
        let Some(piece) = self.pieces.get(id) else {
            warn!(piece = %id, "delete requested for unknown piece");
            return false;
        };
        if let Some(gid) = piece.group.clone() {
            self.remove_from_group(&gid, &GroupMember::Leaf(id.clone()));
        }
        let piece = self.pieces.remove(id).expect("still present");
        for cid in &piece.connections {
            if let Some(conn) = self.connections.remove(cid) {
                if let Some(partner_id) = conn.paired_with {
                    if let Some(partner) = self.connections.get_mut(&partner_id) {
                        partner.paired_with = None;
                        let partner_container =
                            self.pieces.get(&partner.owner).map(|p| p.container.clone());
                        if let Some(layer) = partner_container
                            .and_then(|c| self.containers.get_mut(&c))
                        {
                            layer.open_connections.register(partner_id.clone());
                        }
                        self.dirty.insert(partner_id);
                    }
                }
            }
            if let Some(layer) = self.containers.get_mut(&piece.container) {
                layer.open_connections.deregister(cid);
            }
            self.dirty.remove(cid);
        }
        if let Some(layer) = self.containers.get_mut(&piece.container) {
            layer.tree.remove(id);
            layer.remove_child(id);
        }
        true
    }

    /// Duplicate a piece into a container. The clone gets fresh ids, is
    /// never locked, and all its connections start open.
    pub fn clone_piece(
        &mut self,
        source: &PieceId,
        target: &ContainerId,
    ) -> Result<PieceId, StructuralError> {
        if !self.containers.contains_key(target) {
            return Err(StructuralError::unknown("container", target.as_str()));
        }
        self.require_piece(source)?;
        let mut conn_map = HashMap::new();
        Ok(self.clone_piece_into(source, target, &mut conn_map))
    }

    fn clone_piece_into(
        &mut self,
        source: &PieceId,
        target: &ContainerId,
        conn_map: &mut HashMap<ConnectionId, ConnectionId>,
    ) -> PieceId {
        let src = self.pieces.get(source).expect("validated by caller").clone();
        let id = PieceId::new(self.fresh_id("piece"));
        let mut piece = Piece::new(id.clone(), src.kind, target.clone(), src.pose, src.local_bounds);
        let item = CollisionBox::new(id.clone(), piece.world_bounds());
        for old_cid in &src.connections {
            let old = self.connections.get(old_cid).expect("owned connection").clone();
            let new_cid = ConnectionId::new(self.fresh_id("conn"));
            self.connections.insert(
                new_cid.clone(),
                Connection::new(
                    new_cid.clone(),
                    id.clone(),
                    old.offset,
                    old.kind,
                    old.connection_index,
                    old.next_connection_index,
                ),
            );
            piece.connections.push(new_cid.clone());
            conn_map.insert(old_cid.clone(), new_cid.clone());
            if let Some(layer) = self.containers.get_mut(target) {
                layer.open_connections.register(new_cid);
            }
        }
        self.pieces.insert(id.clone(), piece);
        let layer = self.containers.get_mut(target).expect("validated by caller");
        layer.push_child(id.clone());
        layer.tree.insert(item);
        id
    }

    // ----- connections --------------------------------------------------

    /// Absolute pose of a connection: its polar offset applied to the
    /// owner's pose.
    pub fn connection_pose(&self, id: &ConnectionId) -> Option<Pose> {
        let conn = self.connections.get(id)?;
        let owner = self.pieces.get(&conn.owner)?;
        Some(conn.offset.end_pose(&owner.pose))
    }

    /// Pair two connections. Either side that is already paired is
    /// disconnected first (without a redraw). Both sides leave the open
    /// registry and get a visual refresh.
    pub fn connect(&mut self, a: &ConnectionId, b: &ConnectionId) -> bool {
        if a == b {
            warn!(connection = %a, "attempted to pair a connection with itself");
            return false;
        }
        if !self.connections.contains_key(a) || !self.connections.contains_key(b) {
            warn!(a = %a, b = %b, "attempted to pair unknown connections");
            return false;
        }
        self.disconnect_internal(a, false);
        self.disconnect_internal(b, false);
        for (this, other) in [(a, b), (b, a)] {
            let conn = self.connections.get_mut(this).expect("checked above");
            conn.paired_with = Some(other.clone());
            let container = self
                .pieces
                .get(&conn.owner)
                .map(|p| p.container.clone());
            if let Some(layer) = container.and_then(|c| self.containers.get_mut(&c)) {
                layer.open_connections.deregister(this);
            }
            self.dirty.insert(this.clone());
        }
        true
    }

    /// Unpair a connection (and its partner). Both sides re-enter the open
    /// registry; `redraw` controls whether their visuals are refreshed.
    pub fn disconnect(&mut self, id: &ConnectionId, redraw: bool) -> Option<ConnectionId> {
        self.disconnect_internal(id, redraw)
    }

    fn disconnect_internal(&mut self, id: &ConnectionId, redraw: bool) -> Option<ConnectionId> {
        let partner_id = self.connections.get_mut(id)?.paired_with.take()?;
        if let Some(partner) = self.connections.get_mut(&partner_id) {
            partner.paired_with = None;
        }
        for cid in [id.clone(), partner_id.clone()] {
            let container = self
                .connections
                .get(&cid)
                .and_then(|c| self.pieces.get(&c.owner))
                .map(|p| p.container.clone());
            if let Some(layer) = container.and_then(|c| self.containers.get_mut(&c)) {
                layer.open_connections.register(cid.clone());
            }
            if redraw {
                self.dirty.insert(cid);
            }
        }
        Some(partner_id)
    }

    /// Adopt an external id for a connection, atomically re-keying every
    /// structure that indexes it: the connection map, the owner's list, the
    /// partner's back-reference, the group aggregate, and the open registry
    /// (the latter only while unpaired).
    pub fn rebind_connection_id(&mut self, old: &ConnectionId, new: ConnectionId) -> bool {
        if old == &new {
            return true;
        }
        if self.connections.contains_key(&new) {
            warn!(old = %old, new = %new, "rebind target id already in use");
            return false;
        }
        let Some(mut conn) = self.connections.remove(old) else {
            warn!(connection = %old, "rebind requested for unknown connection");
            return false;
        };
        conn.id = new.clone();
        let owner = conn.owner.clone();
        let partner = conn.paired_with.clone();
        let open = conn.is_open();
        self.connections.insert(new.clone(), conn);
        if let Some(piece) = self.pieces.get_mut(&owner) {
            for cid in &mut piece.connections {
                if cid == old {
                    *cid = new.clone();
                }
            }
            let container = piece.container.clone();
            let group = piece.group.clone();
            if open {
                if let Some(layer) = self.containers.get_mut(&container) {
                    layer.open_connections.deregister(old);
                    layer.open_connections.register(new.clone());
                }
            }
            if let Some(group) = group.and_then(|g| self.groups.get_mut(&g)) {
                if group.connections.remove(old).is_some() {
                    group.connections.insert(new.clone(), owner.clone());
                }
            }
        }
        if let Some(partner) = partner.and_then(|p| self.connections.get_mut(&p)) {
            partner.paired_with = Some(new.clone());
        }
        if self.dirty.remove(old) {
            self.dirty.insert(new);
        }
        true
    }

    /// Scan the container's open registry for a connector that faces this
    /// one: compatible kind, different piece, heading opposite within
    /// tolerance, position inside the snap box. Pairs the two when
    /// `connect` is set. Returns the match, if any.
    pub fn find_matching_connection(
        &mut self,
        id: &ConnectionId,
        connect: bool,
    ) -> Option<ConnectionId> {
        let conn = self.connections.get(id)?;
        let owner = self.pieces.get(&conn.owner)?;
        let kind = conn.kind;
        let owner_id = owner.id.clone();
        let pose = self.connection_pose(id)?;
        let layer = self.containers.get(&owner.container)?;
        let candidates: Vec<ConnectionId> = layer.open_connections.iter().cloned().collect();
        let mut found = None;
        for cid in candidates {
            if cid == *id {
                continue;
            }
            let Some(candidate) = self.connections.get(&cid) else {
                continue;
            };
            if candidate.kind != kind || candidate.owner == owner_id {
                continue;
            }
            let Some(candidate_pose) = self.connection_pose(&cid) else {
                continue;
            };
            if pose.is_in_radius(&candidate_pose, self.config.snap_radius)
                && pose.has_opposite_angle(&candidate_pose)
            {
                found = Some(cid);
                break;
            }
        }
        if connect {
            if let Some(ref cid) = found {
                self.connect(id, cid);
            }
        }
        found
    }

    /// First open connection on a piece with `connection_index >= start`,
    /// wrapping around to the piece's first open connection when none
    /// qualifies.
    pub fn open_connection_from(&self, piece: &PieceId, start: i32) -> Option<ConnectionId> {
        let piece = self.pieces.get(piece)?;
        let open: Vec<&Connection> = piece
            .connections
            .iter()
            .filter_map(|cid| self.connections.get(cid))
            .filter(|c| c.is_open())
            .collect();
        open.iter()
            .find(|c| c.connection_index >= start)
            .or_else(|| open.first())
            .map(|c| c.id.clone())
    }

    // ----- groups: membership ------------------------------------------

    pub fn create_group(&mut self, temporary: bool) -> GroupId {
        let id = GroupId::new(self.fresh_id("group"));
        self.groups.insert(id.clone(), PieceGroup::new(id.clone(), temporary));
        id
    }

    /// The container the group's tree is anchored to, looking up the
    /// nesting chain when this node has not fixed one itself.
    fn anchor_container(&self, gid: &GroupId) -> Option<ContainerId> {
        let mut current = Some(gid.clone());
        while let Some(id) = current {
            let group = self.groups.get(&id)?;
            if let Some(container) = &group.parent_container {
                return Some(container.clone());
            }
            current = group.nested_in.clone();
        }
        None
    }

    /// Add a member to a group.
    ///
    /// Policy violations (already grouped, duplicate, self- or ancestor-add)
    /// are warned no-ops returning `Ok(false)`. A container mismatch is the
    /// one hard failure: it aborts with an error and leaves everything
    /// unchanged.
    pub fn add_to_group(
        &mut self,
        gid: &GroupId,
        member: GroupMember,
    ) -> Result<bool, StructuralError> {
        let group = self.require_group(gid)?;
        let member_container = match &member {
            GroupMember::Leaf(pid) => {
                let piece = self.require_piece(pid)?;
                if piece.group.is_some() {
                    warn!(group = %gid, piece = %pid, "piece already belongs to a group");
                    return Ok(false);
                }
                Some(piece.container.clone())
            }
            GroupMember::Nested(ngid) => {
                if ngid == gid {
                    warn!(group = %gid, "group cannot contain itself");
                    return Ok(false);
                }
                let nested = self.require_group(ngid)?;
                if nested.nested_in.is_some() || group.contains(&member) {
                    warn!(group = %gid, nested = %ngid, "group already has an owner");
                    return Ok(false);
                }
                // Membership must stay a tree: a group cannot adopt any of
                // its own ancestors.
                let mut ancestor = group.nested_in.clone();
                while let Some(aid) = ancestor {
                    if aid == *ngid {
                        warn!(group = %gid, nested = %ngid, "group cannot contain an ancestor");
                        return Ok(false);
                    }
                    ancestor = self.groups.get(&aid).and_then(|g| g.nested_in.clone());
                }
                nested.parent_container.clone()
            }
        };
        if let Some(found) = &member_container {
            // The anchor may have been fixed anywhere up the nesting chain,
            // not just on this node.
            if let Some(expected) = self.anchor_container(gid) {
                if &expected != found {
                    return Err(StructuralError::ContainerMismatch {
                        group: gid.to_string(),
                        member: match &member {
                            GroupMember::Leaf(p) => p.to_string(),
                            GroupMember::Nested(g) => g.to_string(),
                        },
                        expected: expected.to_string(),
                        found: found.to_string(),
                    });
                }
            }
            // Fix the anchor on this group and every still-unanchored
            // ancestor, so later adds anywhere in the tree agree on it.
            let mut current = Some(gid.clone());
            while let Some(id) = current {
                let Some(node) = self.groups.get_mut(&id) else {
                    break;
                };
                current = node.nested_in.clone();
                if node.parent_container.is_none() {
                    node.parent_container = Some(found.clone());
                }
            }
        }
        let group = self.groups.get_mut(gid).expect("checked above");
        group.push_member(member.clone());
        match member {
            GroupMember::Leaf(pid) => {
                let piece = self.pieces.get_mut(&pid).expect("checked above");
                piece.group = Some(gid.clone());
                let conns = piece.connections.clone();
                let group = self.groups.get_mut(gid).expect("checked above");
                for cid in conns {
                    group.connections.insert(cid, pid.clone());
                }
            }
            GroupMember::Nested(ngid) => {
                let nested = self.groups.get_mut(&ngid).expect("checked above");
                nested.nested_in = Some(gid.clone());
            }
        }
        Ok(true)
    }

    /// Remove a member: clear its back-reference and evict its connections
    /// from the aggregate. Removing the last member destroys the group.
    pub fn remove_from_group(&mut self, gid: &GroupId, member: &GroupMember) -> bool {
        let Some(group) = self.groups.get_mut(gid) else {
            warn!(group = %gid, "remove requested on unknown group");
            return false;
        };
        if !group.remove_member(member) {
            warn!(group = %gid, "remove requested for a non-member");
            return false;
        }
        match member {
            GroupMember::Leaf(pid) => {
                group.connections.retain(|_, owner| owner != pid);
                if let Some(piece) = self.pieces.get_mut(pid) {
                    piece.group = None;
                }
            }
            GroupMember::Nested(ngid) => {
                if let Some(nested) = self.groups.get_mut(ngid) {
                    nested.nested_in = None;
                }
            }
        }
        let group = self.groups.get(gid).expect("still present");
        if !group.destroyed && group.size() == 0 {
            self.destroy_group(gid);
        }
        true
    }

    /// Destroy a group. Temporary groups simply disband; permanent groups
    /// additionally delete every member piece (recursively through nested
    /// groups). Returns the ids of the pieces deleted, in member order.
    ///
    /// The `destroyed` flag is terminal and retained for introspection;
    /// `size()` reports 0 from here on.
    pub fn destroy_group(&mut self, gid: &GroupId) -> Vec<PieceId> {
        let Some(group) = self.groups.get_mut(gid) else {
            warn!(group = %gid, "destroy requested on unknown group");
            return Vec::new();
        };
        if group.destroyed {
            return Vec::new();
        }
        group.destroyed = true;
        let temporary = group.temporary;
        let members = group.take_members();
        group.connections.clear();
        group.drag_anchor = None;
        let mut deleted = Vec::new();
        for member in members {
            match member {
                GroupMember::Leaf(pid) => {
                    if let Some(piece) = self.pieces.get_mut(&pid) {
                        piece.group = None;
                    }
                    if !temporary && self.delete_piece(&pid) {
                        deleted.push(pid);
                    }
                }
                GroupMember::Nested(ngid) => {
                    if let Some(nested) = self.groups.get_mut(&ngid) {
                        nested.nested_in = None;
                    }
                    if !temporary {
                        deleted.extend(self.destroy_group(&ngid));
                    }
                }
            }
        }
        deleted
    }

    /// Member count as seen from outside; 0 once destroyed.
    pub fn group_size(&self, gid: &GroupId) -> usize {
        self.groups.get(gid).map_or(0, PieceGroup::size)
    }

    /// Every leaf piece in the subtree, in depth-first member order.
    pub fn all_pieces(&self, gid: &GroupId) -> Vec<PieceId> {
        let mut out = Vec::new();
        self.collect_pieces(gid, &mut out);
        out
    }

    fn collect_pieces(&self, gid: &GroupId, out: &mut Vec<PieceId>) {
        let Some(group) = self.groups.get(gid) else {
            return;
        };
        for member in group.members() {
            match member {
                GroupMember::Leaf(pid) => out.push(pid),
                GroupMember::Nested(ngid) => self.collect_pieces(&ngid, out),
            }
        }
    }

    /// Every connection in the subtree, leaves in depth-first order.
    pub fn aggregate_connections(&self, gid: &GroupId) -> Vec<ConnectionId> {
        self.all_pieces(gid)
            .iter()
            .filter_map(|pid| self.pieces.get(pid))
            .flat_map(|piece| piece.connections.iter().cloned())
            .collect()
    }

    // ----- groups: geometry --------------------------------------------

    fn member_bounds(&self, member: &GroupMember) -> Option<BoundingBox> {
        match member {
            GroupMember::Leaf(pid) => self.pieces.get(pid).map(Piece::world_bounds),
            GroupMember::Nested(ngid) => self.group_bounds(ngid),
        }
    }

    /// Fold of the direct members' bounds. `None` when the group is empty
    /// or the first member's bounds are unavailable.
    pub fn group_bounds(&self, gid: &GroupId) -> Option<BoundingBox> {
        let group = self.groups.get(gid)?;
        let members = group.members();
        let mut iter = members.iter();
        let mut bounds = self.member_bounds(iter.next()?)?;
        for member in iter {
            if let Some(b) = self.member_bounds(member) {
                bounds = bounds.union(&b);
            }
        }
        Some(bounds)
    }

    /// World-space center of the group's bounds.
    pub fn group_global_position(&self, gid: &GroupId) -> Option<Point> {
        self.group_bounds(gid).map(|b| b.center())
    }

    /// Group center mapped into the parent container's coordinates
    /// (identity when no container is fixed yet).
    pub fn group_local_position(&self, gid: &GroupId) -> Option<Point> {
        let center = self.group_global_position(gid)?;
        let group = self.groups.get(gid)?;
        Some(match &group.parent_container {
            Some(cid) => self.containers.get(cid)?.to_local(center),
            None => center,
        })
    }

    /// The group's pose: local center with angle 0 (group nodes carry no
    /// intrinsic orientation).
    pub fn group_pose(&self, gid: &GroupId) -> Option<Pose> {
        let p = self.group_local_position(gid)?;
        Some(Pose::new(p.x, p.y, 0.0))
    }

    /// A group can rotate iff no paired connection crosses the group
    /// boundary: every partner of a paired aggregate connection must belong
    /// to the subtree as well.
    pub fn can_rotate(&self, gid: &GroupId) -> bool {
        let inside: HashSet<PieceId> = self.all_pieces(gid).into_iter().collect();
        for pid in &inside {
            let Some(piece) = self.pieces.get(pid) else {
                continue;
            };
            for cid in &piece.connections {
                let Some(conn) = self.connections.get(cid) else {
                    continue;
                };
                if let Some(partner_id) = &conn.paired_with {
                    let partner_inside = self
                        .connections
                        .get(partner_id)
                        .is_some_and(|p| inside.contains(&p.owner));
                    if !partner_inside {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// True iff any direct leaf is locked, or any nested group is locked or
    /// transitively has locked pieces.
    pub fn has_locked_pieces(&self, gid: &GroupId) -> bool {
        let Some(group) = self.groups.get(gid) else {
            return false;
        };
        group.members().iter().any(|member| match member {
            GroupMember::Leaf(pid) => self.pieces.get(pid).is_some_and(|p| p.locked),
            GroupMember::Nested(ngid) => {
                self.groups.get(ngid).is_some_and(|g| g.locked) || self.has_locked_pieces(ngid)
            }
        })
    }

    /// Set the group's lock. Temporary groups propagate the flag to every
    /// direct leaf member; permanent groups keep it local to the group node.
    pub fn set_group_locked(&mut self, gid: &GroupId, locked: bool) {
        let Some(group) = self.groups.get_mut(gid) else {
            warn!(group = %gid, "lock requested on unknown group");
            return;
        };
        group.locked = locked;
        if group.temporary {
            for member in group.members() {
                if let GroupMember::Leaf(pid) = member {
                    if let Some(piece) = self.pieces.get_mut(&pid) {
                        piece.locked = locked;
                    }
                }
            }
        }
    }

    /// Set the dragging flag on the group and its direct leaf members.
    /// Nested groups keep their own flag.
    pub fn set_group_dragging(&mut self, gid: &GroupId, dragging: bool) {
        let Some(group) = self.groups.get_mut(gid) else {
            return;
        };
        group.dragging = dragging;
        for member in group.members() {
            if let GroupMember::Leaf(pid) = member {
                if let Some(piece) = self.pieces.get_mut(&pid) {
                    piece.dragging = dragging;
                }
            }
        }
    }

    // ----- groups: movement --------------------------------------------

    /// Move the group so its local center lands on `(x, y)`, preserving
    /// every member's offset relative to the center — including members of
    /// nested groups, which are moved through their own `move` so the
    /// recursion holds at every depth.
    ///
    /// No-op when the group or any transitive member is locked, or when the
    /// position is undetermined.
    pub fn move_group(&mut self, gid: &GroupId, x: f64, y: f64) -> bool {
        let Some(group) = self.groups.get(gid) else {
            warn!(group = %gid, "move requested on unknown group");
            return false;
        };
        if group.locked || self.has_locked_pieces(gid) {
            warn!(group = %gid, "move ignored: group or member locked");
            return false;
        }
        let Some(pos) = self.group_local_position(gid) else {
            warn!(group = %gid, "move ignored: position undetermined");
            return false;
        };
        let dx = x - pos.x;
        let dy = y - pos.y;
        for member in self.groups.get(gid).expect("checked above").members() {
            match member {
                GroupMember::Leaf(pid) => {
                    if let Some(piece) = self.pieces.get_mut(&pid) {
                        piece.pose = Pose::new(
                            piece.pose.x + dx,
                            piece.pose.y + dy,
                            piece.pose.angle(),
                        );
                    }
                }
                GroupMember::Nested(ngid) => {
                    if let Some(np) = self.group_local_position(&ngid) {
                        self.move_group(&ngid, np.x + dx, np.y + dy);
                    }
                }
            }
        }
        true
    }

    /// Rotate the whole subtree around the group's center by `angle`.
    ///
    /// Protocol: drop every leaf's collision box first, rotate poses (and
    /// re-run snap matching on still-open connections when
    /// `check_connections`), then reinsert — unless a drag is in flight, in
    /// which case reinsertion is deferred to drag end.
    ///
    /// No-op when locked, when a paired connection crosses the group
    /// boundary ([`can_rotate`](Board::can_rotate)), or when the center is
    /// undetermined.
    pub fn rotate_group(&mut self, gid: &GroupId, angle: f64, check_connections: bool) -> bool {
        let Some(group) = self.groups.get(gid) else {
            warn!(group = %gid, "rotate requested on unknown group");
            return false;
        };
        if group.locked || self.has_locked_pieces(gid) {
            warn!(group = %gid, "rotate ignored: group or member locked");
            return false;
        }
        if !self.can_rotate(gid) {
            debug!(group = %gid, "rotate ignored: paired connection crosses the group");
            return false;
        }
        // Center of rotation in world space; poses are world-space and the
        // container transform is a pure translation.
        let Some(center) = self.group_global_position(gid) else {
            warn!(group = %gid, "rotate ignored: center undetermined");
            return false;
        };
        self.delete_collision_tree(gid);
        self.rotate_subtree(gid, center, angle, check_connections);
        if !self.groups.get(gid).is_some_and(|g| g.dragging) {
            self.insert_collision_tree(gid);
        }
        true
    }

    /// Rotate the group by one user-command step
    /// ([`DEFAULT_ROTATE_STEP`]); the sign picks the direction.
    pub fn rotate_group_step(&mut self, gid: &GroupId, clockwise: bool) -> bool {
        let step = if clockwise {
            DEFAULT_ROTATE_STEP
        } else {
            -DEFAULT_ROTATE_STEP
        };
        self.rotate_group(gid, step, true)
    }

    /// Rotation body, shared with nested recursion. The parent already
    /// validated lock state and `can_rotate` for the whole subtree, so this
    /// variant re-checks nothing.
    fn rotate_subtree(&mut self, gid: &GroupId, center: Point, angle: f64, check: bool) {
        let Some(group) = self.groups.get(gid) else {
            return;
        };
        for member in group.members() {
            match member {
                GroupMember::Leaf(pid) => {
                    let Some(piece) = self.pieces.get_mut(&pid) else {
                        continue;
                    };
                    piece.pose = piece.pose.rotate_around(center.x, center.y, angle);
                    for cid in piece.connections.clone() {
                        if self.connections.get(&cid).is_some_and(Connection::is_open) {
                            if check {
                                self.find_matching_connection(&cid, true);
                            }
                            self.dirty.insert(cid);
                        }
                    }
                }
                GroupMember::Nested(ngid) => {
                    self.rotate_subtree(&ngid, center, angle, check);
                }
            }
        }
    }

    // ----- groups: collision-index sync --------------------------------

    /// Remove every leaf's bounding box from its container's index,
    /// recursing through nested groups. Removal is by id equality.
    pub fn delete_collision_tree(&mut self, gid: &GroupId) {
        debug!(group = %gid, "collision tree: removing leaf boxes");
        for pid in self.all_pieces(gid) {
            let Some(container) = self.pieces.get(&pid).map(|p| p.container.clone()) else {
                continue;
            };
            if let Some(layer) = self.containers.get_mut(&container) {
                layer.tree.remove(&pid);
            }
        }
    }

    /// Recompute every leaf's box from its current pose and bulk-load the
    /// batch into each container's index.
    pub fn insert_collision_tree(&mut self, gid: &GroupId) {
        debug!(group = %gid, "collision tree: reinserting leaf boxes");
        let mut batches: HashMap<ContainerId, Vec<CollisionBox>> = HashMap::new();
        for pid in self.all_pieces(gid) {
            if let Some(piece) = self.pieces.get(&pid) {
                batches
                    .entry(piece.container.clone())
                    .or_default()
                    .push(CollisionBox::new(pid, piece.world_bounds()));
            }
        }
        for (container, batch) in batches {
            if let Some(layer) = self.containers.get_mut(&container) {
                layer.tree.load(batch);
            }
        }
    }

    // ----- groups: drag lifecycle --------------------------------------

    /// Begin dragging at a container-local pointer position.
    ///
    /// Nested groups delegate upward so the outermost group is what drags.
    /// Records the drag anchor (relative to the nearest aggregate
    /// connection, or to the centroid when none exists), removes the leaf
    /// boxes from the index, and marks the subtree dragging. The boxes are
    /// reinserted exactly once, by [`end_drag`](Board::end_drag).
    pub fn start_drag(&mut self, gid: &GroupId, pointer: Point) -> bool {
        let Some(group) = self.groups.get(gid) else {
            warn!(group = %gid, "drag requested on unknown group");
            return false;
        };
        if group.locked || self.has_locked_pieces(gid) {
            warn!(group = %gid, "drag ignored: group or member locked");
            return false;
        }
        if let Some(parent) = group.nested_in.clone() {
            return self.start_drag(&parent, pointer);
        }
        let Some(group_pose) = self.group_pose(gid) else {
            warn!(group = %gid, "drag ignored: position undetermined");
            return false;
        };
        let pointer_pose = Pose::new(pointer.x, pointer.y, 0.0);
        let mut nearest: Option<(f64, Pose)> = None;
        for cid in self.aggregate_connections(gid) {
            if let Some(pose) = self.local_connection_pose(gid, &cid) {
                let dist = (pointer_pose - pose).magnitude();
                if nearest.map_or(true, |(best, _)| dist < best) {
                    nearest = Some((dist, pose));
                }
            }
        }
        let anchor = match nearest {
            Some((_, conn_pose)) => DragAnchor {
                start: pointer_pose - conn_pose,
                offset: group_pose - conn_pose,
            },
            None => DragAnchor {
                start: pointer_pose - group_pose,
                offset: Pose::default(),
            },
        };
        self.delete_collision_tree(gid);
        let group = self.groups.get_mut(gid).expect("checked above");
        group.drag_anchor = Some(anchor);
        self.set_group_dragging(gid, true);
        true
    }

    /// Finish (or abort) a drag: reinsert the leaf boxes removed at drag
    /// start and clear the dragging state. Idempotent — a second call is a
    /// no-op, so the boxes go back exactly once.
    pub fn end_drag(&mut self, gid: &GroupId) -> bool {
        if !self.groups.get(gid).is_some_and(|g| g.dragging) {
            return false;
        }
        self.insert_collision_tree(gid);
        self.set_group_dragging(gid, false);
        if let Some(group) = self.groups.get_mut(gid) {
            group.drag_anchor = None;
        }
        true
    }

    /// Connection pose mapped into the group's container space.
    fn local_connection_pose(&self, gid: &GroupId, cid: &ConnectionId) -> Option<Pose> {
        let pose = self.connection_pose(cid)?;
        let group = self.groups.get(gid)?;
        Some(match &group.parent_container {
            Some(container) => {
                let local = self
                    .containers
                    .get(container)?
                    .to_local(Point::new(pose.x, pose.y));
                Pose::new(local.x, local.y, pose.angle())
            }
            None => pose,
        })
    }

    // ----- groups: clone ------------------------------------------------

    /// Deep-clone a group into `target`: every piece and nested group gets
    /// fresh ids, internal pairings are re-established across the whole
    /// subtree, pairings that crossed the boundary are left open. The clone
    /// is always unlocked and inherits only the temporary/permanent kind.
    ///
    /// With `connect_to`, the clone is mated to that piece: its matching
    /// connector is aligned (rotate, then delete → move → reinsert) and
    /// paired with the target's open connector; if the target has no usable
    /// open connector, the clone is instead placed adjacent along the
    /// target's heading.
    pub fn clone_group(
        &mut self,
        gid: &GroupId,
        target: &ContainerId,
        connect_to: Option<&PieceId>,
    ) -> Result<GroupId, StructuralError> {
        self.require_group(gid)?;
        if !self.containers.contains_key(target) {
            return Err(StructuralError::unknown("container", target.as_str()));
        }
        if let Some(pid) = connect_to {
            self.require_piece(pid)?;
        }
        let mut conn_map = HashMap::new();
        let new_gid = self.clone_subtree(gid, target, &mut conn_map)?;
        // Re-pair clones whose original partner was cloned too.
        for (old, new) in &conn_map {
            let Some(partner) = self
                .connections
                .get(old)
                .and_then(|c| c.paired_with.clone())
            else {
                continue;
            };
            let Some(new_partner) = conn_map.get(&partner) else {
                continue;
            };
            let already = self
                .connections
                .get(new)
                .is_some_and(|c| c.paired_with.as_ref() == Some(new_partner));
            if !already {
                self.connect(new, new_partner);
            }
        }
        if let Some(target_piece) = connect_to {
            self.attach_clone(&new_gid, target_piece)?;
        }
        Ok(new_gid)
    }

    fn clone_subtree(
        &mut self,
        src_gid: &GroupId,
        target: &ContainerId,
        conn_map: &mut HashMap<ConnectionId, ConnectionId>,
    ) -> Result<GroupId, StructuralError> {
        let src = self.require_group(src_gid)?;
        let temporary = src.temporary;
        let members = src.members();
        let new_gid = self.create_group(temporary);
        for member in members {
            match member {
                GroupMember::Leaf(pid) => {
                    let new_pid = self.clone_piece_into(&pid, target, conn_map);
                    self.add_to_group(&new_gid, GroupMember::Leaf(new_pid))?;
                }
                GroupMember::Nested(ngid) => {
                    let new_child = self.clone_subtree(&ngid, target, conn_map)?;
                    self.add_to_group(&new_gid, GroupMember::Nested(new_child))?;
                }
            }
        }
        Ok(new_gid)
    }

    /// Mate a freshly cloned group to `target_piece`, or fall back to
    /// adjacent placement when no connector pair can be made.
    fn attach_clone(
        &mut self,
        clone: &GroupId,
        target_piece: &PieceId,
    ) -> Result<(), StructuralError> {
        let target_conn = self.open_connection_from(target_piece, 0);
        let mated = match target_conn {
            Some(tc) => self.mate_connectors(clone, target_piece, &tc),
            None => false,
        };
        if !mated {
            self.place_adjacent(clone, target_piece)?;
        }
        Ok(())
    }

    /// Align the clone's matching connector with `tc` and pair them.
    /// Returns false when the clone has no open connector to offer.
    fn mate_connectors(&mut self, clone: &GroupId, target_piece: &PieceId, tc: &ConnectionId) -> bool {
        let Some(target_kind) = self.pieces.get(target_piece).map(|p| p.kind) else {
            return false;
        };
        let Some(tconn) = self.connections.get(tc) else {
            return false;
        };
        let start = tconn.next_connection_index;
        let conn_kind = tconn.kind;
        // Candidate connectors on the clone: open, kind-compatible,
        // preferring pieces of the target's own kind.
        let mut candidates: Vec<(bool, i32, ConnectionId)> = Vec::new();
        for cid in self.aggregate_connections(clone) {
            let Some(conn) = self.connections.get(&cid) else {
                continue;
            };
            if !conn.is_open() || conn.kind != conn_kind {
                continue;
            }
            let same_kind = self
                .pieces
                .get(&conn.owner)
                .is_some_and(|p| p.kind == target_kind);
            candidates.push((same_kind, conn.connection_index, cid));
        }
        candidates.sort_by_key(|(same_kind, index, _)| (!same_kind, *index));
        // Wrap-around selection: first candidate at or past the target's
        // continuation index, else the first candidate outright.
        let cc = candidates
            .iter()
            .find(|(_, index, _)| *index >= start)
            .or_else(|| candidates.first())
            .map(|(_, _, cid)| cid.clone());
        let Some(cc) = cc else {
            return false;
        };
        let (Some(target_pose), Some(clone_pose)) =
            (self.connection_pose(tc), self.connection_pose(&cc))
        else {
            return false;
        };
        // Turn the clone so the two connectors face each other, then close
        // the positional gap with the full index-sync protocol.
        let delta = normalize_angle(target_pose.angle() + PI - clone_pose.angle());
        self.rotate_group(clone, delta, false);
        let (Some(target_pose), Some(clone_pose)) =
            (self.connection_pose(tc), self.connection_pose(&cc))
        else {
            return false;
        };
        if let Some(pos) = self.group_local_position(clone) {
            let dx = target_pose.x - clone_pose.x;
            let dy = target_pose.y - clone_pose.y;
            self.delete_collision_tree(clone);
            self.move_group(clone, pos.x + dx, pos.y + dy);
            self.insert_collision_tree(clone);
        }
        self.connect(tc, &cc)
    }

    /// Place the clone next to the target, offset by half the clone's plus
    /// half the target's width along the target's heading.
    fn place_adjacent(
        &mut self,
        clone: &GroupId,
        target_piece: &PieceId,
    ) -> Result<(), StructuralError> {
        let target = self.require_piece(target_piece)?;
        let heading = target.pose.angle();
        let target_center = target.world_bounds().center();
        let target_width = target.width();
        let Some(clone_bounds) = self.group_bounds(clone) else {
            return Ok(());
        };
        let distance = (clone_bounds.width + target_width) / 2.0;
        let x = target_center.x + distance * heading.cos();
        let y = target_center.y + distance * heading.sin();
        let Some(group) = self.groups.get(clone) else {
            return Ok(());
        };
        let local = match &group.parent_container {
            Some(cid) => self
                .containers
                .get(cid)
                .map(|c| c.to_local(Point::new(x, y)))
                .unwrap_or(Point::new(x, y)),
            None => Point::new(x, y),
        };
        self.delete_collision_tree(clone);
        self.move_group(clone, local.x, local.y);
        self.insert_collision_tree(clone);
        Ok(())
    }

    // ----- serialization ------------------------------------------------

    /// Minimal-diff record for a group: `group` only when nested, `locked`
    /// only when set.
    pub fn serialize_group(&self, gid: &GroupId) -> Option<GroupRecord> {
        let group = self.groups.get(gid)?;
        Some(GroupRecord {
            id: group.id.to_string(),
            group: group.nested_in.as_ref().map(GroupId::to_string),
            locked: group.locked.then_some(1),
        })
    }

    /// Serialized record for a connection endpoint.
    pub fn serialize_connection(&self, cid: &ConnectionId) -> Option<ConnectionRecord> {
        let conn = self.connections.get(cid)?;
        Some(ConnectionRecord::new(
            conn.id.to_string(),
            conn.paired_with
                .as_ref()
                .map(ConnectionId::to_string)
                .unwrap_or_default(),
        ))
    }

    /// Import a group record (first pass: create the node; nesting is
    /// resolved by [`resolve_group_nesting`](Board::resolve_group_nesting)
    /// once every record exists). Persisted groups are permanent.
    pub fn import_group_record(&mut self, record: &GroupRecord) -> Option<GroupId> {
        if !record.is_valid() {
            warn!(id = %record.id, "skipping malformed group record");
            return None;
        }
        let gid = GroupId::new(record.id.clone());
        if self.groups.contains_key(&gid) {
            warn!(group = %gid, "skipping duplicate group record");
            return None;
        }
        let mut group = PieceGroup::new(gid.clone(), false);
        group.locked = record.locked == Some(1);
        self.groups.insert(gid.clone(), group);
        Some(gid)
    }

    /// Second import pass: link nested groups to their parents.
    pub fn resolve_group_nesting(&mut self, records: &[GroupRecord]) {
        for record in records {
            let Some(parent) = &record.group else {
                continue;
            };
            let child = GroupId::new(record.id.clone());
            let parent = GroupId::new(parent.clone());
            if !self.groups.contains_key(&child) || !self.groups.contains_key(&parent) {
                warn!(child = %child, parent = %parent, "unresolved group nesting reference");
                continue;
            }
            if let Err(err) = self.add_to_group(&parent, GroupMember::Nested(child)) {
                warn!(%err, "group nesting rejected during import");
            }
        }
    }

    /// Adopt a serialized connection id for a live connection, recording
    /// the binding in the import context for pairing resolution.
    pub fn adopt_connection_record(
        &mut self,
        live: &ConnectionId,
        record: &ConnectionRecord,
        ctx: &mut ImportContext,
    ) -> bool {
        if !record.is_valid() {
            warn!(id = %record.id, "skipping malformed connection record");
            return false;
        }
        let adopted = ConnectionId::new(record.id.clone());
        if !self.rebind_connection_id(live, adopted.clone()) {
            return false;
        }
        ctx.resolved.insert(record.id.clone(), adopted);
        true
    }

    /// Final import pass: re-establish pairings named by the records. Both
    /// endpoints must have been adopted into `ctx`; dangling references are
    /// warned and skipped.
    pub fn resolve_pairings(&mut self, records: &[ConnectionRecord], ctx: &ImportContext) {
        for record in records {
            if record.other_connection.is_empty() {
                continue;
            }
            let (Some(a), Some(b)) = (
                ctx.resolve(&record.id).cloned(),
                ctx.resolve(&record.other_connection).cloned(),
            ) else {
                warn!(
                    id = %record.id,
                    other = %record.other_connection,
                    "unresolved pairing reference"
                );
                continue;
            };
            let already = self
                .connections
                .get(&a)
                .is_some_and(|c| c.paired_with.as_ref() == Some(&b));
            if !already {
                self.connect(&a, &b);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with_layer() -> (Board, ContainerId) {
        let mut board = Board::new();
        let layer = board.add_container(Container::new(
            ContainerId::new("layer"),
            Point::default(),
        ));
        (board, layer)
    }

    fn straight_piece(board: &mut Board, layer: &ContainerId, x: f64, y: f64) -> PieceId {
        let pid = board
            .place_piece(
                0,
                layer,
                Pose::new(x, y, 0.0),
                BoundingBox::new(-10.0, -5.0, 20.0, 10.0),
            )
            .unwrap();
        board
            .add_connection(&pid, PolarVector::new(10.0, PI, PI), 0, 0, 1)
            .unwrap();
        board
            .add_connection(&pid, PolarVector::new(10.0, 0.0, 0.0), 0, 1, 0)
            .unwrap();
        pid
    }

    #[test]
    fn placing_a_piece_indexes_and_registers() {
        let (mut board, layer) = board_with_layer();
        let pid = straight_piece(&mut board, &layer, 0.0, 0.0);
        let layer_ref = board.container(&layer).unwrap();
        assert_eq!(layer_ref.tree.len(), 1);
        assert_eq!(layer_ref.open_connections.len(), 2);
        assert_eq!(layer_ref.child_index(&pid), Some(0));
    }

    #[test]
    fn connection_pose_applies_polar_offset() {
        let (mut board, layer) = board_with_layer();
        let pid = straight_piece(&mut board, &layer, 100.0, 50.0);
        let east = board.piece(&pid).unwrap().connections[1].clone();
        let pose = board.connection_pose(&east).unwrap();
        assert!((pose.x - 110.0).abs() < 1e-9);
        assert!((pose.y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn delete_piece_cleans_every_registry() {
        let (mut board, layer) = board_with_layer();
        let a = straight_piece(&mut board, &layer, 0.0, 0.0);
        let b = straight_piece(&mut board, &layer, 20.0, 0.0);
        let a_east = board.piece(&a).unwrap().connections[1].clone();
        let b_west = board.piece(&b).unwrap().connections[0].clone();
        assert!(board.connect(&a_east, &b_west));
        assert!(board.delete_piece(&a));
        // Partner is unpaired and open again.
        let b_west_conn = board.connection(&b_west).unwrap();
        assert!(b_west_conn.is_open());
        let layer_ref = board.container(&layer).unwrap();
        assert!(layer_ref.open_connections.contains(&b_west));
        assert_eq!(layer_ref.tree.len(), 1);
        assert_eq!(layer_ref.child_count(), 1);
        assert!(board.piece(&a).is_none());
    }

    #[test]
    fn rebind_rekeys_registries_atomically() {
        let (mut board, layer) = board_with_layer();
        let pid = straight_piece(&mut board, &layer, 0.0, 0.0);
        let old = board.piece(&pid).unwrap().connections[0].clone();
        let new = ConnectionId::new("imported-1");
        assert!(board.rebind_connection_id(&old, new.clone()));
        assert!(board.connection(&old).is_none());
        assert_eq!(board.connection(&new).unwrap().owner, pid);
        let layer_ref = board.container(&layer).unwrap();
        assert!(!layer_ref.open_connections.contains(&old));
        assert!(layer_ref.open_connections.contains(&new));
        assert_eq!(board.piece(&pid).unwrap().connections[0], new);
    }

    #[test]
    fn open_connection_wraps_to_first() {
        let (mut board, layer) = board_with_layer();
        let pid = straight_piece(&mut board, &layer, 0.0, 0.0);
        let conns = board.piece(&pid).unwrap().connections.clone();
        // start 1 picks index 1; start 2 wraps to the first open.
        assert_eq!(board.open_connection_from(&pid, 1), Some(conns[1].clone()));
        assert_eq!(board.open_connection_from(&pid, 2), Some(conns[0].clone()));
        // Pair away index 0; wrap now lands on index 1.
        let other = straight_piece(&mut board, &layer, -20.0, 0.0);
        let other_east = board.piece(&other).unwrap().connections[1].clone();
        board.connect(&conns[0], &other_east);
        assert_eq!(board.open_connection_from(&pid, 2), Some(conns[1].clone()));
    }

    #[test]
    fn snap_matching_requires_facing_connectors() {
        let (mut board, layer) = board_with_layer();
        let a = straight_piece(&mut board, &layer, 0.0, 0.0);
        let b = straight_piece(&mut board, &layer, 20.5, 0.0);
        let a_east = board.piece(&a).unwrap().connections[1].clone();
        let b_west = board.piece(&b).unwrap().connections[0].clone();
        // a's east connector at (10, 0) heading 0; b's west at (10.5, 0)
        // heading π: in radius and opposite.
        let found = board.find_matching_connection(&a_east, false);
        assert_eq!(found, Some(b_west.clone()));
        // Connecting variant pairs and empties the registries.
        board.find_matching_connection(&a_east, true);
        assert_eq!(
            board.connection(&a_east).unwrap().paired_with,
            Some(b_west.clone())
        );
        assert_eq!(board.connection(&b_west).unwrap().paired_with, Some(a_east));
    }

    #[test]
    fn group_destruction_on_last_member_removal() {
        let (mut board, layer) = board_with_layer();
        let pid = straight_piece(&mut board, &layer, 0.0, 0.0);
        let gid = board.create_group(true);
        board.add_to_group(&gid, GroupMember::Leaf(pid.clone())).unwrap();
        assert!(board.remove_from_group(&gid, &GroupMember::Leaf(pid.clone())));
        let group = board.group(&gid).unwrap();
        assert!(group.destroyed);
        assert_eq!(board.group_size(&gid), 0);
        // Temporary group: the piece itself survives.
        assert!(board.piece(&pid).is_some());
        assert_eq!(board.piece(&pid).unwrap().group, None);
    }

    #[test]
    fn cross_container_add_is_fatal() {
        let (mut board, layer) = board_with_layer();
        let other = board.add_container(Container::new(
            ContainerId::new("other"),
            Point::default(),
        ));
        let a = straight_piece(&mut board, &layer, 0.0, 0.0);
        let b = straight_piece(&mut board, &other, 0.0, 0.0);
        let gid = board.create_group(false);
        board.add_to_group(&gid, GroupMember::Leaf(a)).unwrap();
        let err = board
            .add_to_group(&gid, GroupMember::Leaf(b.clone()))
            .unwrap_err();
        assert!(matches!(err, StructuralError::ContainerMismatch { .. }));
        // State unchanged: b stayed ungrouped, group kept one member.
        assert_eq!(board.piece(&b).unwrap().group, None);
        assert_eq!(board.group_size(&gid), 1);
    }
}
