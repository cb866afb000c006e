//! Hierarchical transform node with cached matrices
//!
//! A [`TransformNode`] stores a local position, rotation and scale together
//! with the matrices derived from them. The world matrix is composed against a
//! *reference frame*: the parent's world matrix, the scene offset for roots of
//! a scene, or identity.
//!
//! # Staleness
//!
//! A node must be refreshed whenever its local pose changed (the dirty flag)
//! or its reference frame changed. Reference changes are detected through
//! revisions: every refresh bumps the node's revision, and a child remembers
//! the revision of the reference it was last composed against.
//!
//! The node never walks the hierarchy itself; [`World`](super::World) feeds
//! it the reference frame top-down.

use glam::{Mat4, Quat, Vec3};

use super::components::Pose;
use super::hierarchy::{Children, Parent};

/// Local pose of an entity plus its cached local and world matrices.
///
/// Every entity owns exactly one of these, attached when it is spawned.
#[derive(Debug, Clone)]
pub struct TransformNode {
    /// Position relative to the reference frame
    position: Vec3,
    /// Rotation relative to the reference frame
    rotation: Quat,
    /// Scale relative to the reference frame
    scale: Vec3,

    /// Scale, then rotation, then translation
    local_matrix: Mat4,
    /// `reference * local_matrix`, valid after a refresh
    world_matrix: Mat4,

    pub(crate) parent: Option<Parent>,
    pub(crate) children: Children,

    /// Local pose or reference changed since the last refresh
    dirty: bool,
    /// Bumped every time the world matrix is recomputed
    revision: u64,
    /// Revision of the reference frame seen at the last refresh
    reference_revision: u64,
}

impl TransformNode {
    /// Create a node at the origin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from a local pose.
    #[must_use]
    pub fn from_pose(pose: Pose) -> Self {
        Self {
            position: pose.position,
            rotation: pose.rotation,
            scale: pose.scale,
            ..Self::default()
        }
    }

    // -------------------------------------------------------------------------
    // Local pose
    // -------------------------------------------------------------------------

    /// Get the local position.
    #[must_use]
    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Get the local rotation.
    #[must_use]
    #[inline]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Get the local scale.
    #[must_use]
    #[inline]
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Get the local pose.
    #[must_use]
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation, self.scale)
    }

    /// Set the local position.
    #[inline]
    pub fn set_position(&mut self, position: Vec3) {
        if self.position != position {
            self.position = position;
            self.dirty = true;
        }
    }

    /// Set the local rotation.
    #[inline]
    pub fn set_rotation(&mut self, rotation: Quat) {
        if self.rotation != rotation {
            self.rotation = rotation;
            self.dirty = true;
        }
    }

    /// Set the local scale.
    #[inline]
    pub fn set_scale(&mut self, scale: Vec3) {
        if self.scale != scale {
            self.scale = scale;
            self.dirty = true;
        }
    }

    /// Set all local components at once.
    #[inline]
    pub fn set(&mut self, position: Vec3, rotation: Quat, scale: Vec3) {
        self.position = position;
        self.rotation = rotation;
        self.scale = scale;
        self.dirty = true;
    }

    /// Set the local pose.
    pub fn set_pose(&mut self, pose: Pose) {
        self.set(pose.position, pose.rotation, pose.scale);
    }

    /// Translate by a delta.
    #[inline]
    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
        self.dirty = true;
    }

    /// Rotate by a quaternion.
    #[inline]
    pub fn rotate(&mut self, rotation: Quat) {
        self.rotation = rotation * self.rotation;
        self.dirty = true;
    }

    /// Rotate by euler angles (in radians).
    #[inline]
    pub fn rotate_euler(&mut self, euler: Vec3) {
        let rot = Quat::from_euler(glam::EulerRot::XYZ, euler.x, euler.y, euler.z);
        self.rotation = rot * self.rotation;
        self.dirty = true;
    }

    /// Scale by a per-axis factor.
    #[inline]
    pub fn scale_by(&mut self, factor: Vec3) {
        self.scale *= factor;
        self.dirty = true;
    }

    /// Get the local forward direction (negative Z).
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Get the local right direction (positive X).
    #[must_use]
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Get the local up direction (positive Y).
    #[must_use]
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    // -------------------------------------------------------------------------
    // Hierarchy links (mutated only through `World`)
    // -------------------------------------------------------------------------

    /// Get the parent entity, if any.
    #[must_use]
    pub fn parent(&self) -> Option<hecs::Entity> {
        self.parent.map(|p| p.entity())
    }

    /// Get the children, in insertion order.
    #[must_use]
    pub fn children(&self) -> &Children {
        &self.children
    }

    // -------------------------------------------------------------------------
    // Matrices
    // -------------------------------------------------------------------------

    /// Compose the local matrix from the current local pose.
    ///
    /// Unlike [`local_matrix`](Self::local_matrix) this never reads the cache.
    #[must_use]
    pub fn compose_local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Local matrix as of the last refresh.
    #[must_use]
    #[inline]
    pub fn local_matrix(&self) -> Mat4 {
        self.local_matrix
    }

    /// World matrix as of the last refresh.
    ///
    /// Only current if this node and its ancestors were refreshed since
    /// their last mutation.
    #[must_use]
    #[inline]
    pub fn world_matrix(&self) -> Mat4 {
        self.world_matrix
    }

    /// Recompose the local and world matrices against `reference`.
    ///
    /// Skips the work when the local pose is clean and the reference has the
    /// same revision as last time. Returns whether anything was recomputed.
    pub(crate) fn refresh(&mut self, reference: Mat4, reference_revision: u64) -> bool {
        if !self.dirty && self.reference_revision == reference_revision {
            return false;
        }
        self.local_matrix = self.compose_local_matrix();
        self.world_matrix = reference * self.local_matrix;
        self.reference_revision = reference_revision;
        self.revision += 1;
        self.dirty = false;
        true
    }

    /// Check if the local pose changed since the last refresh.
    #[must_use]
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Force the next refresh to recompute.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Number of times the world matrix was recomputed.
    #[must_use]
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    // -------------------------------------------------------------------------
    // Space conversions (read the cached world matrix)
    // -------------------------------------------------------------------------

    /// Transform a point from local to world space.
    #[must_use]
    pub fn local_to_world(&self, point: Vec3) -> Vec3 {
        self.world_matrix.transform_point3(point)
    }

    /// Transform a point from world to local space.
    ///
    /// A world matrix with a zero scale axis is not invertible; the result is
    /// then non-finite.
    #[must_use]
    pub fn world_to_local(&self, point: Vec3) -> Vec3 {
        self.world_matrix.inverse().transform_point3(point)
    }

    /// Express a local-space pose in world space.
    #[must_use]
    pub fn local_to_world_pose(&self, pose: Pose) -> Pose {
        Pose::from_matrix(&(self.world_matrix * pose.matrix()))
    }

    /// Express a world-space pose in this node's local space.
    ///
    /// With [`Pose::IDENTITY`] this is the flattened decomposition of the
    /// inverse world transform.
    #[must_use]
    pub fn world_to_local_pose(&self, pose: Pose) -> Pose {
        Pose::from_matrix(&(self.world_matrix.inverse() * pose.matrix()))
    }

    /// Decompose the world matrix into position, rotation and scale.
    #[must_use]
    pub fn world_transformation(&self) -> Pose {
        Pose::from_matrix(&self.world_matrix)
    }

    // -------------------------------------------------------------------------
    // Inverse pose solve
    // -------------------------------------------------------------------------

    /// Assign the local pose that places this node at the given world pose
    /// once composed against `reference`.
    ///
    /// `scale` of `None` keeps the current local scale.
    pub(crate) fn solve_world(
        &mut self,
        reference: &Pose,
        position: Vec3,
        rotation: Quat,
        scale: Option<Vec3>,
    ) {
        let inverse_rotation = reference.rotation.inverse();

        self.rotation = inverse_rotation * rotation;
        self.position = (inverse_rotation * (position - reference.position)) / reference.scale;
        if let Some(scale) = scale {
            self.scale = scale / reference.scale;
        }
        self.dirty = true;
    }
}

impl Default for TransformNode {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            local_matrix: Mat4::IDENTITY,
            world_matrix: Mat4::IDENTITY,
            parent: None,
            children: Children::new(),
            dirty: true,
            revision: 0,
            reference_revision: 0,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
