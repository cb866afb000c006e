//! Spatial transform core of an entity/component scene graph
//!
//! This crate provides:
//! - Local position/rotation/scale per entity, composed into world matrices
//! - Point and pose conversion between local and world space
//! - Solving the local pose that reaches a desired world pose
//! - Parent/child hierarchy with cycle detection, built on hecs
//! - Scene-level root offsets

pub mod core;
pub mod ecs;

// Re-exports for convenience
pub use glam;
pub use hecs;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::core::{Scene, SceneConfig, SceneError, SceneId};
    pub use crate::ecs::{HierarchyError, Pose, TransformNode, World};
    pub use glam::{Mat4, Quat, Vec3};
}
