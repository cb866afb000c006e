//! Entity Component System module
//!
//! Built on top of the hecs ECS library

mod components;
mod hierarchy;
mod transform;
mod world;

pub use components::{ComponentInfo, EPSILON, Pose, approx_eq_quat, approx_eq_vec3};
pub use hierarchy::{Children, HierarchyError, Parent};
pub use transform::TransformNode;
pub use world::World;
