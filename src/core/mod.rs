//! Core scene types
//!
//! Contains the scene anchor and its configuration

mod scene;

pub use scene::{Scene, SceneConfig, SceneError, SceneId};
