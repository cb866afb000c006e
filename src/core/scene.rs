//! Scene anchor
//!
//! A scene contributes one translation, applied ahead of every root entity
//! that belongs to it. Scenes are configured through [`SceneConfig`], which can
//! be written by hand or read from RON (Rusty Object Notation) or JSON.

use std::fmt;
use std::fs;
use std::path::Path;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Identifier of a scene registered with a [`World`](crate::ecs::World)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(pub(crate) u32);

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene#{}", self.0)
    }
}

/// Scene configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Scene name
    pub name: String,
    /// World-space offset applied to root entities
    #[serde(default)]
    pub offset: Vec3,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            name: String::from("Untitled"),
            offset: Vec3::ZERO,
        }
    }
}

impl SceneConfig {
    /// Create a new config with a name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the root offset
    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    /// Parse a config from RON text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid config
    pub fn from_ron_str(text: &str) -> Result<Self, SceneError> {
        ron::from_str(text).map_err(|e| SceneError::DeserializeError(e.to_string()))
    }

    /// Parse a config from JSON text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid config
    pub fn from_json_str(text: &str) -> Result<Self, SceneError> {
        serde_json::from_str(text).map_err(|e| SceneError::DeserializeError(e.to_string()))
    }

    /// Load a config from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let content = fs::read_to_string(path).map_err(|e| SceneError::IoError(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Load a config from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let content = fs::read_to_string(path).map_err(|e| SceneError::IoError(e.to_string()))?;
        Self::from_json_str(&content)
    }
}

/// A scene as seen by the transform core: a name and a root offset
#[derive(Debug, Clone)]
pub struct Scene {
    id: SceneId,
    name: String,
    offset: Vec3,
    /// Bumped whenever the offset changes
    revision: u64,
}

impl Scene {
    pub(crate) fn new(id: SceneId, config: SceneConfig) -> Self {
        Self {
            id,
            name: config.name,
            offset: config.offset,
            revision: 1,
        }
    }

    /// Scene identifier
    #[must_use]
    pub const fn id(&self) -> SceneId {
        self.id
    }

    /// Scene name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// World-space offset applied to root entities
    #[must_use]
    pub const fn offset(&self) -> Vec3 {
        self.offset
    }

    /// The offset as a translation-only matrix
    #[must_use]
    pub fn offset_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.offset)
    }

    /// Number of offset changes, starting at 1
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn set_offset(&mut self, offset: Vec3) {
        if self.offset != offset {
            self.offset = offset;
            self.revision += 1;
        }
    }
}

/// Errors that can occur while loading scene configuration
#[derive(Debug, Clone)]
pub enum SceneError {
    /// IO error
    IoError(String),
    /// Deserialization error
    DeserializeError(String),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::DeserializeError(e) => write!(f, "Deserialization error: {e}"),
        }
    }
}

impl std::error::Error for SceneError {}
