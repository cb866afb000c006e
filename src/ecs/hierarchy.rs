//! Entity hierarchy types
//!
//! Parent links and child lists stored inside each [`TransformNode`], plus the
//! errors raised when the hierarchy is misused.
//!
//! [`TransformNode`]: super::TransformNode

use hecs::Entity;
use smallvec::SmallVec;

use crate::core::SceneId;

/// Non-owning link from a node to its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parent(pub Entity);

impl Parent {
    /// Create a new parent reference
    #[must_use]
    pub const fn new(entity: Entity) -> Self {
        Self(entity)
    }

    /// Get the parent entity
    #[must_use]
    pub const fn entity(&self) -> Entity {
        self.0
    }
}

/// Ordered list of child entities, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Children(pub SmallVec<[Entity; 8]>);

impl Children {
    /// Create an empty children list
    #[must_use]
    pub fn new() -> Self {
        Self(SmallVec::new())
    }

    /// Add a child, ignoring duplicates
    pub fn add(&mut self, child: Entity) {
        if !self.0.contains(&child) {
            self.0.push(child);
        }
    }

    /// Remove a child
    pub fn remove(&mut self, child: Entity) -> bool {
        if let Some(pos) = self.0.iter().position(|&e| e == child) {
            self.0.remove(pos);
            true
        } else {
            false
        }
    }

    /// Check whether `entity` is a direct child
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.0.contains(&entity)
    }

    /// Check if this entity has children
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the number of children
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over children
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.0.iter()
    }

    /// Children as a slice
    #[must_use]
    pub fn as_slice(&self) -> &[Entity] {
        &self.0
    }
}

/// Errors that can occur when wiring or querying the hierarchy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    /// The entity does not exist
    NoSuchEntity(Entity),
    /// The entity has no transform (something bypassed `World::spawn`)
    MissingTransform(Entity),
    /// Parenting would make a node its own ancestor
    CyclicParenting {
        /// Node being reparented
        child: Entity,
        /// Requested parent
        parent: Entity,
    },
    /// The transform cannot be removed, replaced or added twice
    TransformRequired(Entity),
    /// The entity has no component of the requested type
    MissingComponent {
        /// Entity that was queried
        entity: Entity,
        /// Type name of the missing component
        component: &'static str,
    },
    /// The scene is not registered with the world
    NoSuchScene(SceneId),
}

impl std::fmt::Display for HierarchyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSuchEntity(e) => write!(f, "no such entity: {e:?}"),
            Self::MissingTransform(e) => write!(f, "entity {e:?} has no transform"),
            Self::CyclicParenting { child, parent } => write!(
                f,
                "invalid hierarchy: {parent:?} cannot become the parent of its ancestor {child:?}"
            ),
            Self::TransformRequired(e) => {
                write!(f, "entity {e:?} must own exactly one transform")
            }
            Self::MissingComponent { entity, component } => {
                write!(f, "entity {entity:?} has no {component} component")
            }
            Self::NoSuchScene(id) => write!(f, "no such scene: {id}"),
        }
    }
}

impl std::error::Error for HierarchyError {}
