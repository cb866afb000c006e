//! World wrapper around hecs
//!
//! Owns every entity, its transform and its other components, plus the scenes
//! entities may belong to. All hierarchy wiring and world-space queries go
//! through here so the parent/child links stay consistent.

use std::any::TypeId;

use glam::{Mat4, Quat, Vec3};
use hecs::Entity;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::core::{Scene, SceneConfig, SceneId};

use super::components::{ComponentInfo, Pose};
use super::hierarchy::{HierarchyError, Parent};
use super::transform::TransformNode;

/// Bookkeeping kept next to every entity's transform
#[derive(Debug, Clone)]
struct EntityRecord {
    name: String,
    scene: Option<SceneId>,
    /// Attached components in insertion order; the transform is always first
    components: SmallVec<[ComponentInfo; 4]>,
}

impl EntityRecord {
    fn new(name: String) -> Self {
        let mut components = SmallVec::new();
        components.push(ComponentInfo::of::<TransformNode>());
        Self {
            name,
            scene: None,
            components,
        }
    }
}

fn is_reserved<T: 'static>() -> bool {
    let id = TypeId::of::<T>();
    id == TypeId::of::<TransformNode>() || id == TypeId::of::<EntityRecord>()
}

/// Scene graph world containing all entities and components
pub struct World {
    /// The underlying hecs world
    inner: hecs::World,
    /// Registered scenes
    scenes: FxHashMap<SceneId, Scene>,
    next_scene_id: u32,
}

impl World {
    /// Create a new empty world
    pub fn new() -> Self {
        Self {
            inner: hecs::World::new(),
            scenes: FxHashMap::default(),
            next_scene_id: 0,
        }
    }

    // -------------------------------------------------------------------------
    // Scenes
    // -------------------------------------------------------------------------

    /// Register a scene
    pub fn create_scene(&mut self, config: SceneConfig) -> SceneId {
        let id = SceneId(self.next_scene_id);
        self.next_scene_id += 1;
        log::debug!("Created {id} '{}' with offset {}", config.name, config.offset);
        self.scenes.insert(id, Scene::new(id, config));
        id
    }

    /// Look up a scene
    pub fn scene(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.get(&id)
    }

    /// Change the root offset of a scene
    ///
    /// # Errors
    ///
    /// Returns an error if the scene is not registered
    pub fn set_scene_offset(&mut self, id: SceneId, offset: Vec3) -> Result<(), HierarchyError> {
        let scene = self
            .scenes
            .get_mut(&id)
            .ok_or(HierarchyError::NoSuchScene(id))?;
        scene.set_offset(offset);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Entities and components
    // -------------------------------------------------------------------------

    /// Spawn an entity; it always owns a transform at the origin
    pub fn spawn(&mut self) -> Entity {
        self.spawn_named("")
    }

    /// Spawn a named entity
    pub fn spawn_named(&mut self, name: impl Into<String>) -> Entity {
        let entity = self
            .inner
            .spawn((TransformNode::new(), EntityRecord::new(name.into())));
        log::trace!("Spawned {entity:?}");
        entity
    }

    /// Spawn an entity with an initial local pose
    pub fn spawn_with_pose(&mut self, name: impl Into<String>, pose: Pose) -> Entity {
        self.inner.spawn((
            TransformNode::from_pose(pose),
            EntityRecord::new(name.into()),
        ))
    }

    /// Despawn an entity together with all its descendants
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist
    pub fn despawn(&mut self, entity: Entity) -> Result<(), HierarchyError> {
        if let Some(parent) = self.parent(entity)? {
            self.transform_mut(parent)?.children.remove(entity);
        }

        let mut stack = vec![entity];
        let mut count = 0usize;
        while let Some(current) = stack.pop() {
            let children = self.children(current)?;
            stack.extend(children);
            self.inner
                .despawn(current)
                .map_err(|_| HierarchyError::NoSuchEntity(current))?;
            count += 1;
        }
        log::debug!("Despawned {entity:?} and {} descendants", count - 1);
        Ok(())
    }

    /// Check if an entity exists
    pub fn contains(&self, entity: Entity) -> bool {
        self.inner.contains(entity)
    }

    /// Get the number of entities
    pub fn len(&self) -> u32 {
        self.inner.len()
    }

    /// Check if the world is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Attach a component, replacing one of the same type in place
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist or `T` is the transform
    pub fn add_component<T: hecs::Component>(
        &mut self,
        entity: Entity,
        component: T,
    ) -> Result<(), HierarchyError> {
        if is_reserved::<T>() {
            return Err(HierarchyError::TransformRequired(entity));
        }
        self.inner
            .insert_one(entity, component)
            .map_err(|_| HierarchyError::NoSuchEntity(entity))?;

        let mut record = self.record_mut(entity)?;
        let info = ComponentInfo::of::<T>();
        if !record.components.contains(&info) {
            record.components.push(info);
        }
        Ok(())
    }

    /// Detach a component and return it
    ///
    /// # Errors
    ///
    /// Returns an error if `T` is the transform or the entity lacks `T`
    pub fn remove_component<T: hecs::Component>(
        &mut self,
        entity: Entity,
    ) -> Result<T, HierarchyError> {
        if is_reserved::<T>() {
            return Err(HierarchyError::TransformRequired(entity));
        }
        let component = self
            .inner
            .remove_one::<T>(entity)
            .map_err(|e| component_error::<T>(entity, e))?;
        self.record_mut(entity)?
            .components
            .retain(|info| !info.is::<T>());
        Ok(component)
    }

    /// List attached components in insertion order, transform first
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist
    pub fn components(&self, entity: Entity) -> Result<Vec<ComponentInfo>, HierarchyError> {
        Ok(self.record(entity)?.components.to_vec())
    }

    /// Get a reference to a component
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist or lacks `T`
    pub fn get<T: hecs::Component>(
        &self,
        entity: Entity,
    ) -> Result<hecs::Ref<'_, T>, HierarchyError> {
        self.inner
            .get::<&T>(entity)
            .map_err(|e| component_error::<T>(entity, e))
    }

    /// Get a mutable reference to a component
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist or lacks `T`
    pub fn get_mut<T: hecs::Component>(
        &mut self,
        entity: Entity,
    ) -> Result<hecs::RefMut<'_, T>, HierarchyError> {
        self.inner
            .get::<&mut T>(entity)
            .map_err(|e| component_error::<T>(entity, e))
    }

    /// Get the entity's name
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist
    pub fn name(&self, entity: Entity) -> Result<String, HierarchyError> {
        Ok(self.record(entity)?.name.clone())
    }

    /// Get the scene the entity belongs to
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist
    pub fn entity_scene(&self, entity: Entity) -> Result<Option<SceneId>, HierarchyError> {
        Ok(self.record(entity)?.scene)
    }

    /// Move the entity into a scene, or out of any scene with `None`
    ///
    /// # Errors
    ///
    /// Returns an error if the entity or scene does not exist
    pub fn set_scene(
        &mut self,
        entity: Entity,
        scene: Option<SceneId>,
    ) -> Result<(), HierarchyError> {
        if let Some(id) = scene
            && !self.scenes.contains_key(&id)
        {
            return Err(HierarchyError::NoSuchScene(id));
        }
        self.record_mut(entity)?.scene = scene;
        self.transform_mut(entity)?.mark_dirty();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Transforms
    // -------------------------------------------------------------------------

    /// Get the entity's transform
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist or lacks a transform
    pub fn transform(&self, entity: Entity) -> Result<hecs::Ref<'_, TransformNode>, HierarchyError> {
        self.inner
            .get::<&TransformNode>(entity)
            .map_err(|e| transform_error(entity, e))
    }

    /// Get the entity's transform for editing its local pose
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist or lacks a transform
    pub fn transform_mut(
        &mut self,
        entity: Entity,
    ) -> Result<hecs::RefMut<'_, TransformNode>, HierarchyError> {
        self.inner
            .get::<&mut TransformNode>(entity)
            .map_err(|e| transform_error(entity, e))
    }

    // -------------------------------------------------------------------------
    // Hierarchy
    // -------------------------------------------------------------------------

    /// Get the parent of an entity
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist
    pub fn parent(&self, entity: Entity) -> Result<Option<Entity>, HierarchyError> {
        Ok(self.transform(entity)?.parent())
    }

    /// Get the children of an entity, in insertion order
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist
    pub fn children(&self, entity: Entity) -> Result<Vec<Entity>, HierarchyError> {
        Ok(self.transform(entity)?.children().as_slice().to_vec())
    }

    /// All entities without a parent
    pub fn roots(&self) -> Vec<Entity> {
        self.inner
            .query::<&TransformNode>()
            .iter()
            .filter(|(_, node)| node.parent().is_none())
            .map(|(entity, _)| entity)
            .collect()
    }

    /// Ancestors of an entity, nearest first
    ///
    /// # Errors
    ///
    /// Returns an error if the entity or one of its ancestors does not exist
    pub fn ancestors(&self, entity: Entity) -> Result<Vec<Entity>, HierarchyError> {
        let mut ancestors = Vec::new();
        let mut current = self.parent(entity)?;
        while let Some(parent) = current {
            ancestors.push(parent);
            current = self.parent(parent)?;
        }
        Ok(ancestors)
    }

    /// Check whether `ancestor` is `entity` itself or above it in the hierarchy
    ///
    /// # Errors
    ///
    /// Returns an error if the entity or one of its ancestors does not exist
    pub fn is_ancestor_of(&self, ancestor: Entity, entity: Entity) -> Result<bool, HierarchyError> {
        if ancestor == entity {
            return Ok(true);
        }
        Ok(self.ancestors(entity)?.contains(&ancestor))
    }

    /// Set or clear the parent of an entity.
    ///
    /// The child is detached from its old parent before being appended to the
    /// new parent's children. Nothing is modified if the move is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::CyclicParenting`] if `parent` is the child or
    /// one of its descendants, or an error if either entity does not exist
    pub fn set_parent(
        &mut self,
        child: Entity,
        parent: Option<Entity>,
    ) -> Result<(), HierarchyError> {
        let old = self.parent(child)?;
        if let Some(new) = parent
            && self.is_ancestor_of(child, new)?
        {
            return Err(HierarchyError::CyclicParenting { child, parent: new });
        }
        if old == parent {
            return Ok(());
        }

        if let Some(old) = old {
            self.transform_mut(old)?.children.remove(child);
        }
        if let Some(new) = parent {
            self.transform_mut(new)?.children.add(child);
        }
        {
            let mut node = self.transform_mut(child)?;
            node.parent = parent.map(Parent::new);
            node.mark_dirty();
        }

        log::debug!("Reparented {child:?}: {old:?} -> {parent:?}");
        Ok(())
    }

    /// Reparent an entity while keeping its world pose
    ///
    /// # Errors
    ///
    /// Same as [`set_parent`](Self::set_parent)
    pub fn set_parent_preserving_world(
        &mut self,
        child: Entity,
        parent: Option<Entity>,
    ) -> Result<(), HierarchyError> {
        let world = Pose::from_matrix(&self.update_world_matrix(child)?);
        self.set_parent(child, parent)?;
        self.set_world_with_scale(child, world.position, world.rotation, world.scale)
    }

    // -------------------------------------------------------------------------
    // World matrices
    // -------------------------------------------------------------------------

    /// Reference frame a root entity is composed against, with its revision
    fn root_reference(&self, entity: Entity) -> Result<(Mat4, u64), HierarchyError> {
        match self.record(entity)?.scene {
            Some(id) => {
                let scene = self.scenes.get(&id).ok_or(HierarchyError::NoSuchScene(id))?;
                Ok((scene.offset_matrix(), scene.revision()))
            }
            None => Ok((Mat4::IDENTITY, 0)),
        }
    }

    /// Bring an entity's world matrix up to date and return it.
    ///
    /// Stale ancestors are refreshed first, root to leaf, so the result is
    /// correct regardless of the order in which nodes were modified.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity or one of its ancestors does not exist
    pub fn update_world_matrix(&mut self, entity: Entity) -> Result<Mat4, HierarchyError> {
        let mut chain = self.ancestors(entity)?;
        chain.reverse();
        chain.push(entity);

        let mut reference = self.root_reference(chain[0])?;
        for id in chain {
            let mut node = self.transform_mut(id)?;
            node.refresh(reference.0, reference.1);
            reference = (node.world_matrix(), node.revision());
        }
        Ok(reference.0)
    }

    /// Refresh every stale transform, walking each root top-down.
    ///
    /// Returns the number of nodes that were recomputed.
    pub fn update_all(&mut self) -> usize {
        let mut stack: Vec<(Entity, Mat4, u64)> = Vec::new();
        for root in self.roots() {
            match self.root_reference(root) {
                Ok((matrix, revision)) => stack.push((root, matrix, revision)),
                Err(e) => log::warn!("Skipping {root:?}: {e}"),
            }
        }

        let mut updated = 0;
        while let Some((entity, reference, revision)) = stack.pop() {
            let Ok(mut node) = self.inner.get::<&mut TransformNode>(entity) else {
                log::warn!("Skipping {entity:?}: transform missing");
                continue;
            };
            if node.refresh(reference, revision) {
                updated += 1;
            }
            let (world, revision) = (node.world_matrix(), node.revision());
            stack.extend(
                node.children()
                    .as_slice()
                    .iter()
                    .rev()
                    .map(|&child| (child, world, revision)),
            );
        }

        log::trace!("Transform pass recomputed {updated} nodes");
        updated
    }

    /// Current reference frame of an entity: its parent's world matrix, its
    /// scene offset, or identity
    ///
    /// # Errors
    ///
    /// Returns an error if the entity or one of its ancestors does not exist
    pub fn reference_frame(&mut self, entity: Entity) -> Result<Mat4, HierarchyError> {
        match self.parent(entity)? {
            Some(parent) => self.update_world_matrix(parent),
            None => Ok(self.root_reference(entity)?.0),
        }
    }

    /// Transform a point from the entity's local space to world space
    ///
    /// # Errors
    ///
    /// Returns an error if the entity or one of its ancestors does not exist
    pub fn local_to_world(&mut self, entity: Entity, point: Vec3) -> Result<Vec3, HierarchyError> {
        Ok(self.update_world_matrix(entity)?.transform_point3(point))
    }

    /// Transform a point from world space to the entity's local space
    ///
    /// # Errors
    ///
    /// Returns an error if the entity or one of its ancestors does not exist
    pub fn world_to_local(&mut self, entity: Entity, point: Vec3) -> Result<Vec3, HierarchyError> {
        self.update_world_matrix(entity)?;
        Ok(self.transform(entity)?.world_to_local(point))
    }

    /// Express a world-space pose in the entity's local space
    ///
    /// # Errors
    ///
    /// Returns an error if the entity or one of its ancestors does not exist
    pub fn world_to_local_pose(&mut self, entity: Entity, pose: Pose) -> Result<Pose, HierarchyError> {
        self.update_world_matrix(entity)?;
        Ok(self.transform(entity)?.world_to_local_pose(pose))
    }

    /// Express a pose in the entity's local space in world space
    ///
    /// # Errors
    ///
    /// Returns an error if the entity or one of its ancestors does not exist
    pub fn local_to_world_pose(&mut self, entity: Entity, pose: Pose) -> Result<Pose, HierarchyError> {
        self.update_world_matrix(entity)?;
        Ok(self.transform(entity)?.local_to_world_pose(pose))
    }

    /// World position, rotation and scale of an entity
    ///
    /// # Errors
    ///
    /// Returns an error if the entity or one of its ancestors does not exist
    pub fn world_transformation(&mut self, entity: Entity) -> Result<Pose, HierarchyError> {
        Ok(Pose::from_matrix(&self.update_world_matrix(entity)?))
    }

    /// Place an entity at a world position and rotation, keeping its local scale
    ///
    /// # Errors
    ///
    /// Returns an error if the entity or one of its ancestors does not exist
    pub fn set_world(
        &mut self,
        entity: Entity,
        position: Vec3,
        rotation: Quat,
    ) -> Result<(), HierarchyError> {
        self.solve_world(entity, position, rotation, None)
    }

    /// Place an entity at a world position, rotation and scale
    ///
    /// # Errors
    ///
    /// Returns an error if the entity or one of its ancestors does not exist
    pub fn set_world_with_scale(
        &mut self,
        entity: Entity,
        position: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) -> Result<(), HierarchyError> {
        self.solve_world(entity, position, rotation, Some(scale))
    }

    /// Derive the local pose from a desired world matrix
    ///
    /// # Errors
    ///
    /// Returns an error if the entity or one of its ancestors does not exist
    pub fn set_world_matrix(&mut self, entity: Entity, matrix: Mat4) -> Result<(), HierarchyError> {
        let target = Pose::from_matrix(&matrix);
        self.solve_world(entity, target.position, target.rotation, Some(target.scale))
    }

    fn solve_world(
        &mut self,
        entity: Entity,
        position: Vec3,
        rotation: Quat,
        scale: Option<Vec3>,
    ) -> Result<(), HierarchyError> {
        let reference = Pose::from_matrix(&self.reference_frame(entity)?);
        if reference.scale.cmpeq(Vec3::ZERO).any() {
            log::warn!("Reference frame of {entity:?} has a zero scale axis; local pose will not be finite");
        }
        self.transform_mut(entity)?
            .solve_world(&reference, position, rotation, scale);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn record(&self, entity: Entity) -> Result<hecs::Ref<'_, EntityRecord>, HierarchyError> {
        self.inner
            .get::<&EntityRecord>(entity)
            .map_err(|_| HierarchyError::NoSuchEntity(entity))
    }

    fn record_mut(&mut self, entity: Entity) -> Result<hecs::RefMut<'_, EntityRecord>, HierarchyError> {
        self.inner
            .get::<&mut EntityRecord>(entity)
            .map_err(|_| HierarchyError::NoSuchEntity(entity))
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

fn transform_error(entity: Entity, error: hecs::ComponentError) -> HierarchyError {
    match error {
        hecs::ComponentError::NoSuchEntity => HierarchyError::NoSuchEntity(entity),
        hecs::ComponentError::MissingComponent(_) => HierarchyError::MissingTransform(entity),
    }
}

fn component_error<T: 'static>(entity: Entity, error: hecs::ComponentError) -> HierarchyError {
    match error {
        hecs::ComponentError::NoSuchEntity => HierarchyError::NoSuchEntity(entity),
        hecs::ComponentError::MissingComponent(_) => HierarchyError::MissingComponent {
            entity,
            component: std::any::type_name::<T>(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{approx_eq_quat, approx_eq_vec3};
    use std::f32::consts::{FRAC_PI_2, PI};

    #[derive(Debug, PartialEq)]
    struct Health(u32);

    #[derive(Debug, PartialEq)]
    struct Tag(&'static str);

    /// Snapshot of every parent link and child list, for comparing before/after
    fn links(world: &World, entities: &[Entity]) -> Vec<(Option<Entity>, Vec<Entity>)> {
        entities
            .iter()
            .map(|&e| (world.parent(e).unwrap(), world.children(e).unwrap()))
            .collect()
    }

    #[test]
    fn test_bare_entity_has_only_transform() {
        let mut world = World::new();
        let entity = world.spawn();

        let components = world.components(entity).unwrap();
        assert_eq!(components.len(), 1);
        assert!(components[0].is::<TransformNode>());
        assert!(world.transform(entity).is_ok());
    }

    #[test]
    fn test_components_in_insertion_order() {
        let mut world = World::new();
        let entity = world.spawn_named("Player");

        world.add_component(entity, Tag("hero")).unwrap();
        world.add_component(entity, Health(10)).unwrap();
        // Replacing keeps the original slot
        world.add_component(entity, Tag("villain")).unwrap();

        let components = world.components(entity).unwrap();
        assert_eq!(components.len(), 3);
        assert!(components[0].is::<TransformNode>());
        assert!(components[1].is::<Tag>());
        assert!(components[2].is::<Health>());
        assert_eq!(*world.get::<Tag>(entity).unwrap(), Tag("villain"));
        assert_eq!(world.name(entity).unwrap(), "Player");

        world.get_mut::<Health>(entity).unwrap().0 = 7;
        assert_eq!(world.remove_component::<Health>(entity).unwrap(), Health(7));
        assert_eq!(world.components(entity).unwrap().len(), 2);
    }

    #[test]
    fn test_transform_cannot_be_removed_or_added() {
        let mut world = World::new();
        let entity = world.spawn();

        assert_eq!(
            world.remove_component::<TransformNode>(entity).unwrap_err(),
            HierarchyError::TransformRequired(entity)
        );
        assert_eq!(
            world
                .add_component(entity, TransformNode::new())
                .unwrap_err(),
            HierarchyError::TransformRequired(entity)
        );
        assert_eq!(world.components(entity).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_component() {
        let mut world = World::new();
        let entity = world.spawn();

        assert!(matches!(
            world.remove_component::<Health>(entity),
            Err(HierarchyError::MissingComponent { .. })
        ));
        assert!(matches!(
            world.get::<Health>(entity),
            Err(HierarchyError::MissingComponent { .. })
        ));
    }

    #[test]
    fn test_point_round_trip_unparented() {
        let mut world = World::new();
        let entity = world.spawn();
        world
            .transform_mut(entity)
            .unwrap()
            .set_position(Vec3::new(1.0, 2.0, 3.0));
        world.update_world_matrix(entity).unwrap();

        let node = world.transform(entity).unwrap();
        assert!(approx_eq_vec3(node.local_to_world(Vec3::ZERO), Vec3::new(1.0, 2.0, 3.0)));
        assert!(approx_eq_vec3(node.world_to_local(Vec3::new(1.0, 2.0, 3.0)), Vec3::ZERO));
    }

    #[test]
    fn test_rotation_scale_composition() {
        let mut world = World::new();
        let entity = world.spawn();
        world.transform_mut(entity).unwrap().set(
            Vec3::X,
            Quat::from_rotation_x(FRAC_PI_2),
            Vec3::splat(2.0),
        );

        let point = world.local_to_world(entity, Vec3::Y).unwrap();
        assert!(approx_eq_vec3(point, Vec3::new(1.0, 0.0, 2.0)));

        let local = world.world_to_local_pose(entity, Pose::IDENTITY).unwrap();
        assert!(approx_eq_vec3(local.position, Vec3::new(-0.5, 0.0, 0.0)));
        assert!(approx_eq_quat(local.rotation, Quat::from_rotation_x(-FRAC_PI_2)));
        assert!(approx_eq_vec3(local.scale, Vec3::splat(0.5)));
    }

    #[test]
    fn test_set_world_through_parent_and_scene() {
        let mut world = World::new();
        let scene = world.create_scene(SceneConfig::default().with_offset(Vec3::X));
        let parent = world.spawn_named("Parent");
        world.set_scene(parent, Some(scene)).unwrap();
        let child = world.spawn_named("Child");
        world.set_parent(child, Some(parent)).unwrap();

        world.transform_mut(parent).unwrap().set(
            Vec3::X,
            Quat::from_rotation_y(-FRAC_PI_2),
            Vec3::splat(0.5),
        );
        world.update_world_matrix(child).unwrap();
        world.set_world(child, Vec3::ZERO, Quat::IDENTITY).unwrap();
        world.update_world_matrix(child).unwrap();

        {
            let node = world.transform(child).unwrap();
            assert!(approx_eq_vec3(node.position(), Vec3::new(0.0, 0.0, 4.0)));
            assert!(approx_eq_quat(node.rotation(), Quat::from_rotation_y(FRAC_PI_2)));
            assert_eq!(node.scale(), Vec3::ONE);
        }

        let pose = world.world_transformation(child).unwrap();
        assert!(approx_eq_vec3(pose.position, Vec3::ZERO));
        assert!(approx_eq_quat(pose.rotation, Quat::IDENTITY));
    }

    #[test]
    fn test_set_world_deep_chain_round_trip() {
        let mut world = World::new();
        let scene = world.create_scene(SceneConfig::default().with_offset(Vec3::new(0.0, -3.0, 1.0)));
        let a = world.spawn_with_pose(
            "a",
            Pose::new(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_z(0.3), Vec3::splat(2.0)),
        );
        let b = world.spawn_with_pose(
            "b",
            Pose::new(Vec3::new(-1.0, 0.5, 0.0), Quat::from_rotation_x(1.1), Vec3::splat(0.25)),
        );
        let c = world.spawn();
        world.set_scene(a, Some(scene)).unwrap();
        world.set_parent(b, Some(a)).unwrap();
        world.set_parent(c, Some(b)).unwrap();

        let target = Pose::new(
            Vec3::new(4.0, -2.0, 7.0),
            Quat::from_rotation_y(PI / 3.0) * Quat::from_rotation_x(0.2),
            Vec3::splat(3.0),
        );
        world
            .set_world_with_scale(c, target.position, target.rotation, target.scale)
            .unwrap();

        assert!(world.world_transformation(c).unwrap().approx_eq(&target));
    }

    #[test]
    fn test_set_world_matrix() {
        let mut world = World::new();
        let parent = world.spawn_with_pose(
            "parent",
            Pose::new(Vec3::Y, Quat::from_rotation_z(FRAC_PI_2), Vec3::ONE),
        );
        let child = world.spawn();
        world.set_parent(child, Some(parent)).unwrap();

        let target = Pose::new(Vec3::new(2.0, 0.0, 0.0), Quat::from_rotation_x(0.5), Vec3::splat(2.0));
        world.set_world_matrix(child, target.matrix()).unwrap();

        assert!(world.world_transformation(child).unwrap().approx_eq(&target));
    }

    #[test]
    fn test_scene_offset_applies_to_roots() {
        let mut world = World::new();
        let scene = world.create_scene(SceneConfig::default().with_offset(Vec3::X));
        let root = world.spawn();
        world.set_scene(root, Some(scene)).unwrap();

        let pose = world.world_transformation(root).unwrap();
        assert!(approx_eq_vec3(pose.position, Vec3::X));

        // The offset is read again after it changes
        world.set_scene_offset(scene, Vec3::new(0.0, 5.0, 0.0)).unwrap();
        let pose = world.world_transformation(root).unwrap();
        assert!(approx_eq_vec3(pose.position, Vec3::new(0.0, 5.0, 0.0)));

        world.set_scene(root, None).unwrap();
        let pose = world.world_transformation(root).unwrap();
        assert!(approx_eq_vec3(pose.position, Vec3::ZERO));
    }

    #[test]
    fn test_unknown_scene_rejected() {
        let mut world = World::new();
        let entity = world.spawn();
        let bogus = SceneId(42);

        assert_eq!(
            world.set_scene(entity, Some(bogus)).unwrap_err(),
            HierarchyError::NoSuchScene(bogus)
        );
        assert_eq!(
            world.set_scene_offset(bogus, Vec3::X).unwrap_err(),
            HierarchyError::NoSuchScene(bogus)
        );
    }

    #[test]
    fn test_reparent_to_descendant_rejected() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        let c = world.spawn();
        world.set_parent(b, Some(a)).unwrap();
        world.set_parent(c, Some(b)).unwrap();

        let before = links(&world, &[a, b, c]);
        assert_eq!(
            world.set_parent(a, Some(c)).unwrap_err(),
            HierarchyError::CyclicParenting { child: a, parent: c }
        );
        assert_eq!(
            world.set_parent(a, Some(a)).unwrap_err(),
            HierarchyError::CyclicParenting { child: a, parent: a }
        );
        assert_eq!(links(&world, &[a, b, c]), before);
    }

    #[test]
    fn test_reparent_detaches_from_old_parent() {
        let mut world = World::new();
        let old = world.spawn();
        let new = world.spawn();
        let child = world.spawn();
        let sibling = world.spawn();
        world.set_parent(child, Some(old)).unwrap();
        world.set_parent(sibling, Some(old)).unwrap();

        world.set_parent(child, Some(new)).unwrap();
        assert_eq!(world.children(old).unwrap(), vec![sibling]);
        assert_eq!(world.children(new).unwrap(), vec![child]);
        assert_eq!(world.parent(child).unwrap(), Some(new));

        // Setting the same parent again does not duplicate the entry
        world.set_parent(child, Some(new)).unwrap();
        assert_eq!(world.children(new).unwrap(), vec![child]);

        world.set_parent(child, None).unwrap();
        assert!(world.children(new).unwrap().is_empty());
        assert!(world.roots().contains(&child));
    }

    #[test]
    fn test_child_follows_parent_changes() {
        let mut world = World::new();
        let parent = world.spawn();
        let child = world.spawn_with_pose("child", Pose::from_position(Vec3::X));
        world.set_parent(child, Some(parent)).unwrap();
        assert!(approx_eq_vec3(world.local_to_world(child, Vec3::ZERO).unwrap(), Vec3::X));

        // Mutating only the parent must still be picked up by the child
        world
            .transform_mut(parent)
            .unwrap()
            .set_position(Vec3::new(0.0, 10.0, 0.0));
        assert!(approx_eq_vec3(
            world.local_to_world(child, Vec3::ZERO).unwrap(),
            Vec3::new(1.0, 10.0, 0.0)
        ));
    }

    #[test]
    fn test_sibling_sees_parent_refreshed_through_other_child() {
        let mut world = World::new();
        let parent = world.spawn();
        let a = world.spawn();
        let b = world.spawn();
        world.set_parent(a, Some(parent)).unwrap();
        world.set_parent(b, Some(parent)).unwrap();
        world.update_all();

        world.transform_mut(parent).unwrap().translate(Vec3::Z);
        world.update_world_matrix(a).unwrap();

        let pose = world.world_transformation(b).unwrap();
        assert!(approx_eq_vec3(pose.position, Vec3::Z));
    }

    #[test]
    fn test_update_all_walks_top_down() {
        let mut world = World::new();
        let root = world.spawn_with_pose("root", Pose::from_position(Vec3::X));
        let mid = world.spawn_with_pose("mid", Pose::from_position(Vec3::Y));
        let leaf = world.spawn_with_pose("leaf", Pose::from_position(Vec3::Z));
        world.set_parent(mid, Some(root)).unwrap();
        world.set_parent(leaf, Some(mid)).unwrap();

        assert_eq!(world.update_all(), 3);
        assert_eq!(world.update_all(), 0);
        assert!(approx_eq_vec3(
            world.transform(leaf).unwrap().local_to_world(Vec3::ZERO),
            Vec3::ONE
        ));

        // Touching the middle node recomputes it and its subtree only
        world.transform_mut(mid).unwrap().translate(Vec3::Y);
        assert_eq!(world.update_all(), 2);
        assert!(approx_eq_vec3(
            world.transform(leaf).unwrap().local_to_world(Vec3::ZERO),
            Vec3::new(1.0, 2.0, 1.0)
        ));
    }

    #[test]
    fn test_set_parent_preserving_world() {
        let mut world = World::new();
        let parent = world.spawn_with_pose(
            "parent",
            Pose::new(Vec3::new(3.0, 0.0, 0.0), Quat::from_rotation_y(FRAC_PI_2), Vec3::splat(2.0)),
        );
        let child = world.spawn_with_pose("child", Pose::from_position(Vec3::new(0.0, 1.0, 0.0)));
        let before = world.world_transformation(child).unwrap();

        world.set_parent_preserving_world(child, Some(parent)).unwrap();
        assert_eq!(world.parent(child).unwrap(), Some(parent));
        assert!(world.world_transformation(child).unwrap().approx_eq(&before));
    }

    #[test]
    fn test_despawn_removes_subtree() {
        let mut world = World::new();
        let root = world.spawn();
        let a = world.spawn();
        let b = world.spawn();
        let c = world.spawn();
        world.set_parent(a, Some(root)).unwrap();
        world.set_parent(b, Some(a)).unwrap();
        world.set_parent(c, Some(root)).unwrap();

        world.despawn(a).unwrap();
        assert!(!world.contains(a));
        assert!(!world.contains(b));
        assert!(world.contains(c));
        assert_eq!(world.children(root).unwrap(), vec![c]);
        assert_eq!(world.len(), 2);

        assert!(matches!(
            world.transform(a),
            Err(HierarchyError::NoSuchEntity(_))
        ));
    }

    #[test]
    fn test_ancestors() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        let c = world.spawn();
        world.set_parent(b, Some(a)).unwrap();
        world.set_parent(c, Some(b)).unwrap();

        assert_eq!(world.ancestors(c).unwrap(), vec![b, a]);
        assert!(world.is_ancestor_of(a, c).unwrap());
        assert!(!world.is_ancestor_of(c, a).unwrap());
        assert_eq!(world.roots(), vec![a]);
    }

    #[test]
    fn test_zero_scale_is_not_corrected() {
        let mut world = World::new();
        let entity = world.spawn();
        world
            .transform_mut(entity)
            .unwrap()
            .set_scale(Vec3::new(1.0, 0.0, 1.0));
        world.update_world_matrix(entity).unwrap();

        let point = world.transform(entity).unwrap().world_to_local(Vec3::ONE);
        assert!(!point.is_finite());
    }
}
