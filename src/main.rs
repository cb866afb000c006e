//! Example demonstrating hierarchical transforms

use std::f32::consts::FRAC_PI_2;

use scene_transform::prelude::*;

const SCENE_CONFIG: &str = r#"(name: "Demo", offset: (1.0, 0.0, 0.0))"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    let mut world = World::new();
    let scene = world.create_scene(SceneConfig::from_ron_str(SCENE_CONFIG)?);

    let arm = world.spawn_named("Arm");
    world.set_scene(arm, Some(scene))?;
    world.transform_mut(arm)?.set(
        Vec3::X,
        Quat::from_rotation_y(-FRAC_PI_2),
        Vec3::splat(0.5),
    );

    let hand = world.spawn_named("Hand");
    world.set_parent(hand, Some(arm))?;
    world.transform_mut(hand)?.set_position(Vec3::new(0.0, 0.0, 2.0));

    let updated = world.update_all();
    log::info!("Initial pass recomputed {updated} transforms");
    log_pose(&mut world, hand)?;

    // Move the hand back to the world origin through its parent chain
    world.set_world(hand, Vec3::ZERO, Quat::IDENTITY)?;
    log::info!("Hand local position is now {}", world.transform(hand)?.position());
    log_pose(&mut world, hand)?;

    if let Err(e) = world.set_parent(arm, Some(hand)) {
        log::warn!("Rejected reparent: {e}");
    }

    Ok(())
}

fn log_pose(world: &mut World, entity: hecs::Entity) -> Result<(), HierarchyError> {
    let pose = world.world_transformation(entity)?;
    log::info!(
        "{}: world position {} rotation {} scale {}",
        world.name(entity)?,
        pose.position,
        pose.rotation,
        pose.scale
    );
    Ok(())
}
