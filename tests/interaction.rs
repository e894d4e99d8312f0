//! Breaking and placing blocks through the world context.

use glam::{IVec2, Vec2};

use blockstream::{Aabb, BlockType, LogProgress, TILE_SIZE, World, WorldConfig};

fn loaded_world(seed: u64) -> World {
    let world = World::new(WorldConfig {
        view_radius: 1,
        unload_radius: 2,
        worker_count: 2,
        ..WorldConfig::with_seed(seed)
    })
    .unwrap();
    world.initial_load(&LogProgress);
    world
}

/// An air cell inside the loaded area, found by scanning up from spawn.
fn air_above_spawn(world: &World) -> (i32, i32) {
    let spawn = world.spawn_point();
    let mut y = spawn.surface_y - 1;
    while !world.get_block(spawn.block_x, y).is_air() {
        y -= 1;
    }
    (spawn.block_x, y)
}

#[test]
fn breaking_removes_the_block() {
    let world = loaded_world(42);
    let spawn = world.spawn_point();
    let (x, y) = (spawn.block_x, spawn.surface_y);
    assert!(!world.get_block(x, y).is_air());

    assert!(world.break_block(x, y));
    assert_eq!(world.get_block(x, y), BlockType::Air);
    assert_eq!(world.to_int_grid().block_at(x, y), Some(BlockType::Air));
}

#[test]
fn breaking_air_fails() {
    let world = loaded_world(42);
    let (x, y) = air_above_spawn(&world);
    assert!(!world.break_block(x, y));
}

#[test]
fn ungenerated_space_rejects_both_operations() {
    let world = loaded_world(42);
    let far = 1_000_000;
    assert_eq!(world.get_block(far, 0), BlockType::Air);
    assert!(!world.break_block(far, 0));
    assert!(!world.place_block(far, 0, BlockType::Stone, &[]));
}

#[test]
fn placing_into_air_succeeds() {
    let world = loaded_world(42);
    let (x, y) = air_above_spawn(&world);
    assert!(world.place_block(x, y, BlockType::Wood, &[]));
    assert_eq!(world.get_block(x, y), BlockType::Wood);
    assert!(world.cache().peek(blockstream::ChunkCoord::from_block(x, y)).unwrap().player_modified);
}

#[test]
fn placing_into_an_occupied_cell_fails() {
    let world = loaded_world(42);
    let spawn = world.spawn_point();
    let before = world.get_block(spawn.block_x, spawn.surface_y);
    let grid_before = world.to_int_grid();
    assert!(!world.place_block(spawn.block_x, spawn.surface_y, BlockType::Stone, &[]));
    assert_eq!(world.get_block(spawn.block_x, spawn.surface_y), before);
    assert_eq!(*world.to_int_grid(), *grid_before);
}

#[test]
fn placing_air_fails() {
    let world = loaded_world(42);
    let (x, y) = air_above_spawn(&world);
    assert!(!world.place_block(x, y, BlockType::Air, &[]));
}

#[test]
fn placing_inside_an_entity_fails() {
    let world = loaded_world(42);
    let (x, y) = air_above_spawn(&world);
    let tile = TILE_SIZE as f32;

    let inside = Aabb::new(Vec2::new(x as f32 * tile + 2.0, y as f32 * tile - 10.0), IVec2::new(12, 28));
    assert!(!world.place_block(x, y, BlockType::Stone, &[inside]));
    assert!(world.get_block(x, y).is_air());

    // touching the cell's left edge is not an overlap
    let beside = Aabb::new(Vec2::new(x as f32 * tile - 12.0, y as f32 * tile), IVec2::new(12, 16));
    assert!(world.place_block(x, y, BlockType::Stone, &[beside]));
}

#[test]
fn edits_are_lost_on_eviction() {
    let world = loaded_world(42);
    let spawn = world.spawn_point();
    let (x, y) = (spawn.block_x, spawn.surface_y);
    let original = world.get_block(x, y);
    assert!(world.break_block(x, y));

    world.cache().evict(spawn.chunk);
    assert_eq!(world.get_block(x, y), BlockType::Air);
    world.cache().get(spawn.chunk);
    assert_eq!(world.get_block(x, y), original);
}
