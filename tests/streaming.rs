//! Load/unload behaviour of a world driven by a moving observer.

use std::collections::HashSet;
use std::time::Duration;

use glam::Vec2;

use blockstream::{CHUNK_HEIGHT, CHUNK_WIDTH, ChunkCoord, LogProgress, TILE_SIZE, World, WorldConfig};

fn world(seed: u64, view: i32, unload: i32) -> World {
    World::new(WorldConfig {
        view_radius: view,
        unload_radius: unload,
        load_budget: 4,
        worker_count: 2,
        ..WorldConfig::with_seed(seed)
    })
    .unwrap()
}

fn pixel_center(coord: ChunkCoord) -> Vec2 {
    let (bx, by) = coord.origin();
    Vec2::new(
        ((bx + CHUNK_WIDTH / 2) * TILE_SIZE) as f32,
        ((by + CHUNK_HEIGHT / 2) * TILE_SIZE) as f32,
    )
}

fn square(center: ChunkCoord, radius: i32) -> HashSet<ChunkCoord> {
    let mut set = HashSet::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            set.insert(ChunkCoord::new(center.x + dx, center.y + dy));
        }
    }
    set
}

/// Keep updating at `position` until the view square is loaded.
fn settle(world: &World, position: Vec2, center: ChunkCoord, radius: i32) {
    let wanted = square(center, radius);
    for _ in 0..500 {
        world.update_observer(position);
        let loaded: HashSet<_> = world.manager().loaded_coords().into_iter().collect();
        if wanted.is_subset(&loaded) && world.manager().in_flight_count() == 0 {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("view square around {center} never finished loading");
}

#[test]
fn loaded_set_converges_to_the_view_square() {
    let world = world(42, 2, 3);
    let center = ChunkCoord::new(0, 0);
    settle(&world, pixel_center(center), center, 2);

    let loaded: HashSet<_> = world.manager().loaded_coords().into_iter().collect();
    assert_eq!(loaded, square(center, 2));
    assert_eq!(world.cache().len(), loaded.len());
}

#[test]
fn walking_keeps_everything_within_the_unload_radius() {
    let world = world(7, 1, 2);
    world.initial_load(&LogProgress);

    let mut center = world.spawn_point().chunk;
    for _ in 0..6 {
        center = ChunkCoord::new(center.x + 1, center.y);
        settle(&world, pixel_center(center), center, 1);

        for coord in world.manager().loaded_coords() {
            assert!(coord.distance(center) <= 2, "{coord} still loaded from {center}");
        }
        for chunk in world.loaded_chunks() {
            assert!(chunk.coord().distance(center) <= 2);
        }
    }
    assert!(world.stats().chunks_evicted > 0);
}

#[test]
fn hovering_on_a_border_does_not_thrash() {
    let world = world(3, 1, 2);
    let left = ChunkCoord::new(0, 0);
    let right = ChunkCoord::new(1, 0);
    settle(&world, pixel_center(left), left, 1);
    settle(&world, pixel_center(right), right, 1);

    let evicted = world.stats().chunks_evicted;
    for i in 0..20 {
        let (coord, pos) = if i % 2 == 0 { (left, pixel_center(left)) } else { (right, pixel_center(right)) };
        let update = world.update_observer(pos);
        assert_eq!(update.observer, coord);
        assert_eq!(update.enqueued, 0);
    }
    assert_eq!(world.stats().chunks_evicted, evicted);
}

#[test]
fn budget_limits_each_update() {
    let world = world(11, 3, 4);
    let update = world.update_observer(Vec2::ZERO);
    assert_eq!(update.enqueued, 4);
    assert_eq!(update.enqueued + update.deferred, 49);
}

#[test]
fn background_grid_rebuild_is_published() {
    let world = world(5, 1, 2);
    world.initial_load(&LogProgress);
    assert!(world.cached_grid().is_none());
    assert!(world.request_grid_rebuild());

    let mut published = None;
    for _ in 0..500 {
        world.poll();
        if let Some(grid) = world.cached_grid() {
            published = Some(grid);
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    let grid = published.expect("grid rebuild never published");
    assert_eq!(grid.width(), 3 * CHUNK_WIDTH);
    assert_eq!(grid.height(), 3 * CHUNK_HEIGHT);
}

#[test]
fn shutdown_is_clean_and_idempotent() {
    let world = world(1, 2, 3);
    world.update_observer(Vec2::ZERO);
    world.shutdown();
    world.shutdown();
    assert!(!world.manager().pool().is_running());
    // streaming falls back to inline generation
    world.initial_load(&LogProgress);
    assert!(world.manager().is_loaded(world.spawn_point().chunk));
}

#[test]
fn teleporting_keeps_the_grid_around_the_new_position() {
    let world = world(21, 1, 2);
    world.update_observer(pixel_center(ChunkCoord::new(0, 0)));

    let far = ChunkCoord::new(5000, 5000);
    world.update_observer(pixel_center(far));
    for _ in 0..3000 {
        if world.manager().in_flight_count() == 0 {
            break;
        }
        world.poll();
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(world.manager().in_flight_count(), 0);

    for chunk in world.loaded_chunks() {
        assert!(chunk.coord().distance(far) <= 2, "{} left behind", chunk.coord());
    }
    let grid = world.to_int_grid();
    assert!(!grid.is_empty());
    assert!(grid.width() <= 5 * CHUNK_WIDTH);
    assert!(grid.height() <= 5 * CHUNK_HEIGHT);
    let (bx, by) = far.origin();
    assert!(grid.contains_block(bx, by));
}
