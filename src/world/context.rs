//! The world a game session talks to
//!
//! Owns the resolver, cache, grid and streaming manager for one seed. All
//! methods take `&self`, so a `World` can sit behind an `Arc` and be shared
//! between the game loop and a renderer.

use std::sync::Arc;

use glam::Vec2;
use parking_lot::RwLock;

use crate::core::biome::Biome;
use crate::core::block::BlockType;
use crate::core::chunk::{Chunk, ChunkCoord, world_to_chunk};
use crate::error::Result;
use crate::physics::collision::{self, Aabb};
use crate::utils::settings::WorldConfig;
use crate::world::cache::ChunkCache;
use crate::world::generator::ChunkGenerator;
use crate::world::grid::{GridBuilder, WorldGrid};
use crate::world::loader::{WorkerPool, WorldTask};
use crate::world::manager::{ChunkManager, ObserverUpdate, ProgressSink, StreamingRadii};
use crate::world::terrain::{HeightResolver, SpawnPoint};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorldStats {
    pub seed: u64,
    pub loaded_chunks: usize,
    pub in_flight: usize,
    pub chunks_generated: u64,
    pub chunks_discarded: u64,
    pub chunks_evicted: u64,
    pub grid_rebuilds: u64,
    pub memoized_columns: usize,
}

pub struct World {
    config: WorldConfig,
    resolver: Arc<HeightResolver>,
    cache: Arc<ChunkCache>,
    grid: Arc<GridBuilder>,
    manager: ChunkManager,
    spawn: RwLock<SpawnPoint>,
}

impl World {
    pub fn new(config: WorldConfig) -> Result<Self> {
        config.validate()?;

        let resolver = Arc::new(HeightResolver::new(config.seed, config.noise));
        let generator = Arc::new(ChunkGenerator::new(Arc::clone(&resolver)));
        let cache = Arc::new(ChunkCache::new(generator));
        let grid = Arc::new(GridBuilder::new());
        let pool = WorkerPool::spawn(
            config.worker_count,
            config.queue_capacity,
            Arc::clone(&cache),
            Arc::clone(&grid),
        )?;
        let manager = ChunkManager::new(
            Arc::clone(&cache),
            pool,
            StreamingRadii {
                view: config.view_radius,
                unload: config.unload_radius,
                load_budget: config.load_budget,
            },
        );
        let spawn = resolver.find_spawn_point();

        tracing::info!(
            seed = config.seed,
            spawn_x = spawn.block_x,
            spawn_y = spawn.block_y,
            "world created"
        );

        Ok(World {
            config,
            resolver,
            cache,
            grid,
            manager,
            spawn: RwLock::new(spawn),
        })
    }

    pub fn with_seed(seed: u64) -> Result<Self> {
        Self::new(WorldConfig::with_seed(seed))
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.resolver.seed()
    }

    pub fn spawn_point(&self) -> SpawnPoint {
        *self.spawn.read()
    }

    pub fn resolver(&self) -> &Arc<HeightResolver> {
        &self.resolver
    }

    pub fn cache(&self) -> &Arc<ChunkCache> {
        &self.cache
    }

    pub fn manager(&self) -> &ChunkManager {
        &self.manager
    }

    pub fn height_at(&self, world_x: i32) -> i32 {
        self.resolver.height_at(world_x)
    }

    pub fn biome_at(&self, world_x: i32) -> Biome {
        self.resolver.biome_at(world_x)
    }

    /// Load everything in view of the spawn point before play starts.
    pub fn initial_load(&self, progress: &dyn ProgressSink) -> usize {
        let spawn = self.spawn_point();
        self.grid.set_focus(spawn.chunk, self.config.unload_radius);
        self.manager
            .initial_load(spawn.position.x, spawn.position.y, progress)
    }

    /// Streaming step for an observer at a pixel position. The collision
    /// grid follows the observer.
    pub fn update_observer(&self, position: Vec2) -> ObserverUpdate {
        let update = self.manager.update_observer_position(position.x, position.y);
        self.grid.set_focus(update.observer, self.config.unload_radius);
        update
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.cache.peek(coord)
    }

    /// Every chunk currently held, for drawing.
    pub fn loaded_chunks(&self) -> Vec<Arc<Chunk>> {
        self.cache.snapshot()
    }

    pub fn get_block(&self, world_x: i32, world_y: i32) -> BlockType {
        self.cache.get_block(world_x, world_y)
    }

    /// Write a block and mirror it into the collision grid.
    pub fn set_block(&self, world_x: i32, world_y: i32, block: BlockType) -> bool {
        if !self.cache.set_block(world_x, world_y, block) {
            return false;
        }
        self.grid.patch(world_x, world_y, block);
        true
    }

    /// Clear a block. Fails on Air and on ungenerated space.
    pub fn break_block(&self, world_x: i32, world_y: i32) -> bool {
        if self.get_block(world_x, world_y).is_air() {
            return false;
        }
        self.set_block(world_x, world_y, BlockType::Air)
    }

    /// Place a block into an empty cell. Fails when the cell is taken or
    /// ungenerated, when `block` is Air, or when it would overlap any of
    /// `occupants`.
    pub fn place_block(
        &self,
        world_x: i32,
        world_y: i32,
        block: BlockType,
        occupants: &[Aabb],
    ) -> bool {
        if block.is_air() {
            return false;
        }
        let (coord, _, _) = world_to_chunk(world_x, world_y);
        if !self.cache.contains(coord) {
            return false;
        }
        if !self.get_block(world_x, world_y).is_replaceable() {
            return false;
        }
        if occupants
            .iter()
            .any(|body| body.intersects_block(world_x, world_y))
        {
            return false;
        }
        self.set_block(world_x, world_y, block)
    }

    /// Collision grid over the loaded chunks around the observer, rebuilt
    /// here if stale.
    pub fn to_int_grid(&self) -> Arc<WorldGrid> {
        self.grid.to_int_grid(&self.cache)
    }

    /// Last built grid, without rebuilding.
    pub fn cached_grid(&self) -> Option<Arc<WorldGrid>> {
        self.grid.cached()
    }

    /// Ask a worker to rebuild the grid. The result shows up in
    /// `cached_grid` once done.
    pub fn request_grid_rebuild(&self) -> bool {
        self.manager.pool().try_submit(WorldTask::RebuildGrid)
    }

    /// Apply finished background work without moving the observer.
    pub fn poll(&self) -> usize {
        self.manager.drain_completed()
    }

    /// Advance one body by its velocity against the current grid.
    pub fn step_body(&self, body: &mut Aabb) {
        let grid = self.to_int_grid();
        collision::resolve(body, &grid);
    }

    /// Start over with a new seed. Chunks generated for the old seed are
    /// never stored afterwards.
    pub fn reset_generation(&self, seed: u64) {
        self.cache.reset(seed);
        self.manager.reset();
        self.grid.invalidate();
        *self.spawn.write() = self.resolver.find_spawn_point();
    }

    pub fn stats(&self) -> WorldStats {
        let cache = self.cache.stats();
        WorldStats {
            seed: self.seed(),
            loaded_chunks: self.manager.loaded_count(),
            in_flight: self.manager.in_flight_count(),
            chunks_generated: cache.generated,
            chunks_discarded: cache.discarded,
            chunks_evicted: cache.evicted,
            grid_rebuilds: self.grid.rebuild_count(),
            memoized_columns: self.resolver.snapshot().memoized_columns(),
        }
    }

    /// Stop the workers. Queries keep working; streaming falls back to
    /// generating on the calling thread.
    pub fn shutdown(&self) {
        self.manager.shutdown();
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("seed", &self.seed())
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}
