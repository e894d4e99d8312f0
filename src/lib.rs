// Core module with blocks, biomes and chunks
pub mod core;

// World module with generation, streaming and the collision grid
pub mod world;

// Collision against the world grid
pub mod physics;

// Configuration
pub mod utils;

// Other modules
pub mod constants;
pub mod error;

// Re-exports
pub use constants::*;
pub use core::{Biome, BlockType, Chunk, ChunkCoord, chunk_to_world, world_to_chunk};
pub use error::{Result, WorldError};
pub use physics::{Aabb, is_solid, resolve};
pub use utils::WorldConfig;
pub use world::{
    ChunkCache, ChunkGenerator, ChunkManager, HeightResolver, LogProgress, ObserverUpdate,
    ProgressSink, SpawnPoint, World, WorldGrid, WorldStats,
};
