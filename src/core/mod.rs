//! Core data structures for the world
//! Contains blocks, biomes and chunks.

pub mod biome;
pub mod block;
pub mod chunk;

// Re-export commonly used types
pub use biome::Biome;
pub use block::BlockType;
pub use chunk::{Chunk, ChunkCoord, chunk_to_world, world_to_chunk};
