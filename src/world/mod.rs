//! World generation and management modules
//! Contains noise, terrain, chunk generation, caching, streaming and the
//! collision grid.

pub mod cache;
pub mod context;
pub mod generator;
pub mod grid;
pub mod loader;
pub mod manager;
pub mod noise;
pub mod terrain;

// Re-export commonly used types
pub use cache::{CacheStats, ChunkCache, ChunkSource};
pub use context::{World, WorldStats};
pub use generator::ChunkGenerator;
pub use grid::{GridBuilder, GridFocus, WorldGrid};
pub use loader::{TaskOutcome, WorkerPool, WorldTask};
pub use manager::{ChunkManager, LogProgress, ObserverUpdate, ProgressSink, StreamingRadii};
pub use noise::{NoiseGenerator, NoiseLayer, OctaveLimits, PermutationTable};
pub use terrain::{HeightResolver, SpawnPoint, TerrainState};
