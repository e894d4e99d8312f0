// Chunk dimensions, in blocks
pub const CHUNK_WIDTH: i32 = 32;
pub const CHUNK_HEIGHT: i32 = 32;
pub const CHUNK_AREA: usize = (CHUNK_WIDTH * CHUNK_HEIGHT) as usize;

// Pixels per block, used by the collision core
pub const TILE_SIZE: i32 = 16;

// Terrain rows (y grows downward)
pub const BASE_SURFACE_Y: i32 = 20;
pub const SURFACE_AMPLITUDE: f64 = 22.0;
pub const MOUNTAIN_LIFT: f64 = 36.0;
pub const MIN_SURFACE_Y: i32 = -64;
pub const MAX_SURFACE_Y: i32 = 60;
pub const SEA_LEVEL_Y: i32 = 30;
pub const SOIL_DEPTH: i32 = 4;
pub const WATER_TABLE_Y: i32 = 160;
pub const DEEP_LAYER_Y: i32 = 480;

// Streaming defaults
pub const VIEW_RADIUS: i32 = 4;
pub const UNLOAD_RADIUS: i32 = 6;
pub const MAX_LOADS_PER_UPDATE: usize = 8;
pub const TASK_QUEUE_CAPACITY: usize = 256;

// Collision
pub const COLLISION_EPSILON: f32 = 0.01;
pub const GROUND_SNAP_TOLERANCE: f32 = 0.5;

// Spawn search
pub const SPAWN_SEARCH_RADIUS: i32 = 512;

pub const DEFAULT_SEED: u64 = 2137;
