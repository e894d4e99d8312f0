//! Per-column terrain height and biome classification
//!
//! Everything the generator needs that depends only on the world x
//! coordinate lives here and is memoised for the lifetime of a seed.

use std::sync::Arc;

use glam::{IVec2, Vec2};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::constants::*;
use crate::core::biome::Biome;
use crate::core::chunk::ChunkCoord;
use crate::world::noise::{NoiseGenerator, NoiseLayer, OctaveLimits};

const OCEAN_DEPTH: f64 = 30.0;
const MOUNTAIN_ONSET: f64 = 0.25;
const OCEAN_ONSET: f64 = -0.3;

/// The noise bands of one world seed.
#[derive(Clone, Debug)]
pub struct TerrainNoise {
    pub continental: NoiseGenerator,
    pub terrain: NoiseGenerator,
    pub detail: NoiseGenerator,
    pub temperature: NoiseGenerator,
    pub humidity: NoiseGenerator,
    pub elevation: NoiseGenerator,
    pub tunnel: NoiseGenerator,
    pub cavern: NoiseGenerator,
    pub cave_entrance: NoiseGenerator,
    pub ore: NoiseGenerator,
    pub pocket: NoiseGenerator,
    pub stone_variant: NoiseGenerator,
    pub deep: NoiseGenerator,
}

impl TerrainNoise {
    pub fn new(seed: u64, limits: OctaveLimits) -> Self {
        let layer = |layer| NoiseGenerator::for_layer(seed, layer, limits);
        TerrainNoise {
            continental: layer(NoiseLayer::Continental),
            terrain: layer(NoiseLayer::Terrain),
            detail: layer(NoiseLayer::Detail),
            temperature: layer(NoiseLayer::Temperature),
            humidity: layer(NoiseLayer::Humidity),
            elevation: layer(NoiseLayer::Elevation),
            tunnel: layer(NoiseLayer::Tunnel),
            cavern: layer(NoiseLayer::Cavern),
            cave_entrance: layer(NoiseLayer::CaveEntrance),
            ore: layer(NoiseLayer::Ore),
            pocket: layer(NoiseLayer::Pocket),
            stone_variant: layer(NoiseLayer::StoneVariant),
            deep: layer(NoiseLayer::Deep),
        }
    }
}

/// Climate bands of one column, each in `[-1, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Climate {
    pub temperature: f64,
    pub humidity: f64,
    pub elevation: f64,
}

impl Climate {
    /// Fixed decision table. Elevation wins first, then temperature and
    /// humidity extremes, then the temperate default.
    pub fn classify(&self) -> Biome {
        let Climate {
            temperature,
            humidity,
            elevation,
        } = *self;

        if elevation > 0.45 {
            Biome::Mountain
        } else if elevation < -0.5 {
            Biome::Ocean
        } else if temperature < -0.4 {
            Biome::Tundra
        } else if temperature > 0.4 && humidity < -0.15 {
            Biome::Desert
        } else if temperature > 0.3 && humidity > 0.3 {
            Biome::Jungle
        } else if humidity > 0.4 {
            Biome::Swamp
        } else if humidity > 0.05 {
            Biome::Forest
        } else {
            Biome::Plains
        }
    }
}

/// Immutable view of one seed plus its memo tables.
///
/// Chunk generation holds an `Arc` to one of these for its whole run, so a
/// concurrent seed reset can never mix two worlds inside one chunk.
#[derive(Debug)]
pub struct TerrainState {
    seed: u64,
    noise: TerrainNoise,
    heights: RwLock<FxHashMap<i32, i32>>,
    biomes: RwLock<FxHashMap<i32, Biome>>,
}

impl TerrainState {
    pub fn new(seed: u64, limits: OctaveLimits) -> Self {
        TerrainState {
            seed,
            noise: TerrainNoise::new(seed, limits),
            heights: RwLock::new(FxHashMap::default()),
            biomes: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn noise(&self) -> &TerrainNoise {
        &self.noise
    }

    pub fn climate_at(&self, world_x: i32) -> Climate {
        let x = world_x as f64;
        let n = &self.noise;
        Climate {
            temperature: n
                .temperature
                .fractal_noise_1d(x, 3, 1.0 / 600.0, 1.6, 0.5)
                .clamp(-1.0, 1.0),
            humidity: n
                .humidity
                .fractal_noise_1d(x, 3, 1.0 / 450.0, 1.6, 0.5)
                .clamp(-1.0, 1.0),
            elevation: n
                .elevation
                .fractal_noise_1d(x, 3, 1.0 / 800.0, 1.8, 0.5)
                .clamp(-1.0, 1.0),
        }
    }

    /// World row of the topmost ground block of a column.
    pub fn height_at(&self, world_x: i32) -> i32 {
        if let Some(height) = self.heights.read().get(&world_x) {
            return *height;
        }
        let height = self.compute_height(world_x);
        self.heights.write().insert(world_x, height);
        height
    }

    pub fn biome_at(&self, world_x: i32) -> Biome {
        if let Some(biome) = self.biomes.read().get(&world_x) {
            return *biome;
        }
        let biome = self.climate_at(world_x).classify();
        self.biomes.write().insert(world_x, biome);
        biome
    }

    fn compute_height(&self, world_x: i32) -> i32 {
        let x = world_x as f64;
        let n = &self.noise;

        let low = n.continental.fractal_noise_1d(x, 4, 1.0 / 512.0, 1.0, 0.5);
        let medium = n.terrain.fractal_noise_1d(x, 3, 1.0 / 128.0, 1.0, 0.5);
        let high = n.detail.fractal_noise_1d(x, 2, 1.0 / 24.0, 1.0, 0.5);
        let blended = low * 0.55 + medium * 0.35 + high * 0.10;

        let elevation = self.climate_at(world_x).elevation;
        let mountain = if elevation > MOUNTAIN_ONSET {
            let weight = ((elevation - MOUNTAIN_ONSET) / (1.0 - MOUNTAIN_ONSET)).min(1.0);
            n.terrain.ridged_noise_1d(x, 2, 1.0 / 48.0, 1.0, 0.5) * weight
        } else {
            0.0
        };
        let ocean = if elevation < OCEAN_ONSET {
            ((OCEAN_ONSET - elevation) / (1.0 + OCEAN_ONSET)).min(1.0)
        } else {
            0.0
        };

        // y grows downward, so raising terrain subtracts
        let height = BASE_SURFACE_Y as f64 - blended * SURFACE_AMPLITUDE - mountain * MOUNTAIN_LIFT
            + ocean * OCEAN_DEPTH;
        (height.round() as i32).clamp(MIN_SURFACE_Y, MAX_SURFACE_Y)
    }

    /// Shallow 1D threshold deciding where the surface is opened up.
    pub fn is_cave_entrance(&self, world_x: i32) -> bool {
        if self.height_at(world_x) >= SEA_LEVEL_Y {
            return false;
        }
        self.noise
            .cave_entrance
            .noise_1d(world_x as f64 / 7.0 + 0.5)
            > 0.55
    }

    pub fn memoized_columns(&self) -> usize {
        self.heights.read().len()
    }
}

/// Where the player first appears.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnPoint {
    /// Top-left of the spawn cell, in pixels.
    pub position: Vec2,
    pub block_x: i32,
    pub block_y: i32,
    pub chunk: ChunkCoord,
    pub surface_y: i32,
}

impl SpawnPoint {
    pub fn at_column(block_x: i32, surface_y: i32) -> Self {
        let block_y = surface_y - 1;
        SpawnPoint {
            position: Vec2::new((block_x * TILE_SIZE) as f32, (block_y * TILE_SIZE) as f32),
            block_x,
            block_y,
            chunk: ChunkCoord::from_block(block_x, block_y),
            surface_y,
        }
    }

    /// Position for an entity of `size` pixels standing on the surface,
    /// centred on the spawn column.
    pub fn entity_position(&self, size: IVec2) -> Vec2 {
        let x = (self.block_x * TILE_SIZE) as f32 + (TILE_SIZE - size.x) as f32 * 0.5;
        let y = (self.surface_y * TILE_SIZE - size.y) as f32 - COLLISION_EPSILON;
        Vec2::new(x, y)
    }
}

/// Shared handle to the current seed's terrain.
#[derive(Debug)]
pub struct HeightResolver {
    state: RwLock<Arc<TerrainState>>,
    limits: OctaveLimits,
}

impl HeightResolver {
    pub fn new(seed: u64, limits: OctaveLimits) -> Self {
        HeightResolver {
            state: RwLock::new(Arc::new(TerrainState::new(seed, limits))),
            limits,
        }
    }

    pub fn snapshot(&self) -> Arc<TerrainState> {
        Arc::clone(&self.state.read())
    }

    pub fn seed(&self) -> u64 {
        self.state.read().seed()
    }

    pub fn limits(&self) -> OctaveLimits {
        self.limits
    }

    pub fn height_at(&self, world_x: i32) -> i32 {
        self.snapshot().height_at(world_x)
    }

    pub fn biome_at(&self, world_x: i32) -> Biome {
        self.snapshot().biome_at(world_x)
    }

    /// Swap in fresh noise and empty memo tables for `new_seed`. Callers that
    /// already hold a snapshot keep working against the old seed.
    pub fn reset_generation(&self, new_seed: u64) {
        let fresh = Arc::new(TerrainState::new(new_seed, self.limits));
        let old = std::mem::replace(&mut *self.state.write(), fresh);
        tracing::info!(
            old_seed = old.seed(),
            new_seed,
            dropped_columns = old.memoized_columns(),
            "terrain generation reset"
        );
    }

    /// First dry, unbroken column scanning outward from x = 0. Falls back to
    /// the origin column when none is found within `SPAWN_SEARCH_RADIUS`.
    pub fn find_spawn_point(&self) -> SpawnPoint {
        let state = self.snapshot();
        for offset in 0..=SPAWN_SEARCH_RADIUS {
            for x in [offset, -offset] {
                let surface = state.height_at(x);
                if surface < SEA_LEVEL_Y
                    && state.biome_at(x) != Biome::Ocean
                    && !state.is_cave_entrance(x)
                {
                    return SpawnPoint::at_column(x, surface);
                }
                if offset == 0 {
                    break;
                }
            }
        }
        tracing::warn!("no dry spawn column found, using origin");
        SpawnPoint::at_column(0, state.height_at(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heights_are_deterministic_and_clamped() {
        let a = HeightResolver::new(42, OctaveLimits::default());
        let b = HeightResolver::new(42, OctaveLimits::default());
        for x in -2000..2000 {
            let h = a.height_at(x);
            assert_eq!(h, b.height_at(x));
            assert!((MIN_SURFACE_Y..=MAX_SURFACE_Y).contains(&h));
        }
    }

    #[test]
    fn heights_are_memoized() {
        let resolver = HeightResolver::new(3, OctaveLimits::default());
        let state = resolver.snapshot();
        for x in 0..64 {
            state.height_at(x);
            state.height_at(x);
        }
        assert_eq!(state.memoized_columns(), 64);
    }

    #[test]
    fn neighbouring_columns_are_continuous() {
        let resolver = HeightResolver::new(9, OctaveLimits::default());
        for x in -500..500 {
            let step = (resolver.height_at(x) - resolver.height_at(x + 1)).abs();
            assert!(step <= 16, "cliff of {step} at x={x}");
        }
    }

    #[test]
    fn decision_table_priorities() {
        let climate = |temperature, humidity, elevation| Climate {
            temperature,
            humidity,
            elevation,
        };
        assert_eq!(climate(-0.9, 0.9, 0.9).classify(), Biome::Mountain);
        assert_eq!(climate(0.9, -0.9, -0.8).classify(), Biome::Ocean);
        assert_eq!(climate(-0.6, 0.0, 0.0).classify(), Biome::Tundra);
        assert_eq!(climate(0.6, -0.5, 0.0).classify(), Biome::Desert);
        assert_eq!(climate(0.35, 0.5, 0.0).classify(), Biome::Jungle);
        assert_eq!(climate(0.0, 0.6, 0.0).classify(), Biome::Swamp);
        assert_eq!(climate(0.0, 0.2, 0.0).classify(), Biome::Forest);
        assert_eq!(climate(0.0, 0.0, 0.0).classify(), Biome::Plains);
    }

    #[test]
    fn reset_swaps_seed_but_keeps_old_snapshots() {
        let resolver = HeightResolver::new(1, OctaveLimits::default());
        let before = resolver.snapshot();
        let heights: Vec<i32> = (0..32).map(|x| before.height_at(x)).collect();

        resolver.reset_generation(2);
        assert_eq!(resolver.seed(), 2);
        assert_eq!(before.seed(), 1);
        assert_eq!(resolver.snapshot().memoized_columns(), 0);
        let again: Vec<i32> = (0..32).map(|x| before.height_at(x)).collect();
        assert_eq!(heights, again);
    }

    #[test]
    fn spawn_point_is_dry_and_consistent() {
        let resolver = HeightResolver::new(42, OctaveLimits::default());
        let spawn = resolver.find_spawn_point();
        assert_eq!(spawn.surface_y, resolver.height_at(spawn.block_x));
        assert_eq!(spawn.block_y, spawn.surface_y - 1);
        assert_eq!(spawn.chunk, ChunkCoord::from_block(spawn.block_x, spawn.block_y));
        assert_eq!(spawn.position.x, (spawn.block_x * TILE_SIZE) as f32);

        let feet = spawn.entity_position(IVec2::new(12, 28));
        assert!(feet.y + 28.0 <= (spawn.surface_y * TILE_SIZE) as f32);
    }
}
