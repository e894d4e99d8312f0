//! Deterministic chunk generation
//!
//! `generate_chunk` is a pure function of the chunk coordinate and the world
//! seed. Generation runs in two passes over the chunk's own array:
//! terrain (surface, soil, caves, ores, deep layer) column by column, then
//! vegetation, which reads the surface cells written by the first pass.

use std::sync::Arc;

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::constants::*;
use crate::core::biome::Biome;
use crate::core::block::BlockType;
use crate::core::chunk::{Chunk, ChunkCoord};
use crate::world::cache::ChunkSource;
use crate::world::terrain::{HeightResolver, TerrainState};

/// Trees are only rooted this far from the chunk's side edges so the canopy
/// fits inside the chunk.
pub const CANOPY_RADIUS: i32 = 2;
/// Minimum gap, in columns, between two trunks.
const TREE_SPACING: i32 = 3;
/// Trunk heights and their relative weights.
pub const TRUNK_HEIGHTS: [(i32, u32); 4] = [(1, 15), (2, 50), (3, 30), (6, 5)];
const LEAF_EDGE_CHANCE: f64 = 0.5;

/// One ore band: only below `min_depth` blocks under the surface and only
/// where the vein noise clears `threshold` inside a cluster region.
#[derive(Clone, Copy, Debug)]
pub struct OreTier {
    pub block: BlockType,
    pub min_depth: i32,
    pub threshold: f64,
    pub cluster: f64,
    pub frequency: f64,
    offset: f64,
}

/// Rarest first; the first tier that matches wins.
pub const ORE_TIERS: [OreTier; 4] = [
    OreTier {
        block: BlockType::DiamondOre,
        min_depth: 160,
        threshold: 0.93,
        cluster: 0.35,
        frequency: 1.0 / 6.0,
        offset: 3000.0,
    },
    OreTier {
        block: BlockType::GoldOre,
        min_depth: 80,
        threshold: 0.88,
        cluster: 0.2,
        frequency: 1.0 / 7.0,
        offset: 2000.0,
    },
    OreTier {
        block: BlockType::IronOre,
        min_depth: 30,
        threshold: 0.84,
        cluster: 0.0,
        frequency: 1.0 / 8.0,
        offset: 1000.0,
    },
    OreTier {
        block: BlockType::CoalOre,
        min_depth: 8,
        threshold: 0.80,
        cluster: -0.2,
        frequency: 1.0 / 9.0,
        offset: 0.0,
    },
];

/// Everything pass 1 needs to know about a column.
#[derive(Clone, Copy, Debug)]
pub struct Column {
    pub world_x: i32,
    pub surface: i32,
    pub biome: Biome,
    pub entrance: bool,
}

impl Column {
    pub fn sample(state: &TerrainState, world_x: i32) -> Self {
        Column {
            world_x,
            surface: state.height_at(world_x),
            biome: state.biome_at(world_x),
            entrance: state.is_cave_entrance(world_x),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cave {
    Tunnel,
    Cavern { large: bool },
}

/// Thread-safe chunk generator over a shared height resolver.
#[derive(Clone, Debug)]
pub struct ChunkGenerator {
    resolver: Arc<HeightResolver>,
}

impl ChunkGenerator {
    pub fn new(resolver: Arc<HeightResolver>) -> Self {
        ChunkGenerator { resolver }
    }

    pub fn resolver(&self) -> &Arc<HeightResolver> {
        &self.resolver
    }

    /// Generate a complete chunk against the resolver's current seed.
    pub fn generate_chunk(&self, coord: ChunkCoord) -> Chunk {
        let state = self.resolver.snapshot();
        generate_with(&state, coord)
    }
}

impl ChunkSource for ChunkGenerator {
    fn generate_chunk(&self, coord: ChunkCoord) -> Chunk {
        ChunkGenerator::generate_chunk(self, coord)
    }

    fn seed(&self) -> u64 {
        self.resolver.seed()
    }

    fn reseed(&self, seed: u64) {
        self.resolver.reset_generation(seed);
    }
}

/// Generate one chunk from a fixed terrain snapshot.
pub fn generate_with(state: &TerrainState, coord: ChunkCoord) -> Chunk {
    let mut chunk = Chunk::new(coord, state.seed());
    let (base_x, base_y) = coord.origin();

    let columns: Vec<Column> = (0..CHUNK_WIDTH)
        .map(|lx| Column::sample(state, base_x + lx))
        .collect();

    // Terrain pass: every column only writes its own cells
    for (lx, column) in columns.iter().enumerate() {
        for ly in 0..CHUNK_HEIGHT {
            let block = terrain_block(state, column, base_y + ly);
            if block != BlockType::Air {
                chunk.set_block(lx as i32, ly, block);
            }
        }
    }

    // Vegetation pass, after the whole terrain pass
    plant_vegetation(state, &mut chunk, &columns);

    chunk
}

/// Pass-1 block for one cell of a column.
pub fn terrain_block(state: &TerrainState, column: &Column, world_y: i32) -> BlockType {
    let depth = world_y - column.surface;

    if depth < 0 {
        return above_surface(column, world_y);
    }

    if depth == 0 {
        return if column.entrance {
            BlockType::Air
        } else {
            column.biome.surface_block()
        };
    }

    if depth <= SOIL_DEPTH {
        if column.entrance {
            return BlockType::Air;
        }
        return if is_soil_pocket(state, column.world_x, world_y) {
            column.biome.pocket_block()
        } else {
            column.biome.soil_block()
        };
    }

    if world_y >= DEEP_LAYER_Y {
        return deep_block(state, column.world_x, world_y);
    }

    underground_block(state, column.world_x, world_y, depth)
}

fn above_surface(column: &Column, world_y: i32) -> BlockType {
    if world_y < SEA_LEVEL_Y {
        BlockType::Air
    } else if world_y == SEA_LEVEL_Y && column.biome == Biome::Tundra {
        BlockType::Ice
    } else {
        BlockType::Water
    }
}

pub fn is_soil_pocket(state: &TerrainState, world_x: i32, world_y: i32) -> bool {
    state
        .noise()
        .pocket
        .noise_2d(world_x as f64 / 6.0 + 0.31, world_y as f64 / 6.0 + 0.17)
        > 0.55
}

fn cave_at(state: &TerrainState, world_x: i32, world_y: i32, depth: i32) -> Option<Cave> {
    let n = state.noise();
    let x = world_x as f64;
    let y = world_y as f64;

    // caves widen and multiply with depth
    let depth_factor = (depth as f64 / 240.0).clamp(0.0, 1.0);

    let cavern = n
        .cavern
        .fractal_noise_2d(x, y * 1.6, 3, 1.0 / 64.0, 1.4, 0.5);
    let cavern_threshold = 0.45 - 0.20 * depth_factor;
    if cavern > cavern_threshold {
        return Some(Cave::Cavern {
            large: cavern > cavern_threshold + 0.15,
        });
    }

    let tunnel = n.tunnel.ridged_noise_2d(x, y, 2, 1.0 / 40.0, 1.0, 0.5);
    let tunnel_threshold = 0.90 - 0.06 * depth_factor;
    if tunnel > tunnel_threshold {
        return Some(Cave::Tunnel);
    }

    None
}

fn ore_at(state: &TerrainState, world_x: i32, world_y: i32, depth: i32) -> Option<BlockType> {
    let n = state.noise();
    let x = world_x as f64;
    let y = world_y as f64;

    ORE_TIERS
        .iter()
        .filter(|tier| depth >= tier.min_depth)
        .find(|tier| {
            n.ore.noise_2d(x / 40.0 + tier.offset + 0.5, y / 40.0 + 0.5) > tier.cluster
                && n.ore
                    .ridged_noise_2d(x + tier.offset, y, 1, tier.frequency, 1.0, 0.5)
                    > tier.threshold
        })
        .map(|tier| tier.block)
}

fn underground_block(state: &TerrainState, world_x: i32, world_y: i32, depth: i32) -> BlockType {
    if let Some(cave) = cave_at(state, world_x, world_y, depth) {
        return match cave {
            Cave::Cavern { large: true } if world_y > WATER_TABLE_Y => BlockType::Water,
            _ => BlockType::Air,
        };
    }

    if let Some(ore) = ore_at(state, world_x, world_y, depth) {
        return ore;
    }

    let n = state.noise();
    let x = world_x as f64;
    let y = world_y as f64;

    if depth > 40
        && n.pocket
            .ridged_noise_2d(x + 5000.0, y, 1, 1.0 / 5.0, 1.0, 0.5)
            > 0.985
    {
        return BlockType::Crystal;
    }

    let variant = n
        .stone_variant
        .fractal_noise_2d(x, y, 2, 1.0 / 20.0, 1.0, 0.5);
    if variant > 0.35 {
        BlockType::Granite
    } else if variant < -0.35 {
        BlockType::Andesite
    } else {
        BlockType::Stone
    }
}

fn deep_block(state: &TerrainState, world_x: i32, world_y: i32) -> BlockType {
    let n = state.noise();
    let x = world_x as f64;
    let y = world_y as f64;

    let cavern = n
        .cavern
        .fractal_noise_2d(x + 7000.0, y * 1.3, 2, 1.0 / 50.0, 1.4, 0.5);
    if cavern > 0.35 {
        return if cavern > 0.5 && world_y > DEEP_LAYER_Y + 40 {
            BlockType::Lava
        } else {
            BlockType::Air
        };
    }

    if n.deep.ridged_noise_2d(x + 3000.0, y, 1, 1.0 / 16.0, 1.0, 0.5) > 0.95 {
        return BlockType::Obsidian;
    }

    let variant = n.deep.fractal_noise_2d(x, y, 3, 1.0 / 30.0, 1.0, 0.5);
    if variant > 0.3 {
        BlockType::Basalt
    } else if variant < -0.35 {
        BlockType::Magma
    } else {
        BlockType::Ashstone
    }
}

/// Column-local RNG. Keyed on the chunk row holding the surface rather than
/// the chunk being generated, so the chunks above and below agree on every
/// draw for the same tree.
fn vegetation_rng(seed: u64, chunk_x: i32, surface_chunk_y: i32, column: i32) -> ChaCha8Rng {
    let key = (chunk_x as i64 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (surface_chunk_y as i64 as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
        ^ (column as u64).wrapping_mul(0x1656_67B1_9E37_79F9);
    ChaCha8Rng::seed_from_u64(seed.wrapping_add(key))
}

fn plant_vegetation(state: &TerrainState, chunk: &mut Chunk, columns: &[Column]) {
    let coord = chunk.coord();
    let (_, base_y) = coord.origin();
    let Ok(trunk_weights) = WeightedIndex::new(TRUNK_HEIGHTS.iter().map(|(_, w)| *w)) else {
        return;
    };

    let mut last_trunk: Option<i32> = None;

    for lx in CANOPY_RADIUS..(CHUNK_WIDTH - CANOPY_RADIUS) {
        let column = &columns[lx as usize];
        let biome = column.biome;
        let Some(host) = biome.vegetation_host() else {
            continue;
        };
        if !biome.has_trees() || column.entrance || column.surface >= SEA_LEVEL_Y {
            continue;
        }

        // read our own surface cell when it is in this chunk
        let local_surface = column.surface - base_y;
        let ground = if (0..CHUNK_HEIGHT).contains(&local_surface) {
            chunk.get_block(lx, local_surface)
        } else {
            terrain_block(state, column, column.surface)
        };
        if ground != host {
            continue;
        }

        if last_trunk.is_some_and(|prev| lx - prev < TREE_SPACING) {
            continue;
        }

        let surface_chunk_y = column.surface.div_euclid(CHUNK_HEIGHT);
        let mut rng = vegetation_rng(state.seed(), coord.x, surface_chunk_y, lx);
        if !rng.gen_bool(biome.tree_chance()) {
            continue;
        }

        let trunk_height = TRUNK_HEIGHTS[trunk_weights.sample(&mut rng)].0;
        stamp_tree(chunk, base_y, lx, column.surface, trunk_height, &mut rng);
        last_trunk = Some(lx);
    }
}

/// Writes a trunk rooted on `surface` and a three-layer canopy. Cells outside
/// this chunk are skipped, but every edge draw is still taken so the result
/// does not depend on which part of the tree lands in this chunk.
fn stamp_tree(
    chunk: &mut Chunk,
    base_y: i32,
    lx: i32,
    surface: i32,
    trunk_height: i32,
    rng: &mut ChaCha8Rng,
) {
    let mut place = |x: i32, world_y: i32, block: BlockType| {
        let ly = world_y - base_y;
        if !(0..CHUNK_WIDTH).contains(&x) || !(0..CHUNK_HEIGHT).contains(&ly) {
            return;
        }
        let current = chunk.get_block(x, ly);
        let allowed = current.is_replaceable()
            || (block == BlockType::Wood && current == BlockType::Leaves);
        if allowed {
            chunk.set_block(x, ly, block);
        }
    };

    for dy in 1..=trunk_height {
        place(lx, surface - dy, BlockType::Wood);
    }

    let top = surface - trunk_height;
    for (world_y, radius) in [(top - 2, 1i32), (top - 1, 2), (top, 2)] {
        for dx in -radius..=radius {
            let keep = if dx.abs() == radius {
                rng.gen_bool(LEAF_EDGE_CHANCE)
            } else {
                true
            };
            if keep && !(dx == 0 && world_y >= top) {
                place(lx + dx, world_y, BlockType::Leaves);
            }
        }
    }
}
