use std::fmt;

use crate::constants::*;
use crate::core::block::BlockType;

/// Position of a chunk in chunk space.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chunk containing the given world block.
    #[inline]
    pub fn from_block(world_x: i32, world_y: i32) -> Self {
        Self {
            x: world_x.div_euclid(CHUNK_WIDTH),
            y: world_y.div_euclid(CHUNK_HEIGHT),
        }
    }

    /// Both halves in one key, x in the high word.
    #[inline]
    pub fn packed(self) -> u64 {
        ((self.x as u32 as u64) << 32) | self.y as u32 as u64
    }

    #[inline]
    pub fn unpack(key: u64) -> Self {
        Self {
            x: (key >> 32) as u32 as i32,
            y: key as u32 as i32,
        }
    }

    /// World block coordinate of the chunk's top-left cell.
    #[inline]
    pub fn origin(self) -> (i32, i32) {
        (self.x * CHUNK_WIDTH, self.y * CHUNK_HEIGHT)
    }

    /// Chebyshev distance in chunks.
    #[inline]
    pub fn distance(self, other: ChunkCoord) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    #[inline]
    pub fn distance_sq(self, other: ChunkCoord) -> i32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Splits a world block coordinate into its chunk and the local cell inside it.
#[inline]
pub fn world_to_chunk(world_x: i32, world_y: i32) -> (ChunkCoord, i32, i32) {
    (
        ChunkCoord::from_block(world_x, world_y),
        world_x.rem_euclid(CHUNK_WIDTH),
        world_y.rem_euclid(CHUNK_HEIGHT),
    )
}

#[inline]
pub fn chunk_to_world(coord: ChunkCoord, local_x: i32, local_y: i32) -> (i32, i32) {
    let (ox, oy) = coord.origin();
    (ox + local_x, oy + local_y)
}

/// A fully generated `CHUNK_WIDTH x CHUNK_HEIGHT` block of the world.
/// Rows are stored top to bottom.
#[derive(Clone, PartialEq, Eq)]
pub struct Chunk {
    coord: ChunkCoord,
    seed: u64,
    blocks: Box<[BlockType; CHUNK_AREA]>,
    pub player_modified: bool,
}

impl Chunk {
    pub fn new(coord: ChunkCoord, seed: u64) -> Self {
        Chunk {
            coord,
            seed,
            blocks: Box::new([BlockType::Air; CHUNK_AREA]),
            player_modified: false,
        }
    }

    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Seed the chunk was generated from.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[inline]
    fn index(x: i32, y: i32) -> Option<usize> {
        if (0..CHUNK_WIDTH).contains(&x) && (0..CHUNK_HEIGHT).contains(&y) {
            Some((y * CHUNK_WIDTH + x) as usize)
        } else {
            None
        }
    }

    pub fn get_block(&self, x: i32, y: i32) -> BlockType {
        match Self::index(x, y) {
            Some(i) => self.blocks[i],
            None => BlockType::Air,
        }
    }

    pub fn set_block(&mut self, x: i32, y: i32, block: BlockType) -> bool {
        match Self::index(x, y) {
            Some(i) => {
                self.blocks[i] = block;
                true
            }
            None => false,
        }
    }

    /// One row of cells, left to right.
    pub fn row(&self, y: i32) -> &[BlockType] {
        let start = (y.clamp(0, CHUNK_HEIGHT - 1) * CHUNK_WIDTH) as usize;
        &self.blocks[start..start + CHUNK_WIDTH as usize]
    }

    pub fn blocks(&self) -> &[BlockType] {
        &self.blocks[..]
    }

    pub fn count(&self, block: BlockType) -> usize {
        self.blocks.iter().filter(|b| **b == block).count()
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("coord", &self.coord)
            .field("seed", &self.seed)
            .field("player_modified", &self.player_modified)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_chunk_round_trip_including_negatives() {
        for wx in -100..100 {
            for wy in [-65, -33, -32, -31, -1, 0, 1, 31, 32, 33, 64] {
                let (coord, lx, ly) = world_to_chunk(wx, wy);
                assert!((0..CHUNK_WIDTH).contains(&lx));
                assert!((0..CHUNK_HEIGHT).contains(&ly));
                assert_eq!(chunk_to_world(coord, lx, ly), (wx, wy));
            }
        }
    }

    #[test]
    fn negative_coordinates_use_floor_division() {
        assert_eq!(world_to_chunk(-1, -1), (ChunkCoord::new(-1, -1), 31, 31));
        assert_eq!(world_to_chunk(-32, 0), (ChunkCoord::new(-1, 0), 0, 0));
        assert_eq!(world_to_chunk(-33, 5), (ChunkCoord::new(-2, 0), 31, 5));
    }

    #[test]
    fn packed_key_round_trips() {
        for (x, y) in [(0, 0), (-1, 1), (i32::MIN, i32::MAX), (12345, -678)] {
            let coord = ChunkCoord::new(x, y);
            assert_eq!(ChunkCoord::unpack(coord.packed()), coord);
        }
        assert_ne!(
            ChunkCoord::new(1, 0).packed(),
            ChunkCoord::new(0, 1).packed()
        );
    }

    #[test]
    fn out_of_range_local_access_is_air() {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0), 1);
        assert!(!chunk.set_block(CHUNK_WIDTH, 0, BlockType::Stone));
        assert!(!chunk.set_block(0, -1, BlockType::Stone));
        assert_eq!(chunk.get_block(-1, 0), BlockType::Air);
        assert!(chunk.set_block(3, 4, BlockType::Stone));
        assert_eq!(chunk.get_block(3, 4), BlockType::Stone);
        assert_eq!(chunk.row(4)[3], BlockType::Stone);
    }
}
