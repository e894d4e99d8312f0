//! Flattened block-id grid over every loaded chunk
//!
//! Collision runs against this grid rather than the chunk map. It is rebuilt
//! when the set of loaded chunks changes and patched in place for single
//! block edits.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use rayon::prelude::*;

use crate::constants::*;
use crate::core::block::BlockType;
use crate::core::chunk::{Chunk, ChunkCoord};
use crate::world::cache::ChunkCache;

/// Dense row-major grid of block ids. Cell `(0, 0)` is world block
/// `(offset_x, offset_y)`; 0 is empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorldGrid {
    cells: Vec<u8>,
    width: i32,
    height: i32,
    offset_x: i32,
    offset_y: i32,
}

impl WorldGrid {
    pub fn empty() -> Self {
        WorldGrid::default()
    }

    /// All-empty grid of the given size. Falls back to an empty grid when
    /// the cell count does not fit in an `i32`.
    pub fn new(width: i32, height: i32, offset_x: i32, offset_y: i32) -> Self {
        Self::try_new(width.into(), height.into(), offset_x, offset_y).unwrap_or_else(|| {
            tracing::warn!(width, height, "grid too large, using an empty grid");
            WorldGrid::empty()
        })
    }

    /// All-empty grid, or `None` when `width * height` cells would not be
    /// addressable with `i32` indices.
    pub fn try_new(width: i64, height: i64, offset_x: i32, offset_y: i32) -> Option<Self> {
        let width = width.max(0);
        let height = height.max(0);
        let cells = width.checked_mul(height)?;
        if cells > i64::from(i32::MAX) {
            return None;
        }
        Some(WorldGrid {
            cells: vec![0; usize::try_from(cells).ok()?],
            width: i32::try_from(width).ok()?,
            height: i32::try_from(height).ok()?,
            offset_x,
            offset_y,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn offset_x(&self) -> i32 {
        self.offset_x
    }

    pub fn offset_y(&self) -> i32 {
        self.offset_y
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    fn index(&self, gx: i32, gy: i32) -> Option<usize> {
        if gx < 0 || gy < 0 || gx >= self.width || gy >= self.height {
            return None;
        }
        Some((gy * self.width + gx) as usize)
    }

    /// Cell at grid-local indices, `None` out of bounds.
    pub fn get(&self, gx: i32, gy: i32) -> Option<u8> {
        self.index(gx, gy).map(|i| self.cells[i])
    }

    pub fn set(&mut self, gx: i32, gy: i32, id: u8) -> bool {
        match self.index(gx, gy) {
            Some(i) => {
                self.cells[i] = id;
                true
            }
            None => false,
        }
    }

    pub fn contains_block(&self, world_x: i32, world_y: i32) -> bool {
        self.index(world_x - self.offset_x, world_y - self.offset_y)
            .is_some()
    }

    pub fn block_at(&self, world_x: i32, world_y: i32) -> Option<BlockType> {
        self.get(world_x - self.offset_x, world_y - self.offset_y)
            .map(BlockType::from_id)
    }

    pub fn set_block(&mut self, world_x: i32, world_y: i32, block: BlockType) -> bool {
        self.set(world_x - self.offset_x, world_y - self.offset_y, block.id())
    }

    /// Flatten a set of chunks into one grid covering their bounding box.
    /// Chunk rows are filled in parallel bands; gaps in the box stay empty.
    pub fn from_chunks(chunks: &[Arc<Chunk>]) -> Self {
        let Some(first) = chunks.first() else {
            return WorldGrid::empty();
        };

        let (mut min_x, mut min_y) = (first.coord().x, first.coord().y);
        let (mut max_x, mut max_y) = (min_x, min_y);
        for chunk in chunks {
            let c = chunk.coord();
            min_x = min_x.min(c.x);
            min_y = min_y.min(c.y);
            max_x = max_x.max(c.x);
            max_y = max_y.max(c.y);
        }

        let chunk_cols = i64::from(max_x) - i64::from(min_x) + 1;
        let chunk_rows = i64::from(max_y) - i64::from(min_y) + 1;
        let Some(mut grid) = WorldGrid::try_new(
            chunk_cols * i64::from(CHUNK_WIDTH),
            chunk_rows * i64::from(CHUNK_HEIGHT),
            min_x.saturating_mul(CHUNK_WIDTH),
            min_y.saturating_mul(CHUNK_HEIGHT),
        ) else {
            tracing::warn!(
                chunks = chunks.len(),
                chunk_cols,
                chunk_rows,
                "chunks span too wide an area to flatten"
            );
            return WorldGrid::empty();
        };

        let mut bands: Vec<Vec<&Chunk>> = vec![Vec::new(); chunk_rows as usize];
        for chunk in chunks {
            bands[(chunk.coord().y - min_y) as usize].push(chunk);
        }

        let width = grid.width as usize;
        let band_len = width * CHUNK_HEIGHT as usize;
        grid.cells
            .par_chunks_mut(band_len)
            .zip(bands.par_iter())
            .for_each(|(cells, band)| fill_band(cells, band, min_x, width));

        grid
    }
}

/// Copy one row of chunks into its slice of the grid.
fn fill_band(cells: &mut [u8], band: &[&Chunk], min_chunk_x: i32, width: usize) {
    let chunk_width = CHUNK_WIDTH as usize;
    for chunk in band {
        let col = (chunk.coord().x - min_chunk_x) as usize * chunk_width;
        for ly in 0..CHUNK_HEIGHT {
            let start = ly as usize * width + col;
            let dst = &mut cells[start..start + chunk_width];
            for (cell, block) in dst.iter_mut().zip(chunk.row(ly)) {
                *cell = block.id();
            }
        }
    }
}

#[derive(Clone, Debug)]
struct CachedGrid {
    grid: Arc<WorldGrid>,
    layout_version: u64,
}

/// Square of chunks the grid is restricted to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridFocus {
    pub center: ChunkCoord,
    pub radius: i32,
}

impl GridFocus {
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        coord.distance(self.center) <= self.radius
    }
}

/// Owns the last built grid and decides when it must be rebuilt.
#[derive(Debug, Default)]
pub struct GridBuilder {
    cached: RwLock<Option<CachedGrid>>,
    focus: RwLock<Option<GridFocus>>,
    dirty: AtomicBool,
    edits: AtomicU64,
    rebuilds: AtomicU64,
}

impl GridBuilder {
    pub fn new() -> Self {
        GridBuilder::default()
    }

    /// Current grid, rebuilt first if chunks were loaded or evicted, or an
    /// edit fell outside it.
    pub fn to_int_grid(&self, cache: &ChunkCache) -> Arc<WorldGrid> {
        if let Some(grid) = self.fresh(cache.layout_version()) {
            return grid;
        }
        self.rebuild(cache)
    }

    fn fresh(&self, layout_version: u64) -> Option<Arc<WorldGrid>> {
        if self.dirty.load(Ordering::Acquire) {
            return None;
        }
        let cached = self.cached.read();
        cached
            .as_ref()
            .filter(|c| c.layout_version == layout_version)
            .map(|c| Arc::clone(&c.grid))
    }

    /// Unconditionally rebuild from the cache's current contents.
    pub fn rebuild(&self, cache: &ChunkCache) -> Arc<WorldGrid> {
        self.dirty.store(false, Ordering::Release);
        let edits_before = self.edits.load(Ordering::Acquire);
        let layout_version = cache.layout_version();
        let mut chunks = cache.snapshot();
        if let Some(focus) = *self.focus.read() {
            chunks.retain(|chunk| focus.contains(chunk.coord()));
        }

        let grid = Arc::new(WorldGrid::from_chunks(&chunks));

        *self.cached.write() = Some(CachedGrid {
            grid: Arc::clone(&grid),
            layout_version,
        });
        // an edit patched the old grid while this one was being filled
        if self.edits.load(Ordering::Acquire) != edits_before {
            self.dirty.store(true, Ordering::Release);
        }

        let count = self.rebuilds.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            chunks = chunks.len(),
            width = grid.width(),
            height = grid.height(),
            rebuild = count,
            "world grid rebuilt"
        );
        grid
    }

    /// Mirror a single block edit into the cached grid. Edits outside it
    /// mark the grid dirty instead.
    pub fn patch(&self, world_x: i32, world_y: i32, block: BlockType) {
        self.edits.fetch_add(1, Ordering::AcqRel);
        let mut cached = self.cached.write();
        match cached.as_mut() {
            Some(c) if c.grid.contains_block(world_x, world_y) => {
                Arc::make_mut(&mut c.grid).set_block(world_x, world_y, block);
            }
            _ => self.dirty.store(true, Ordering::Release),
        }
    }

    /// Only flatten chunks within `radius` of `center`. Chunks the cache
    /// still holds farther out are left out of the grid.
    pub fn set_focus(&self, center: ChunkCoord, radius: i32) {
        let focus = Some(GridFocus { center, radius });
        let mut current = self.focus.write();
        if *current != focus {
            *current = focus;
            self.dirty.store(true, Ordering::Release);
        }
    }

    pub fn focus(&self) -> Option<GridFocus> {
        *self.focus.read()
    }

    pub fn invalidate(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Last built grid without rebuilding.
    pub fn cached(&self) -> Option<Arc<WorldGrid>> {
        self.cached.read().as_ref().map(|c| Arc::clone(&c.grid))
    }

    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::generator::ChunkGenerator;
    use crate::world::noise::OctaveLimits;
    use crate::world::terrain::HeightResolver;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn cache(seed: u64) -> ChunkCache {
        let resolver = Arc::new(HeightResolver::new(seed, OctaveLimits::default()));
        ChunkCache::new(Arc::new(ChunkGenerator::new(resolver)))
    }

    fn load_square(cache: &ChunkCache, min: i32, max: i32) {
        for cy in min..=max {
            for cx in min..=max {
                cache.get(ChunkCoord::new(cx, cy));
            }
        }
    }

    fn assert_matches_cache(grid: &WorldGrid, cache: &ChunkCache) {
        for gy in 0..grid.height() {
            for gx in 0..grid.width() {
                let (wx, wy) = (gx + grid.offset_x(), gy + grid.offset_y());
                assert_eq!(
                    grid.get(gx, gy),
                    Some(cache.get_block(wx, wy).id()),
                    "mismatch at ({wx}, {wy})"
                );
            }
        }
    }

    #[test]
    fn empty_cache_gives_empty_grid() {
        let cache = cache(1);
        let builder = GridBuilder::new();
        let grid = builder.to_int_grid(&cache);
        assert!(grid.is_empty());
        assert_eq!(grid.get(0, 0), None);
    }

    #[test]
    fn grid_covers_bounding_box_with_negative_origin() {
        let cache = cache(42);
        load_square(&cache, -2, 1);
        let grid = GridBuilder::new().to_int_grid(&cache);

        assert_eq!(grid.width(), 4 * CHUNK_WIDTH);
        assert_eq!(grid.height(), 4 * CHUNK_HEIGHT);
        assert_eq!(grid.offset_x(), -2 * CHUNK_WIDTH);
        assert_eq!(grid.offset_y(), -2 * CHUNK_HEIGHT);
        assert_matches_cache(&grid, &cache);
    }

    #[test]
    fn gaps_in_the_bounding_box_are_empty() {
        let cache = cache(7);
        cache.get(ChunkCoord::new(0, 0));
        cache.get(ChunkCoord::new(2, 1));
        let grid = GridBuilder::new().to_int_grid(&cache);
        assert_eq!(grid.width(), 3 * CHUNK_WIDTH);
        let (ox, oy) = ChunkCoord::new(1, 0).origin();
        for ly in 0..CHUNK_HEIGHT {
            for lx in 0..CHUNK_WIDTH {
                assert_eq!(grid.block_at(ox + lx, oy + ly), Some(BlockType::Air));
            }
        }
    }

    #[test]
    fn cached_grid_is_reused_until_layout_changes() {
        let cache = cache(3);
        load_square(&cache, 0, 1);
        let builder = GridBuilder::new();
        let first = builder.to_int_grid(&cache);
        let second = builder.to_int_grid(&cache);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builder.rebuild_count(), 1);

        cache.get(ChunkCoord::new(5, 5));
        let third = builder.to_int_grid(&cache);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(builder.rebuild_count(), 2);
    }

    #[test]
    fn random_edits_stay_consistent_with_the_cache() {
        let cache = cache(11);
        load_square(&cache, -1, 1);
        let builder = GridBuilder::new();
        builder.to_int_grid(&cache);

        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let span = 3 * CHUNK_WIDTH;
        for _ in 0..500 {
            let wx = rng.gen_range(-CHUNK_WIDTH..span - CHUNK_WIDTH);
            let wy = rng.gen_range(-CHUNK_HEIGHT..span - CHUNK_HEIGHT);
            let block = BlockType::ALL[rng.gen_range(0..BlockType::ALL.len())];
            assert!(cache.set_block(wx, wy, block));
            builder.patch(wx, wy, block);
        }

        assert!(!builder.is_dirty());
        let grid = builder.to_int_grid(&cache);
        assert_eq!(builder.rebuild_count(), 1);
        assert_matches_cache(&grid, &cache);
    }

    #[test]
    fn edit_outside_the_grid_forces_a_rebuild() {
        let cache = cache(5);
        cache.get(ChunkCoord::new(0, 0));
        let builder = GridBuilder::new();
        builder.to_int_grid(&cache);

        builder.patch(1000, 1000, BlockType::Stone);
        assert!(builder.is_dirty());
        builder.to_int_grid(&cache);
        assert!(!builder.is_dirty());
        assert_eq!(builder.rebuild_count(), 2);
    }

    #[test]
    fn patch_does_not_touch_grids_already_handed_out() {
        let cache = cache(5);
        cache.get(ChunkCoord::new(0, 0));
        let builder = GridBuilder::new();
        let before = builder.to_int_grid(&cache);
        let old = before.block_at(3, 3);

        cache.set_block(3, 3, BlockType::Obsidian);
        builder.patch(3, 3, BlockType::Obsidian);

        assert_eq!(before.block_at(3, 3), old);
        assert_eq!(
            builder.to_int_grid(&cache).block_at(3, 3),
            Some(BlockType::Obsidian)
        );
    }

    #[test]
    fn distant_clusters_never_overflow_the_grid() {
        let cache = cache(13);
        load_square(&cache, 0, 1);
        cache.get(ChunkCoord::new(5000, 5000));
        cache.get(ChunkCoord::new(5001, 5000));

        let builder = GridBuilder::new();
        let unfocused = builder.to_int_grid(&cache);
        assert!(unfocused.is_empty());

        builder.set_focus(ChunkCoord::new(5000, 5000), 2);
        let grid = builder.to_int_grid(&cache);
        assert_eq!(grid.width(), 2 * CHUNK_WIDTH);
        assert_eq!(grid.height(), CHUNK_HEIGHT);
        assert_eq!(grid.offset_x(), 5000 * CHUNK_WIDTH);
        assert_matches_cache(&grid, &cache);
    }

    #[test]
    fn moving_the_focus_rebuilds_around_the_new_center() {
        let cache = cache(17);
        load_square(&cache, -3, 3);
        let builder = GridBuilder::new();
        builder.set_focus(ChunkCoord::new(0, 0), 1);
        let near_origin = builder.to_int_grid(&cache);
        assert_eq!(near_origin.width(), 3 * CHUNK_WIDTH);
        assert_eq!(near_origin.offset_x(), -CHUNK_WIDTH);

        builder.set_focus(ChunkCoord::new(0, 0), 1);
        assert!(!builder.is_dirty());

        builder.set_focus(ChunkCoord::new(3, 3), 1);
        assert!(builder.is_dirty());
        let moved = builder.to_int_grid(&cache);
        assert_eq!(moved.width(), 2 * CHUNK_WIDTH);
        assert_eq!(moved.offset_x(), 2 * CHUNK_WIDTH);
        assert_eq!(moved.offset_y(), 2 * CHUNK_HEIGHT);
        assert_eq!(builder.rebuild_count(), 2);
    }

    #[test]
    fn oversized_grids_fall_back_to_empty() {
        assert!(WorldGrid::try_new(1 << 20, 1 << 20, 0, 0).is_none());
        assert!(WorldGrid::new(i32::MAX, 2, 0, 0).is_empty());
        assert_eq!(WorldGrid::new(4, 3, -1, -1).cells().len(), 12);
    }
}
