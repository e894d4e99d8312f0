//! Concurrent store of generated chunks
//!
//! Chunks are generated on first access and published only once complete.
//! Misses use check-lock-check: look up under the read lock, generate with no
//! lock held, then re-check under the write lock. Two threads missing the
//! same coordinate may both generate, but only the first result is stored
//! and every caller gets that one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::core::block::BlockType;
use crate::core::chunk::{Chunk, ChunkCoord, world_to_chunk};

/// Something that can produce a chunk for the current seed.
pub trait ChunkSource: Send + Sync {
    /// Must be a pure function of `coord` and the source's seed, and must
    /// stamp that seed on the returned chunk.
    fn generate_chunk(&self, coord: ChunkCoord) -> Chunk;

    fn seed(&self) -> u64;

    fn reseed(&self, seed: u64);
}

struct CacheInner {
    chunks: FxHashMap<u64, Arc<Chunk>>,
    seed: u64,
    layout_version: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub stored: usize,
    pub generated: u64,
    pub discarded: u64,
    pub evicted: u64,
}

pub struct ChunkCache {
    source: Arc<dyn ChunkSource>,
    inner: RwLock<CacheInner>,
    generated: AtomicU64,
    discarded: AtomicU64,
    evicted: AtomicU64,
}

impl ChunkCache {
    pub fn new(source: Arc<dyn ChunkSource>) -> Self {
        let seed = source.seed();
        ChunkCache {
            source,
            inner: RwLock::new(CacheInner {
                chunks: FxHashMap::default(),
                seed,
                layout_version: 0,
            }),
            generated: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    /// Cached chunk, generating and storing it on a miss.
    pub fn get(&self, coord: ChunkCoord) -> Arc<Chunk> {
        let key = coord.packed();
        loop {
            if let Some(chunk) = self.inner.read().chunks.get(&key) {
                return Arc::clone(chunk);
            }

            let chunk = self.source.generate_chunk(coord);
            self.generated.fetch_add(1, Ordering::Relaxed);

            let mut inner = self.inner.write();
            if let Some(existing) = inner.chunks.get(&key) {
                self.discarded.fetch_add(1, Ordering::Relaxed);
                return Arc::clone(existing);
            }
            if chunk.seed() != inner.seed {
                let source_seed = self.source.seed();
                if source_seed != inner.seed {
                    // the source was reseeded without going through `reset`
                    tracing::warn!(
                        old_seed = inner.seed,
                        new_seed = source_seed,
                        dropped = inner.chunks.len(),
                        "chunk source reseeded outside the cache"
                    );
                    inner.chunks.clear();
                    inner.seed = source_seed;
                    inner.layout_version += 1;
                }
            }
            if chunk.seed() != inner.seed {
                // generated against a seed that was reset mid-flight
                self.discarded.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(%coord, stale_seed = chunk.seed(), "discarding stale chunk");
                continue;
            }

            let chunk = Arc::new(chunk);
            inner.chunks.insert(key, Arc::clone(&chunk));
            inner.layout_version += 1;
            tracing::trace!(%coord, "chunk stored");
            return chunk;
        }
    }

    /// Cached chunk without generating.
    pub fn peek(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.inner.read().chunks.get(&coord.packed()).cloned()
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.inner.read().chunks.contains_key(&coord.packed())
    }

    /// Drop a chunk. It is regenerated identically on next access, minus any
    /// player edits.
    pub fn evict(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        let mut inner = self.inner.write();
        let removed = inner.chunks.remove(&coord.packed());
        if removed.is_some() {
            inner.layout_version += 1;
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.read().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn coords(&self) -> Vec<ChunkCoord> {
        self.inner
            .read()
            .chunks
            .keys()
            .map(|key| ChunkCoord::unpack(*key))
            .collect()
    }

    /// Every stored chunk, for readers that draw or flatten the world.
    pub fn snapshot(&self) -> Vec<Arc<Chunk>> {
        self.inner.read().chunks.values().cloned().collect()
    }

    /// Changes whenever a chunk is stored or evicted, or the cache is reset.
    pub fn layout_version(&self) -> u64 {
        self.inner.read().layout_version
    }

    pub fn seed(&self) -> u64 {
        self.inner.read().seed
    }

    /// Block at a world coordinate; Air where nothing is generated.
    pub fn get_block(&self, world_x: i32, world_y: i32) -> BlockType {
        let (coord, lx, ly) = world_to_chunk(world_x, world_y);
        match self.inner.read().chunks.get(&coord.packed()) {
            Some(chunk) => chunk.get_block(lx, ly),
            None => BlockType::Air,
        }
    }

    /// Overwrite one block of a generated chunk. Returns false for
    /// ungenerated space.
    pub fn set_block(&self, world_x: i32, world_y: i32, block: BlockType) -> bool {
        let (coord, lx, ly) = world_to_chunk(world_x, world_y);
        let mut inner = self.inner.write();
        let Some(chunk) = inner.chunks.get_mut(&coord.packed()) else {
            return false;
        };
        let chunk = Arc::make_mut(chunk);
        chunk.player_modified = true;
        chunk.set_block(lx, ly, block)
    }

    /// Switch to a new seed. Everything stored is dropped, and chunks still
    /// being generated against the old seed are rejected when they finish.
    pub fn reset(&self, seed: u64) {
        let mut inner = self.inner.write();
        self.source.reseed(seed);
        let dropped = inner.chunks.len();
        inner.chunks.clear();
        inner.seed = seed;
        inner.layout_version += 1;
        tracing::info!(seed, dropped, "chunk cache reset");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            stored: self.len(),
            generated: self.generated.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ChunkCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
