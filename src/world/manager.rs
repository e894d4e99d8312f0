//! Keeps the chunks around an observer loaded
//!
//! Each update enqueues a bounded number of missing chunks nearest-first and
//! evicts chunks past the unload radius. Chunks still being generated are
//! never evicted. Lock order is `in_flight` before `loaded`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashSet;

use crate::constants::TILE_SIZE;
use crate::core::chunk::ChunkCoord;
use crate::world::cache::ChunkCache;
use crate::world::loader::{TaskOutcome, WorkerPool, WorldTask};

/// Receives `(step, total, message)` while the world is being prepared.
pub trait ProgressSink {
    fn report(&self, step: usize, total: usize, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize, &str),
{
    fn report(&self, step: usize, total: usize, message: &str) {
        self(step, total, message)
    }
}

/// Reports progress through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, step: usize, total: usize, message: &str) {
        tracing::info!(step, total, "{}", message);
    }
}

/// What one observer update did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObserverUpdate {
    pub observer: ChunkCoord,
    /// Jobs drained from the worker pool.
    pub completed: usize,
    pub enqueued: usize,
    /// Missing chunks left for a later update by the budget or a full queue.
    pub deferred: usize,
    pub evicted: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct StreamingRadii {
    pub view: i32,
    pub unload: i32,
    pub load_budget: usize,
}

pub struct ChunkManager {
    cache: Arc<ChunkCache>,
    pool: WorkerPool,
    loaded: RwLock<FxHashSet<ChunkCoord>>,
    in_flight: Mutex<FxHashSet<ChunkCoord>>,
    observer: Mutex<Option<ChunkCoord>>,
    radii: StreamingRadii,
}

/// Chunk containing a pixel-space position.
pub fn observer_chunk(x: f32, y: f32) -> ChunkCoord {
    let tile = TILE_SIZE as f32;
    ChunkCoord::from_block((x / tile).floor() as i32, (y / tile).floor() as i32)
}

/// Every chunk within Chebyshev `radius` of `center`, nearest first.
pub fn neighbourhood(center: ChunkCoord, radius: i32) -> Vec<ChunkCoord> {
    let radius = radius.max(0);
    let side = (2 * radius + 1) as usize;
    let mut coords = Vec::with_capacity(side * side);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            coords.push(ChunkCoord::new(center.x + dx, center.y + dy));
        }
    }
    coords.sort_by_key(|c| c.distance_sq(center));
    coords
}

impl ChunkManager {
    pub fn new(cache: Arc<ChunkCache>, pool: WorkerPool, radii: StreamingRadii) -> Self {
        ChunkManager {
            cache,
            pool,
            loaded: RwLock::new(FxHashSet::default()),
            in_flight: Mutex::new(FxHashSet::default()),
            observer: Mutex::new(None),
            radii,
        }
    }

    pub fn radii(&self) -> StreamingRadii {
        self.radii
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Per-tick streaming step for an observer at pixel position `(x, y)`.
    pub fn update_observer_position(&self, x: f32, y: f32) -> ObserverUpdate {
        let completed = self.drain_completed();
        let center = observer_chunk(x, y);
        *self.observer.lock() = Some(center);

        let mut update = ObserverUpdate {
            observer: center,
            completed,
            ..ObserverUpdate::default()
        };

        {
            let mut in_flight = self.in_flight.lock();
            let loaded = self.loaded.read();
            let missing: Vec<ChunkCoord> = neighbourhood(center, self.radii.view)
                .into_iter()
                .filter(|c| !loaded.contains(c) && !in_flight.contains(c))
                .collect();

            for coord in missing {
                if update.enqueued >= self.radii.load_budget
                    || !self.pool.try_submit(WorldTask::Generate(coord))
                {
                    update.deferred += 1;
                    continue;
                }
                in_flight.insert(coord);
                update.enqueued += 1;
                tracing::trace!(%coord, "chunk enqueued");
            }
        }

        update.evicted = self.evict_beyond(center);

        if update.enqueued > 0 || update.evicted > 0 {
            tracing::debug!(
                observer = %center,
                enqueued = update.enqueued,
                deferred = update.deferred,
                evicted = update.evicted,
                "streaming update"
            );
        }
        update
    }

    /// Load the whole view square around `(x, y)` before returning. Returns
    /// the number of chunks that had to be generated.
    pub fn initial_load(&self, x: f32, y: f32, progress: &dyn ProgressSink) -> usize {
        self.drain_completed();
        let center = observer_chunk(x, y);
        *self.observer.lock() = Some(center);

        let coords = neighbourhood(center, self.radii.view);
        let total = coords.len();
        let mut needed: FxHashSet<ChunkCoord> = {
            let loaded = self.loaded.read();
            coords.iter().copied().filter(|c| !loaded.contains(c)).collect()
        };
        let generated = needed.len();
        let mut step = total - needed.len();
        progress.report(step, total, "Preparing spawn area");

        let ordered: Vec<ChunkCoord> = coords.into_iter().filter(|c| needed.contains(c)).collect();
        for coord in ordered {
            let queued = {
                let mut in_flight = self.in_flight.lock();
                if in_flight.contains(&coord) {
                    true
                } else if self.pool.try_submit(WorldTask::Generate(coord)) {
                    in_flight.insert(coord);
                    true
                } else {
                    false
                }
            };
            if !queued {
                // queue full or pool gone: generate here while workers catch up
                self.load_inline(coord);
                needed.remove(&coord);
                step += 1;
                progress.report(step, total, &format!("Generated chunk {coord}"));
            }
        }

        while !needed.is_empty() {
            match self.pool.recv_timeout(Duration::from_millis(50)) {
                Some(outcome) => {
                    if let Some(coord) = self.apply(outcome) {
                        if needed.remove(&coord) {
                            step += 1;
                            progress.report(step, total, &format!("Generated chunk {coord}"));
                        }
                    }
                }
                None if !self.pool.is_running() => {
                    for coord in needed.drain() {
                        self.load_inline(coord);
                        step += 1;
                        progress.report(step, total, &format!("Generated chunk {coord}"));
                    }
                }
                None => {}
            }
        }

        progress.report(total, total, "World ready");
        tracing::info!(observer = %center, chunks = total, generated, "initial load finished");
        generated
    }

    fn load_inline(&self, coord: ChunkCoord) {
        self.cache.get(coord);
        self.in_flight.lock().remove(&coord);
        self.loaded.write().insert(coord);
    }

    /// Apply every finished outcome waiting on the pool.
    pub fn drain_completed(&self) -> usize {
        let mut count = 0;
        loop {
            let outcomes = self.pool.poll(64);
            if outcomes.is_empty() {
                return count;
            }
            count += outcomes.len();
            for outcome in outcomes {
                self.apply(outcome);
            }
        }
    }

    /// Record one outcome; returns the chunk it loaded or gave up on.
    fn apply(&self, outcome: TaskOutcome) -> Option<ChunkCoord> {
        match outcome {
            TaskOutcome::Generated(coord) => {
                let observer = *self.observer.lock();
                let mut in_flight = self.in_flight.lock();
                in_flight.remove(&coord);
                // requested before the observer moved away
                if observer.is_some_and(|center| coord.distance(center) > self.radii.unload) {
                    drop(in_flight);
                    self.cache.evict(coord);
                    tracing::trace!(%coord, "dropping chunk that landed out of range");
                    return None;
                }
                self.loaded.write().insert(coord);
                Some(coord)
            }
            TaskOutcome::Cancelled(coord) => {
                self.in_flight.lock().remove(&coord);
                None
            }
            TaskOutcome::GridRebuilt(grid) => {
                tracing::trace!(width = grid.width(), height = grid.height(), "grid rebuild done");
                None
            }
        }
    }

    fn evict_beyond(&self, center: ChunkCoord) -> usize {
        let in_flight = self.in_flight.lock();
        let mut loaded = self.loaded.write();
        let far: Vec<ChunkCoord> = loaded
            .iter()
            .copied()
            .filter(|c| c.distance(center) > self.radii.unload && !in_flight.contains(c))
            .collect();
        for coord in &far {
            loaded.remove(coord);
            self.cache.evict(*coord);
        }
        far.len()
    }

    pub fn loaded_coords(&self) -> Vec<ChunkCoord> {
        self.loaded.read().iter().copied().collect()
    }

    pub fn is_loaded(&self, coord: ChunkCoord) -> bool {
        self.loaded.read().contains(&coord)
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.read().len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn observer_chunk(&self) -> Option<ChunkCoord> {
        *self.observer.lock()
    }

    /// Forget what is loaded after the cache was reset. Jobs still in flight
    /// land in the new world once they finish.
    pub fn reset(&self) {
        self.loaded.write().clear();
    }

    pub fn shutdown(&self) {
        self.pool.shutdown();
        self.drain_completed();
    }
}

impl std::fmt::Debug for ChunkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkManager")
            .field("loaded", &self.loaded_count())
            .field("in_flight", &self.in_flight_count())
            .field("observer", &self.observer_chunk())
            .field("radii", &self.radii)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{CHUNK_HEIGHT, CHUNK_WIDTH};
    use crate::world::generator::ChunkGenerator;
    use crate::world::grid::GridBuilder;
    use crate::world::noise::OctaveLimits;
    use crate::world::terrain::HeightResolver;

    fn manager(view: i32, unload: i32, budget: usize) -> (ChunkManager, Arc<ChunkCache>) {
        let resolver = Arc::new(HeightResolver::new(42, OctaveLimits::default()));
        let cache = Arc::new(ChunkCache::new(Arc::new(ChunkGenerator::new(resolver))));
        let pool =
            WorkerPool::spawn(2, 64, Arc::clone(&cache), Arc::new(GridBuilder::new())).unwrap();
        let radii = StreamingRadii {
            view,
            unload,
            load_budget: budget,
        };
        (ChunkManager::new(Arc::clone(&cache), pool, radii), cache)
    }

    fn chunk_center(coord: ChunkCoord) -> (f32, f32) {
        let (bx, by) = coord.origin();
        (
            ((bx + CHUNK_WIDTH / 2) * TILE_SIZE) as f32,
            ((by + CHUNK_HEIGHT / 2) * TILE_SIZE) as f32,
        )
    }

    #[test]
    fn neighbourhood_is_nearest_first() {
        let coords = neighbourhood(ChunkCoord::new(3, -1), 2);
        assert_eq!(coords.len(), 25);
        assert_eq!(coords[0], ChunkCoord::new(3, -1));
        let distances: Vec<_> = coords
            .iter()
            .map(|c| c.distance_sq(ChunkCoord::new(3, -1)))
            .collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn observer_chunk_floors_negative_pixels() {
        assert_eq!(observer_chunk(-0.5, -0.5), ChunkCoord::new(-1, -1));
        assert_eq!(observer_chunk(0.0, 0.0), ChunkCoord::new(0, 0));
        let edge = (CHUNK_WIDTH * TILE_SIZE) as f32;
        assert_eq!(observer_chunk(edge, 0.0), ChunkCoord::new(1, 0));
    }

    #[test]
    fn update_respects_the_load_budget() {
        let (manager, _) = manager(2, 3, 3);
        let update = manager.update_observer_position(0.0, 0.0);
        assert_eq!(update.enqueued, 3);
        assert_eq!(update.deferred, 22);
        assert_eq!(manager.in_flight_count() + manager.loaded_count(), 3);
    }

    #[test]
    fn initial_load_reports_every_step() {
        let (manager, cache) = manager(1, 2, 4);
        let steps = Mutex::new(Vec::new());
        let sink = |step: usize, total: usize, _: &str| steps.lock().push((step, total));

        let generated = manager.initial_load(0.0, 0.0, &sink);

        assert_eq!(generated, 9);
        assert_eq!(manager.loaded_count(), 9);
        assert_eq!(manager.in_flight_count(), 0);
        assert_eq!(cache.len(), 9);
        let steps = steps.into_inner();
        assert_eq!(steps.first(), Some(&(0, 9)));
        assert_eq!(steps.last(), Some(&(9, 9)));
        assert!(steps.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[test]
    fn moving_away_evicts_past_the_unload_radius() {
        let (manager, cache) = manager(1, 2, 16);
        manager.initial_load(0.0, 0.0, &LogProgress);

        let (x, y) = chunk_center(ChunkCoord::new(2, 0));
        manager.update_observer_position(x, y);
        // (-1, *) is 3 away from (2, 0) and must go
        for cy in -1..=1 {
            assert!(!manager.is_loaded(ChunkCoord::new(-1, cy)));
            assert!(!cache.contains(ChunkCoord::new(-1, cy)));
        }
        // (0, *) is exactly at the unload radius and stays
        assert!(manager.is_loaded(ChunkCoord::new(0, 0)));
    }

    #[test]
    fn initial_load_after_shutdown_generates_inline() {
        let (manager, cache) = manager(1, 2, 4);
        manager.shutdown();
        let generated = manager.initial_load(0.0, 0.0, &LogProgress);
        assert_eq!(generated, 9);
        assert_eq!(cache.len(), 9);
    }

    #[test]
    fn chunks_requested_before_a_teleport_do_not_stay_loaded() {
        let (manager, cache) = manager(1, 2, 16);
        manager.update_observer_position(0.0, 0.0);

        let far = ChunkCoord::new(5000, 5000);
        let (x, y) = chunk_center(far);
        manager.update_observer_position(x, y);
        let deadline = std::time::Instant::now() + Duration::from_secs(30);
        while manager.in_flight_count() > 0 {
            assert!(std::time::Instant::now() < deadline, "jobs never finished");
            manager.drain_completed();
            std::thread::sleep(Duration::from_millis(5));
        }

        assert!(manager.loaded_coords().iter().all(|c| c.distance(far) <= 2));
        assert!(cache.coords().iter().all(|c| c.distance(far) <= 2));
        assert!(manager.is_loaded(far));
    }
}
