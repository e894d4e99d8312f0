//! Background worker pool for chunk generation and grid rebuilds
//!
//! Work is handed to a fixed set of named threads over a bounded crossbeam
//! channel. Workers write generated chunks straight into the shared cache
//! and report what they did on the result channel; the caller decides when
//! to drain it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded, unbounded};
use parking_lot::{Mutex, RwLock};

use crate::core::chunk::ChunkCoord;
use crate::error::{Result, WorldError};
use crate::world::cache::ChunkCache;
use crate::world::grid::{GridBuilder, WorldGrid};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorldTask {
    Generate(ChunkCoord),
    RebuildGrid,
}

#[derive(Clone, Debug)]
pub enum TaskOutcome {
    /// The chunk is now in the cache.
    Generated(ChunkCoord),
    /// Dropped unstarted because the pool is shutting down.
    Cancelled(ChunkCoord),
    GridRebuilt(Arc<WorldGrid>),
}

pub struct WorkerPool {
    task_tx: RwLock<Option<Sender<WorldTask>>>,
    result_rx: Receiver<TaskOutcome>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    cancel: Arc<AtomicBool>,
    worker_count: usize,
}

impl WorkerPool {
    /// Start `worker_count` workers (0 means one per CPU).
    pub fn spawn(
        worker_count: usize,
        queue_capacity: usize,
        cache: Arc<ChunkCache>,
        grid: Arc<GridBuilder>,
    ) -> Result<Self> {
        let worker_count = if worker_count == 0 {
            num_cpus::get()
        } else {
            worker_count
        };

        let (task_tx, task_rx) = bounded::<WorldTask>(queue_capacity.max(1));
        // workers never block on send, even while being joined
        let (result_tx, result_rx) = unbounded::<TaskOutcome>();
        let cancel = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let rx = task_rx.clone();
            let tx = result_tx.clone();
            let cache = Arc::clone(&cache);
            let grid = Arc::clone(&grid);
            let cancel = Arc::clone(&cancel);

            let handle = thread::Builder::new()
                .name(format!("chunk-gen-{}", index))
                .spawn(move || worker_loop(rx, tx, cache, grid, cancel))
                .map_err(|source| WorldError::WorkerSpawn { index, source })?;
            handles.push(handle);
        }

        tracing::info!(workers = worker_count, queue_capacity, "worker pool started");

        Ok(WorkerPool {
            task_tx: RwLock::new(Some(task_tx)),
            result_rx,
            handles: Mutex::new(handles),
            cancel,
            worker_count,
        })
    }

    /// Queue a task without blocking. False if the queue is full or the
    /// pool has shut down.
    pub fn try_submit(&self, task: WorldTask) -> bool {
        match self.task_tx.read().as_ref() {
            Some(tx) => tx.try_send(task).is_ok(),
            None => false,
        }
    }

    /// Queue a task, waiting for room.
    pub fn submit(&self, task: WorldTask) -> bool {
        let tx = self.task_tx.read().clone();
        match tx {
            Some(tx) => tx.send(task).is_ok(),
            None => false,
        }
    }

    /// Drain up to `max` finished outcomes without blocking.
    pub fn poll(&self, max: usize) -> Vec<TaskOutcome> {
        let mut outcomes = Vec::new();
        while outcomes.len() < max {
            match self.result_rx.try_recv() {
                Ok(outcome) => outcomes.push(outcome),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        outcomes
    }

    /// Wait for the next outcome. `None` once every worker has exited or
    /// the timeout passes.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<TaskOutcome> {
        match self.result_rx.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn is_running(&self) -> bool {
        self.task_tx.read().is_some()
    }

    /// Close the queue, cancel anything not yet started and join every
    /// worker. Safe to call more than once.
    pub fn shutdown(&self) {
        self.cancel.store(true, Ordering::Release);
        let closed = self.task_tx.write().take().is_some();

        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        let mut panicked = 0;
        for handle in handles {
            if handle.join().is_err() {
                panicked += 1;
            }
        }

        if panicked > 0 {
            tracing::warn!(panicked, "chunk workers panicked before shutdown");
        }
        if closed {
            tracing::info!(workers = self.worker_count, "worker pool stopped");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_count", &self.worker_count)
            .field("running", &self.is_running())
            .finish()
    }
}

fn worker_loop(
    rx: Receiver<WorldTask>,
    tx: Sender<TaskOutcome>,
    cache: Arc<ChunkCache>,
    grid: Arc<GridBuilder>,
    cancel: Arc<AtomicBool>,
) {
    while let Ok(task) = rx.recv() {
        let cancelled = cancel.load(Ordering::Acquire);
        let outcome = match task {
            WorldTask::Generate(coord) if cancelled => TaskOutcome::Cancelled(coord),
            WorldTask::Generate(coord) => {
                cache.get(coord);
                TaskOutcome::Generated(coord)
            }
            WorldTask::RebuildGrid if cancelled => continue,
            WorldTask::RebuildGrid => TaskOutcome::GridRebuilt(grid.rebuild(&cache)),
        };

        if tx.send(outcome).is_err() {
            break;
        }
    }
}
