//! Deferred executors: run-after-response queue and tokio spawner

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::warn;

use flexcache_core::{DeferredExecutor, DeferredTask};

/// Holds tasks until the owner of the current operation calls [`run`](Self::run)
///
/// This is the per-request model: serve the response, then drain the queue
/// before the execution context goes away. Clones share one queue.
#[derive(Clone, Default)]
pub struct DeferredQueue {
    tasks: Arc<Mutex<Vec<DeferredTask>>>,
}

impl DeferredQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Check if nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Run every queued task, including tasks queued while running
    ///
    /// Each task runs on its own tokio task so a panic is contained and
    /// logged. Returns how many tasks ran.
    pub async fn run(&self) -> usize {
        let mut ran = 0;
        loop {
            let batch = std::mem::take(&mut *self.tasks.lock());
            if batch.is_empty() {
                return ran;
            }
            for task in batch {
                if let Err(e) = tokio::spawn(task).await {
                    warn!(target: "flexcache", error = %e, "Deferred task did not complete");
                }
                ran += 1;
            }
        }
    }

    /// Drop everything still queued
    pub fn clear(&self) -> usize {
        std::mem::take(&mut *self.tasks.lock()).len()
    }
}

impl DeferredExecutor for DeferredQueue {
    fn enqueue(&self, task: DeferredTask) {
        self.tasks.lock().push(task);
    }
}

/// Hands each task to the tokio runtime as soon as it is queued
///
/// The task starts once the current task yields, which in practice is after
/// the read that queued it has returned.
///
/// Without a handle and outside a runtime the task is dropped with a warning.
/// A scheduler that queued it clears its flag, so the next stale read tries
/// again.
#[derive(Debug, Clone, Default)]
pub struct SpawnExecutor {
    handle: Option<Handle>,
}

impl SpawnExecutor {
    /// Spawn on whichever runtime is current at enqueue time
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn on a specific runtime
    pub fn on(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl DeferredExecutor for SpawnExecutor {
    fn enqueue(&self, task: DeferredTask) {
        let handle = match &self.handle {
            Some(handle) => handle.clone(),
            None => match Handle::try_current() {
                Ok(handle) => handle,
                Err(_) => {
                    warn!(target: "flexcache", "No tokio runtime; dropping deferred task");
                    return;
                }
            },
        };
        handle.spawn(task);
    }
}
