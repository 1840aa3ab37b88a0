//! Deferred execution contract

use std::future::Future;
use std::pin::Pin;

/// A unit of work to run after the triggering operation has returned
pub type DeferredTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Runs tasks after the primary work of the current operation
///
/// No ordering is guaranteed between tasks. Tasks report their own failures;
/// an executor only has to make sure a failing task does not take others down.
pub trait DeferredExecutor: Send + Sync + 'static {
    /// Queue a task
    fn enqueue(&self, task: DeferredTask);
}
