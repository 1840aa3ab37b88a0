//! Optimistic read, then lock and re-check before doing the work
//!
//! The caller reads a version without any lock and decides work is needed.
//! Under the lock the version is read again; the body only runs if nobody
//! else moved it in between. Nothing here is cache specific.

use std::future::Future;
use tracing::warn;

use flexcache_core::{LockBackend, Result};

use super::lock::DistributedLock;

/// How a locked revalidation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revalidation<T> {
    /// Version unchanged; the body ran and produced this
    Committed(T),
    /// Version moved after the optimistic read; the body did not run
    Superseded,
    /// Lock not obtained within its wait budget; the body did not run
    Contended,
}

impl<T> Revalidation<T> {
    /// Whether the body ran
    pub fn is_committed(&self) -> bool {
        matches!(self, Revalidation::Committed(_))
    }
}

/// Run `body` under `lock` only if `reread` still returns `observed`
///
/// The lock is released on every path out of the re-check and the body.
/// Errors from `reread` or `body` propagate; a lock timeout does not.
///
/// The version must change on every write for the re-check to catch it. A
/// cache timestamp only has whole-second resolution, so a write landing in
/// the same second as `observed` looks unchanged and the body runs again.
pub async fn locked_revalidate<L, V, R, RFut, B, BFut, T>(
    lock: &DistributedLock<L>,
    observed: &V,
    reread: R,
    body: B,
) -> Result<Revalidation<T>>
where
    L: LockBackend,
    V: PartialEq,
    R: FnOnce() -> RFut,
    RFut: Future<Output = Result<V>>,
    B: FnOnce() -> BFut,
    BFut: Future<Output = Result<T>>,
{
    let guard = match lock.acquire().await {
        Ok(guard) => guard,
        Err(e) if e.is_lock_timeout() => return Ok(Revalidation::Contended),
        Err(e) => return Err(e),
    };

    let outcome = async {
        if reread().await? != *observed {
            return Ok(Revalidation::Superseded);
        }
        body().await.map(Revalidation::Committed)
    }
    .await;

    let key = guard.key().to_string();
    if let Err(e) = guard.release().await {
        warn!(target: "flexcache", lock = %key, error = %e, "Lock release failed");
    }
    outcome
}
