//! Per-request refresh scheduling
//!
//! Each simulated request gets its own scheduler and deferred queue. Stale
//! entries are refreshed after the "response" is sent, and a key is
//! refreshed at most once per request no matter how often it is read.

use flexcache::prelude::*;
use std::time::Duration;

async fn handle_request(cache: &FlexibleCache<MemoryBackend>, id: u32) -> Result<()> {
    let queue = DeferredQueue::new();
    let request = cache.scoped(RefreshScheduler::new(queue.clone()));

    let ttl = TtlSpec::new(Duration::from_secs(1), Duration::from_secs(60));
    for _ in 0..3 {
        let stats: String = request
            .flexible(
                "stats",
                ttl,
                move || async move { Ok(format!("stats computed by request {}", id)) },
                Some(LockConfig::new().hold_secs(5)),
            )
            .await?;
        println!("request {}: {}", id, stats);
    }

    println!("request {}: response sent, {} refresh(es) queued", id, queue.len());
    let ran = queue.run().await;
    println!("request {}: ran {} deferred task(s)\n", id, ran);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cache = FlexibleCache::new(MemoryBackend::new(MemoryConfig::default()));

    handle_request(&cache, 1).await?;
    handle_request(&cache, 2).await?;

    println!("⏳ Waiting for the entry to go stale...\n");
    tokio::time::sleep(Duration::from_millis(1100)).await;

    handle_request(&cache, 3).await?;
    handle_request(&cache, 4).await?;

    Ok(())
}
