//! Stale-While-Revalidate (SWR) Example
//!
//! Serves the cached dashboard immediately, even once it is stale, while a
//! single background task recomputes it.

use flexcache::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let backend = MemoryBackend::new(MemoryConfig::default());
    let cache = FlexibleCache::new(backend);
    let version = Arc::new(AtomicU32::new(0));

    println!("=== Flexible Cache Demo ===\n");

    // Fresh for 1 second, kept for 10
    let ttl = TtlSpec::new(Duration::from_secs(1), Duration::from_secs(10));

    let render = |version: Arc<AtomicU32>| {
        move || async move {
            let v = version.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(format!("Dashboard v{}", v))
        }
    };

    let value: String = cache
        .flexible("dashboard", ttl, render(version.clone()), None)
        .await?;
    println!("T+0s: MISS, computed - {}", value);

    let value: String = cache
        .flexible("dashboard", ttl, render(version.clone()), None)
        .await?;
    println!("T+0s: FRESH - {}", value);

    println!("\n⏳ Waiting 2 seconds for the fresh window to pass...\n");
    tokio::time::sleep(Duration::from_secs(2)).await;

    let value: String = cache
        .flexible("dashboard", ttl, render(version.clone()), None)
        .await?;
    println!("T+2s: STALE (served immediately) - {}", value);

    // Further stale reads do not queue another refresh
    let value: String = cache
        .flexible("dashboard", ttl, render(version.clone()), None)
        .await?;
    println!("T+2s: STALE again - {}", value);

    tokio::time::sleep(Duration::from_millis(500)).await;

    let value: String = cache
        .flexible("dashboard", ttl, render(version.clone()), None)
        .await?;
    println!("T+2.5s: FRESH after background refresh - {}", value);

    println!(
        "\n✅ Computed {} times for 5 reads",
        version.load(Ordering::SeqCst)
    );

    Ok(())
}
