use flexcache::TracingMetrics;
use flexcache::prelude::*;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing subscriber
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_target(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("A global subscriber was already installed");
    }

    // 2. Create a FlexibleCache that reports through tracing
    let backend = MemoryBackend::new(MemoryConfig::default());
    let metrics = TracingMetrics::new().with_service_name("example-service");
    let cache = FlexibleCache::with_serializer_and_metrics(
        backend,
        JsonSerializer,
        metrics,
        FlexibleConfig::with_namespace("demo"),
    );

    let ttl = TtlSpec::new(Duration::from_secs(1), Duration::from_secs(60));

    println!("\n⚡ Miss...");
    let user: String = cache
        .flexible("user:1", ttl, || async { Ok("Alice".to_string()) }, None)
        .await?;
    println!("   Got: {}", user);

    println!("\n⚡ Fresh hit...");
    let user: String = cache
        .flexible("user:1", ttl, || async { Ok("Alice v2".to_string()) }, None)
        .await?;
    println!("   Got: {}", user);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    println!("\n⚡ Stale hit, refresh queued...");
    let user: String = cache
        .flexible("user:1", ttl, || async { Ok("Alice v2".to_string()) }, None)
        .await?;
    println!("   Got: {}", user);

    tokio::time::sleep(Duration::from_millis(100)).await;

    println!("\n✅ Check your console output for structured logs!");

    Ok(())
}
