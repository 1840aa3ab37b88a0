use flexcache::prelude::*;
use std::time::Duration;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Check if we can connect to Redis, otherwise skip
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

    println!("Connecting to Redis at {}", redis_url);

    let config = RedisConfig::new(redis_url).pool_size(5).prefix("example");

    match RedisBackend::new(config).await {
        Ok(backend) => {
            let cache = FlexibleCache::new(backend);
            let ttl = TtlSpec::new(Duration::from_secs(5), Duration::from_secs(300));

            let greeting: String = cache
                .flexible("hello", ttl, || async { Ok("world".to_string()) }, None)
                .await?;
            println!("Got: {}", greeting);

            // Lock with a named owner so an operator can release it
            let guard = cache
                .lock("hello", LockConfig::new().owner("example-job").hold_secs(30))
                .acquire()
                .await?;
            println!("Holding {} as {}", guard.key(), guard.owner());
            guard.release().await?;

            cache.forget("hello").await?;
            println!("Stats: {:?}", cache.stats().await?);
        }
        Err(e) => {
            eprintln!("Failed to connect to Redis: {}", e);
            eprintln!("Skipping example (Redis might not be running)");
        }
    }

    Ok(())
}
