//! Flash sale demo binary.
//!
//! Simulates a sale with hundreds of concurrent buyers against either the
//! in-memory store or `Redis`, then prints the outcome tally and the
//! Prometheus metrics.
//!
//! ```text
//! FLASH_SALE_BACKEND=memory cargo run -p flash-sale-demo
//! FLASH_SALE_BACKEND=redis REDIS_URL=redis://127.0.0.1:6379 cargo run -p flash-sale-demo
//! ```

mod sale;

use anyhow::{Context, bail};
use flash_sale_core::{AtomicStore, Config, StockService};
use flash_sale_redis::RedisAtomicStore;
use flash_sale_runtime::{MetricsExporter, init_tracing};
use flash_sale_testing::InMemoryAtomicStore;
use sale::{SaleSettings, run_sale};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    init_tracing("flash_sale_demo=info,flash_sale_core=warn,flash_sale_redis=info")
        .context("failed to initialize tracing")?;

    let mut exporter = MetricsExporter::new();
    exporter.install()?;

    let config = Config::from_env();
    config.validate()?;
    let settings = SaleSettings::from_env();
    let backend = std::env::var("FLASH_SALE_BACKEND").unwrap_or_else(|_| "memory".to_string());

    info!(
        backend = %backend,
        event_id = %settings.event_id,
        stock = settings.stock,
        buyers = settings.buyers,
        "Starting flash sale simulation"
    );

    match backend.as_str() {
        "memory" => simulate(InMemoryAtomicStore::new(), &config, &settings).await?,
        "redis" => {
            info!(redis_url = %config.redis.url, "Connecting to Redis...");
            let store = RedisAtomicStore::from_config(&config.redis).await?;
            simulate(store, &config, &settings).await?;
        }
        other => bail!("unknown FLASH_SALE_BACKEND '{other}' (expected 'memory' or 'redis')"),
    }

    if let Some(rendered) = exporter.render() {
        println!("\n=== Metrics ===\n{rendered}");
    }

    Ok(())
}

async fn simulate<S>(store: S, config: &Config, settings: &SaleSettings) -> anyhow::Result<()>
where
    S: AtomicStore + Clone + 'static,
{
    let service = StockService::new(store, config.reservation.clone());
    let report = run_sale(&service, settings).await?;

    println!("\n=== Flash Sale Summary ===\n{report}");

    Ok(())
}
