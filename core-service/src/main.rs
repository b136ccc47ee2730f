use anyhow::Context;
use bridge_desktop::SqliteConnectionDirectory;
use core_catalog::{create_pool, DatabaseConfig};
use core_runtime::config::{CoreConfig, SyncSettings};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_service::{router, CatalogSyncService};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

fn logging_config() -> anyhow::Result<LoggingConfig> {
    let mut config = LoggingConfig::default();
    if let Ok(format) = std::env::var("CATALOG_SYNC_LOG_FORMAT") {
        config = config.with_format(format.parse::<LogFormat>()?);
    }
    if let Ok(filter) = std::env::var("RUST_LOG") {
        config = config.with_filter(filter);
    }
    Ok(config)
}

fn spawn_backstop(service: CatalogSyncService, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match service.run_nightly_backstop().await {
                Ok(outcomes) => info!(connections = outcomes.len(), "Backstop finished"),
                Err(e) => warn!(error = %e, "Backstop failed"),
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = SyncSettings::from_env()?;
    init_logging(logging_config()?)?;

    let pool = create_pool(DatabaseConfig::new(settings.database_path.clone()))
        .await
        .context("failed to open catalog database")?;
    let directory = SqliteConnectionDirectory::new(pool.clone())
        .await
        .context("failed to open connection directory")?;

    let bind_addr = settings.bind_addr.clone();
    let backstop_interval = settings.nightly_backstop_interval;

    let config = CoreConfig::builder()
        .settings(settings)
        .connection_directory(Arc::new(directory))
        .build()?;
    let service = CatalogSyncService::with_vimeo(config, pool);

    if service.settings().callback_base_url.is_none() {
        warn!("CATALOG_SYNC_CALLBACK_BASE_URL is not set; webhook subscriptions will fail");
    }
    if let Some(every) = backstop_interval {
        info!(interval_secs = every.as_secs(), "Scheduling nightly backstop");
        spawn_backstop(service.clone(), every);
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!(addr = %bind_addr, "catalog-sync listening");

    axum::serve(listener, router(service)).await?;
    Ok(())
}
