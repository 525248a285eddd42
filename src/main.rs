use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use folio::api::{start_server, AppState, ServerConfig};
use folio::numbering::{GeneratorRegistry, NumberGenerationService, NumberingConfig};
use folio::storage::{LocalLockBackend, LockConfig, RocksDbStorage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("folio=info".parse()?))
        .init();

    tracing::info!("Folio starting...");

    let data_dir = std::env::var("FOLIO_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let storage = Arc::new(RocksDbStorage::open(&data_dir)?);
    tracing::info!("Opened RocksDB at {}", data_dir);

    let lock_config = LockConfig::from_env();
    tracing::info!(
        lease_secs = lock_config.lease.as_secs(),
        max_wait_ms = lock_config.max_wait.as_millis() as u64,
        "Using in-process generator lock"
    );

    let settings = NumberingConfig::from_env();
    let start = settings.start;
    tracing::info!(
        generator = %settings.generator,
        padding = settings.padding,
        pattern = %settings.pattern,
        "Loaded invoice numbering settings"
    );

    let service = Arc::new(NumberGenerationService::new(
        Arc::clone(&storage),
        Arc::clone(&storage),
        Arc::new(LocalLockBackend::new(lock_config)),
        GeneratorRegistry::builtin(),
        settings,
    ));

    service.settings()?.validate()?;
    let generator = service.settings()?.generator;
    if !service.generator_definitions().contains_key(&generator) {
        return Err(format!("Unknown invoice number generator: {}", generator).into());
    }

    if let Some(start) = start {
        service.seed_start(start)?;
    }

    let state = Arc::new(AppState::new(service, storage));

    start_server(ServerConfig::from_env(), state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown signal received");
    })
    .await?;

    Ok(())
}
