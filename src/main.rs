use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gateway::GatewayService;
use greenpass_core::{Clock, CoreConfig, SystemClock, ValidityEngine};
use greenpass_protocol::{StorageClient, serve, shutdown_channel, wait_for_signal};
use greenpass_store::{FileRecordStore, RecordStore};
use issuance::IssuanceService;
use storage_service::StorageService;

/// Main entry point for greenpass
///
/// Starts the three services in one process:
/// - Issuance on port 1024 (configurable via GREENPASS_ISSUANCE_ADDR)
/// - Storage on port 1025 (configurable via GREENPASS_STORAGE_ADDR)
/// - Gateway on port 1026 (configurable via GREENPASS_GATEWAY_ADDR)
///
/// Issuance and the gateway still reach storage over TCP at GREENPASS_STORAGE_UPSTREAM, so the
/// wire protocol is exercised exactly as in a split deployment.
///
/// # Environment Variables
/// - `GREENPASS_DATA_DIR`: Record store directory (default: "greenpass_data")
/// - `GREENPASS_STORAGE_UPSTREAM`: Storage address used by the other services
///   (default: "127.0.0.1:1025")
/// - `GREENPASS_VALIDITY_RULES`: "legacy" (default) or "calendar"
/// - `GREENPASS_DRAIN_SECS`: Shutdown drain window in seconds (default: 5)
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("greenpass_run=info".parse()?)
                .add_directive("greenpass_protocol=info".parse()?)
                .add_directive("storage_service=info".parse()?)
                .add_directive("gateway=info".parse()?)
                .add_directive("issuance=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CoreConfig::from_env()?;
    let store: Arc<dyn RecordStore> = Arc::new(FileRecordStore::open(config.data_dir())?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine = ValidityEngine::new(config.validity_rules());
    let storage_client = StorageClient::new(config.storage_upstream());

    let storage_listener = TcpListener::bind(config.storage_addr()).await?;
    let issuance_listener = TcpListener::bind(config.issuance_addr()).await?;
    let gateway_listener = TcpListener::bind(config.gateway_addr()).await?;

    tracing::info!("++ Record store at {}", config.data_dir().display());
    tracing::info!("++ Starting greenpass storage on {}", config.storage_addr());
    tracing::info!("++ Starting greenpass issuance on {}", config.issuance_addr());
    tracing::info!("++ Starting greenpass gateway on {}", config.gateway_addr());
    tracing::info!("++ Validity rules {}", config.validity_rules());

    let (trigger, token) = shutdown_channel();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    let drain = config.drain_window();
    let storage = serve(
        storage_listener,
        Arc::new(StorageService::new(store)),
        token.clone(),
        drain,
    );
    let issuance = serve(
        issuance_listener,
        Arc::new(IssuanceService::new(
            storage_client.clone(),
            Arc::clone(&clock),
            engine,
        )),
        token.clone(),
        drain,
    );
    let gateway = serve(
        gateway_listener,
        Arc::new(GatewayService::new(storage_client, clock, engine)),
        token,
        drain,
    );

    // Run all three
    tokio::try_join!(storage, issuance, gateway)?;

    Ok(())
}
