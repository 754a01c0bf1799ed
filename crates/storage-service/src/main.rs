use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use greenpass_core::CoreConfig;
use greenpass_protocol::{serve, shutdown_channel, wait_for_signal};
use greenpass_store::FileRecordStore;
use storage_service::StorageService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("storage_service=info".parse()?)
                .add_directive("greenpass_protocol=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CoreConfig::from_env()?;
    let store = FileRecordStore::open(config.data_dir())?;
    tracing::info!("-- Record store at {}", store.root_directory().display());

    let listener = TcpListener::bind(config.storage_addr()).await?;
    tracing::info!("-- Starting greenpass storage on {}", listener.local_addr()?);

    let (trigger, token) = shutdown_channel();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    let service = Arc::new(StorageService::new(Arc::new(store)));
    serve(listener, service, token, config.drain_window()).await?;

    Ok(())
}
