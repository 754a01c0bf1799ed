use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use greenpass_core::{CoreConfig, SystemClock, ValidityEngine};
use greenpass_protocol::{serve, shutdown_channel, wait_for_signal, StorageClient};
use issuance::IssuanceService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("issuance=info".parse()?)
                .add_directive("greenpass_protocol=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CoreConfig::from_env()?;
    let listener = TcpListener::bind(config.issuance_addr()).await?;
    tracing::info!("-- Starting greenpass issuance on {}", listener.local_addr()?);
    tracing::info!(
        "-- Storage upstream {}, validity rules {}",
        config.storage_upstream(),
        config.validity_rules()
    );

    let (trigger, token) = shutdown_channel();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    let service = Arc::new(IssuanceService::new(
        StorageClient::new(config.storage_upstream()),
        Arc::new(SystemClock),
        ValidityEngine::new(config.validity_rules()),
    ));
    serve(listener, service, token, config.drain_window()).await?;

    Ok(())
}
