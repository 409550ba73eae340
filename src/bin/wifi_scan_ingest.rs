use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::info;

use wifi_scan_ingest::config;
use wifi_scan_ingest::consumer::ConsumerLoop;
use wifi_scan_ingest::control::ConsumerControl;
use wifi_scan_ingest::delivery::{DeliveryEngine, DeliveryEngineConfig, FirehoseConfig, FirehoseSender};
use wifi_scan_ingest::health::HealthArbiter;
use wifi_scan_ingest::monitoring::MonitoringState;

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("received SIGTERM, starting graceful shutdown");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load_config().context("failed to load configuration")?;

    wifi_scan_ingest::init_tracing();

    info!(
        topic = %config.bus.topic,
        delivery_stream = %config.delivery.delivery_stream_name,
        "starting wifi scan ingestion worker"
    );

    let sender = Arc::new(
        FirehoseSender::new(FirehoseConfig {
            delivery_stream_name: config.delivery.delivery_stream_name.clone(),
            region: config.delivery.region.clone(),
            endpoint_override: config.delivery.endpoint_override.clone(),
        })
        .await,
    );

    let delivery_engine = Arc::new(DeliveryEngine::new(
        sender,
        DeliveryEngineConfig {
            max_batch_size: config.delivery.max_batch_size,
            max_batch_size_bytes: config.delivery.max_batch_size_bytes,
            max_retries: config.delivery.max_retries,
            retry_backoff_ms: config.delivery.retry_backoff_ms,
            retry_backoff_max_ms: 60_000,
        },
    ));

    let monitoring = Arc::new(MonitoringState::new());
    let health = Arc::new(HealthArbiter::new(
        config.health.liveness_timeout_minutes,
        config.health.consumption_timeout_minutes,
        config.health.minimum_consumption_rate,
    ));
    let control = Arc::new(ConsumerControl::new());

    let consumer_loop = ConsumerLoop::new(
        &config.bus,
        &config.delivery,
        delivery_engine,
        monitoring,
        health,
        control,
    )
    .context("failed to construct bus consumer")?;

    consumer_loop.run(shutdown_signal()).await;

    info!("shutdown complete");
    Ok(())
}
