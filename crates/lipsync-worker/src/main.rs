//! Lip-sync queue worker binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lipsync_inference::HttpInferenceEngine;
use lipsync_queue::JobQueue;
use lipsync_worker::{JobExecutor, ServerlessHandler, WorkerConfig};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Worker failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // Required for TLS (reqwest, rediss://)
    let _ = rustls::crypto::ring::default_provider().install_default();

    dotenvy::dotenv().ok();
    init_tracing()?;

    info!("Starting lipsync-worker");

    let config = WorkerConfig::from_env()?;
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        PrometheusBuilder::new()
            .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
            .install()
            .context("failed to start metrics exporter")?;
        info!("Metrics available on port {}", port);
    }

    let engine = Arc::new(HttpInferenceEngine::from_env()?);
    let handler = ServerlessHandler::from_config(&config, engine)?;
    let queue = JobQueue::from_env()?;

    let executor = Arc::new(JobExecutor::new(config, queue, handler));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_executor.shutdown();
    });

    executor.run().await?;

    info!("Worker shutdown complete");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("lipsync=info,info"))
        .context("invalid RUST_LOG")?;

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }

    Ok(())
}
