//! # OBD Prometheus Exporter
//!
//! Binary entry point: connects to the ELM327 adapter, registers the
//! standard gauges, spawns the sampling loop, and serves the scrape
//! endpoint until a shutdown signal arrives.

use anyhow::Context;
use clap::Parser;
use obd_exporter::cli::Config;
use obd_exporter::utils::logger::setup_logger;
use obd_exporter::{
    register_gauges, serve, standard_readings, Elm327Client, MetricRegistry, MetricsHandler,
    Sampler, VERSION,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logger().expect("Failed to initialize logger");
    let config = Config::parse();

    info!("Starting obd-exporter v{}", VERSION);

    let registry = Arc::new(MetricRegistry::new());
    let readings = standard_readings();
    register_gauges(&registry, &readings, &config.host)
        .context("failed to register metric gauges")?;
    info!("Registered {} gauges for host {}", registry.len(), config.host);

    info!("Connecting to OBD adapter on {}...", config.device);
    let client = Elm327Client::open(&config.device, config.baud)
        .with_context(|| format!("failed to connect to OBD adapter on {}", config.device))?;
    info!("Connected");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sampler = Sampler::new(
        client,
        Arc::clone(&registry),
        readings,
        Duration::from_millis(config.interval_ms),
        shutdown_rx.clone(),
    );
    let sampler_handle = tokio::spawn(sampler.run());

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    serve(MetricsHandler::new(registry), config.port, shutdown_rx)
        .await
        .with_context(|| format!("metrics server failed on port {}", config.port))?;

    let stats = sampler_handle.await.context("sampler task panicked")?;
    info!(
        "Shutdown complete: {} ticks, {} samples recorded",
        stats.ticks, stats.samples
    );
    Ok(())
}
