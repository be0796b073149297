//! Broker server binary: load the YAML queue config, bind the producer and
//! consumer endpoints, and run the engine on a single-threaded runtime.

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use stowage_broker::{transport, BrokerConfig, BrokerEngine, EngineOptions};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "stowage-broker", about = "Persistent message broker")]
struct Args {
    /// Path to the YAML queue configuration.
    #[arg(long)]
    config: PathBuf,
    /// Producer endpoint.
    #[arg(long, default_value = "127.0.0.1:5555")]
    producer_addr: SocketAddr,
    /// Consumer endpoint.
    #[arg(long, default_value = "127.0.0.1:5556")]
    consumer_addr: SocketAddr,
    /// Root directory for disk-queue persistence.
    #[arg(long, default_value = "storage")]
    storage_root: PathBuf,
    /// Sweep interval in milliseconds.
    #[arg(long, default_value_t = 1000)]
    sweep_interval_ms: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = BrokerConfig::load(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    let options = EngineOptions {
        storage_root: args.storage_root.clone(),
        sweep_interval: Duration::from_millis(args.sweep_interval_ms),
    };
    let engine = BrokerEngine::new(config, options).context("starting broker engine")?;

    let (producer_tx, producer_rx) = mpsc::channel(64);
    let (consumer_tx, consumer_rx) = mpsc::channel(64);
    let (shutdown_tx, _) = broadcast::channel(1);

    let producer_endpoint = tokio::spawn(transport::serve(
        "producer",
        args.producer_addr,
        producer_tx,
        shutdown_tx.subscribe(),
    ));
    let consumer_endpoint = tokio::spawn(transport::serve(
        "consumer",
        args.consumer_addr,
        consumer_tx,
        shutdown_tx.subscribe(),
    ));
    let engine_task = tokio::spawn(engine.run(producer_rx, consumer_rx));

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutdown signal received");

    // The signal stops the accept loops and every live connection, dropping
    // their clones of the inbound senders; the engine then drains whatever
    // is in flight and stops on its own.
    let _ = shutdown_tx.send(());
    for endpoint in [producer_endpoint, consumer_endpoint] {
        if let Ok(Err(err)) = endpoint.await {
            error!(%err, "endpoint failed");
        }
    }
    if let Err(err) = engine_task.await {
        error!(%err, "engine task failed");
    }
    Ok(())
}
