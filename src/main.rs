use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use price_worker::config::{load_endpoints, Config, WorkerCfg};
use price_worker::coordinator::CoordinatorClient;
use price_worker::rpc::HttpRpcTransport;
use price_worker::worker::PriceWorker;

#[derive(Parser, Debug)]
#[command(version, about = "Token price worker for a remote scan coordinator")]
struct Args {
    /// Path to config file (optional)
    #[arg(long)]
    config: Option<String>,

    /// Coordinator base URL (overrides config)
    #[arg(long)]
    coordinator_url: Option<String>,

    /// Worker identity reported to the coordinator
    #[arg(long)]
    worker_id: Option<String>,

    /// Newline-delimited RPC endpoint list
    #[arg(long)]
    endpoints_file: Option<String>,

    /// Tokens requested per batch
    #[arg(long)]
    batch_size: Option<u32>,

    /// Delay between token lookups in milliseconds
    #[arg(long)]
    request_delay_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    // Config file first, CLI args override
    let mut cfg = if let Some(config_path) = &args.config {
        WorkerCfg::from_config(Config::from_file(config_path)?)
    } else {
        WorkerCfg::default()
    };
    if let Some(coordinator_url) = args.coordinator_url {
        cfg.coordinator_url = coordinator_url;
    }
    if let Some(worker_id) = args.worker_id {
        cfg.worker_id = worker_id;
    }
    if let Some(endpoints_file) = args.endpoints_file {
        cfg.endpoints_file = endpoints_file;
    }
    if let Some(batch_size) = args.batch_size {
        cfg.batch_size = batch_size;
    }
    if let Some(request_delay_ms) = args.request_delay_ms {
        cfg.request_delay = std::time::Duration::from_millis(request_delay_ms);
    }

    // Fatal when the pool is missing or empty
    let endpoints = load_endpoints(&cfg.endpoints_file)?;
    info!(
        "🚀 Worker {} starting with {} RPC endpoints",
        cfg.worker_id,
        endpoints.len()
    );

    let coordinator = CoordinatorClient::new(&cfg)?;
    let transport = HttpRpcTransport::new(cfg.rpc_timeout)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = PriceWorker::new(cfg, coordinator, transport, endpoints, shutdown_rx)?;
    let handle = tokio::spawn(worker.run());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping worker");
    let _ = shutdown_tx.send(true);
    handle.await?;
    Ok(())
}
