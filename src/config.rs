use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;
use std::{fs, path::Path};

/// Wrapped SOL, the default pricing denominator
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

const DEFAULT_COORDINATOR_URL: &str = "https://dienlanhquangphat.vn/toolvip";
const DEFAULT_WORKER_ID: &str = "webcon_rust";
const DEFAULT_ENDPOINTS_FILE: &str = "apikeys.txt";

#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorCfg {
    pub base_url: String,
    pub worker_id: String,
    /// The coordinator deployment serves a self-signed certificate
    pub accept_invalid_certs: bool,
}

impl Default for CoordinatorCfg {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_COORDINATOR_URL.to_string(),
            worker_id: DEFAULT_WORKER_ID.to_string(),
            accept_invalid_certs: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingCfg {
    pub base_mint: String,
    pub batch_size: u32,
    pub request_delay_ms: u64,
    pub rpc_timeout_ms: u64,
}

impl Default for PricingCfg {
    fn default() -> Self {
        Self {
            base_mint: WSOL_MINT.to_string(),
            batch_size: 5,
            request_delay_ms: 2400,
            rpc_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollCfg {
    pub empty_batch_backoff_ms: u64,
    pub idle_backoff_ms: u64,
}

impl Default for PollCfg {
    fn default() -> Self {
        Self {
            empty_batch_backoff_ms: 2000,
            idle_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcCfg {
    pub endpoints_file: String,
}

impl Default for RpcCfg {
    fn default() -> Self {
        Self {
            endpoints_file: DEFAULT_ENDPOINTS_FILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub coordinator: CoordinatorCfg,
    #[serde(default)]
    pub pricing: PricingCfg,
    #[serde(default)]
    pub poll: PollCfg,
    #[serde(default)]
    pub rpc: RpcCfg,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path.as_ref())
            .with_context(|| format!("read config {}", path.as_ref().display()))?;
        let cfg: Self = toml::from_str(&s).context("parse worker config")?;
        Ok(cfg)
    }
}

/// Flattened runtime configuration consumed by the worker
#[derive(Debug, Clone)]
pub struct WorkerCfg {
    pub coordinator_url: String,
    pub worker_id: String,
    pub accept_invalid_certs: bool,
    pub base_mint: String,
    pub batch_size: u32,
    pub request_delay: Duration,
    pub rpc_timeout: Duration,
    pub empty_batch_backoff: Duration,
    pub idle_backoff: Duration,
    pub endpoints_file: String,
}

impl WorkerCfg {
    pub fn from_config(cfg: Config) -> Self {
        Self {
            coordinator_url: cfg.coordinator.base_url,
            worker_id: cfg.coordinator.worker_id,
            accept_invalid_certs: cfg.coordinator.accept_invalid_certs,
            base_mint: cfg.pricing.base_mint,
            batch_size: cfg.pricing.batch_size,
            request_delay: Duration::from_millis(cfg.pricing.request_delay_ms),
            rpc_timeout: Duration::from_millis(cfg.pricing.rpc_timeout_ms),
            empty_batch_backoff: Duration::from_millis(cfg.poll.empty_batch_backoff_ms),
            idle_backoff: Duration::from_millis(cfg.poll.idle_backoff_ms),
            endpoints_file: cfg.rpc.endpoints_file,
        }
    }
}

impl Default for WorkerCfg {
    fn default() -> Self {
        Self::from_config(Config::default())
    }
}

/// Load the newline-delimited RPC endpoint list. An empty pool is a fatal
/// startup condition, never a degraded mode.
pub fn load_endpoints<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read RPC endpoint list {}", path.as_ref().display()))?;

    let endpoints: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if endpoints.is_empty() {
        bail!("no RPC endpoints in {}", path.as_ref().display());
    }
    Ok(endpoints)
}
