//! Client for the scan coordinator that assigns mint batches and collects
//! computed prices

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::warn;

use crate::config::WorkerCfg;
use crate::model::{PriceReport, TokenAssignment};

/// Seam between the worker loop and the coordinator HTTP API
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Request a batch of assignments. Any failure means "no work right now",
    /// never an error the loop has to handle.
    async fn assign_batch(&self) -> Vec<TokenAssignment>;

    /// Report one batch of computed prices. Failures are surfaced so the
    /// caller can log them; the batch is dropped either way.
    async fn report_results(&self, results: &[PriceReport]) -> Result<()>;
}

pub struct CoordinatorClient {
    http_client: Client,
    base_url: String,
    worker_id: String,
    batch_size: u32,
}

impl CoordinatorClient {
    pub fn new(cfg: &WorkerCfg) -> Result<Self> {
        if cfg.accept_invalid_certs {
            warn!("⚠️ TLS certificate verification is DISABLED for coordinator requests");
        }
        let http_client = Client::builder()
            .danger_accept_invalid_certs(cfg.accept_invalid_certs)
            .build()
            .context("build coordinator HTTP client")?;

        Ok(Self {
            http_client,
            base_url: cfg.coordinator_url.clone(),
            worker_id: cfg.worker_id.clone(),
            batch_size: cfg.batch_size,
        })
    }
}

#[async_trait]
impl Coordinator for CoordinatorClient {
    async fn assign_batch(&self) -> Vec<TokenAssignment> {
        let url = format!(
            "{}/assign-token.php?worker={}&count={}",
            self.base_url, self.worker_id, self.batch_size
        );

        let response = match self.http_client.get(&url).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!("⚠️ Coordinator assign request failed: {}", err);
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            warn!("⚠️ Coordinator assign returned status {}", response.status());
            return Vec::new();
        }

        match response.json::<Vec<TokenAssignment>>().await {
            Ok(batch) => batch,
            Err(err) => {
                warn!("⚠️ Coordinator assign decode failed: {}", err);
                Vec::new()
            }
        }
    }

    async fn report_results(&self, results: &[PriceReport]) -> Result<()> {
        let url = format!("{}/update-token.php", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .json(results)
            .send()
            .await
            .context("send price report")?;

        if !response.status().is_success() {
            bail!("coordinator report returned status {}", response.status());
        }
        Ok(())
    }
}
