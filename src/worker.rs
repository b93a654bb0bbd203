//! The assign -> price -> report loop

use rand::Rng;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::WorkerCfg;
use crate::coordinator::Coordinator;
use crate::model::{unix_now, PriceReport};
use crate::price::PriceResolver;
use crate::rpc::RpcTransport;

/// Long-running pricing worker. Runs until the shutdown channel fires;
/// production never fires it, tests and ctrl-c do.
pub struct PriceWorker<C, T>
where
    C: Coordinator,
    T: RpcTransport,
{
    cfg: WorkerCfg,
    coordinator: C,
    transport: T,
    endpoints: Vec<String>,
    shutdown: watch::Receiver<bool>,
}

impl<C, T> PriceWorker<C, T>
where
    C: Coordinator,
    T: RpcTransport,
{
    pub fn new(
        cfg: WorkerCfg,
        coordinator: C,
        transport: T,
        endpoints: Vec<String>,
        shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<Self> {
        if endpoints.is_empty() {
            anyhow::bail!("RPC endpoint pool is empty");
        }
        Ok(Self {
            cfg,
            coordinator,
            transport,
            endpoints,
            shutdown,
        })
    }

    pub async fn run(mut self) {
        info!("Price worker loop started");
        while self.cycle().await {}
        info!("Price worker loop stopped");
    }

    /// One full pass of the state machine. Returns false once shutdown has
    /// been signalled; every failure short of that keeps the loop alive.
    async fn cycle(&mut self) -> bool {
        let batch = self.coordinator.assign_batch().await;
        if batch.is_empty() {
            return self.idle(self.cfg.empty_batch_backoff).await;
        }
        info!("📋 Assigned {} tokens", batch.len());

        let mut results = Vec::new();
        for token in &batch {
            // pool is non-empty, validated at construction
            let endpoint =
                self.endpoints[rand::thread_rng().gen_range(0..self.endpoints.len())].clone();
            let resolver = PriceResolver::new(&self.transport, &self.cfg.base_mint);

            match resolver.resolve(&token.mint, &endpoint).await {
                Ok(price) => {
                    info!("✅ [{}] price = {}", token.mint, price);
                    results.push(PriceReport {
                        mint: token.mint.clone(),
                        price,
                        timestamp: unix_now(),
                        index: token.index,
                    });
                }
                Err(err) => warn!("⚠️ [{}] no price: {}", token.mint, err),
            }

            // self-imposed rate limit on the RPC pool, kept even after the
            // last token of a batch
            if !self.idle(self.cfg.request_delay).await {
                return false;
            }
        }

        if !results.is_empty() {
            match self.coordinator.report_results(&results).await {
                Ok(()) => info!("📤 Sent {} prices", results.len()),
                Err(err) => error!("❌ Failed to send {} prices: {}", results.len(), err),
            }
        }

        self.idle(self.cfg.idle_backoff).await
    }

    /// Shutdown-aware sleep. Returns false when shutdown was signalled.
    async fn idle(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.shutdown.changed() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TokenAssignment;
    use crate::rpc::RpcError;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct FakeCoordinator {
        batches: Mutex<VecDeque<Vec<TokenAssignment>>>,
        reports: Arc<Mutex<Vec<Vec<PriceReport>>>>,
    }

    impl FakeCoordinator {
        fn new(batches: Vec<Vec<TokenAssignment>>) -> Self {
            Self {
                batches: Mutex::new(batches.into()),
                reports: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl Coordinator for FakeCoordinator {
        async fn assign_batch(&self) -> Vec<TokenAssignment> {
            self.batches.lock().unwrap().pop_front().unwrap_or_default()
        }

        async fn report_results(&self, results: &[PriceReport]) -> anyhow::Result<()> {
            self.reports.lock().unwrap().push(results.to_vec());
            Ok(())
        }
    }

    /// Answers the four-step lookup from the mint name embedded in the
    /// request; mints starting with "dead" get no largest accounts.
    struct MintKeyedTransport {
        calls: Arc<AtomicUsize>,
    }

    impl MintKeyedTransport {
        fn new() -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl RpcTransport for MintKeyedTransport {
        async fn call(
            &self,
            _endpoint: &str,
            method: &str,
            params: Value,
        ) -> Result<Value, RpcError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let key = params[0].as_str().unwrap_or_default().to_string();
            Ok(match method {
                "getTokenLargestAccounts" => {
                    if key.starts_with("dead") {
                        json!({"result": {"value": []}})
                    } else {
                        json!({"result": {"value": [{"address": format!("{key}/holder")}]}})
                    }
                }
                "getAccountInfo" => {
                    let mint = key.trim_end_matches("/holder");
                    json!({"result": {"value": {"data": {"parsed": {"info": {
                        "owner": format!("{mint}/owner"),
                        "tokenAmount": {"uiAmount": 2.0},
                    }}}}}})
                }
                "getTokenAccountsByOwner" => {
                    let mint = key.trim_end_matches("/owner");
                    json!({"result": {"value": [{"pubkey": format!("{mint}/wsol")}]}})
                }
                "getTokenAccountBalance" => json!({"result": {"value": {"uiAmount": 1.0}}}),
                other => return Err(RpcError::Transport(format!("unexpected method {other}"))),
            })
        }
    }

    fn fast_cfg() -> WorkerCfg {
        let mut cfg = WorkerCfg::default();
        cfg.request_delay = Duration::from_millis(1);
        cfg.empty_batch_backoff = Duration::from_millis(1);
        cfg.idle_backoff = Duration::from_millis(1);
        cfg
    }

    fn assignment(mint: &str, index: Option<i64>) -> TokenAssignment {
        TokenAssignment {
            mint: mint.to_string(),
            index,
        }
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_rpc_calls() {
        let coordinator = FakeCoordinator::new(vec![Vec::new()]);
        let reports = Arc::clone(&coordinator.reports);
        let transport = MintKeyedTransport::new();
        let calls = Arc::clone(&transport.calls);
        let (_tx, rx) = watch::channel(false);
        let mut worker =
            PriceWorker::new(fast_cfg(), coordinator, transport, vec!["rpc".to_string()], rx)
                .unwrap();

        assert!(worker.cycle().await);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(reports.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reports_only_resolved_tokens_with_indexes() {
        let coordinator = FakeCoordinator::new(vec![vec![
            assignment("mint-a", Some(7)),
            assignment("dead-b", Some(8)),
            assignment("mint-c", None),
        ]]);
        let reports = Arc::clone(&coordinator.reports);
        let transport = MintKeyedTransport::new();
        let (_tx, rx) = watch::channel(false);
        let mut worker =
            PriceWorker::new(fast_cfg(), coordinator, transport, vec!["rpc".to_string()], rx)
                .unwrap();

        assert!(worker.cycle().await);

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        let batch = &reports[0];
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].mint, "mint-a");
        assert_eq!(batch[0].index, Some(7));
        assert_eq!(batch[0].price, 0.5);
        assert_eq!(batch[1].mint, "mint-c");
        assert_eq!(batch[1].index, None);
    }

    #[tokio::test]
    async fn test_all_failed_batch_sends_no_report() {
        let coordinator =
            FakeCoordinator::new(vec![vec![assignment("dead-a", None), assignment("dead-b", None)]]);
        let reports = Arc::clone(&coordinator.reports);
        let transport = MintKeyedTransport::new();
        let calls = Arc::clone(&transport.calls);
        let (_tx, rx) = watch::channel(false);
        let mut worker =
            PriceWorker::new(fast_cfg(), coordinator, transport, vec!["rpc".to_string()], rx)
                .unwrap();

        assert!(worker.cycle().await);

        // one lookup each, stopped at the first step
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(reports.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_loop() {
        let coordinator = FakeCoordinator::new(vec![Vec::new()]);
        let transport = MintKeyedTransport::new();
        let (tx, rx) = watch::channel(false);
        let mut worker =
            PriceWorker::new(fast_cfg(), coordinator, transport, vec!["rpc".to_string()], rx)
                .unwrap();
        worker.cfg.empty_batch_backoff = Duration::from_secs(60);

        tx.send(true).unwrap();

        assert!(!worker.cycle().await);
    }

    #[tokio::test]
    async fn test_rejects_empty_endpoint_pool() {
        let coordinator = FakeCoordinator::new(Vec::new());
        let transport = MintKeyedTransport::new();
        let (_tx, rx) = watch::channel(false);

        assert!(PriceWorker::new(fast_cfg(), coordinator, transport, Vec::new(), rx).is_err());
    }
}
