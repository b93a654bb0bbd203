//! Generic JSON-RPC transport for read-only Solana queries

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

/// RPC call failures
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("RPC transport failed: {0}")]
    Transport(String),

    #[error("RPC response decode failed: {0}")]
    Decode(String),
}

/// Seam for issuing JSON-RPC calls so pricing can run against fakes in tests
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Issue one call against `endpoint`. `params` is the positional
    /// parameter array. No retries, no failover to other endpoints.
    async fn call(&self, endpoint: &str, method: &str, params: Value) -> Result<Value, RpcError>;
}

fn envelope(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    })
}

/// HTTP transport with a fixed per-call timeout
pub struct HttpRpcTransport {
    http_client: Client,
}

impl HttpRpcTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl RpcTransport for HttpRpcTransport {
    async fn call(&self, endpoint: &str, method: &str, params: Value) -> Result<Value, RpcError> {
        let response = self
            .http_client
            .post(endpoint)
            .json(&envelope(method, params))
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        response
            .json::<Value>()
            .await
            .map_err(|e| RpcError::Decode(e.to_string()))
    }
}
