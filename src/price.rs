//! Price resolution against on-chain liquidity
//!
//! The price of a mint is derived from its single largest holder account,
//! assumed to be the liquidity pool pairing it with the base asset: the
//! pool's base-asset reserve divided by its target-asset reserve. This is a
//! heuristic, not a protocol-level guarantee.

use serde_json::{json, Value};
use thiserror::Error;

use crate::model::round_price;
use crate::rpc::{RpcError, RpcTransport};

/// Why a single mint produced no price. None of these abort the batch.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("RPC call failed: {0}")]
    Rpc(#[from] RpcError),

    #[error("no largest token accounts")]
    NoLargestAccounts,

    #[error("holder account has no owner")]
    MissingOwner,

    #[error("holder token amount is zero")]
    ZeroTokenAmount,

    #[error("owner holds no base-asset account")]
    NoBaseAccount,

    #[error("base-asset amount is zero")]
    ZeroBaseAmount,

    #[error("malformed RPC response: missing {0}")]
    Malformed(&'static str),
}

pub struct PriceResolver<'a> {
    transport: &'a dyn RpcTransport,
    base_mint: &'a str,
}

impl<'a> PriceResolver<'a> {
    pub fn new(transport: &'a dyn RpcTransport, base_mint: &'a str) -> Self {
        Self { transport, base_mint }
    }

    /// Resolve the price of `mint` in base-asset units via the configured
    /// endpoint. Four sequential lookups; the first failure wins.
    pub async fn resolve(&self, mint: &str, endpoint: &str) -> Result<f64, ResolveError> {
        // 1. Largest holder of the target mint, assumed to be the pool
        let largest = self
            .transport
            .call(endpoint, "getTokenLargestAccounts", json!([mint]))
            .await?;
        let holders = largest
            .pointer("/result/value")
            .and_then(Value::as_array)
            .filter(|value| !value.is_empty())
            .ok_or(ResolveError::NoLargestAccounts)?;
        let holder = holders[0]
            .get("address")
            .and_then(Value::as_str)
            .ok_or(ResolveError::Malformed("largest account address"))?;

        // 2. Pool's reserve of the target mint and its owning account
        let account = self
            .transport
            .call(endpoint, "getAccountInfo", json!([holder, {"encoding": "jsonParsed"}]))
            .await?;
        let info = account
            .pointer("/result/value/data/parsed/info")
            .ok_or(ResolveError::Malformed("parsed account info"))?;
        let owner = info
            .get("owner")
            .and_then(Value::as_str)
            .ok_or(ResolveError::MissingOwner)?;
        let token_amount = info
            .pointer("/tokenAmount/uiAmount")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        if token_amount == 0.0 {
            return Err(ResolveError::ZeroTokenAmount);
        }

        // 3. Owner's base-asset accounts; the first one is the paired reserve
        let base_accounts = self
            .transport
            .call(
                endpoint,
                "getTokenAccountsByOwner",
                json!([owner, {"mint": self.base_mint}, {"encoding": "jsonParsed"}]),
            )
            .await?;
        let accounts = base_accounts
            .pointer("/result/value")
            .and_then(Value::as_array)
            .filter(|value| !value.is_empty())
            .ok_or(ResolveError::NoBaseAccount)?;
        let base_account = accounts[0]
            .get("pubkey")
            .and_then(Value::as_str)
            .ok_or(ResolveError::Malformed("base account pubkey"))?;

        // 4. Paired base-asset reserve
        let balance = self
            .transport
            .call(endpoint, "getTokenAccountBalance", json!([base_account]))
            .await?;
        let base_amount = balance
            .pointer("/result/value")
            .ok_or(ResolveError::Malformed("base account balance"))?
            .get("uiAmount")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        if base_amount == 0.0 {
            return Err(ResolveError::ZeroBaseAmount);
        }

        Ok(round_price(base_amount / token_amount))
    }
}
