//! Price worker - polls a scan coordinator for token batches and prices
//! each mint against a base asset over raw Solana JSON-RPC.

pub mod config;
pub mod coordinator;
pub mod model;
pub mod price;
pub mod rpc;
pub mod worker;

// Re-export main types for convenience
pub use coordinator::{Coordinator, CoordinatorClient};
pub use price::PriceResolver;
pub use rpc::{HttpRpcTransport, RpcTransport};
pub use worker::PriceWorker;
