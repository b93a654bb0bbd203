//! Wire types exchanged with the coordinator

use serde::{Deserialize, Serialize};

/// One token handed out by the coordinator for pricing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenAssignment {
    pub mint: String,
    #[serde(default)]
    pub index: Option<i64>,
}

/// Computed price for one assignment, reported back as part of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceReport {
    pub mint: String,
    pub price: f64,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
}

/// Round a price to the 12 decimal digits the coordinator expects
pub fn round_price(value: f64) -> f64 {
    (value * 1e12).round() / 1e12
}

/// Current unix time in whole seconds
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
