//! Unified [`Balance`] map keyed by uppercased currency code (spec §3).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct CurrencyBalance {
    pub free: f64,
    pub used: f64,
    pub total: f64,
}

impl CurrencyBalance {
    /// Builds a balance from venue-reported `free`/`used`, deriving `total = free + used`.
    pub fn from_free_used(free: f64, used: f64) -> Self {
        Self { free, used, total: free + used }
    }

    /// Builds a balance from a venue-reported `total` directly (spec §3: "exceptions where
    /// venue reports total directly are tolerated").
    pub fn from_total(total: f64, free: f64) -> Self {
        Self { free, used: total - free, total }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Balances {
    pub currencies: HashMap<String, CurrencyBalance>,
    pub info: Value,
    pub timestamp: i64,
    pub datetime: String,
}

impl Balances {
    pub fn get(&self, currency: &str) -> Option<CurrencyBalance> {
        self.currencies.get(&currency.to_uppercase()).copied()
    }
}
