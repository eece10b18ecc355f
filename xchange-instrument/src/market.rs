//! The [`Market`] descriptor (spec §3): a venue trading pair normalized to the library's
//! `BASE/QUOTE` unified symbol form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct Precision {
    pub price: Option<u32>,
    pub amount: Option<u32>,
    pub base: Option<u32>,
    pub quote: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct Range {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct Limits {
    pub amount: Range,
    pub price: Range,
    pub cost: Range,
}

/// A venue trading pair, normalized to the unified `symbol = base + "/" + quote` invariant
/// (spec §3).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Market {
    /// Venue-specific token, e.g. `BTC-USDT`, `btc_usdt`, `XXBTZUSD`.
    pub id: String,
    /// Unified form `BASE/QUOTE`.
    pub symbol: String,
    pub base: String,
    pub quote: String,
    pub active: bool,
    pub precision: Precision,
    pub limits: Limits,
    pub step_size: Option<f64>,
    pub tick_size: Option<f64>,
    /// Opaque venue-raw payload, for diagnostics and fields not otherwise modelled.
    pub info: Value,
}

impl Market {
    pub fn new(id: impl Into<String>, base: impl Into<String>, quote: impl Into<String>) -> Self {
        let base = base.into();
        let quote = quote.into();
        let symbol = format!("{base}/{quote}");
        Self {
            id: id.into(),
            symbol,
            base,
            quote,
            active: true,
            precision: Precision::default(),
            limits: Limits::default(),
            step_size: None,
            tick_size: None,
            info: Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_is_base_slash_quote() {
        let market = Market::new("BTC-USDT", "BTC", "USDT");
        assert_eq!(market.symbol, "BTC/USDT");
    }
}
