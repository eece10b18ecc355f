//! Fee schedule shapes (spec §3): either a venue default, or per-symbol overrides.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct FeeRate {
    pub maker: f64,
    pub taker: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TradingFees {
    pub default: FeeRate,
    pub by_symbol: HashMap<String, FeeRate>,
}

impl TradingFees {
    pub fn for_symbol(&self, symbol: &str) -> FeeRate {
        self.by_symbol.get(symbol).copied().unwrap_or(self.default)
    }
}
