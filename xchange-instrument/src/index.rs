//! `markets` / `marketsById` / `symbols` driver state (spec §3, §5).
//!
//! Written once by `loadMarkets` and read thereafter by every other call; concurrent readers
//! must observe a consistent snapshot. [`MarketIndex`] achieves this with write-once-publish:
//! each `loadMarkets`/reload builds a brand new [`MarketSnapshot`] and atomically swaps it in,
//! so a reader never observes a partially-populated map.

use crate::market::Market;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
pub struct MarketSnapshot {
    pub markets: HashMap<String, Market>,
    pub markets_by_id: HashMap<String, Market>,
    pub symbols: Vec<String>,
}

#[derive(Debug)]
pub struct MarketIndex {
    snapshot: RwLock<Arc<MarketSnapshot>>,
    loaded: AtomicBool,
}

impl Default for MarketIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketIndex {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(MarketSnapshot::default())),
            loaded: AtomicBool::new(false),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Returns a consistent, point-in-time snapshot. Cheap: an `Arc` clone.
    pub fn snapshot(&self) -> Arc<MarketSnapshot> {
        self.snapshot.read().expect("MarketIndex lock poisoned").clone()
    }

    /// Publishes a freshly loaded market set. `alt_ids` lets a venue (Kraken) register
    /// additional lookup keys (e.g. both `wsname` and `altname`) pointing at the same
    /// [`Market`] (spec §8 scenario 1).
    pub fn publish(&self, markets: Vec<Market>, alt_ids: impl Fn(&Market) -> Vec<String>) {
        let mut by_symbol = HashMap::with_capacity(markets.len());
        let mut by_id = HashMap::with_capacity(markets.len() * 2);
        let mut symbols = Vec::with_capacity(markets.len());

        for market in markets {
            symbols.push(market.symbol.clone());
            by_id.insert(market.id.clone(), market.clone());
            for alt in alt_ids(&market) {
                by_id.insert(alt, market.clone());
            }
            by_symbol.insert(market.symbol.clone(), market);
        }

        let snapshot = Arc::new(MarketSnapshot {
            markets: by_symbol,
            markets_by_id: by_id,
            symbols,
        });

        *self.snapshot.write().expect("MarketIndex lock poisoned") = snapshot;
        self.loaded.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_is_visible_atomically() {
        let index = MarketIndex::new();
        assert!(!index.is_loaded());

        index.publish(vec![Market::new("XXBTZUSD", "BTC", "USD")], |_| vec!["XBT/USD".to_string()]);

        assert!(index.is_loaded());
        let snap = index.snapshot();
        assert!(snap.markets.contains_key("BTC/USD"));
        assert!(snap.markets_by_id.contains_key("XXBTZUSD"));
        assert!(snap.markets_by_id.contains_key("XBT/USD"));
    }
}
