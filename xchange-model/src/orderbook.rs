//! Unified [`OrderBook`] snapshot (spec §3, §8: bids descending by price, asks ascending,
//! optional `limit` applied).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Level {
    pub price: f64,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderBook {
    pub symbol: String,
    /// Best-bid-first (descending price).
    pub bids: Vec<Level>,
    /// Best-ask-first (ascending price).
    pub asks: Vec<Level>,
    pub timestamp: i64,
    pub datetime: String,
    pub nonce: Option<u64>,
}

impl OrderBook {
    /// Sorts both sides into the unified ordering and applies `limit`, if given.
    pub fn normalized(mut self, limit: Option<usize>) -> Self {
        self.bids
            .sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(std::cmp::Ordering::Equal));
        self.asks
            .sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal));

        if let Some(limit) = limit {
            self.bids.truncate(limit);
            self.asks.truncate(limit);
        }

        self
    }

    pub fn is_sorted(&self) -> bool {
        self.bids.windows(2).all(|w| w[0].price >= w[1].price)
            && self.asks.windows(2).all(|w| w[0].price <= w[1].price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_sorts_bids_desc_and_asks_asc() {
        let book = OrderBook {
            symbol: "BTC/USD".into(),
            bids: vec![Level { price: 99.0, size: 1.0 }, Level { price: 101.0, size: 2.0 }],
            asks: vec![Level { price: 105.0, size: 1.0 }, Level { price: 103.0, size: 2.0 }],
            timestamp: 0,
            datetime: String::new(),
            nonce: None,
        }
        .normalized(None);

        assert!(book.is_sorted());
        assert_eq!(book.bids[0].price, 101.0);
        assert_eq!(book.asks[0].price, 103.0);
    }

    #[test]
    fn normalized_applies_limit_to_both_sides() {
        let book = OrderBook {
            symbol: "BTC/USD".into(),
            bids: vec![
                Level { price: 99.0, size: 1.0 },
                Level { price: 101.0, size: 2.0 },
                Level { price: 100.0, size: 3.0 },
            ],
            asks: vec![],
            timestamp: 0,
            datetime: String::new(),
            nonce: None,
        }
        .normalized(Some(2));

        assert_eq!(book.bids.len(), 2);
    }
}
