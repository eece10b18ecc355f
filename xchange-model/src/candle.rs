//! Unified OHLCV [`Candle`] (spec §3, §8: strictly ascending timestamp, length bounded by a
//! requested limit).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Candle {
    pub timestamp_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Sorts candles into chronologically ascending order and applies `limit`, if given (spec
/// §4.8: reverse venues that return newest-first).
pub fn normalize_candles(mut candles: Vec<Candle>, limit: Option<usize>) -> Vec<Candle> {
    candles.sort_by_key(|c| c.timestamp_ms);
    if let Some(limit) = limit {
        candles.truncate(limit);
    }
    candles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_sorts_ascending_and_applies_limit() {
        let candles = vec![
            Candle { timestamp_ms: 300, open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 1.0 },
            Candle { timestamp_ms: 100, open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 1.0 },
            Candle { timestamp_ms: 200, open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 1.0 },
        ];

        let normalized = normalize_candles(candles, Some(2));
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].timestamp_ms, 100);
        assert_eq!(normalized[1].timestamp_ms, 200);
    }
}
