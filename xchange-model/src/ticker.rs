//! Unified [`Ticker`] snapshot (spec §3, §8: `change == last - open`,
//! `percentage == change / open * 100` whenever both `last` and `open` are present).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Ticker {
    pub symbol: String,
    pub last: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub bid_volume: Option<f64>,
    pub ask_volume: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub open: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    pub quote_volume: Option<f64>,
    pub change: Option<f64>,
    pub percentage: Option<f64>,
    pub vwap: Option<f64>,
    pub timestamp: i64,
    pub datetime: String,
    pub info: Value,
}

impl Ticker {
    /// Derives `change`/`percentage` from `last`/`open` when both are present, leaving them
    /// unset otherwise (spec §8). Call after populating every other field.
    pub fn with_derived_change(mut self) -> Self {
        if let (Some(last), Some(open)) = (self.last, self.open) {
            if open != 0.0 {
                let change = last - open;
                self.change = Some(change);
                self.percentage = Some(change / open * 100.0);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_ticker() -> Ticker {
        Ticker {
            symbol: "BTC/USD".into(),
            last: None,
            bid: None,
            ask: None,
            bid_volume: None,
            ask_volume: None,
            high: None,
            low: None,
            open: None,
            close: None,
            volume: None,
            quote_volume: None,
            change: None,
            percentage: None,
            vwap: None,
            timestamp: 0,
            datetime: String::new(),
            info: Value::Null,
        }
    }

    #[test]
    fn derives_change_and_percentage_when_both_present() {
        let ticker = Ticker {
            last: Some(110.0),
            open: Some(100.0),
            ..base_ticker()
        }
        .with_derived_change();

        assert_eq!(ticker.change, Some(10.0));
        assert_eq!(ticker.percentage, Some(10.0));
    }

    #[test]
    fn leaves_change_unset_when_open_missing() {
        let ticker = Ticker {
            last: Some(110.0),
            ..base_ticker()
        }
        .with_derived_change();

        assert_eq!(ticker.change, None);
        assert_eq!(ticker.percentage, None);
    }
}
