//! Unified public [`Trade`] and private [`MyTrade`] (spec §3).

use crate::status::Side;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Trade {
    pub id: String,
    pub symbol: String,
    pub price: f64,
    pub amount: f64,
    /// `price * amount`.
    pub cost: f64,
    pub side: Side,
    pub timestamp: i64,
    pub datetime: String,
    pub info: Value,
}

impl Trade {
    pub fn new(
        id: impl Into<String>,
        symbol: impl Into<String>,
        price: f64,
        amount: f64,
        side: Side,
        timestamp: i64,
        datetime: impl Into<String>,
        info: Value,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            price,
            amount,
            cost: price * amount,
            side,
            timestamp,
            datetime: datetime.into(),
            info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Fee {
    pub cost: f64,
    /// Left unset where a venue's REST envelope never actually derives it (spec §9: Bittrex
    /// `_parseOrder` sets a shared commission currency without deriving one).
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MyTrade {
    pub trade: Trade,
    pub order_id: String,
    pub fee: Option<Fee>,
    pub is_maker: Option<bool>,
}
