//! The unified status alphabet and side enum (spec §4.7, §8).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Expired,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::Rejected => "REJECTED",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    /// Derives a [`Side`] from a venue's numeric `0`/`1` type field (spec §4.10: Bitstamp,
    /// LBank public trades use `0 -> buy`, `1 -> sell`).
    pub fn from_numeric_type(value: i64) -> Self {
        if value == 0 {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    pub fn from_str_loose(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "buy" | "bid" | "b" => Some(Side::Buy),
            "sell" | "ask" | "s" => Some(Side::Sell),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum OrderType {
    Limit,
    Market,
    /// Venue-specific extension the unified alphabet doesn't otherwise name (spec §3).
    Other,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "LIMIT",
            OrderType::Market => "MARKET",
            OrderType::Other => "OTHER",
        }
    }
}
