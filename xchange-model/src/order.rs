//! Unified [`Order`] (spec §3, §8: `remaining = max(0, amount - filled)`,
//! `average = cost / filled` when `filled > 0` else `0`).

use crate::status::{OrderStatus, OrderType, Side};
use crate::trade::{Fee, MyTrade};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Order {
    pub id: String,
    pub client_order_id: Option<String>,
    pub symbol: String,
    pub order_type: OrderType,
    pub side: Side,
    pub price: Option<f64>,
    pub amount: f64,
    pub filled: f64,
    pub remaining: f64,
    pub cost: f64,
    pub average: f64,
    pub status: OrderStatus,
    pub timestamp: i64,
    pub datetime: String,
    pub trades: Vec<MyTrade>,
    pub fee: Option<Fee>,
    pub info: Value,
}

impl Order {
    /// Constructs an [`Order`], deriving `remaining`/`average` from `amount`/`filled`/`cost`
    /// per the spec's invariants rather than trusting venue-supplied values for them.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        client_order_id: Option<String>,
        symbol: impl Into<String>,
        order_type: OrderType,
        side: Side,
        price: Option<f64>,
        amount: f64,
        filled: f64,
        cost: f64,
        status: OrderStatus,
        timestamp: i64,
        datetime: impl Into<String>,
        trades: Vec<MyTrade>,
        fee: Option<Fee>,
        info: Value,
    ) -> Self {
        let remaining = (amount - filled).max(0.0);
        let average = if filled > 0.0 { cost / filled } else { 0.0 };

        Self {
            id: id.into(),
            client_order_id,
            symbol: symbol.into(),
            order_type,
            side,
            price,
            amount,
            filled,
            remaining,
            cost,
            average,
            status,
            timestamp,
            datetime: datetime.into(),
            trades,
            fee,
            info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_and_average_are_derived() {
        let order = Order::new(
            "1",
            None,
            "BTC/USD",
            OrderType::Limit,
            Side::Buy,
            Some(100.0),
            10.0,
            4.0,
            400.0,
            OrderStatus::PartiallyFilled,
            0,
            "",
            vec![],
            None,
            Value::Null,
        );

        assert_eq!(order.remaining, 6.0);
        assert_eq!(order.average, 100.0);
    }

    #[test]
    fn average_is_zero_when_nothing_filled() {
        let order = Order::new(
            "1", None, "BTC/USD", OrderType::Limit, Side::Buy, Some(100.0), 10.0, 0.0, 0.0,
            OrderStatus::New, 0, "", vec![], None, Value::Null,
        );

        assert_eq!(order.average, 0.0);
        assert_eq!(order.remaining, 10.0);
    }

    #[test]
    fn remaining_never_goes_negative() {
        let order = Order::new(
            "1", None, "BTC/USD", OrderType::Limit, Side::Buy, Some(100.0), 10.0, 12.0, 1200.0,
            OrderStatus::Filled, 0, "", vec![], None, Value::Null,
        );

        assert_eq!(order.remaining, 0.0);
    }
}
