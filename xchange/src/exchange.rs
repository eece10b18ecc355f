//! The unified façade trait (spec §9: "not inheritance but a capability set") every venue driver
//! implements, plus the shared request/response shapes methods on it pass around.

use crate::capability::Capabilities;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use xchange_instrument::fee::TradingFees;
use xchange_instrument::index::MarketSnapshot;
use xchange_model::balance::Balances;
use xchange_model::candle::Candle;
use xchange_model::order::Order;
use xchange_model::orderbook::OrderBook;
use xchange_model::status::{OrderType, Side};
use xchange_model::ticker::Ticker;
use xchange_model::trade::{MyTrade, Trade};
use xchange_model::ExchangeError;

/// A unified `createOrder` call (spec §4.8). `params` carries venue-specific extras the unified
/// shape doesn't otherwise name (e.g. Pionex's base-vs-quote `amount`/`size` split for market
/// orders).
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub symbol: String,
    pub order_type: OrderType,
    pub side: Side,
    pub amount: f64,
    pub price: Option<f64>,
    pub params: Value,
}

impl CreateOrderRequest {
    pub fn new(symbol: impl Into<String>, order_type: OrderType, side: Side, amount: f64) -> Self {
        Self {
            symbol: symbol.into(),
            order_type,
            side,
            amount,
            price: None,
            params: Value::Null,
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

/// The unified method surface (spec §4.8) every venue driver implements. Capability bits gate
/// which methods actually do work; an unsupported call returns
/// [`ExchangeError::FeatureUnsupported`] rather than panicking or silently no-op'ing.
#[async_trait]
pub trait Exchange: Send + Sync {
    fn venue(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Populates `markets`/`marketsById`/`symbols`; idempotent unless `reload`.
    async fn load_markets(&self, reload: bool) -> Result<Arc<MarketSnapshot>, ExchangeError>;

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError>;

    async fn fetch_tickers(&self, symbols: &[String]) -> Result<HashMap<String, Ticker>, ExchangeError>;

    async fn fetch_order_book(&self, symbol: &str, limit: Option<usize>) -> Result<OrderBook, ExchangeError>;

    async fn fetch_trades(
        &self,
        symbol: &str,
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Trade>, ExchangeError>;

    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Candle>, ExchangeError>;

    async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, ExchangeError>;

    async fn cancel_order(&self, id: &str, symbol: Option<&str>) -> Result<Order, ExchangeError>;

    async fn cancel_all_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError>;

    async fn fetch_order(&self, id: &str, symbol: Option<&str>) -> Result<Order, ExchangeError>;

    async fn fetch_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError>;

    async fn fetch_closed_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError>;

    async fn fetch_my_trades(
        &self,
        symbol: Option<&str>,
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<MyTrade>, ExchangeError>;

    async fn fetch_balance(&self) -> Result<Balances, ExchangeError>;

    async fn fetch_trading_fees(&self) -> Result<TradingFees, ExchangeError>;

    /// Explicit close-all (spec §5): synchronous with respect to new subscriptions.
    async fn close_all_ws(&self);
}
