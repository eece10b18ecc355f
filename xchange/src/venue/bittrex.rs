//! Bittrex v3 driver: `preSign` HMAC-SHA512 signing (spec §4.4) and SignalR hub framing over raw
//! WebSocket text frames (spec §4.9, §9) rather than a SignalR client library.

use crate::capability::Capabilities;
use crate::exchange::{CreateOrderRequest, Exchange};
use crate::orchestrator::Orchestrator;
use crate::venue::common::{get, post_json, ErrorTable};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use xchange_instrument::fee::TradingFees;
use xchange_instrument::index::{MarketIndex, MarketSnapshot};
use xchange_instrument::market::Market;
use xchange_integration::clock::Clock;
use xchange_integration::coerce::*;
use xchange_integration::crypto::{hmac_sha512_hex, sha512_hex};
use xchange_integration::protocol::http::{HttpRequestSpec, SignedRequest, Signer};
use xchange_integration::protocol::websocket::WsMessage;
use xchange_integration::time::{iso8601_from_millis, parse_iso8601};
use xchange_model::balance::{Balances, CurrencyBalance};
use xchange_model::candle::{normalize_candles, Candle};
use xchange_model::order::Order;
use xchange_model::orderbook::{Level, OrderBook};
use xchange_model::status::{OrderStatus, OrderType, Side};
use xchange_model::ticker::Ticker;
use xchange_model::trade::{MyTrade, Trade};
use xchange_model::ExchangeError;

const VENUE: &str = "bittrex";
const BASE_URL: &str = "https://api.bittrex.com/v3";

fn error_table() -> ErrorTable {
    ErrorTable::new(&[
        ("INVALID_SIGNATURE", "AuthenticationError"),
        ("INVALID_APIKEY", "AuthenticationError"),
        ("ORDER_NOT_OPEN", "OrderNotFound"),
        ("INSUFFICIENT_FUNDS", "InsufficientFunds"),
        ("MIN_TRADE_REQUIREMENT_NOT_MET", "InvalidOrder"),
        ("MARKET_DOES_NOT_EXIST", "BadSymbol"),
        ("THROTTLED", "RateLimitExceeded"),
    ])
}

#[derive(Debug)]
struct BittrexSigner {
    api_key: String,
    secret: String,
    clock: Arc<dyn Clock>,
}

impl Signer for BittrexSigner {
    fn sign(&self, request: &HttpRequestSpec) -> Result<SignedRequest, xchange_integration::error::SocketError> {
        let timestamp = self.clock.now_unix_millis().to_string();
        let content_hash = match &request.body {
            Some(body) => sha512_hex(&String::from_utf8_lossy(body)),
            None => sha512_hex(""),
        };

        let pre_sign = format!(
            "{timestamp}{url}{method}{content_hash}",
            url = request.url,
            method = request.method.as_str(),
        );
        let signature = hmac_sha512_hex(&pre_sign, &self.secret);

        Ok(SignedRequest {
            headers: vec![
                ("Api-Key".to_string(), self.api_key.clone()),
                ("Api-Timestamp".to_string(), timestamp),
                ("Api-Content-Hash".to_string(), content_hash),
                ("Api-Signature".to_string(), signature),
            ],
            url_override: None,
            body_override: None,
        })
    }
}

pub struct BittrexDriver {
    orchestrator: Orchestrator,
    signer: BittrexSigner,
    markets: Arc<MarketIndex>,
    errors: ErrorTable,
}

impl std::fmt::Debug for BittrexDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BittrexDriver").finish()
    }
}

impl BittrexDriver {
    pub fn new(
        api_key: impl Into<String>,
        secret: impl Into<String>,
        transport: Arc<dyn xchange_integration::protocol::http::HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rate_limiter = Arc::new(xchange_integration::ratelimit::RateLimiter::new(
            60.0,
            Duration::from_secs(60),
        ));
        Self {
            orchestrator: Orchestrator::new(VENUE, transport, rate_limiter, Duration::from_secs(10)),
            signer: BittrexSigner { api_key: api_key.into(), secret: secret.into(), clock },
            markets: Arc::new(MarketIndex::new()),
            errors: error_table(),
        }
    }

    fn venue_id(&self, symbol: &str) -> String {
        let snapshot = self.markets.snapshot();
        snapshot
            .markets
            .get(symbol)
            .map(|m| m.id.clone())
            .unwrap_or_else(|| symbol.replace('/', "-"))
    }

    fn unified_symbol(&self, venue_id: &str) -> String {
        let snapshot = self.markets.snapshot();
        if let Some(market) = snapshot.markets_by_id.get(venue_id) {
            return market.symbol.clone();
        }
        xchange_instrument::symbol::split_by_separator(venue_id, "-")
            .map(|(b, q)| format!("{b}/{q}"))
            .unwrap_or_else(|| venue_id.to_string())
    }

    /// Bittrex's error body carries a top-level `code` (spec §4.6) with no further envelope.
    fn map_error(&self, status: u16, body: &Value) -> ExchangeError {
        match body.get("code").and_then(Value::as_str) {
            Some(code) => self.errors.map(VENUE, code, code.to_string()),
            None => ExchangeError::http(VENUE, status, body.to_string()),
        }
    }
}

#[async_trait]
impl Exchange for BittrexDriver {
    fn venue(&self) -> &'static str {
        VENUE
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            watch_ticker: true,
            watch_order_book: true,
            watch_trades: true,
            watch_orders: true,
            fetch_trading_fees: true,
            cancel_all_orders: false,
            ..Default::default()
        }
    }

    async fn load_markets(&self, _reload: bool) -> Result<Arc<MarketSnapshot>, ExchangeError> {
        let request = get(BASE_URL, "/markets", &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let rows = response.body.as_array().cloned().unwrap_or_default();

        let markets = rows
            .iter()
            .filter_map(|row| {
                let id = safe_string(row, "symbol", "");
                let base = safe_string(row, "baseCurrencySymbol", "");
                let quote = safe_string(row, "quoteCurrencySymbol", "");
                if base.is_empty() || quote.is_empty() {
                    return None;
                }
                let mut market = Market::new(id, base, quote);
                market.active = safe_string(row, "status", "") == "ONLINE";
                market.precision.price = safe_int_opt(row, "precision").map(|v| v as u32);
                Some(market)
            })
            .collect();

        self.markets.publish(markets, |_| vec![]);
        Ok(self.markets.snapshot())
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        let venue_id = self.venue_id(symbol);
        let summary_request = get(BASE_URL, &format!("/markets/{venue_id}/summary"), &[], Duration::from_secs(10));
        let ticker_request = get(BASE_URL, &format!("/markets/{venue_id}/ticker"), &[], Duration::from_secs(10));

        let summary = self.orchestrator.execute(summary_request, None, 1.0).await?.body;
        let ticker = self.orchestrator.execute(ticker_request, None, 1.0).await?.body;

        Ok(parse_ticker(symbol, &summary, &ticker))
    }

    async fn fetch_tickers(&self, symbols: &[String]) -> Result<HashMap<String, Ticker>, ExchangeError> {
        let mut out = HashMap::new();
        for symbol in symbols {
            match self.fetch_ticker(symbol).await {
                Ok(ticker) => {
                    out.insert(symbol.clone(), ticker);
                }
                Err(error) => tracing::warn!(venue = VENUE, symbol = %symbol, %error, "fetch_tickers: skipped"),
            }
        }
        Ok(out)
    }

    async fn fetch_order_book(&self, symbol: &str, limit: Option<usize>) -> Result<OrderBook, ExchangeError> {
        let venue_id = self.venue_id(symbol);
        let depth = limit.unwrap_or(25).min(500);
        let request = get(
            BASE_URL,
            &format!("/markets/{venue_id}/orderbook"),
            &[("depth", depth.to_string())],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let body = response.body;

        let to_levels = |key: &str| -> Vec<Level> {
            body.get(key)
                .and_then(Value::as_array)
                .map(|rows| {
                    rows.iter()
                        .map(|row| Level {
                            price: safe_float(row, "rate", 0.0),
                            size: safe_float(row, "quantity", 0.0),
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        Ok(OrderBook {
            symbol: symbol.to_string(),
            bids: to_levels("bid"),
            asks: to_levels("ask"),
            timestamp: 0,
            datetime: String::new(),
            nonce: None,
        }
        .normalized(limit))
    }

    async fn fetch_trades(
        &self,
        symbol: &str,
        _since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Trade>, ExchangeError> {
        let venue_id = self.venue_id(symbol);
        let request = get(BASE_URL, &format!("/markets/{venue_id}/trades"), &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let mut rows = response.body.as_array().cloned().unwrap_or_default();
        if let Some(limit) = limit {
            rows.truncate(limit);
        }

        Ok(rows
            .iter()
            .map(|row| {
                let side = match safe_string(row, "takerSide", "BUY").as_str() {
                    "SELL" => Side::Sell,
                    _ => Side::Buy,
                };
                let timestamp = parse_iso8601(&safe_string(row, "executedAt", "")).unwrap_or(0);
                Trade::new(
                    safe_string(row, "id", ""),
                    symbol,
                    safe_float(row, "rate", 0.0),
                    safe_float(row, "quantity", 0.0),
                    side,
                    timestamp,
                    iso8601_from_millis(timestamp),
                    row.clone(),
                )
            })
            .collect())
    }

    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        _since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let venue_id = self.venue_id(symbol);
        let request = get(
            BASE_URL,
            &format!("/markets/{venue_id}/candles/{timeframe}/recent"),
            &[],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let rows = response.body.as_array().cloned().unwrap_or_default();

        let candles: Vec<Candle> = rows
            .iter()
            .map(|row| Candle {
                timestamp_ms: parse_iso8601(&safe_string(row, "startsAt", "")).unwrap_or(0),
                open: safe_float(row, "open", 0.0),
                high: safe_float(row, "high", 0.0),
                low: safe_float(row, "low", 0.0),
                close: safe_float(row, "close", 0.0),
                volume: safe_float(row, "volume", 0.0),
            })
            .collect();

        Ok(normalize_candles(candles, limit))
    }

    async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, ExchangeError> {
        let venue_id = self.venue_id(&request.symbol);
        let (order_type, time_in_force) = match request.order_type {
            OrderType::Market => ("MARKET", "IMMEDIATE_OR_CANCEL"),
            _ => ("LIMIT", "GOOD_TIL_CANCELLED"),
        };

        let mut body = serde_json::json!({
            "marketSymbol": venue_id,
            "direction": request.side.as_str(),
            "type": order_type,
            "quantity": request.amount.to_string(),
            "timeInForce": time_in_force,
        });
        if let Some(price) = request.price {
            body["limit"] = Value::String(price.to_string());
        }

        let http = post_json(BASE_URL, "/orders", body, Duration::from_secs(10));
        let response = self.orchestrator.execute(http, Some(&self.signer), 1.0).await?;
        Ok(parse_order(&request.symbol, &response.body))
    }

    async fn cancel_order(&self, id: &str, symbol: Option<&str>) -> Result<Order, ExchangeError> {
        let http = HttpRequestSpec {
            method: xchange_integration::protocol::http::HttpMethod::Delete,
            url: format!("{BASE_URL}/orders/{id}"),
            headers: Vec::new(),
            body: None,
            timeout: Duration::from_secs(10),
        };
        let response = self.orchestrator.execute(http, Some(&self.signer), 1.0).await?;
        Ok(parse_order(symbol.unwrap_or_default(), &response.body))
    }

    async fn cancel_all_orders(&self, _symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError> {
        Err(ExchangeError::FeatureUnsupported { venue: VENUE, method: "cancelAllOrders" })
    }

    async fn fetch_order(&self, id: &str, symbol: Option<&str>) -> Result<Order, ExchangeError> {
        let request = get(BASE_URL, &format!("/orders/{id}"), &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        Ok(parse_order(symbol.unwrap_or_default(), &response.body))
    }

    async fn fetch_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError> {
        let path = match symbol {
            Some(sym) => format!("/orders/open?marketSymbol={}", self.venue_id(sym)),
            None => "/orders/open".to_string(),
        };
        let request = get(BASE_URL, &path, &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let rows = response.body.as_array().cloned().unwrap_or_default();
        Ok(rows
            .iter()
            .map(|row| parse_order(&self.unified_symbol(&safe_string(row, "marketSymbol", "")), row))
            .collect())
    }

    async fn fetch_closed_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError> {
        let path = match symbol {
            Some(sym) => format!("/orders/closed?marketSymbol={}", self.venue_id(sym)),
            None => "/orders/closed".to_string(),
        };
        let request = get(BASE_URL, &path, &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let rows = response.body.as_array().cloned().unwrap_or_default();
        Ok(rows
            .iter()
            .map(|row| parse_order(&self.unified_symbol(&safe_string(row, "marketSymbol", "")), row))
            .collect())
    }

    async fn fetch_my_trades(
        &self,
        symbol: Option<&str>,
        _since: Option<i64>,
        _limit: Option<usize>,
    ) -> Result<Vec<MyTrade>, ExchangeError> {
        let path = match symbol {
            Some(sym) => format!("/executions?marketSymbol={}", self.venue_id(sym)),
            None => "/executions".to_string(),
        };
        let request = get(BASE_URL, &path, &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let rows = response.body.as_array().cloned().unwrap_or_default();

        Ok(rows
            .iter()
            .map(|row| {
                let market_symbol = self.unified_symbol(&safe_string(row, "marketSymbol", ""));
                let side = match safe_string(row, "takerSide", "BUY").as_str() {
                    "SELL" => Side::Sell,
                    _ => Side::Buy,
                };
                let timestamp = parse_iso8601(&safe_string(row, "executedAt", "")).unwrap_or(0);
                MyTrade {
                    trade: Trade::new(
                        safe_string(row, "id", ""),
                        market_symbol,
                        safe_float(row, "rate", 0.0),
                        safe_float(row, "quantity", 0.0),
                        side,
                        timestamp,
                        iso8601_from_millis(timestamp),
                        row.clone(),
                    ),
                    order_id: safe_string(row, "orderId", ""),
                    // Bittrex `_parseOrder` sets a shared commission currency without deriving
                    // it; left unset until venue-specific derivation is added (spec §9).
                    fee: safe_float_opt(row, "commission").map(|cost| xchange_model::trade::Fee { cost, currency: None }),
                    is_maker: None,
                }
            })
            .collect())
    }

    async fn fetch_balance(&self) -> Result<Balances, ExchangeError> {
        let request = get(BASE_URL, "/balances", &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let rows = response.body.as_array().cloned().unwrap_or_default();

        let mut currencies = HashMap::new();
        for row in &rows {
            let code = safe_string_upper(row, "currencySymbol", "");
            let total = safe_float(row, "total", 0.0);
            let available = safe_float(row, "available", 0.0);
            currencies.insert(code, CurrencyBalance::from_total(total, available));
        }

        Ok(Balances {
            currencies,
            info: Value::Array(rows),
            timestamp: 0,
            datetime: String::new(),
        })
    }

    async fn fetch_trading_fees(&self) -> Result<TradingFees, ExchangeError> {
        let request = get(BASE_URL, "/account/fees/trading", &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let rows = response.body.as_array().cloned().unwrap_or_default();

        let mut by_symbol = HashMap::new();
        for row in &rows {
            let symbol = self.unified_symbol(&safe_string(row, "marketSymbol", ""));
            by_symbol.insert(
                symbol,
                xchange_instrument::fee::FeeRate {
                    maker: safe_float(row, "makerRate", 0.0),
                    taker: safe_float(row, "takerRate", 0.0),
                },
            );
        }

        Ok(TradingFees {
            default: xchange_instrument::fee::FeeRate { maker: 0.0025, taker: 0.0025 },
            by_symbol,
        })
    }

    async fn close_all_ws(&self) {}
}

fn parse_ticker(symbol: &str, summary: &Value, ticker: &Value) -> Ticker {
    Ticker {
        symbol: symbol.to_string(),
        last: safe_float_opt(ticker, "lastTradeRate"),
        bid: safe_float_opt(ticker, "bidRate"),
        ask: safe_float_opt(ticker, "askRate"),
        bid_volume: None,
        ask_volume: None,
        high: safe_float_opt(summary, "high"),
        low: safe_float_opt(summary, "low"),
        open: None,
        close: safe_float_opt(ticker, "lastTradeRate"),
        volume: safe_float_opt(summary, "volume"),
        quote_volume: safe_float_opt(summary, "quoteVolume"),
        change: safe_float_opt(summary, "percentChange"),
        percentage: safe_float_opt(summary, "percentChange"),
        vwap: None,
        timestamp: parse_iso8601(&safe_string(summary, "updatedAt", "")).unwrap_or(0),
        datetime: safe_string(summary, "updatedAt", ""),
        info: serde_json::json!({"summary": summary, "ticker": ticker}),
    }
}

fn parse_order(symbol: &str, body: &Value) -> Order {
    let amount = safe_float(body, "quantity", 0.0);
    let filled = safe_float(body, "fillQuantity", 0.0);
    let cost = safe_float(body, "proceeds", 0.0);
    let status = match safe_string(body, "status", "").as_str() {
        "OPEN" if filled > 0.0 => OrderStatus::PartiallyFilled,
        "OPEN" => OrderStatus::New,
        "CLOSED" if filled >= amount && amount > 0.0 => OrderStatus::Filled,
        "CLOSED" => OrderStatus::Canceled,
        _ => OrderStatus::New,
    };
    let side = match safe_string(body, "direction", "BUY").as_str() {
        "SELL" => Side::Sell,
        _ => Side::Buy,
    };
    let order_type = match safe_string(body, "type", "LIMIT").as_str() {
        "MARKET" | "CEILING_MARKET" => OrderType::Market,
        _ => OrderType::Limit,
    };
    let timestamp = parse_iso8601(&safe_string(body, "createdAt", "")).unwrap_or(0);

    Order::new(
        safe_string(body, "id", ""),
        safe_string_opt(body, "clientOrderId"),
        symbol,
        order_type,
        side,
        safe_float_opt(body, "limit"),
        amount,
        filled,
        cost,
        status,
        timestamp,
        iso8601_from_millis(timestamp),
        vec![],
        None,
        body.clone(),
    )
}

/// Builds a SignalR hub `Subscribe` invocation (spec §4.9, §9): Bittrex's WS transport is framed
/// directly over raw WebSocket text, not a SignalR client library.
pub fn subscribe_invocation(channels: &[String], invocation_id: i64) -> WsMessage {
    WsMessage::Text(
        serde_json::json!({
            "H": "c3",
            "M": "Subscribe",
            "A": [channels],
            "I": invocation_id,
        })
        .to_string(),
    )
}

/// Unwraps a SignalR hub message envelope, returning `(method, parsed_payload)` for each inner
/// invocation. `A[0]` is a JSON string that must itself be parsed (spec §9).
pub fn unwrap_hub_messages(frame: &Value) -> Vec<(String, Value)> {
    frame
        .get("M")
        .and_then(Value::as_array)
        .map(|invocations| {
            invocations
                .iter()
                .filter_map(|invocation| {
                    let method = safe_string(invocation, "M", "");
                    let payload_str = invocation.get("A").and_then(Value::as_array)?.first()?.as_str()?;
                    let payload: Value = serde_json::from_str(payload_str).ok()?;
                    Some((method, payload))
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwrap_hub_messages_parses_nested_json_string_payload() {
        let frame = serde_json::json!({
            "C": "d-1,0|1,1",
            "M": [
                {"H": "c3", "M": "orderBook", "A": ["{\"marketSymbol\":\"BTC-USD\",\"depth\":25}"]}
            ]
        });
        let messages = unwrap_hub_messages(&frame);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "orderBook");
        assert_eq!(messages[0].1["marketSymbol"], "BTC-USD");
    }

    #[test]
    fn subscribe_invocation_carries_channel_list_and_id() {
        let msg = subscribe_invocation(&["orderbook_BTC-USD_25".to_string()], 1);
        match msg {
            WsMessage::Text(text) => {
                assert!(text.contains("\"M\":\"Subscribe\""));
                assert!(text.contains("orderbook_BTC-USD_25"));
            }
            _ => panic!("expected text message"),
        }
    }

    #[test]
    fn parse_order_derives_partially_filled_from_open_status_with_fills() {
        let body = serde_json::json!({
            "id": "1", "marketSymbol": "BTC-USD", "direction": "BUY", "type": "LIMIT",
            "status": "OPEN", "quantity": "10", "fillQuantity": "4", "limit": "100"
        });
        let order = parse_order("BTC/USD", &body);
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
    }
}
