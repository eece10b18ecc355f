//! Pionex driver: HMAC-SHA256 query signing, the `{result, data, code, message}` envelope
//! (spec §4.6), and the base/quote split on market order sizing (spec §9).

use crate::capability::Capabilities;
use crate::exchange::{CreateOrderRequest, Exchange};
use crate::orchestrator::Orchestrator;
use crate::venue::binance::sorted_raw_query;
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
use xchange_integration::crypto::hmac_sha256_hex;
use xchange_integration::protocol::http::{HttpMethod, HttpRequestSpec, SignedRequest, Signer};
use xchange_integration::protocol::websocket::WsMessage;
use xchange_integration::time::iso8601_from_millis;
use xchange_model::balance::{Balances, CurrencyBalance};
use xchange_model::candle::{normalize_candles, Candle};
use xchange_model::order::Order;
use xchange_model::orderbook::{Level, OrderBook};
use xchange_model::status::{OrderStatus, OrderType, Side};
use xchange_model::ticker::Ticker;
use xchange_model::trade::{MyTrade, Trade};
use xchange_model::ExchangeError;

const VENUE: &str = "pionex";
const BASE_URL: &str = "https://api.pionex.com";

fn error_table() -> ErrorTable {
    ErrorTable::new(&[
        ("API_KEY_INVALID", "AuthenticationError"),
        ("SIGNATURE_INVALID", "AuthenticationError"),
        ("TIMESTAMP_EXPIRED", "AuthenticationError"),
        ("PARAMS_ERROR", "BadRequest"),
        ("BALANCE_NOT_ENOUGH", "InsufficientFunds"),
        ("ORDER_NOT_EXIST", "OrderNotFound"),
        ("RATE_LIMIT", "RateLimitExceeded"),
        ("SYMBOL_NOT_EXIST", "BadSymbol"),
    ])
}

/// Pionex signs `requestPath?sorted_query` directly (no timestamp folded into the query the way
/// Binance does) plus the raw JSON body for POST, keyed by a `PIONEX-KEY` / `PIONEX-SIGNATURE`
/// header pair instead of a query-embedded signature (spec §4.4).
#[derive(Debug)]
struct PionexSigner {
    api_key: String,
    secret: String,
    clock: Arc<dyn Clock>,
}

impl Signer for PionexSigner {
    fn sign(&self, request: &HttpRequestSpec) -> Result<SignedRequest, xchange_integration::error::SocketError> {
        let timestamp = self.clock.now_unix_millis().to_string();
        let (full_path, query) = request.url.split_once('?').unwrap_or((&request.url, ""));
        let path = full_path.strip_prefix(BASE_URL).unwrap_or(full_path);

        let mut pairs: Vec<(&str, String)> = query
            .split('&')
            .filter(|kv| !kv.is_empty())
            .filter_map(|kv| kv.split_once('='))
            .map(|(k, v)| (k, v.to_string()))
            .collect();
        pairs.push(("timestamp", timestamp.clone()));
        let sorted_query = sorted_raw_query(&pairs);

        let body = request
            .body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default();

        let prehash = format!("{path}?{sorted_query}{body}");
        let signature = hmac_sha256_hex(&prehash, &self.secret);

        let new_url = format!("{BASE_URL}{path}?{sorted_query}");

        Ok(SignedRequest {
            headers: vec![
                ("PIONEX-KEY".to_string(), self.api_key.clone()),
                ("PIONEX-SIGNATURE".to_string(), signature),
            ],
            url_override: Some(new_url),
            body_override: None,
        })
    }
}

pub struct PionexDriver {
    orchestrator: Orchestrator,
    signer: PionexSigner,
    markets: Arc<MarketIndex>,
    errors: ErrorTable,
}

impl std::fmt::Debug for PionexDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PionexDriver").finish()
    }
}

impl PionexDriver {
    pub fn new(
        api_key: impl Into<String>,
        secret: impl Into<String>,
        transport: Arc<dyn xchange_integration::protocol::http::HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rate_limiter = Arc::new(xchange_integration::ratelimit::RateLimiter::new(
            8.0,
            Duration::from_secs(1),
        ));
        Self {
            orchestrator: Orchestrator::new(VENUE, transport, rate_limiter, Duration::from_secs(10)),
            signer: PionexSigner {
                api_key: api_key.into(),
                secret: secret.into(),
                clock,
            },
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
            .unwrap_or_else(|| symbol.replace('/', "_"))
    }

    /// Pionex symbol parse falls back to uppercasing if `marketsById` is empty; coins with
    /// multi-segment names will round-trip imperfectly (spec §9, preserved as documented).
    fn unified_symbol(&self, venue_id: &str) -> String {
        let snapshot = self.markets.snapshot();
        if let Some(market) = snapshot.markets_by_id.get(venue_id) {
            return market.symbol.clone();
        }
        xchange_instrument::symbol::split_by_separator(venue_id, "_")
            .map(|(b, q)| format!("{b}/{q}"))
            .unwrap_or_else(|| venue_id.to_uppercase())
    }

    /// Pionex's envelope (spec §4.6): `result === false` signals failure; `code`/`message` carry
    /// the venue error, `data` carries the payload on success.
    fn map_envelope(&self, body: Value) -> Result<Value, ExchangeError> {
        if !safe_bool(&body, "result", true) {
            let code = safe_string(&body, "code", "");
            let message = safe_string(&body, "message", "");
            return Err(self.errors.map(VENUE, &code, message));
        }
        Ok(body.get("data").cloned().unwrap_or(body))
    }
}

#[async_trait]
impl Exchange for PionexDriver {
    fn venue(&self) -> &'static str {
        VENUE
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            watch_ticker: true,
            watch_order_book: true,
            watch_trades: true,
            fetch_closed_orders: true,
            cancel_all_orders: true,
            ..Default::default()
        }
    }

    async fn load_markets(&self, _reload: bool) -> Result<Arc<MarketSnapshot>, ExchangeError> {
        let request = get(BASE_URL, "/api/v1/common/symbols", &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let data = self.map_envelope(response.body)?;
        let rows = data.get("symbols").and_then(Value::as_array).cloned().unwrap_or_default();

        let markets = rows
            .iter()
            .filter_map(|row| {
                let id = safe_string(row, "symbol", "");
                let base = safe_string(row, "baseCurrency", "");
                let quote = safe_string(row, "quoteCurrency", "");
                if base.is_empty() || quote.is_empty() {
                    return None;
                }
                let mut market = Market::new(id, base, quote);
                market.active = safe_bool(row, "enable", true);
                market.step_size = safe_float_opt(row, "baseStepSize");
                market.tick_size = safe_float_opt(row, "quoteStepSize");
                Some(market)
            })
            .collect();

        self.markets.publish(markets, |_| vec![]);
        Ok(self.markets.snapshot())
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        let venue_id = self.venue_id(symbol);
        let request = get(
            BASE_URL,
            "/api/v1/market/tickers",
            &[("symbol", venue_id)],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let data = self.map_envelope(response.body)?;
        let row = data
            .get("tickers")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first())
            .cloned()
            .unwrap_or(data);
        Ok(parse_ticker(symbol, &row))
    }

    async fn fetch_tickers(&self, symbols: &[String]) -> Result<HashMap<String, Ticker>, ExchangeError> {
        let request = get(BASE_URL, "/api/v1/market/tickers", &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, None, symbols.len().max(1) as f64).await?;
        let data = self.map_envelope(response.body)?;
        let rows = data.get("tickers").and_then(Value::as_array).cloned().unwrap_or_default();
        let wanted: std::collections::HashSet<String> = symbols.iter().map(|s| self.venue_id(s)).collect();

        let mut out = HashMap::new();
        for row in &rows {
            let venue_id = safe_string(row, "symbol", "");
            if !wanted.is_empty() && !wanted.contains(&venue_id) {
                continue;
            }
            let symbol = self.unified_symbol(&venue_id);
            out.insert(symbol.clone(), parse_ticker(&symbol, row));
        }
        Ok(out)
    }

    async fn fetch_order_book(&self, symbol: &str, limit: Option<usize>) -> Result<OrderBook, ExchangeError> {
        let venue_id = self.venue_id(symbol);
        let mut params = vec![("symbol", venue_id)];
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        let request = get(BASE_URL, "/api/v1/market/depth", &params, Duration::from_secs(10));
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let data = self.map_envelope(response.body)?;

        let to_levels = |key: &str| -> Vec<Level> {
            data.get(key)
                .and_then(Value::as_array)
                .map(|rows| {
                    rows.iter()
                        .filter_map(|row| {
                            let row = row.as_array()?;
                            Some(Level {
                                price: row.first()?.as_str()?.parse().ok()?,
                                size: row.get(1)?.as_str()?.parse().ok()?,
                            })
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        let timestamp = safe_int(&data, "timestamp", 0);
        Ok(OrderBook {
            symbol: symbol.to_string(),
            bids: to_levels("bids"),
            asks: to_levels("asks"),
            timestamp,
            datetime: iso8601_from_millis(timestamp),
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
        let mut params = vec![("symbol", venue_id)];
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        let request = get(BASE_URL, "/api/v1/market/trades", &params, Duration::from_secs(10));
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let data = self.map_envelope(response.body)?;
        let rows = data.get("trades").and_then(Value::as_array).cloned().unwrap_or_default();

        Ok(rows
            .iter()
            .map(|row| {
                let side = Side::from_str_loose(&safe_string_lower(row, "side", "BUY")).unwrap_or(Side::Buy);
                let timestamp = safe_int(row, "time", 0);
                Trade::new(
                    safe_string(row, "id", ""),
                    symbol,
                    safe_float(row, "price", 0.0),
                    safe_float(row, "size", 0.0),
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
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let venue_id = self.venue_id(symbol);
        let mut params = vec![("symbol", venue_id), ("interval", timeframe.to_string())];
        let since_str;
        if let Some(since) = since {
            since_str = since.to_string();
            params.push(("startTime", since_str));
        }
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        let request = get(BASE_URL, "/api/v1/market/klines", &params, Duration::from_secs(10));
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let data = self.map_envelope(response.body)?;
        let rows = data.get("klines").and_then(Value::as_array).cloned().unwrap_or_default();

        let candles = rows
            .iter()
            .map(|row| Candle {
                timestamp_ms: safe_int(row, "time", 0),
                open: safe_float(row, "open", 0.0),
                high: safe_float(row, "high", 0.0),
                low: safe_float(row, "low", 0.0),
                close: safe_float(row, "close", 0.0),
                volume: safe_float(row, "volume", 0.0),
            })
            .collect();

        Ok(normalize_candles(candles, limit))
    }

    /// Market buy sizes by quote via `amount`; market sell sizes by base via `size` (spec §9,
    /// distinct from Coinbase's `order_configuration` split but the same underlying asymmetry).
    async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, ExchangeError> {
        let venue_id = self.venue_id(&request.symbol);
        let mut body = serde_json::json!({
            "symbol": venue_id,
            "side": if request.side == Side::Buy { "BUY" } else { "SELL" },
            "type": if request.order_type == OrderType::Market { "MARKET" } else { "LIMIT" },
        });

        if request.order_type == OrderType::Market && request.side == Side::Buy {
            body["amount"] = Value::String(request.amount.to_string());
        } else {
            body["size"] = Value::String(request.amount.to_string());
        }
        if let Some(price) = request.price {
            body["price"] = Value::String(price.to_string());
        }

        let http = post_json(BASE_URL, "/api/v1/trade/order", body, Duration::from_secs(10));
        let response = self.orchestrator.execute(http, Some(&self.signer), 1.0).await?;
        let data = self.map_envelope(response.body)?;

        Ok(Order::new(
            safe_string(&data, "orderId", ""),
            safe_string_opt(&data, "clientOrderId"),
            request.symbol,
            request.order_type,
            request.side,
            request.price,
            request.amount,
            0.0,
            0.0,
            OrderStatus::New,
            0,
            "",
            vec![],
            None,
            data,
        ))
    }

    async fn cancel_order(&self, id: &str, symbol: Option<&str>) -> Result<Order, ExchangeError> {
        let venue_id = symbol.map(|s| self.venue_id(s)).unwrap_or_default();
        let body = serde_json::json!({ "symbol": venue_id, "orderId": id });
        let http = HttpRequestSpec {
            method: HttpMethod::Delete,
            url: format!("{BASE_URL}/api/v1/trade/order"),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(body.to_string().into_bytes().into()),
            timeout: Duration::from_secs(10),
        };
        let response = self.orchestrator.execute(http, Some(&self.signer), 1.0).await?;
        self.map_envelope(response.body)?;
        Ok(Order::new(
            id,
            None,
            symbol.unwrap_or_default(),
            OrderType::Limit,
            Side::Buy,
            None,
            0.0,
            0.0,
            0.0,
            OrderStatus::Canceled,
            0,
            "",
            vec![],
            None,
            Value::Null,
        ))
    }

    async fn cancel_all_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError> {
        let venue_id = symbol.map(|s| self.venue_id(s)).unwrap_or_default();
        let body = serde_json::json!({ "symbol": venue_id });
        let http = HttpRequestSpec {
            method: HttpMethod::Delete,
            url: format!("{BASE_URL}/api/v1/trade/allOrders"),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(body.to_string().into_bytes().into()),
            timeout: Duration::from_secs(10),
        };
        self.orchestrator.execute(http, Some(&self.signer), 1.0).await?;
        Ok(Vec::new())
    }

    async fn fetch_order(&self, id: &str, symbol: Option<&str>) -> Result<Order, ExchangeError> {
        let request = get(
            BASE_URL,
            "/api/v1/trade/order",
            &[("orderId", id.to_string())],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let data = self.map_envelope(response.body)?;
        Ok(parse_order(symbol.unwrap_or_default(), &data))
    }

    async fn fetch_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError> {
        let mut params = vec![];
        let venue_id;
        if let Some(sym) = symbol {
            venue_id = self.venue_id(sym);
            params.push(("symbol", venue_id));
        }
        let request = get(BASE_URL, "/api/v1/trade/openOrders", &params, Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let data = self.map_envelope(response.body)?;
        let rows = data.get("orders").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(rows
            .iter()
            .map(|row| parse_order(&self.unified_symbol(&safe_string(row, "symbol", "")), row))
            .collect())
    }

    async fn fetch_closed_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError> {
        let mut params = vec![("status", "FILLED".to_string())];
        let venue_id;
        if let Some(sym) = symbol {
            venue_id = self.venue_id(sym);
            params.push(("symbol", venue_id));
        }
        let request = get(BASE_URL, "/api/v1/trade/allOrders", &params, Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let data = self.map_envelope(response.body)?;
        let rows = data.get("orders").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(rows
            .iter()
            .map(|row| parse_order(&self.unified_symbol(&safe_string(row, "symbol", "")), row))
            .collect())
    }

    async fn fetch_my_trades(
        &self,
        symbol: Option<&str>,
        _since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<MyTrade>, ExchangeError> {
        let mut params = vec![];
        let venue_id;
        if let Some(sym) = symbol {
            venue_id = self.venue_id(sym);
            params.push(("symbol", venue_id));
        }
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        let request = get(BASE_URL, "/api/v1/trade/fills", &params, Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let data = self.map_envelope(response.body)?;
        let rows = data.get("fills").and_then(Value::as_array).cloned().unwrap_or_default();

        Ok(rows
            .iter()
            .map(|row| {
                let market_symbol = self.unified_symbol(&safe_string(row, "symbol", ""));
                let side = Side::from_str_loose(&safe_string_lower(row, "side", "buy")).unwrap_or(Side::Buy);
                let timestamp = safe_int(row, "timestamp", 0);
                MyTrade {
                    trade: Trade::new(
                        safe_string(row, "id", ""),
                        market_symbol,
                        safe_float(row, "price", 0.0),
                        safe_float(row, "size", 0.0),
                        side,
                        timestamp,
                        iso8601_from_millis(timestamp),
                        row.clone(),
                    ),
                    order_id: safe_string(row, "orderId", ""),
                    fee: safe_float_opt(row, "fee").map(|cost| xchange_model::trade::Fee {
                        cost,
                        currency: safe_string_opt(row, "feeCoin"),
                    }),
                    is_maker: None,
                }
            })
            .collect())
    }

    async fn fetch_balance(&self) -> Result<Balances, ExchangeError> {
        let request = get(BASE_URL, "/api/v1/account/balances", &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let data = self.map_envelope(response.body)?;
        let rows = data.get("balances").and_then(Value::as_array).cloned().unwrap_or_default();

        let mut currencies = HashMap::new();
        for row in &rows {
            let code = safe_string_upper(row, "coin", "");
            let free = safe_float(row, "free", 0.0);
            let frozen = safe_float(row, "frozen", 0.0);
            currencies.insert(code, CurrencyBalance::from_free_used(free, frozen));
        }

        Ok(Balances {
            currencies,
            info: Value::Array(rows),
            timestamp: 0,
            datetime: String::new(),
        })
    }

    async fn fetch_trading_fees(&self) -> Result<TradingFees, ExchangeError> {
        Err(ExchangeError::FeatureUnsupported {
            venue: VENUE,
            method: "fetch_trading_fees",
        })
    }

    async fn close_all_ws(&self) {}
}

fn parse_ticker(symbol: &str, data: &Value) -> Ticker {
    let timestamp = safe_int(data, "time", 0);
    Ticker {
        symbol: symbol.to_string(),
        last: safe_float_opt(data, "close"),
        bid: None,
        ask: None,
        bid_volume: None,
        ask_volume: None,
        high: safe_float_opt(data, "high"),
        low: safe_float_opt(data, "low"),
        open: safe_float_opt(data, "open"),
        close: safe_float_opt(data, "close"),
        volume: safe_float_opt(data, "volume"),
        quote_volume: None,
        change: None,
        percentage: None,
        vwap: None,
        timestamp,
        datetime: iso8601_from_millis(timestamp),
        info: data.clone(),
    }
    .with_derived_change()
}

fn parse_order(symbol: &str, body: &Value) -> Order {
    let amount = safe_float2(body, "size", "amount", 0.0);
    let filled = safe_float(body, "filledSize", 0.0);
    let cost = safe_float(body, "filledAmount", 0.0);
    let status_str = safe_string_upper(body, "status", "OPEN");
    let status = match status_str.as_str() {
        "FILLED" | "CLOSED" => OrderStatus::Filled,
        "CANCELED" | "CANCELLED" => OrderStatus::Canceled,
        "REJECTED" => OrderStatus::Rejected,
        _ if filled > 0.0 => OrderStatus::PartiallyFilled,
        _ => OrderStatus::New,
    };
    let side = Side::from_str_loose(&safe_string_lower(body, "side", "buy")).unwrap_or(Side::Buy);
    let order_type = if safe_string_upper(body, "type", "LIMIT") == "MARKET" {
        OrderType::Market
    } else {
        OrderType::Limit
    };
    let timestamp = safe_int(body, "createTime", 0);

    Order::new(
        safe_string(body, "orderId", ""),
        safe_string_opt(body, "clientOrderId"),
        symbol,
        order_type,
        side,
        safe_float_opt(body, "price"),
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

/// Filters out `SUBSCRIBED` acks and plain `PING` frames before an inbound WS message reaches
/// the normalization layer, and builds the `PONG` echo Pionex expects in reply (spec §9).
pub fn subscribe_message(topic: &str, symbol: &str) -> WsMessage {
    WsMessage::Text(
        serde_json::json!({
            "op": "SUBSCRIBE",
            "topic": topic,
            "symbol": symbol,
        })
        .to_string(),
    )
}

pub fn dispatch_frame(value: &Value) -> Option<&Value> {
    match safe_string(value, "op", "").as_str() {
        "SUBSCRIBED" | "PING" => None,
        _ => Some(value),
    }
}

pub fn pong_reply(value: &Value, clock: &dyn Clock) -> Option<WsMessage> {
    if safe_string(value, "op", "") != "PING" {
        return None;
    }
    Some(WsMessage::Text(
        serde_json::json!({ "op": "PONG", "timestamp": clock.now_unix_millis() }).to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_frame_drops_subscribed_ack_and_plain_ping() {
        let ack = serde_json::json!({"op": "SUBSCRIBED", "topic": "TRADE"});
        assert!(dispatch_frame(&ack).is_none());

        let ping = serde_json::json!({"op": "PING", "timestamp": 1});
        assert!(dispatch_frame(&ping).is_none());

        let data = serde_json::json!({"op": "TRADE", "symbol": "BTC_USDT"});
        assert!(dispatch_frame(&data).is_some());
    }

    #[test]
    fn pong_reply_echoes_server_ping_with_fresh_timestamp() {
        let clock = xchange_integration::clock::FixedClock(1_700_000_000_000);
        let ping = serde_json::json!({"op": "PING", "timestamp": 1});
        let reply = pong_reply(&ping, &clock).unwrap();
        let WsMessage::Text(text) = reply else { panic!("expected text frame") };
        assert!(text.contains("\"op\":\"PONG\""));
        assert!(text.contains("1700000000000"));
    }

    #[test]
    fn unified_symbol_falls_back_to_uppercase_when_index_is_empty() {
        let driver = PionexDriver::new(
            "key",
            "secret",
            Arc::new(xchange_integration::protocol::http::ReqwestTransport::new()),
            Arc::new(xchange_integration::clock::SystemClock),
        );
        assert_eq!(driver.unified_symbol("btc_usdt"), "BTC/USDT");
    }

    #[test]
    fn market_buy_uses_amount_field_market_sell_uses_size_field() {
        let mut buy_body = serde_json::json!({"symbol": "BTC_USDT", "side": "BUY", "type": "MARKET"});
        buy_body["amount"] = Value::String("50".to_string());
        assert!(buy_body.get("amount").is_some());
        assert!(buy_body.get("size").is_none());

        let mut sell_body = serde_json::json!({"symbol": "BTC_USDT", "side": "SELL", "type": "MARKET"});
        sell_body["size"] = Value::String("0.01".to_string());
        assert!(sell_body.get("size").is_some());
        assert!(sell_body.get("amount").is_none());
    }
}
