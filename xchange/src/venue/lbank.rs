//! LBank driver: two-step MD5-then-HMAC signing (spec §4.4) and the `{result, data, error_code}`
//! envelope (spec §4.6).

use crate::capability::Capabilities;
use crate::exchange::{CreateOrderRequest, Exchange};
use crate::orchestrator::Orchestrator;
use crate::venue::common::{get, post, ErrorTable};
use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use xchange_instrument::fee::TradingFees;
use xchange_instrument::index::{MarketIndex, MarketSnapshot};
use xchange_instrument::market::Market;
use xchange_integration::clock::Clock;
use xchange_integration::coerce::*;
use xchange_integration::crypto::{hmac_sha256_hex, md5_upper_hex};
use xchange_integration::protocol::http::{BodyMode, HttpRequestSpec, SignedRequest, Signer};
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

const VENUE: &str = "lbank";
const BASE_URL: &str = "https://api.lbkex.com";

fn error_table() -> ErrorTable {
    ErrorTable::new(&[
        ("10001", "BadRequest"),
        ("10002", "AuthenticationError"),
        ("10004", "RateLimitExceeded"),
        ("10007", "AuthenticationError"),
        ("10009", "OrderNotFound"),
        ("10013", "InsufficientFunds"),
        ("10014", "InvalidOrder"),
        ("10016", "InsufficientFunds"),
        ("10020", "BadSymbol"),
    ])
}

/// Generates a 32-character alphanumeric `echostr` (spec §4.4).
pub fn random_echostr() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..32)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

/// The core two-step LBank signature (spec §4.4): alphabetize `k=v&...` unencoded, MD5 uppercase
/// hex that, then HMAC-SHA256 hex the digest with the secret. A free function so the exact
/// wire-format transform is directly testable without a real `echostr`/clock.
pub fn lbank_signature(params: &[(&str, String)], secret: &str) -> String {
    let raw = xchange_integration::coerce::build_raw_query(params);
    let digest = md5_upper_hex(&raw);
    hmac_sha256_hex(&digest, secret)
}

#[derive(Debug)]
struct LbankSigner {
    api_key: String,
    secret: String,
    clock: Arc<dyn Clock>,
}

impl Signer for LbankSigner {
    fn sign(&self, request: &HttpRequestSpec) -> Result<SignedRequest, xchange_integration::error::SocketError> {
        let timestamp = self.clock.now_unix_millis().to_string();
        let echostr = random_echostr();

        let mut pairs: Vec<(String, String)> = vec![
            ("api_key".to_string(), self.api_key.clone()),
            ("timestamp".to_string(), timestamp.clone()),
            ("echostr".to_string(), echostr.clone()),
            ("signature_method".to_string(), "HmacSHA256".to_string()),
        ];

        if let Some(body) = &request.body {
            let body_str = String::from_utf8_lossy(body);
            pairs.extend(
                body_str
                    .split('&')
                    .filter(|s| !s.is_empty())
                    .filter_map(|kv| kv.split_once('=').map(|(k, v)| (k.to_string(), v.to_string()))),
            );
        }

        let mut sorted = pairs.clone();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        let refs: Vec<(&str, String)> = sorted.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        let sign = lbank_signature(&refs, &self.secret);

        pairs.push(("sign".to_string(), sign));
        let body = xchange_integration::coerce::build_raw_query(
            &pairs.iter().map(|(k, v)| (k.as_str(), v.clone())).collect::<Vec<_>>(),
        );

        Ok(SignedRequest {
            headers: vec![
                ("timestamp".to_string(), timestamp),
                ("signature_method".to_string(), "HmacSHA256".to_string()),
                ("echostr".to_string(), echostr),
            ],
            url_override: None,
            body_override: Some(body.into_bytes().into()),
        })
    }
}

pub struct LbankDriver {
    orchestrator: Orchestrator,
    signer: LbankSigner,
    markets: Arc<MarketIndex>,
    errors: ErrorTable,
}

impl std::fmt::Debug for LbankDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LbankDriver").finish()
    }
}

impl LbankDriver {
    pub fn new(
        api_key: impl Into<String>,
        secret: impl Into<String>,
        transport: Arc<dyn xchange_integration::protocol::http::HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rate_limiter = Arc::new(xchange_integration::ratelimit::RateLimiter::new(
            200.0,
            Duration::from_secs(10),
        ));
        Self {
            orchestrator: Orchestrator::new(VENUE, transport, rate_limiter, Duration::from_secs(10)),
            signer: LbankSigner { api_key: api_key.into(), secret: secret.into(), clock },
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
            .unwrap_or_else(|| symbol.replace('/', "_").to_lowercase())
    }

    fn unified_symbol(&self, venue_id: &str) -> String {
        let snapshot = self.markets.snapshot();
        if let Some(market) = snapshot.markets_by_id.get(venue_id) {
            return market.symbol.clone();
        }
        xchange_instrument::symbol::split_by_separator(venue_id, "_")
            .map(|(b, q)| format!("{b}/{q}"))
            .unwrap_or_else(|| venue_id.to_string())
    }

    /// LBank's envelope (spec §4.6): `result === "false"` on failure, mapping `error_code`.
    fn map_envelope(&self, body: Value) -> Result<Value, ExchangeError> {
        if safe_string(&body, "result", "true") == "false" {
            let code = safe_string(&body, "error_code", "");
            return Err(self.errors.map(VENUE, &code, format!("error_code {code}")));
        }
        Ok(body.get("data").cloned().unwrap_or(body))
    }
}

#[async_trait]
impl Exchange for LbankDriver {
    fn venue(&self) -> &'static str {
        VENUE
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            watch_ticker: true,
            watch_order_book: true,
            watch_trades: true,
            fetch_trading_fees: false,
            fetch_closed_orders: true,
            ..Default::default()
        }
    }

    async fn load_markets(&self, _reload: bool) -> Result<Arc<MarketSnapshot>, ExchangeError> {
        let request = get(BASE_URL, "/v2/currencyPairs.do", &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let rows = self.map_envelope(response.body)?;
        let rows: Vec<String> = rows
            .as_array()
            .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let markets = rows
            .iter()
            .filter_map(|id| {
                let (base, quote) = xchange_instrument::symbol::split_by_separator(id, "_")?;
                Some(Market::new(id.clone(), base, quote))
            })
            .collect();

        self.markets.publish(markets, |_| vec![]);
        Ok(self.markets.snapshot())
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        let venue_id = self.venue_id(symbol);
        let request = get(
            BASE_URL,
            "/v2/ticker/24hr.do",
            &[("symbol", venue_id)],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let body = self.map_envelope(response.body)?;
        let row = body.as_array().and_then(|a| a.first()).cloned().unwrap_or(Value::Null);
        Ok(parse_ticker(symbol, &row))
    }

    async fn fetch_tickers(&self, symbols: &[String]) -> Result<HashMap<String, Ticker>, ExchangeError> {
        let mut out = HashMap::new();
        for symbol in symbols {
            if let Ok(ticker) = self.fetch_ticker(symbol).await {
                out.insert(symbol.clone(), ticker);
            } else {
                tracing::warn!(venue = VENUE, symbol = %symbol, "fetch_tickers: skipping symbol after error");
            }
        }
        Ok(out)
    }

    async fn fetch_order_book(&self, symbol: &str, limit: Option<usize>) -> Result<OrderBook, ExchangeError> {
        let venue_id = self.venue_id(symbol);
        let request = get(
            BASE_URL,
            "/v2/depth.do",
            &[("symbol", venue_id), ("size", limit.unwrap_or(60).to_string())],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let body = self.map_envelope(response.body)?;

        let to_levels = |key: &str| -> Vec<Level> {
            body.get(key)
                .and_then(Value::as_array)
                .map(|rows| {
                    rows.iter()
                        .filter_map(|row| {
                            let row = row.as_array()?;
                            Some(Level { price: row.first()?.as_f64()?, size: row.get(1)?.as_f64()? })
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        Ok(OrderBook {
            symbol: symbol.to_string(),
            bids: to_levels("bids"),
            asks: to_levels("asks"),
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
        let request = get(
            BASE_URL,
            "/v2/trades.do",
            &[("symbol", venue_id), ("size", limit.unwrap_or(100).to_string())],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let rows = self.map_envelope(response.body)?;
        let rows = rows.as_array().cloned().unwrap_or_default();

        Ok(rows
            .iter()
            .map(|row| {
                let side = Side::from_numeric_type(safe_int(row, "type", 0));
                let timestamp = safe_int(row, "date_ms", 0);
                Trade::new(
                    safe_string(row, "tid", ""),
                    symbol,
                    safe_float(row, "price", 0.0),
                    safe_float(row, "amount", 0.0),
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
        let time = since.unwrap_or(0) / 1000;
        let request = get(
            BASE_URL,
            "/v2/kline.do",
            &[
                ("symbol", venue_id),
                ("type", timeframe.to_string()),
                ("size", limit.unwrap_or(100).to_string()),
                ("time", time.to_string()),
            ],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let rows = self.map_envelope(response.body)?;
        let rows = rows.as_array().cloned().unwrap_or_default();

        let candles: Vec<Candle> = rows
            .iter()
            .filter_map(|row| {
                let row = row.as_array()?;
                Some(Candle {
                    timestamp_ms: row.first()?.as_i64()? * 1000,
                    open: row.get(1)?.as_f64()?,
                    high: row.get(2)?.as_f64()?,
                    low: row.get(3)?.as_f64()?,
                    close: row.get(4)?.as_f64()?,
                    volume: row.get(5)?.as_f64()?,
                })
            })
            .collect();

        Ok(normalize_candles(candles, limit))
    }

    async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, ExchangeError> {
        let venue_id = self.venue_id(&request.symbol);
        let order_type = match (request.order_type, request.side) {
            (OrderType::Limit, Side::Buy) => "buy",
            (OrderType::Limit, Side::Sell) => "sell",
            (_, Side::Buy) => "buy_market",
            (_, Side::Sell) => "sell_market",
        };

        let mut params = vec![
            ("symbol".to_string(), venue_id),
            ("type".to_string(), order_type.to_string()),
            ("amount".to_string(), request.amount.to_string()),
        ];
        if let Some(price) = request.price {
            params.push(("price".to_string(), price.to_string()));
        }

        let refs: Vec<(&str, String)> = params.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        let http = post(BASE_URL, "/v2/create_order.do", &refs, BodyMode::FormUrlEncoded, Duration::from_secs(10));
        let response = self.orchestrator.execute(http, Some(&self.signer), 1.0).await?;
        let body = self.map_envelope(response.body)?;

        Ok(Order::new(
            safe_string(&body, "order_id", ""),
            None,
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
            body,
        ))
    }

    async fn cancel_order(&self, id: &str, symbol: Option<&str>) -> Result<Order, ExchangeError> {
        let venue_id = symbol.map(|s| self.venue_id(s)).unwrap_or_default();
        let http = post(
            BASE_URL,
            "/v2/cancel_order.do",
            &[("symbol", venue_id), ("order_id", id.to_string())],
            BodyMode::FormUrlEncoded,
            Duration::from_secs(10),
        );
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

    async fn cancel_all_orders(&self, _symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError> {
        Err(ExchangeError::FeatureUnsupported { venue: VENUE, method: "cancelAllOrders" })
    }

    async fn fetch_order(&self, id: &str, symbol: Option<&str>) -> Result<Order, ExchangeError> {
        let venue_id = symbol.map(|s| self.venue_id(s)).unwrap_or_default();
        let http = post(
            BASE_URL,
            "/v2/orders_info.do",
            &[("symbol", venue_id), ("order_id", id.to_string())],
            BodyMode::FormUrlEncoded,
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(http, Some(&self.signer), 1.0).await?;
        let body = self.map_envelope(response.body)?;
        let row = body.as_array().and_then(|a| a.first()).cloned().unwrap_or(body);
        Ok(parse_order(symbol.unwrap_or_default(), &row))
    }

    async fn fetch_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError> {
        let venue_id = symbol.map(|s| self.venue_id(s)).unwrap_or_default();
        let http = post(
            BASE_URL,
            "/v2/orders_info_no_deal.do",
            &[("symbol", venue_id), ("current_page", "1".to_string()), ("page_length", "200".to_string())],
            BodyMode::FormUrlEncoded,
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(http, Some(&self.signer), 1.0).await?;
        let body = self.map_envelope(response.body)?;
        let rows = body.get("orders").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(rows.iter().map(|row| parse_order(symbol.unwrap_or_default(), row)).collect())
    }

    async fn fetch_closed_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError> {
        let venue_id = symbol.map(|s| self.venue_id(s)).unwrap_or_default();
        let http = post(
            BASE_URL,
            "/v2/orders_info_history.do",
            &[("symbol", venue_id), ("current_page", "1".to_string()), ("page_length", "200".to_string())],
            BodyMode::FormUrlEncoded,
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(http, Some(&self.signer), 1.0).await?;
        let body = self.map_envelope(response.body)?;
        let rows = body.get("orders").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(rows.iter().map(|row| parse_order(symbol.unwrap_or_default(), row)).collect())
    }

    async fn fetch_my_trades(
        &self,
        symbol: Option<&str>,
        _since: Option<i64>,
        _limit: Option<usize>,
    ) -> Result<Vec<MyTrade>, ExchangeError> {
        let orders = self.fetch_closed_orders(symbol).await?;
        Ok(orders
            .into_iter()
            .filter(|o| o.filled > 0.0)
            .map(|o| MyTrade {
                order_id: o.id.clone(),
                fee: o.fee.clone(),
                is_maker: None,
                trade: Trade::new(
                    o.id,
                    o.symbol,
                    o.average,
                    o.filled,
                    o.side,
                    o.timestamp,
                    o.datetime,
                    o.info,
                ),
            })
            .collect())
    }

    async fn fetch_balance(&self) -> Result<Balances, ExchangeError> {
        let http = post(BASE_URL, "/v2/user_info.do", &[], BodyMode::FormUrlEncoded, Duration::from_secs(10));
        let response = self.orchestrator.execute(http, Some(&self.signer), 1.0).await?;
        let body = self.map_envelope(response.body)?;

        let mut currencies = HashMap::new();
        if let Some(free_map) = body.get("free").and_then(Value::as_object) {
            for (code, free) in free_map {
                let free_val: f64 = free.as_str().and_then(|s| s.parse().ok()).unwrap_or(0.0);
                let used_val = body
                    .get("freeze")
                    .and_then(|f| f.get(code))
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.0);
                currencies.insert(code.to_uppercase(), CurrencyBalance::from_free_used(free_val, used_val));
            }
        }

        Ok(Balances { currencies, info: body, timestamp: 0, datetime: String::new() })
    }

    async fn fetch_trading_fees(&self) -> Result<TradingFees, ExchangeError> {
        Err(ExchangeError::FeatureUnsupported { venue: VENUE, method: "fetchTradingFees" })
    }

    async fn close_all_ws(&self) {}
}

fn parse_ticker(symbol: &str, row: &Value) -> Ticker {
    let ticker_data = row.get("ticker").unwrap_or(row);
    Ticker {
        symbol: symbol.to_string(),
        last: safe_float_opt(ticker_data, "latest"),
        bid: None,
        ask: None,
        bid_volume: None,
        ask_volume: None,
        high: safe_float_opt(ticker_data, "high"),
        low: safe_float_opt(ticker_data, "low"),
        open: None,
        close: safe_float_opt(ticker_data, "latest"),
        volume: safe_float_opt(ticker_data, "vol"),
        quote_volume: safe_float_opt(ticker_data, "turnover"),
        change: safe_float_opt(ticker_data, "change"),
        percentage: None,
        vwap: None,
        timestamp: safe_int(row, "timestamp", 0),
        datetime: iso8601_from_millis(safe_int(row, "timestamp", 0)),
        info: row.clone(),
    }
}

fn parse_order(symbol: &str, body: &Value) -> Order {
    let amount = safe_float(body, "amount", 0.0);
    let filled = safe_float(body, "deal_amount", 0.0);
    let cost = safe_float(body, "deal_money", 0.0);
    let status = match safe_int(body, "status", -1) {
        0 => OrderStatus::New,
        1 => OrderStatus::PartiallyFilled,
        2 => OrderStatus::Filled,
        4 | -1 => OrderStatus::Canceled,
        _ => OrderStatus::New,
    };
    let side = if safe_string(body, "type", "buy").contains("sell") { Side::Sell } else { Side::Buy };
    let order_type = if safe_string(body, "type", "").contains("market") { OrderType::Market } else { OrderType::Limit };
    let timestamp = safe_int(body, "create_time", 0);

    Order::new(
        safe_string(body, "order_id", ""),
        None,
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

/// LBank subscribe frame (spec §4.9 table). Ping frames are handled separately: the server's
/// `{action:"ping", ping:uuid}` is echoed back verbatim, not re-derived.
pub fn subscribe_message(channel: &str, pair: &str) -> WsMessage {
    WsMessage::Text(
        serde_json::json!({"action": "subscribe", "subscribe": channel, "pair": pair}).to_string(),
    )
}

pub fn echo_ping(value: &Value) -> Option<WsMessage> {
    if safe_string(value, "action", "") == "ping" {
        Some(WsMessage::Text(value.to_string()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_echostr_is_32_alphanumeric_chars() {
        let echostr = random_echostr();
        assert_eq!(echostr.len(), 32);
        assert!(echostr.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn lbank_signature_is_deterministic_for_fixed_params() {
        let params = vec![("api_key", "K".to_string()), ("amount", "1".to_string())];
        let a = lbank_signature(&params, "S");
        let b = lbank_signature(&params, "S");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn echo_ping_passes_through_server_payload_verbatim() {
        let ping = serde_json::json!({"action": "ping", "ping": "abc-123"});
        match echo_ping(&ping) {
            Some(WsMessage::Text(text)) => assert!(text.contains("abc-123")),
            _ => panic!("expected ping to be echoed"),
        }
    }

    #[test]
    fn parse_order_detects_sell_and_market_from_type_string() {
        let body = serde_json::json!({
            "order_id": "1", "type": "sell_market", "amount": "2", "deal_amount": "2",
            "deal_money": "200", "status": 2, "create_time": 0
        });
        let order = parse_order("BTC/USDT", &body);
        assert_eq!(order.side, Side::Sell);
        assert_eq!(order.order_type, OrderType::Market);
    }
}
