//! Kraken driver: two-step REST signing (spec §4.2), `XXBTZUSD`-style asset codes (spec §4.7),
//! and the Kraken v2 WebSocket channel protocol (spec §4.9).

use crate::capability::Capabilities;
use crate::exchange::{CreateOrderRequest, Exchange};
use crate::orchestrator::Orchestrator;
use crate::venue::common::{get, post, ErrorTable};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use xchange_instrument::fee::TradingFees;
use xchange_instrument::index::{MarketIndex, MarketSnapshot};
use xchange_instrument::market::Market;
use xchange_instrument::symbol::clean_kraken_currency;
use xchange_integration::clock::Clock;
use xchange_integration::coerce::*;
use xchange_integration::crypto::kraken_sign;
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

const VENUE: &str = "kraken";
const BASE_URL: &str = "https://api.kraken.com";

fn error_table() -> ErrorTable {
    ErrorTable::new(&[
        ("EAPI:Invalid key", "AuthenticationError"),
        ("EAPI:Invalid signature", "AuthenticationError"),
        ("EAPI:Invalid nonce", "AuthenticationError"),
        ("EGeneral:Permission denied", "AuthenticationError"),
        ("EGeneral:Invalid arguments", "BadRequest"),
        ("EQuery:Unknown asset pair", "BadSymbol"),
        ("EOrder:Unknown order", "OrderNotFound"),
        ("EOrder:Insufficient funds", "InsufficientFunds"),
        ("EOrder:Invalid", "InvalidOrder"),
        ("EAPI:Rate limit exceeded", "RateLimitExceeded"),
        ("EService:Unavailable", "ExchangeNotAvailable"),
        ("EService:Busy", "ExchangeNotAvailable"),
    ])
}

/// Kraken's two-step signer (spec §4.2, §4.4): form-encoded body carrying a microsecond nonce,
/// `API-Sign` computed over `path ‖ SHA256(nonce ‖ body)`.
#[derive(Debug)]
struct KrakenSigner {
    api_key: String,
    secret_b64: String,
    clock: Arc<dyn Clock>,
}

impl Signer for KrakenSigner {
    fn sign(&self, request: &HttpRequestSpec) -> Result<SignedRequest, xchange_integration::error::SocketError> {
        use xchange_integration::error::SocketError;

        let path = request
            .url
            .splitn(4, '/')
            .nth(3)
            .map(|rest| format!("/{rest}"))
            .unwrap_or_default();
        let path = path.split('?').next().unwrap_or(&path).to_string();

        let body = request
            .body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default();

        let nonce = self.clock.now_unix_micros().to_string();
        let body_with_nonce = if body.is_empty() {
            format!("nonce={nonce}")
        } else {
            format!("nonce={nonce}&{body}")
        };

        let signature = kraken_sign(&path, &nonce, &body_with_nonce, &self.secret_b64)
            .map_err(SocketError::Sign)?;

        Ok(SignedRequest {
            headers: vec![
                ("API-Key".to_string(), self.api_key.clone()),
                ("API-Sign".to_string(), signature),
            ],
            url_override: None,
            body_override: Some(body_with_nonce.into_bytes().into()),
        })
    }
}

pub struct KrakenDriver {
    orchestrator: Orchestrator,
    signer: KrakenSigner,
    markets: Arc<MarketIndex>,
    errors: ErrorTable,
}

impl std::fmt::Debug for KrakenDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KrakenDriver").finish()
    }
}

impl KrakenDriver {
    pub fn new(
        api_key: impl Into<String>,
        secret_b64: impl Into<String>,
        transport: Arc<dyn xchange_integration::protocol::http::HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rate_limiter = Arc::new(xchange_integration::ratelimit::RateLimiter::new(
            15.0,
            Duration::from_secs(1),
        ));
        Self {
            orchestrator: Orchestrator::new(VENUE, transport, rate_limiter, Duration::from_secs(10)),
            signer: KrakenSigner {
                api_key: api_key.into(),
                secret_b64: secret_b64.into(),
                clock,
            },
            markets: Arc::new(MarketIndex::new()),
            errors: error_table(),
        }
    }

    /// Scans the `error` array for the first matching known substring (spec §4.6).
    fn map_envelope(&self, body: &Value) -> Result<Value, ExchangeError> {
        if let Some(errors) = body.get("error").and_then(Value::as_array) {
            if let Some(first) = errors.first().and_then(Value::as_str) {
                return Err(self.errors.map_by_substring(VENUE, first));
            }
        }
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    fn unified_symbol(&self, venue_id: &str) -> String {
        let snapshot = self.markets.snapshot();
        if let Some(market) = snapshot.markets_by_id.get(venue_id) {
            return market.symbol.clone();
        }
        // Fallback: the pair wasn't in the loaded market set; clean Kraken's prefixed asset
        // codes and guess a 3+3/4+4 split like every other venue's fallback.
        let cleaned = clean_kraken_currency(venue_id);
        xchange_instrument::symbol::partition_by_length(&cleaned)
            .map(|(b, q)| format!("{b}/{q}"))
            .unwrap_or_else(|| venue_id.to_string())
    }

    fn venue_id(&self, symbol: &str) -> String {
        let snapshot = self.markets.snapshot();
        snapshot
            .markets
            .get(symbol)
            .map(|m| m.id.clone())
            .unwrap_or_else(|| symbol.replace('/', ""))
    }
}

#[async_trait]
impl Exchange for KrakenDriver {
    fn venue(&self) -> &'static str {
        VENUE
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            watch_ticker: true,
            watch_order_book: true,
            watch_trades: true,
            fetch_trading_fees: false,
            cancel_all_orders: true,
            fetch_closed_orders: true,
            ..Default::default()
        }
    }

    /// Scenario: §8.1 — a pair with `wsname` registers both its native id and `wsname` as
    /// alternate lookup keys; a pair with only `altname` registers that instead.
    async fn load_markets(&self, _reload: bool) -> Result<Arc<MarketSnapshot>, ExchangeError> {
        let request = get(BASE_URL, "/0/public/AssetPairs", &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let result = self.map_envelope(&response.body)?;

        let mut markets = Vec::new();
        let mut alt_ids: HashMap<String, Vec<String>> = HashMap::new();

        if let Value::Object(pairs) = result {
            for (venue_id, info) in pairs {
                let base_raw = safe_string(&info, "base", "");
                let quote_raw = safe_string(&info, "quote", "");
                let base = clean_kraken_currency(&base_raw);
                let quote = clean_kraken_currency(&quote_raw);

                let mut market = Market::new(venue_id.clone(), base, quote);
                market.precision.price = safe_int_opt(&info, "pair_decimals").map(|v| v as u32);
                market.precision.amount = safe_int_opt(&info, "lot_decimals").map(|v| v as u32);

                let mut registered = Vec::new();
                if let Some(wsname) = safe_string_opt(&info, "wsname") {
                    registered.push(wsname);
                } else if let Some(altname) = safe_string_opt(&info, "altname") {
                    registered.push(altname);
                }
                alt_ids.insert(venue_id, registered);
                markets.push(market);
            }
        }

        self.markets.publish(markets, |m| {
            alt_ids.get(&m.id).cloned().unwrap_or_default()
        });
        Ok(self.markets.snapshot())
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        let venue_id = self.venue_id(symbol);
        let request = get(
            BASE_URL,
            "/0/public/Ticker",
            &[("pair", venue_id.clone())],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let result = self.map_envelope(&response.body)?;
        let entry = result
            .get(&venue_id)
            .or_else(|| result.as_object().and_then(|o| o.values().next()))
            .cloned()
            .unwrap_or(Value::Null);

        Ok(parse_ticker(symbol, &entry))
    }

    async fn fetch_tickers(&self, symbols: &[String]) -> Result<HashMap<String, Ticker>, ExchangeError> {
        let mut out = HashMap::new();
        for symbol in symbols {
            if let Ok(ticker) = self.fetch_ticker(symbol).await {
                out.insert(symbol.clone(), ticker);
            }
        }
        Ok(out)
    }

    async fn fetch_order_book(&self, symbol: &str, limit: Option<usize>) -> Result<OrderBook, ExchangeError> {
        let venue_id = self.venue_id(symbol);
        let mut params = vec![("pair", venue_id.clone())];
        let count_str;
        if let Some(limit) = limit {
            count_str = limit.to_string();
            params.push(("count", count_str));
        }
        let request = get(BASE_URL, "/0/public/Depth", &params, Duration::from_secs(10));
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let result = self.map_envelope(&response.body)?;
        let entry = result
            .get(&venue_id)
            .or_else(|| result.as_object().and_then(|o| o.values().next()))
            .cloned()
            .unwrap_or(Value::Null);

        let to_levels = |key: &str| -> Vec<Level> {
            entry
                .get(key)
                .and_then(Value::as_array)
                .map(|rows| {
                    rows.iter()
                        .filter_map(|row| {
                            let row = row.as_array()?;
                            let price: f64 = row.first()?.as_str()?.parse().ok()?;
                            let size: f64 = row.get(1)?.as_str()?.parse().ok()?;
                            Some(Level { price, size })
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
            "/0/public/Trades",
            &[("pair", venue_id.clone())],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let result = self.map_envelope(&response.body)?;
        let rows = result
            .get(&venue_id)
            .or_else(|| result.as_object().and_then(|o| o.values().next()))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut trades: Vec<Trade> = rows
            .iter()
            .filter_map(|row| {
                let row = row.as_array()?;
                let price: f64 = row.first()?.as_str()?.parse().ok()?;
                let amount: f64 = row.get(1)?.as_str()?.parse().ok()?;
                let ts_secs = row.get(2)?.as_f64()?;
                let side = match row.get(3)?.as_str()? {
                    "b" => Side::Buy,
                    _ => Side::Sell,
                };
                let timestamp = (ts_secs * 1000.0) as i64;
                Some(Trade::new(
                    timestamp.to_string(),
                    symbol,
                    price,
                    amount,
                    side,
                    timestamp,
                    iso8601_from_millis(timestamp),
                    row.clone().into(),
                ))
            })
            .collect();

        if let Some(limit) = limit {
            trades.truncate(limit);
        }
        Ok(trades)
    }

    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let venue_id = self.venue_id(symbol);
        let interval = timeframe_to_minutes(timeframe).to_string();
        let mut params = vec![("pair", venue_id.clone()), ("interval", interval)];
        let since_str;
        if let Some(since) = since {
            since_str = (since / 1000).to_string();
            params.push(("since", since_str));
        }
        let request = get(BASE_URL, "/0/public/OHLC", &params, Duration::from_secs(10));
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let result = self.map_envelope(&response.body)?;
        let rows = result
            .get(&venue_id)
            .or_else(|| {
                result.as_object().and_then(|o| o.iter().find(|(k, _)| *k != "last").map(|(_, v)| v))
            })
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let candles: Vec<Candle> = rows
            .iter()
            .filter_map(|row| {
                let row = row.as_array()?;
                let timestamp_ms = (row.first()?.as_f64()? * 1000.0) as i64;
                Some(Candle {
                    timestamp_ms,
                    open: row.get(1)?.as_str()?.parse().ok()?,
                    high: row.get(2)?.as_str()?.parse().ok()?,
                    low: row.get(3)?.as_str()?.parse().ok()?,
                    close: row.get(4)?.as_str()?.parse().ok()?,
                    volume: row.get(6)?.as_str()?.parse().ok()?,
                })
            })
            .collect();

        Ok(normalize_candles(candles, limit))
    }

    async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, ExchangeError> {
        let venue_id = self.venue_id(&request.symbol);
        let mut params = vec![
            ("pair".to_string(), venue_id),
            ("type".to_string(), request.side.as_str().to_lowercase()),
            (
                "ordertype".to_string(),
                match request.order_type {
                    OrderType::Limit => "limit".to_string(),
                    OrderType::Market => "market".to_string(),
                    OrderType::Other => "market".to_string(),
                },
            ),
            ("volume".to_string(), request.amount.to_string()),
        ];
        if let Some(price) = request.price {
            params.push(("price".to_string(), price.to_string()));
        }

        let param_refs: Vec<(&str, String)> =
            params.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        let http = post(
            BASE_URL,
            "/0/private/AddOrder",
            &param_refs,
            BodyMode::FormUrlEncoded,
            Duration::from_secs(10),
        );
        let response = self
            .orchestrator
            .execute(http, Some(&self.signer), 1.0)
            .await?;
        let result = self.map_envelope(&response.body)?;
        let order_id = result
            .get("txid")
            .and_then(Value::as_array)
            .and_then(|a| a.first())
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Order::new(
            order_id,
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
            result,
        ))
    }

    async fn cancel_order(&self, id: &str, symbol: Option<&str>) -> Result<Order, ExchangeError> {
        let http = post(
            BASE_URL,
            "/0/private/CancelOrder",
            &[("txid", id.to_string())],
            BodyMode::FormUrlEncoded,
            Duration::from_secs(10),
        );
        let response = self
            .orchestrator
            .execute(http, Some(&self.signer), 1.0)
            .await?;
        self.map_envelope(&response.body)?;
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
        let http = post(
            BASE_URL,
            "/0/private/CancelAll",
            &[],
            BodyMode::FormUrlEncoded,
            Duration::from_secs(10),
        );
        self.orchestrator
            .execute(http, Some(&self.signer), 1.0)
            .await?;
        Ok(Vec::new())
    }

    async fn fetch_order(&self, id: &str, symbol: Option<&str>) -> Result<Order, ExchangeError> {
        let http = post(
            BASE_URL,
            "/0/private/QueryOrders",
            &[("txid", id.to_string())],
            BodyMode::FormUrlEncoded,
            Duration::from_secs(10),
        );
        let response = self
            .orchestrator
            .execute(http, Some(&self.signer), 1.0)
            .await?;
        let result = self.map_envelope(&response.body)?;
        let entry = result.get(id).cloned().unwrap_or(Value::Null);
        Ok(parse_order(id, symbol.unwrap_or_default(), &entry))
    }

    async fn fetch_open_orders(&self, _symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError> {
        let http = post(
            BASE_URL,
            "/0/private/OpenOrders",
            &[],
            BodyMode::FormUrlEncoded,
            Duration::from_secs(10),
        );
        let response = self
            .orchestrator
            .execute(http, Some(&self.signer), 1.0)
            .await?;
        let result = self.map_envelope(&response.body)?;
        Ok(parse_orders_map(&result, "open"))
    }

    async fn fetch_closed_orders(&self, _symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError> {
        let http = post(
            BASE_URL,
            "/0/private/ClosedOrders",
            &[],
            BodyMode::FormUrlEncoded,
            Duration::from_secs(10),
        );
        let response = self
            .orchestrator
            .execute(http, Some(&self.signer), 1.0)
            .await?;
        let result = self.map_envelope(&response.body)?;
        Ok(parse_orders_map(&result, "closed"))
    }

    async fn fetch_my_trades(
        &self,
        symbol: Option<&str>,
        _since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<MyTrade>, ExchangeError> {
        let http = post(
            BASE_URL,
            "/0/private/TradesHistory",
            &[],
            BodyMode::FormUrlEncoded,
            Duration::from_secs(10),
        );
        let response = self
            .orchestrator
            .execute(http, Some(&self.signer), 1.0)
            .await?;
        let result = self.map_envelope(&response.body)?;
        let mut trades: Vec<MyTrade> = result
            .get("trades")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .map(|(id, v)| parse_my_trade(id, symbol.unwrap_or_default(), v))
                    .collect()
            })
            .unwrap_or_default();
        if let Some(limit) = limit {
            trades.truncate(limit);
        }
        Ok(trades)
    }

    async fn fetch_balance(&self) -> Result<Balances, ExchangeError> {
        let http = post(
            BASE_URL,
            "/0/private/Balance",
            &[],
            BodyMode::FormUrlEncoded,
            Duration::from_secs(10),
        );
        let response = self
            .orchestrator
            .execute(http, Some(&self.signer), 1.0)
            .await?;
        let result = self.map_envelope(&response.body)?;
        let mut currencies = HashMap::new();
        if let Value::Object(map) = &result {
            for (code, amount) in map {
                let total: f64 = amount.as_str().and_then(|s| s.parse().ok()).unwrap_or(0.0);
                currencies.insert(
                    clean_kraken_currency(code).to_uppercase(),
                    CurrencyBalance::from_total(total, total),
                );
            }
        }
        Ok(Balances {
            currencies,
            info: result,
            timestamp: 0,
            datetime: String::new(),
        })
    }

    async fn fetch_trading_fees(&self) -> Result<TradingFees, ExchangeError> {
        Err(ExchangeError::FeatureUnsupported {
            venue: VENUE,
            method: "fetchTradingFees",
        })
    }

    async fn close_all_ws(&self) {}
}

fn timeframe_to_minutes(timeframe: &str) -> u32 {
    match timeframe {
        "1m" => 1,
        "5m" => 5,
        "15m" => 15,
        "30m" => 30,
        "1h" => 60,
        "4h" => 240,
        "1d" => 1440,
        "1w" => 10080,
        _ => 1,
    }
}

fn parse_ticker(symbol: &str, entry: &Value) -> Ticker {
    let array_str = |key: &str, idx: usize| -> Option<f64> {
        entry
            .get(key)
            .and_then(Value::as_array)
            .and_then(|a| a.get(idx))
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    };

    Ticker {
        symbol: symbol.to_string(),
        last: array_str("c", 0),
        bid: array_str("b", 0),
        ask: array_str("a", 0),
        bid_volume: array_str("b", 2),
        ask_volume: array_str("a", 2),
        high: array_str("h", 1),
        low: array_str("l", 1),
        open: array_str("o", 0).or_else(|| entry.get("o").and_then(Value::as_str).and_then(|s| s.parse().ok())),
        close: array_str("c", 0),
        volume: array_str("v", 1),
        quote_volume: None,
        change: None,
        percentage: None,
        vwap: array_str("p", 1),
        timestamp: 0,
        datetime: String::new(),
        info: entry.clone(),
    }
    .with_derived_change()
}

fn parse_order(id: &str, symbol: &str, entry: &Value) -> Order {
    let amount = safe_float(entry, "vol", 0.0);
    let filled = safe_float(entry, "vol_exec", 0.0);
    let cost = safe_float(entry, "cost", 0.0);
    let status = match safe_string(entry, "status", "").as_str() {
        "open" => OrderStatus::New,
        "closed" => OrderStatus::Filled,
        "canceled" => OrderStatus::Canceled,
        "expired" => OrderStatus::Expired,
        _ if filled > 0.0 && filled < amount => OrderStatus::PartiallyFilled,
        _ => OrderStatus::Rejected,
    };
    let descr = entry.get("descr").cloned().unwrap_or(Value::Null);
    let side = match safe_string(&descr, "type", "buy").as_str() {
        "sell" => Side::Sell,
        _ => Side::Buy,
    };
    let order_type = match safe_string(&descr, "ordertype", "limit").as_str() {
        "market" => OrderType::Market,
        "limit" => OrderType::Limit,
        _ => OrderType::Other,
    };
    let price = safe_float_opt(&descr, "price");
    let timestamp = (safe_float(entry, "opentm", 0.0) * 1000.0) as i64;

    Order::new(
        id,
        None,
        symbol,
        order_type,
        side,
        price,
        amount,
        filled,
        cost,
        status,
        timestamp,
        iso8601_from_millis(timestamp),
        vec![],
        None,
        entry.clone(),
    )
}

fn parse_orders_map(result: &Value, key: &str) -> Vec<Order> {
    result
        .get(key)
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .map(|(id, v)| {
                    let symbol = v
                        .get("descr")
                        .and_then(|d| d.get("pair"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    parse_order(id, &symbol, v)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_my_trade(id: &str, symbol: &str, entry: &Value) -> MyTrade {
    let price = safe_float(entry, "price", 0.0);
    let amount = safe_float(entry, "vol", 0.0);
    let side = match safe_string(entry, "type", "buy").as_str() {
        "sell" => Side::Sell,
        _ => Side::Buy,
    };
    let timestamp = (safe_float(entry, "time", 0.0) * 1000.0) as i64;
    let order_id = safe_string(entry, "ordertxid", "");
    let fee_cost = safe_float_opt(entry, "fee");

    MyTrade {
        trade: Trade::new(
            id,
            symbol,
            price,
            amount,
            side,
            timestamp,
            iso8601_from_millis(timestamp),
            entry.clone(),
        ),
        order_id,
        fee: fee_cost.map(|cost| xchange_model::trade::Fee { cost, currency: None }),
        is_maker: None,
    }
}

static KRAKEN_WS_REQ_ID: AtomicI64 = AtomicI64::new(1);

/// Kraken v2 WS subscribe dialect (spec §4.9).
pub fn subscribe_message(channel: &str, symbols: &[String]) -> WsMessage {
    let id = KRAKEN_WS_REQ_ID.fetch_add(1, Ordering::SeqCst);
    WsMessage::Text(
        serde_json::json!({
            "method": "subscribe",
            "params": {"channel": channel, "symbol": symbols},
            "req_id": id,
        })
        .to_string(),
    )
}

/// Extracts the dispatch key (`channel` field) from an inbound decoded payload.
pub fn dispatch_channel(value: &Value) -> Option<&str> {
    value.get("channel").and_then(Value::as_str)
}

pub fn is_heartbeat(value: &Value) -> bool {
    dispatch_channel(value) == Some("heartbeat")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_change_and_percentage_are_derived() {
        let entry = serde_json::json!({"c": ["110.0", "1"], "o": "100.0", "h": ["0","120"], "l": ["0","90"], "v": ["0","5"]});
        let ticker = parse_ticker("BTC/USD", &entry);
        assert_eq!(ticker.last, Some(110.0));
        assert_eq!(ticker.change, Some(10.0));
        assert_eq!(ticker.percentage, Some(10.0));
    }

    #[test]
    fn subscribe_message_carries_channel_and_symbols() {
        let msg = subscribe_message("ticker", &["BTC/USD".to_string()]);
        match msg {
            WsMessage::Text(text) => {
                assert!(text.contains("\"channel\":\"ticker\""));
                assert!(text.contains("BTC/USD"));
            }
            _ => panic!("expected text message"),
        }
    }

    #[test]
    fn dispatch_channel_reads_channel_field() {
        let value = serde_json::json!({"channel": "ticker"});
        assert_eq!(dispatch_channel(&value), Some("ticker"));
    }
}
