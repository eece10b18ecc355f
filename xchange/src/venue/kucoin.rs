//! KuCoin v2 driver: `prehash` HMAC-SHA256 signing with an HMAC'd passphrase (spec §4.4), the
//! `{code, data, msg}` envelope (spec §4.6), and the non-standard OHLCV column order (spec §4.8).

use crate::capability::Capabilities;
use crate::exchange::{CreateOrderRequest, Exchange};
use crate::orchestrator::Orchestrator;
use crate::venue::common::{get, post_json, ErrorTable};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use xchange_instrument::fee::TradingFees;
use xchange_instrument::index::{MarketIndex, MarketSnapshot};
use xchange_instrument::market::Market;
use xchange_integration::clock::Clock;
use xchange_integration::coerce::*;
use xchange_integration::crypto::hmac_sha256_base64;
use xchange_integration::protocol::http::{HttpRequestSpec, SignedRequest, Signer};
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

const VENUE: &str = "kucoin";
const BASE_URL: &str = "https://api.kucoin.com";

fn error_table() -> ErrorTable {
    ErrorTable::new(&[
        ("400001", "AuthenticationError"),
        ("400002", "AuthenticationError"),
        ("400003", "AuthenticationError"),
        ("400004", "AuthenticationError"),
        ("400100", "BadRequest"),
        ("400200", "InsufficientFunds"),
        ("400400", "InvalidOrder"),
        ("400500", "OrderNotFound"),
        ("429000", "RateLimitExceeded"),
    ])
}

#[derive(Debug)]
struct KucoinSigner {
    api_key: String,
    secret: String,
    passphrase: String,
    clock: Arc<dyn Clock>,
}

impl Signer for KucoinSigner {
    fn sign(&self, request: &HttpRequestSpec) -> Result<SignedRequest, xchange_integration::error::SocketError> {
        let timestamp = self.clock.now_unix_millis().to_string();
        let (path, query) = request.url.split_once('?').unwrap_or((&request.url, ""));
        let request_path = if query.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{query}")
        };
        let body = request
            .body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default();

        let prehash = format!("{timestamp}{}{request_path}{body}", request.method.as_str());
        let signature = hmac_sha256_base64(&prehash, &self.secret);
        let signed_passphrase = hmac_sha256_base64(&self.passphrase, &self.secret);

        Ok(SignedRequest {
            headers: vec![
                ("KC-API-KEY".to_string(), self.api_key.clone()),
                ("KC-API-SIGN".to_string(), signature),
                ("KC-API-TIMESTAMP".to_string(), timestamp),
                ("KC-API-PASSPHRASE".to_string(), signed_passphrase),
                ("KC-API-KEY-VERSION".to_string(), "2".to_string()),
            ],
            url_override: None,
            body_override: None,
        })
    }
}

pub struct KucoinDriver {
    orchestrator: Orchestrator,
    signer: KucoinSigner,
    markets: Arc<MarketIndex>,
    errors: ErrorTable,
}

impl std::fmt::Debug for KucoinDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KucoinDriver").finish()
    }
}

impl KucoinDriver {
    pub fn new(
        api_key: impl Into<String>,
        secret: impl Into<String>,
        passphrase: impl Into<String>,
        transport: Arc<dyn xchange_integration::protocol::http::HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rate_limiter = Arc::new(xchange_integration::ratelimit::RateLimiter::new(
            180.0,
            Duration::from_secs(3),
        ));
        Self {
            orchestrator: Orchestrator::new(VENUE, transport, rate_limiter, Duration::from_secs(10)),
            signer: KucoinSigner {
                api_key: api_key.into(),
                secret: secret.into(),
                passphrase: passphrase.into(),
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

    /// KuCoin's envelope (spec §4.6): `code !== "200000"` maps `code`; success returns `data`.
    fn map_envelope(&self, body: Value) -> Result<Value, ExchangeError> {
        let code = safe_string(&body, "code", "");
        if code != "200000" {
            let message = safe_string(&body, "msg", "");
            return Err(self.errors.map(VENUE, &code, message));
        }
        Ok(body.get("data").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl Exchange for KucoinDriver {
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
            cancel_all_orders: true,
            fetch_closed_orders: true,
            ..Default::default()
        }
    }

    async fn load_markets(&self, _reload: bool) -> Result<Arc<MarketSnapshot>, ExchangeError> {
        let request = get(BASE_URL, "/api/v2/symbols", &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let data = self.map_envelope(response.body)?;
        let rows = data.as_array().cloned().unwrap_or_default();

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
                market.active = safe_bool(row, "enableTrading", true);
                market.step_size = safe_float_opt(row, "baseIncrement");
                market.tick_size = safe_float_opt(row, "priceIncrement");
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
            "/api/v1/market/stats",
            &[("symbol", venue_id)],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let data = self.map_envelope(response.body)?;
        Ok(parse_ticker(symbol, &data))
    }

    async fn fetch_tickers(&self, symbols: &[String]) -> Result<HashMap<String, Ticker>, ExchangeError> {
        let request = get(BASE_URL, "/api/v1/market/allTickers", &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, None, symbols.len().max(1) as f64).await?;
        let data = self.map_envelope(response.body)?;
        let rows = data.get("ticker").and_then(Value::as_array).cloned().unwrap_or_default();
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
        let request = get(
            BASE_URL,
            "/api/v1/market/orderbook/level2_100",
            &[("symbol", venue_id)],
            Duration::from_secs(10),
        );
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

        Ok(OrderBook {
            symbol: symbol.to_string(),
            bids: to_levels("bids"),
            asks: to_levels("asks"),
            timestamp: safe_int(&data, "time", 0),
            datetime: iso8601_from_millis(safe_int(&data, "time", 0)),
            nonce: safe_int_opt(&data, "sequence").map(|v| v as u64),
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
            "/api/v1/market/histories",
            &[("symbol", venue_id)],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let data = self.map_envelope(response.body)?;
        let mut rows = data.as_array().cloned().unwrap_or_default();
        if let Some(limit) = limit {
            rows.truncate(limit);
        }

        Ok(rows
            .iter()
            .map(|row| {
                let side = Side::from_str_loose(&safe_string(row, "side", "buy")).unwrap_or(Side::Buy);
                let timestamp = safe_int(row, "time", 0) / 1_000_000;
                Trade::new(
                    safe_string(row, "sequence", ""),
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

    /// KuCoin returns `[time, open, close, high, low, volume, turnover]`, newest first (spec
    /// §4.8): reshape to OHLC via indices `1, 3, 4, 2` and reverse into chronological order.
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let venue_id = self.venue_id(symbol);
        let mut params = vec![("symbol", venue_id), ("type", timeframe.to_string())];
        let since_str;
        if let Some(since) = since {
            since_str = (since / 1000).to_string();
            params.push(("startAt", since_str));
        }
        let request = get(BASE_URL, "/api/v1/market/candles", &params, Duration::from_secs(10));
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let data = self.map_envelope(response.body)?;
        let rows = data.as_array().cloned().unwrap_or_default();

        let candles: Vec<Candle> = rows
            .iter()
            .filter_map(|row| {
                let row = row.as_array()?;
                Some(Candle {
                    timestamp_ms: row.first()?.as_str()?.parse::<i64>().ok()? * 1000,
                    open: row.get(1)?.as_str()?.parse().ok()?,
                    close: row.get(2)?.as_str()?.parse().ok()?,
                    high: row.get(3)?.as_str()?.parse().ok()?,
                    low: row.get(4)?.as_str()?.parse().ok()?,
                    volume: row.get(5)?.as_str()?.parse().ok()?,
                })
            })
            .collect();

        Ok(normalize_candles(candles, limit))
    }

    async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, ExchangeError> {
        let venue_id = self.venue_id(&request.symbol);
        let mut body = serde_json::json!({
            "clientOid": Uuid::new_v4().to_string(),
            "symbol": venue_id,
            "side": if request.side == Side::Buy { "buy" } else { "sell" },
            "type": if request.order_type == OrderType::Market { "market" } else { "limit" },
            "size": request.amount.to_string(),
        });
        if let Some(price) = request.price {
            body["price"] = Value::String(price.to_string());
        }

        let http = post_json(BASE_URL, "/api/v1/orders", body, Duration::from_secs(10));
        let response = self.orchestrator.execute(http, Some(&self.signer), 1.0).await?;
        let data = self.map_envelope(response.body)?;

        Ok(Order::new(
            safe_string(&data, "orderId", ""),
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
            data,
        ))
    }

    async fn cancel_order(&self, id: &str, symbol: Option<&str>) -> Result<Order, ExchangeError> {
        let http = HttpRequestSpec {
            method: xchange_integration::protocol::http::HttpMethod::Delete,
            url: format!("{BASE_URL}/api/v1/orders/{id}"),
            headers: Vec::new(),
            body: None,
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
        let path = match symbol {
            Some(sym) => format!("/api/v1/orders?symbol={}", self.venue_id(sym)),
            None => "/api/v1/orders".to_string(),
        };
        let http = HttpRequestSpec {
            method: xchange_integration::protocol::http::HttpMethod::Delete,
            url: format!("{BASE_URL}{path}"),
            headers: Vec::new(),
            body: None,
            timeout: Duration::from_secs(10),
        };
        self.orchestrator.execute(http, Some(&self.signer), 1.0).await?;
        Ok(Vec::new())
    }

    async fn fetch_order(&self, id: &str, symbol: Option<&str>) -> Result<Order, ExchangeError> {
        let request = get(BASE_URL, &format!("/api/v1/orders/{id}"), &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let data = self.map_envelope(response.body)?;
        Ok(parse_order(symbol.unwrap_or_default(), &data))
    }

    async fn fetch_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError> {
        let mut params = vec![("status", "active".to_string())];
        let venue_id;
        if let Some(sym) = symbol {
            venue_id = self.venue_id(sym);
            params.push(("symbol", venue_id));
        }
        let request = get(BASE_URL, "/api/v1/orders", &params, Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let data = self.map_envelope(response.body)?;
        let rows = data.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(rows
            .iter()
            .map(|row| parse_order(&self.unified_symbol(&safe_string(row, "symbol", "")), row))
            .collect())
    }

    async fn fetch_closed_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError> {
        let mut params = vec![("status", "done".to_string())];
        let venue_id;
        if let Some(sym) = symbol {
            venue_id = self.venue_id(sym);
            params.push(("symbol", venue_id));
        }
        let request = get(BASE_URL, "/api/v1/orders", &params, Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let data = self.map_envelope(response.body)?;
        let rows = data.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(rows
            .iter()
            .map(|row| parse_order(&self.unified_symbol(&safe_string(row, "symbol", "")), row))
            .collect())
    }

    async fn fetch_my_trades(
        &self,
        symbol: Option<&str>,
        _since: Option<i64>,
        _limit: Option<usize>,
    ) -> Result<Vec<MyTrade>, ExchangeError> {
        let mut params = vec![];
        let venue_id;
        if let Some(sym) = symbol {
            venue_id = self.venue_id(sym);
            params.push(("symbol", venue_id));
        }
        let request = get(BASE_URL, "/api/v1/fills", &params, Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let data = self.map_envelope(response.body)?;
        let rows = data.get("items").and_then(Value::as_array).cloned().unwrap_or_default();

        Ok(rows
            .iter()
            .map(|row| {
                let market_symbol = self.unified_symbol(&safe_string(row, "symbol", ""));
                let side = Side::from_str_loose(&safe_string(row, "side", "buy")).unwrap_or(Side::Buy);
                let timestamp = safe_int(row, "createdAt", 0);
                MyTrade {
                    trade: Trade::new(
                        safe_string(row, "tradeId", ""),
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
                        currency: safe_string_opt(row, "feeCurrency"),
                    }),
                    is_maker: Some(safe_string(row, "liquidity", "") == "maker"),
                }
            })
            .collect())
    }

    async fn fetch_balance(&self) -> Result<Balances, ExchangeError> {
        let request = get(
            BASE_URL,
            "/api/v1/accounts",
            &[("type", "trade".to_string())],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let data = self.map_envelope(response.body)?;
        let rows = data.as_array().cloned().unwrap_or_default();

        let mut currencies = HashMap::new();
        for row in &rows {
            let code = safe_string_upper(row, "currency", "");
            let balance = safe_float(row, "balance", 0.0);
            let available = safe_float(row, "available", 0.0);
            currencies.insert(code, CurrencyBalance::from_total(balance, available));
        }

        Ok(Balances {
            currencies,
            info: Value::Array(rows),
            timestamp: 0,
            datetime: String::new(),
        })
    }

    async fn fetch_trading_fees(&self) -> Result<TradingFees, ExchangeError> {
        let request = get(BASE_URL, "/api/v1/base-fee", &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let data = self.map_envelope(response.body)?;

        Ok(TradingFees {
            default: xchange_instrument::fee::FeeRate {
                maker: safe_float(&data, "makerFeeRate", 0.001),
                taker: safe_float(&data, "takerFeeRate", 0.001),
            },
            by_symbol: HashMap::new(),
        })
    }

    async fn close_all_ws(&self) {}
}

fn parse_ticker(symbol: &str, data: &Value) -> Ticker {
    Ticker {
        symbol: symbol.to_string(),
        last: safe_float_opt(data, "last"),
        bid: safe_float_opt(data, "buy"),
        ask: safe_float_opt(data, "sell"),
        bid_volume: None,
        ask_volume: None,
        high: safe_float_opt(data, "high"),
        low: safe_float_opt(data, "low"),
        open: None,
        close: safe_float_opt(data, "last"),
        volume: safe_float_opt(data, "vol"),
        quote_volume: safe_float_opt(data, "volValue"),
        change: safe_float_opt(data, "changePrice"),
        percentage: safe_float_opt(data, "changeRate"),
        vwap: safe_float_opt(data, "averagePrice"),
        timestamp: safe_int(data, "time", 0),
        datetime: iso8601_from_millis(safe_int(data, "time", 0)),
        info: data.clone(),
    }
}

fn parse_order(symbol: &str, body: &Value) -> Order {
    let amount = safe_float(body, "size", 0.0);
    let filled = safe_float(body, "dealSize", 0.0);
    let cost = safe_float(body, "dealFunds", 0.0);
    let is_active = safe_bool(body, "isActive", true);
    let cancel_exist = safe_bool(body, "cancelExist", false);
    let status = if cancel_exist {
        OrderStatus::Canceled
    } else if is_active && filled > 0.0 {
        OrderStatus::PartiallyFilled
    } else if is_active {
        OrderStatus::New
    } else {
        OrderStatus::Filled
    };
    let side = Side::from_str_loose(&safe_string(body, "side", "buy")).unwrap_or(Side::Buy);
    let order_type = if safe_string(body, "type", "limit") == "market" { OrderType::Market } else { OrderType::Limit };
    let timestamp = safe_int(body, "createdAt", 0);

    Order::new(
        safe_string(body, "id", ""),
        safe_string_opt(body, "clientOid"),
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

pub fn subscribe_message(topic: &str, id: i64, private_channel: bool) -> WsMessage {
    WsMessage::Text(
        serde_json::json!({
            "id": id,
            "type": "subscribe",
            "topic": topic,
            "privateChannel": private_channel,
            "response": true,
        })
        .to_string(),
    )
}

pub fn dispatch_topic(value: &Value) -> Option<&str> {
    if safe_string(value, "type", "") != "message" {
        return None;
    }
    value.get("topic").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prehash_layout_matches_timestamp_method_path_body() {
        let signer = KucoinSigner {
            api_key: "key".into(),
            secret: "secret".into(),
            passphrase: "pass".into(),
            clock: Arc::new(xchange_integration::clock::FixedClock(1_700_000_000_000)),
        };
        let request = HttpRequestSpec {
            method: xchange_integration::protocol::http::HttpMethod::Get,
            url: "/api/v1/accounts?currency=BTC".to_string(),
            headers: Vec::new(),
            body: None,
            timeout: Duration::from_secs(10),
        };
        let signed = signer.sign(&request).unwrap();
        assert!(signed.headers.iter().any(|(k, v)| k == "KC-API-KEY-VERSION" && v == "2"));
    }

    #[test]
    fn candle_reshape_reorders_to_ohlc_and_sorts_ascending() {
        let rows = serde_json::json!([
            ["1700000060", "10", "15", "12", "8", "100", "1200"],
            ["1700000000", "9", "12", "11", "7", "80", "900"]
        ]);
        let candles: Vec<Candle> = rows
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|row| {
                let row = row.as_array()?;
                Some(Candle {
                    timestamp_ms: row.first()?.as_str()?.parse::<i64>().ok()? * 1000,
                    open: row.get(1)?.as_str()?.parse().ok()?,
                    close: row.get(2)?.as_str()?.parse().ok()?,
                    high: row.get(3)?.as_str()?.parse().ok()?,
                    low: row.get(4)?.as_str()?.parse().ok()?,
                    volume: row.get(5)?.as_str()?.parse().ok()?,
                })
            })
            .collect();
        let normalized = normalize_candles(candles, None);
        assert_eq!(normalized[0].timestamp_ms, 1_700_000_000_000);
        assert_eq!(normalized[0].close, 12.0);
        assert_eq!(normalized[0].high, 11.0);
        assert_eq!(normalized[0].low, 7.0);
        assert_eq!(normalized[1].timestamp_ms, 1_700_000_060_000);
    }

    #[test]
    fn dispatch_topic_requires_message_type() {
        let ack = serde_json::json!({"type": "ack", "id": "1"});
        assert_eq!(dispatch_topic(&ack), None);

        let msg = serde_json::json!({"type": "message", "topic": "/market/ticker:BTC-USDT"});
        assert_eq!(dispatch_topic(&msg), Some("/market/ticker:BTC-USDT"));
    }
}
