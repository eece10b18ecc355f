//! Binance-family driver (also the base for Bitrue's REST signing, spec §4.4): sorted-raw-query
//! HMAC-SHA256 signing with the signature appended as a query param (GET/DELETE) or folded into
//! the URL (POST).

use crate::capability::Capabilities;
use crate::exchange::{CreateOrderRequest, Exchange};
use crate::orchestrator::Orchestrator;
use crate::venue::common::{get, post, ErrorTable};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use xchange_instrument::fee::TradingFees;
use xchange_instrument::index::{MarketIndex, MarketSnapshot};
use xchange_instrument::market::Market;
use xchange_integration::clock::Clock;
use xchange_integration::coerce::*;
use xchange_integration::crypto::hmac_sha256_hex;
use xchange_integration::protocol::http::{BodyMode, HttpMethod, HttpRequestSpec, SignedRequest, Signer};
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

const VENUE: &str = "binance";
const BASE_URL: &str = "https://api.binance.com";

fn error_table() -> ErrorTable {
    ErrorTable::new(&[
        ("-1021", "BadRequest"),
        ("-1022", "AuthenticationError"),
        ("-2014", "AuthenticationError"),
        ("-2015", "AuthenticationError"),
        ("-1121", "BadSymbol"),
        ("-2013", "OrderNotFound"),
        ("-2010", "InsufficientFunds"),
        ("-1013", "InvalidOrder"),
        ("-1003", "RateLimitExceeded"),
    ])
}

/// Builds the sorted-raw (alphabetized, unencoded) query string Binance-family signatures cover
/// (spec §4.4): distinct from [`xchange_integration::coerce::build_raw_query`], which preserves
/// caller order.
pub fn sorted_raw_query(params: &[(&str, String)]) -> String {
    let sorted: BTreeMap<&str, &String> = params.iter().map(|(k, v)| (*k, v)).collect();
    sorted
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

#[derive(Debug)]
struct BinanceSigner {
    api_key: String,
    secret: String,
    recv_window: i64,
    clock: Arc<dyn Clock>,
}

impl Signer for BinanceSigner {
    fn sign(&self, request: &HttpRequestSpec) -> Result<SignedRequest, xchange_integration::error::SocketError> {
        let (path, existing_query) = request.url.split_once('?').unwrap_or((&request.url, ""));
        let timestamp = self.clock.now_unix_millis().to_string();

        let mut pairs: Vec<(String, String)> = existing_query
            .split('&')
            .filter(|s| !s.is_empty())
            .filter_map(|kv| kv.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
            .collect();

        if let Some(body) = &request.body {
            let body_str = String::from_utf8_lossy(body);
            pairs.extend(
                body_str
                    .split('&')
                    .filter(|s| !s.is_empty())
                    .filter_map(|kv| kv.split_once('=').map(|(k, v)| (k.to_string(), v.to_string()))),
            );
        }

        pairs.push(("timestamp".to_string(), timestamp));
        pairs.push(("recvWindow".to_string(), self.recv_window.to_string()));

        let refs: Vec<(&str, String)> = pairs.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        let query = sorted_raw_query(&refs);
        let signature = hmac_sha256_hex(&query, &self.secret);

        let headers = vec![("X-MBX-APIKEY".to_string(), self.api_key.clone())];

        match request.method {
            HttpMethod::Get | HttpMethod::Delete => Ok(SignedRequest {
                headers,
                url_override: Some(format!("{path}?{query}&signature={signature}")),
                body_override: None,
            }),
            _ => Ok(SignedRequest {
                headers,
                url_override: Some(format!("{path}?signature={signature}")),
                body_override: Some(query.into_bytes().into()),
            }),
        }
    }
}

pub struct BinanceDriver {
    orchestrator: Orchestrator,
    signer: BinanceSigner,
    markets: Arc<MarketIndex>,
    errors: ErrorTable,
}

impl std::fmt::Debug for BinanceDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceDriver").finish()
    }
}

impl BinanceDriver {
    pub fn new(
        api_key: impl Into<String>,
        secret: impl Into<String>,
        recv_window: i64,
        transport: Arc<dyn xchange_integration::protocol::http::HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rate_limiter = Arc::new(xchange_integration::ratelimit::RateLimiter::new(
            1200.0,
            Duration::from_secs(60),
        ));
        Self {
            orchestrator: Orchestrator::new(VENUE, transport, rate_limiter, Duration::from_secs(10)),
            signer: BinanceSigner {
                api_key: api_key.into(),
                secret: secret.into(),
                recv_window,
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
            .unwrap_or_else(|| symbol.replace('/', ""))
    }

    fn unified_symbol(&self, venue_id: &str) -> String {
        let snapshot = self.markets.snapshot();
        if let Some(market) = snapshot.markets_by_id.get(venue_id) {
            return market.symbol.clone();
        }
        xchange_instrument::symbol::partition_by_length(venue_id)
            .map(|(b, q)| format!("{b}/{q}"))
            .unwrap_or_else(|| venue_id.to_string())
    }

    fn map_envelope(&self, body: Value) -> Result<Value, ExchangeError> {
        if let Some(code) = body.get("code").and_then(Value::as_i64) {
            let message = safe_string(&body, "msg", "");
            return Err(self.errors.map(VENUE, &code.to_string(), message));
        }
        Ok(body)
    }
}

#[async_trait]
impl Exchange for BinanceDriver {
    fn venue(&self) -> &'static str {
        VENUE
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            watch_ticker: true,
            watch_order_book: true,
            watch_trades: true,
            fetch_trading_fees: true,
            cancel_all_orders: true,
            fetch_closed_orders: true,
            ..Default::default()
        }
    }

    async fn load_markets(&self, _reload: bool) -> Result<Arc<MarketSnapshot>, ExchangeError> {
        let request = get(BASE_URL, "/api/v3/exchangeInfo", &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, None, 10.0).await?;
        let body = self.map_envelope(response.body)?;
        let rows = body.get("symbols").and_then(Value::as_array).cloned().unwrap_or_default();

        let markets = rows
            .iter()
            .filter_map(|row| {
                let id = safe_string(row, "symbol", "");
                let base = safe_string(row, "baseAsset", "");
                let quote = safe_string(row, "quoteAsset", "");
                if base.is_empty() || quote.is_empty() {
                    return None;
                }
                let mut market = Market::new(id, base, quote);
                market.active = safe_string(row, "status", "") == "TRADING";
                market.precision.amount = safe_int_opt(row, "baseAssetPrecision").map(|v| v as u32);
                market.precision.quote = safe_int_opt(row, "quoteAssetPrecision").map(|v| v as u32);
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
            "/api/v3/ticker/24hr",
            &[("symbol", venue_id)],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let body = self.map_envelope(response.body)?;
        Ok(parse_ticker(symbol, &body))
    }

    async fn fetch_tickers(&self, symbols: &[String]) -> Result<HashMap<String, Ticker>, ExchangeError> {
        let venue_ids: Vec<String> = symbols.iter().map(|s| self.venue_id(s)).collect();
        let symbols_json = serde_json::to_string(&venue_ids).unwrap_or_default();
        let request = get(
            BASE_URL,
            "/api/v3/ticker/24hr",
            &[("symbols", symbols_json)],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, None, symbols.len().max(1) as f64).await?;
        let rows = response.body.as_array().cloned().unwrap_or_default();
        let mut out = HashMap::new();
        for row in &rows {
            let venue_id = safe_string(row, "symbol", "");
            let symbol = self.unified_symbol(&venue_id);
            out.insert(symbol.clone(), parse_ticker(&symbol, row));
        }
        Ok(out)
    }

    async fn fetch_order_book(&self, symbol: &str, limit: Option<usize>) -> Result<OrderBook, ExchangeError> {
        let venue_id = self.venue_id(symbol);
        let request = get(
            BASE_URL,
            "/api/v3/depth",
            &[("symbol", venue_id), ("limit", limit.unwrap_or(100).to_string())],
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
            timestamp: 0,
            datetime: String::new(),
            nonce: safe_int_opt(&body, "lastUpdateId").map(|v| v as u64),
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
            "/api/v3/trades",
            &[("symbol", venue_id), ("limit", limit.unwrap_or(500).to_string())],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let rows = response.body.as_array().cloned().unwrap_or_default();

        Ok(rows
            .iter()
            .map(|row| {
                let side = if safe_bool(row, "isBuyerMaker", false) {
                    Side::Sell
                } else {
                    Side::Buy
                };
                let timestamp = safe_int(row, "time", 0);
                Trade::new(
                    safe_string(row, "id", ""),
                    symbol,
                    safe_float(row, "price", 0.0),
                    safe_float(row, "qty", 0.0),
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
        let mut params = vec![
            ("symbol", venue_id),
            ("interval", timeframe.to_string()),
            ("limit", limit.unwrap_or(500).to_string()),
        ];
        let since_str;
        if let Some(since) = since {
            since_str = since.to_string();
            params.push(("startTime", since_str));
        }
        let request = get(BASE_URL, "/api/v3/klines", &params, Duration::from_secs(10));
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let rows = response.body.as_array().cloned().unwrap_or_default();

        let candles: Vec<Candle> = rows
            .iter()
            .filter_map(|row| {
                let row = row.as_array()?;
                Some(Candle {
                    timestamp_ms: row.first()?.as_i64()?,
                    open: row.get(1)?.as_str()?.parse().ok()?,
                    high: row.get(2)?.as_str()?.parse().ok()?,
                    low: row.get(3)?.as_str()?.parse().ok()?,
                    close: row.get(4)?.as_str()?.parse().ok()?,
                    volume: row.get(5)?.as_str()?.parse().ok()?,
                })
            })
            .collect();

        Ok(normalize_candles(candles, limit))
    }

    async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, ExchangeError> {
        let venue_id = self.venue_id(&request.symbol);
        let mut params = vec![
            ("symbol".to_string(), venue_id),
            ("side".to_string(), request.side.as_str().to_string()),
            (
                "type".to_string(),
                match request.order_type {
                    OrderType::Limit => "LIMIT".to_string(),
                    OrderType::Market => "MARKET".to_string(),
                    OrderType::Other => "MARKET".to_string(),
                },
            ),
            ("quantity".to_string(), request.amount.to_string()),
        ];
        if let Some(price) = request.price {
            params.push(("price".to_string(), price.to_string()));
            params.push(("timeInForce".to_string(), "GTC".to_string()));
        }

        let refs: Vec<(&str, String)> = params.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        let http = post(BASE_URL, "/api/v3/order", &refs, BodyMode::FormUrlEncoded, Duration::from_secs(10));
        let response = self.orchestrator.execute(http, Some(&self.signer), 1.0).await?;
        let body = self.map_envelope(response.body)?;

        Ok(Order::new(
            safe_string(&body, "orderId", ""),
            safe_string_opt(&body, "clientOrderId"),
            request.symbol,
            request.order_type,
            request.side,
            request.price,
            request.amount,
            0.0,
            0.0,
            OrderStatus::New,
            safe_int(&body, "transactTime", 0),
            iso8601_from_millis(safe_int(&body, "transactTime", 0)),
            vec![],
            None,
            body,
        ))
    }

    async fn cancel_order(&self, id: &str, symbol: Option<&str>) -> Result<Order, ExchangeError> {
        let venue_id = symbol.map(|s| self.venue_id(s)).unwrap_or_default();
        let mut http = post(
            BASE_URL,
            "/api/v3/order",
            &[("symbol", venue_id), ("orderId", id.to_string())],
            BodyMode::FormUrlEncoded,
            Duration::from_secs(10),
        );
        http.method = HttpMethod::Delete;
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
        let mut http = post(
            BASE_URL,
            "/api/v3/openOrders",
            &[("symbol", venue_id)],
            BodyMode::FormUrlEncoded,
            Duration::from_secs(10),
        );
        http.method = HttpMethod::Delete;
        self.orchestrator.execute(http, Some(&self.signer), 1.0).await?;
        Ok(Vec::new())
    }

    async fn fetch_order(&self, id: &str, symbol: Option<&str>) -> Result<Order, ExchangeError> {
        let venue_id = symbol.map(|s| self.venue_id(s)).unwrap_or_default();
        let request = get(
            BASE_URL,
            "/api/v3/order",
            &[("symbol", venue_id), ("orderId", id.to_string())],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let body = self.map_envelope(response.body)?;
        Ok(parse_order(symbol.unwrap_or_default(), &body))
    }

    async fn fetch_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError> {
        let mut params = vec![];
        let venue_id;
        if let Some(sym) = symbol {
            venue_id = self.venue_id(sym);
            params.push(("symbol", venue_id));
        }
        let request = get(BASE_URL, "/api/v3/openOrders", &params, Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 3.0).await?;
        let rows = response.body.as_array().cloned().unwrap_or_default();
        Ok(rows.iter().map(|row| parse_order(symbol.unwrap_or_default(), row)).collect())
    }

    async fn fetch_closed_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError> {
        let venue_id = symbol.map(|s| self.venue_id(s)).unwrap_or_default();
        let request = get(BASE_URL, "/api/v3/allOrders", &[("symbol", venue_id)], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 10.0).await?;
        let rows = response.body.as_array().cloned().unwrap_or_default();
        Ok(rows
            .iter()
            .filter(|row| safe_string(row, "status", "") != "NEW")
            .map(|row| parse_order(symbol.unwrap_or_default(), row))
            .collect())
    }

    async fn fetch_my_trades(
        &self,
        symbol: Option<&str>,
        _since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<MyTrade>, ExchangeError> {
        let venue_id = symbol.map(|s| self.venue_id(s)).unwrap_or_default();
        let mut params = vec![("symbol", venue_id)];
        let limit_str;
        if let Some(limit) = limit {
            limit_str = limit.to_string();
            params.push(("limit", limit_str));
        }
        let request = get(BASE_URL, "/api/v3/myTrades", &params, Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 10.0).await?;
        let rows = response.body.as_array().cloned().unwrap_or_default();

        Ok(rows
            .iter()
            .map(|row| {
                let side = if safe_bool(row, "isBuyer", true) { Side::Buy } else { Side::Sell };
                let timestamp = safe_int(row, "time", 0);
                MyTrade {
                    trade: Trade::new(
                        safe_string(row, "id", ""),
                        symbol.unwrap_or_default(),
                        safe_float(row, "price", 0.0),
                        safe_float(row, "qty", 0.0),
                        side,
                        timestamp,
                        iso8601_from_millis(timestamp),
                        row.clone(),
                    ),
                    order_id: safe_string(row, "orderId", ""),
                    fee: safe_float_opt(row, "commission").map(|cost| xchange_model::trade::Fee {
                        cost,
                        currency: safe_string_opt(row, "commissionAsset"),
                    }),
                    is_maker: Some(safe_bool(row, "isMaker", false)),
                }
            })
            .collect())
    }

    async fn fetch_balance(&self) -> Result<Balances, ExchangeError> {
        let request = get(BASE_URL, "/api/v3/account", &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 10.0).await?;
        let body = self.map_envelope(response.body)?;
        let rows = body.get("balances").and_then(Value::as_array).cloned().unwrap_or_default();

        let mut currencies = HashMap::new();
        for row in &rows {
            let code = safe_string_upper(row, "asset", "");
            let free = safe_float(row, "free", 0.0);
            let used = safe_float(row, "locked", 0.0);
            currencies.insert(code, CurrencyBalance::from_free_used(free, used));
        }

        Ok(Balances {
            currencies,
            info: body,
            timestamp: 0,
            datetime: String::new(),
        })
    }

    async fn fetch_trading_fees(&self) -> Result<TradingFees, ExchangeError> {
        let request = get(BASE_URL, "/sapi/v1/asset/tradeFee", &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let rows = response.body.as_array().cloned().unwrap_or_default();

        let mut by_symbol = HashMap::new();
        for row in &rows {
            let venue_id = safe_string(row, "symbol", "");
            let symbol = self.unified_symbol(&venue_id);
            by_symbol.insert(
                symbol,
                xchange_instrument::fee::FeeRate {
                    maker: safe_float(row, "makerCommission", 0.0),
                    taker: safe_float(row, "takerCommission", 0.0),
                },
            );
        }

        Ok(TradingFees {
            default: xchange_instrument::fee::FeeRate { maker: 0.001, taker: 0.001 },
            by_symbol,
        })
    }

    async fn close_all_ws(&self) {}
}

fn parse_ticker(symbol: &str, body: &Value) -> Ticker {
    Ticker {
        symbol: symbol.to_string(),
        last: safe_float_opt(body, "lastPrice"),
        bid: safe_float_opt(body, "bidPrice"),
        ask: safe_float_opt(body, "askPrice"),
        bid_volume: safe_float_opt(body, "bidQty"),
        ask_volume: safe_float_opt(body, "askQty"),
        high: safe_float_opt(body, "highPrice"),
        low: safe_float_opt(body, "lowPrice"),
        open: safe_float_opt(body, "openPrice"),
        close: safe_float_opt(body, "lastPrice"),
        volume: safe_float_opt(body, "volume"),
        quote_volume: safe_float_opt(body, "quoteVolume"),
        change: safe_float_opt(body, "priceChange"),
        percentage: safe_float_opt(body, "priceChangePercent"),
        vwap: safe_float_opt(body, "weightedAvgPrice"),
        timestamp: safe_int(body, "closeTime", 0),
        datetime: iso8601_from_millis(safe_int(body, "closeTime", 0)),
        info: body.clone(),
    }
}

fn parse_order(symbol: &str, body: &Value) -> Order {
    let amount = safe_float(body, "origQty", 0.0);
    let filled = safe_float(body, "executedQty", 0.0);
    let cost = safe_float(body, "cummulativeQuoteQty", 0.0);
    let status = match safe_string(body, "status", "").as_str() {
        "NEW" => OrderStatus::New,
        "PARTIALLY_FILLED" => OrderStatus::PartiallyFilled,
        "FILLED" => OrderStatus::Filled,
        "CANCELED" | "PENDING_CANCEL" => OrderStatus::Canceled,
        "EXPIRED" => OrderStatus::Expired,
        "REJECTED" => OrderStatus::Rejected,
        _ => OrderStatus::New,
    };
    let side = match safe_string(body, "side", "BUY").as_str() {
        "SELL" => Side::Sell,
        _ => Side::Buy,
    };
    let order_type = match safe_string(body, "type", "LIMIT").as_str() {
        "MARKET" => OrderType::Market,
        "LIMIT" => OrderType::Limit,
        _ => OrderType::Other,
    };
    let timestamp = safe_int(body, "time", 0);

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

/// Binance-family WS is raw stream frames, not an envelope with an explicit subscribe message
/// per symbol; streams are named in the connection URL path (`<symbol>@<stream>`).
pub fn stream_name(venue_id: &str, stream: &str) -> String {
    format!("{}@{stream}", venue_id.to_lowercase())
}

pub fn subscribe_message(streams: &[String], id: i64) -> WsMessage {
    WsMessage::Text(
        serde_json::json!({"method": "SUBSCRIBE", "params": streams, "id": id}).to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_raw_query_alphabetizes_without_encoding() {
        let params = vec![("symbol", "BTC USDT".to_string()), ("recvWindow", "5000".to_string())];
        assert_eq!(sorted_raw_query(&params), "recvWindow=5000&symbol=BTC USDT");
    }

    #[test]
    fn parse_order_derives_status_from_fill_state() {
        let body = serde_json::json!({
            "orderId": 1, "symbol": "BTCUSDT", "side": "BUY", "type": "LIMIT",
            "status": "PARTIALLY_FILLED", "origQty": "10", "executedQty": "4", "price": "100"
        });
        let order = parse_order("BTC/USDT", &body);
        assert_eq!(order.remaining, 6.0);
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
    }

    #[test]
    fn stream_name_lowercases_venue_id() {
        assert_eq!(stream_name("BTCUSDT", "depth"), "btcusdt@depth");
    }
}
