//! Bitstamp driver: v2 HMAC-SHA256 signing (spec §4.2, §8 scenario 2), side-in-URL order
//! placement, and the `bts:subscribe` WebSocket dialect (spec §4.9).

use crate::capability::Capabilities;
use crate::exchange::{CreateOrderRequest, Exchange};
use crate::orchestrator::Orchestrator;
use crate::venue::common::{get, post, ErrorTable};
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
use xchange_integration::crypto::hmac_sha256_hex;
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

const VENUE: &str = "bitstamp";
const BASE_URL: &str = "https://www.bitstamp.net/api/v2";

fn error_table() -> ErrorTable {
    ErrorTable::new(&[
        ("API0001", "AuthenticationError"),
        ("API0002", "AuthenticationError"),
        ("API0003", "BadRequest"),
        ("API0005", "InvalidOrder"),
        ("API0017", "OrderNotFound"),
        ("API0024", "InsufficientFunds"),
    ])
}

/// Builds the raw signing string and HMAC-SHA256 hex signature for Bitstamp v2 (spec §4.2,
/// §8 scenario 2). A free function so the exact vector can be tested without driving the
/// [`Signer`] trait through a fake clock.
pub fn bitstamp_signature(
    api_key: &str,
    secret: &str,
    method: &str,
    path: &str,
    nonce: &str,
    timestamp: &str,
    content_type: Option<&str>,
    body: &str,
) -> String {
    let mut payload = format!("BITSTAMP {api_key}{method}www.bitstamp.net{path}");
    if let Some(content_type) = content_type {
        payload.push_str(content_type);
    }
    payload.push_str(nonce);
    payload.push_str(timestamp);
    payload.push_str("v2");
    payload.push_str(body);
    hmac_sha256_hex(&payload, secret)
}

#[derive(Debug)]
struct BitstampSigner {
    api_key: String,
    secret: String,
    clock: Arc<dyn Clock>,
}

impl Signer for BitstampSigner {
    fn sign(&self, request: &HttpRequestSpec) -> Result<SignedRequest, xchange_integration::error::SocketError> {
        let path = request
            .url
            .splitn(2, "www.bitstamp.net")
            .nth(1)
            .unwrap_or_default()
            .split('?')
            .next()
            .unwrap_or_default()
            .to_string();

        let body = request
            .body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default();
        let content_type = if body.is_empty() {
            None
        } else {
            Some("application/x-www-form-urlencoded")
        };

        let nonce = Uuid::new_v4().to_string();
        let timestamp = self.clock.now_unix_millis().to_string();
        let signature = bitstamp_signature(
            &self.api_key,
            &self.secret,
            request.method.as_str(),
            &path,
            &nonce,
            &timestamp,
            content_type,
            &body,
        );

        let mut headers = vec![
            ("X-Auth".to_string(), format!("BITSTAMP {}", self.api_key)),
            ("X-Auth-Signature".to_string(), signature),
            ("X-Auth-Nonce".to_string(), nonce),
            ("X-Auth-Timestamp".to_string(), timestamp),
            ("X-Auth-Version".to_string(), "v2".to_string()),
        ];
        if let Some(content_type) = content_type {
            headers.push(("Content-Type".to_string(), content_type.to_string()));
        }

        Ok(SignedRequest {
            headers,
            url_override: None,
            body_override: None,
        })
    }
}

pub struct BitstampDriver {
    orchestrator: Orchestrator,
    signer: BitstampSigner,
    markets: Arc<MarketIndex>,
    errors: ErrorTable,
}

impl std::fmt::Debug for BitstampDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitstampDriver").finish()
    }
}

impl BitstampDriver {
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
            signer: BitstampSigner {
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
            .unwrap_or_else(|| symbol.replace('/', "").to_lowercase())
    }

    fn unified_symbol(&self, venue_id: &str) -> String {
        let snapshot = self.markets.snapshot();
        if let Some(market) = snapshot.markets_by_id.get(venue_id) {
            return market.symbol.clone();
        }
        xchange_instrument::symbol::partition_by_length(venue_id)
            .map(|(b, q)| format!("{b}/{q}"))
            .unwrap_or_else(|| venue_id.to_uppercase())
    }

    /// Unwraps a Bitstamp envelope (spec §4.6): `status === "error"` carries a `code`.
    fn map_envelope(&self, body: Value) -> Result<Value, ExchangeError> {
        if safe_string(&body, "status", "") == "error" {
            let code = body
                .get("reason")
                .and_then(|r| r.get("__all__"))
                .and_then(Value::as_array)
                .and_then(|a| a.first())
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            return Err(self.errors.map(VENUE, code, body.to_string()));
        }
        Ok(body)
    }
}

#[async_trait]
impl Exchange for BitstampDriver {
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
            ..Default::default()
        }
    }

    async fn load_markets(&self, _reload: bool) -> Result<Arc<MarketSnapshot>, ExchangeError> {
        let request = get(BASE_URL, "/trading-pairs-info/", &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let rows = response.body.as_array().cloned().unwrap_or_default();

        let markets = rows
            .iter()
            .filter_map(|row| {
                let name = safe_string(row, "name", "");
                let (base, quote) = name.split_once('/')?;
                let id = safe_string(row, "url_symbol", "");
                let mut market = Market::new(id, base, quote);
                market.active = safe_string(row, "trading", "Enabled") == "Enabled";
                market.precision.price = safe_int_opt(row, "counter_decimals").map(|v| v as u32);
                market.precision.amount = safe_int_opt(row, "base_decimals").map(|v| v as u32);
                Some(market)
            })
            .collect();

        self.markets.publish(markets, |_| vec![]);
        Ok(self.markets.snapshot())
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        let venue_id = self.venue_id(symbol);
        let request = get(BASE_URL, &format!("/ticker/{venue_id}/"), &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let body = self.map_envelope(response.body)?;

        Ok(Ticker {
            symbol: symbol.to_string(),
            last: safe_float_opt(&body, "last"),
            bid: safe_float_opt(&body, "bid"),
            ask: safe_float_opt(&body, "ask"),
            bid_volume: None,
            ask_volume: None,
            high: safe_float_opt(&body, "high"),
            low: safe_float_opt(&body, "low"),
            open: safe_float_opt(&body, "open"),
            close: safe_float_opt(&body, "last"),
            volume: safe_float_opt(&body, "volume"),
            quote_volume: None,
            change: None,
            percentage: None,
            vwap: safe_float_opt(&body, "vwap"),
            timestamp: safe_int(&body, "timestamp", 0) * 1000,
            datetime: iso8601_from_millis(safe_int(&body, "timestamp", 0) * 1000),
            info: body,
        }
        .with_derived_change())
    }

    /// Iterates per-symbol with failures skipped (spec §4.8: "a venue has no bulk endpoint").
    async fn fetch_tickers(&self, symbols: &[String]) -> Result<HashMap<String, Ticker>, ExchangeError> {
        let mut out = HashMap::new();
        for symbol in symbols {
            match self.fetch_ticker(symbol).await {
                Ok(ticker) => {
                    out.insert(symbol.clone(), ticker);
                }
                Err(error) => {
                    tracing::warn!(%symbol, %error, "bitstamp fetchTickers: skipping symbol after error");
                }
            }
        }
        Ok(out)
    }

    async fn fetch_order_book(&self, symbol: &str, limit: Option<usize>) -> Result<OrderBook, ExchangeError> {
        let venue_id = self.venue_id(symbol);
        let request = get(BASE_URL, &format!("/order_book/{venue_id}/"), &[], Duration::from_secs(10));
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

        // Bitstamp orderbook `timestamp` is seconds -> ms (spec §4.10).
        let timestamp = safe_int(&body, "timestamp", 0) * 1000;
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
        let request = get(
            BASE_URL,
            &format!("/transactions/{venue_id}/"),
            &[("time", "hour".to_string())],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let rows = response.body.as_array().cloned().unwrap_or_default();

        let mut trades: Vec<Trade> = rows
            .iter()
            .map(|row| {
                // numeric type 0/1 -> buy/sell (spec §4.10).
                let side = Side::from_numeric_type(safe_int(row, "type", 0));
                let timestamp = safe_int(row, "date", 0) * 1000;
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
        _since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let venue_id = self.venue_id(symbol);
        let step = match timeframe {
            "1m" => 60,
            "5m" => 300,
            "15m" => 900,
            "1h" => 3600,
            "4h" => 14400,
            "1d" => 86400,
            _ => 60,
        };
        let request = get(
            BASE_URL,
            &format!("/ohlc/{venue_id}/"),
            &[("step", step.to_string()), ("limit", limit.unwrap_or(100).to_string())],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, None, 1.0).await?;
        let body = self.map_envelope(response.body)?;
        let rows = body
            .get("ohlc")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let candles: Vec<Candle> = rows
            .iter()
            .map(|row| Candle {
                timestamp_ms: safe_int(row, "timestamp", 0) * 1000,
                open: safe_float(row, "open", 0.0),
                high: safe_float(row, "high", 0.0),
                low: safe_float(row, "low", 0.0),
                close: safe_float(row, "close", 0.0),
                volume: safe_float(row, "volume", 0.0),
            })
            .collect();

        Ok(normalize_candles(candles, limit))
    }

    /// Bitstamp side goes in the URL: `/buy|sell[/market]/{pair}/` (spec §4.8).
    async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, ExchangeError> {
        let venue_id = self.venue_id(&request.symbol);
        let side = match request.side {
            Side::Buy => "buy",
            Side::Sell => "sell",
        };
        let path = match request.order_type {
            OrderType::Market => format!("/{side}/market/{venue_id}/"),
            _ => format!("/{side}/{venue_id}/"),
        };

        let mut params = vec![("amount".to_string(), request.amount.to_string())];
        if let Some(price) = request.price {
            params.push(("price".to_string(), price.to_string()));
        }
        let param_refs: Vec<(&str, String)> =
            params.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();

        let http = post(BASE_URL, &path, &param_refs, BodyMode::FormUrlEncoded, Duration::from_secs(10));
        let response = self
            .orchestrator
            .execute(http, Some(&self.signer), 1.0)
            .await?;
        let body = self.map_envelope(response.body)?;

        Ok(Order::new(
            safe_string(&body, "id", ""),
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
        let http = post(
            BASE_URL,
            "/cancel_order/",
            &[("id", id.to_string())],
            BodyMode::FormUrlEncoded,
            Duration::from_secs(10),
        );
        let response = self
            .orchestrator
            .execute(http, Some(&self.signer), 1.0)
            .await?;
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
        let http = post(
            BASE_URL,
            "/cancel_all_orders/",
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
            "/order_status/",
            &[("id", id.to_string())],
            BodyMode::FormUrlEncoded,
            Duration::from_secs(10),
        );
        let response = self
            .orchestrator
            .execute(http, Some(&self.signer), 1.0)
            .await?;
        let body = self.map_envelope(response.body)?;
        let status = match safe_string(&body, "status", "").as_str() {
            "Finished" => OrderStatus::Filled,
            "Canceled" => OrderStatus::Canceled,
            _ => OrderStatus::New,
        };
        Ok(Order::new(
            id,
            None,
            symbol.unwrap_or_default(),
            OrderType::Limit,
            Side::Buy,
            None,
            safe_float(&body, "amount_remaining", 0.0),
            0.0,
            0.0,
            status,
            0,
            "",
            vec![],
            None,
            body,
        ))
    }

    async fn fetch_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError> {
        let path = match symbol {
            Some(sym) => format!("/open_orders/{}/", self.venue_id(sym)),
            None => "/open_orders/all/".to_string(),
        };
        let http = post(BASE_URL, &path, &[], BodyMode::FormUrlEncoded, Duration::from_secs(10));
        let response = self
            .orchestrator
            .execute(http, Some(&self.signer), 1.0)
            .await?;
        let rows = response.body.as_array().cloned().unwrap_or_default();
        Ok(rows
            .iter()
            .map(|row| {
                let side = if safe_int(row, "type", 0) == 0 { Side::Buy } else { Side::Sell };
                Order::new(
                    safe_string(row, "id", ""),
                    None,
                    symbol.unwrap_or_default(),
                    OrderType::Limit,
                    side,
                    safe_float_opt(row, "price"),
                    safe_float(row, "amount", 0.0),
                    0.0,
                    0.0,
                    OrderStatus::New,
                    0,
                    "",
                    vec![],
                    None,
                    row.clone(),
                )
            })
            .collect())
    }

    async fn fetch_closed_orders(&self, _symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError> {
        Err(ExchangeError::FeatureUnsupported {
            venue: VENUE,
            method: "fetchClosedOrders",
        })
    }

    /// Preserved source defect (spec §9): `since` is accepted but forwarded as `offset=0`,
    /// effectively ignoring it.
    async fn fetch_my_trades(
        &self,
        symbol: Option<&str>,
        _since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<MyTrade>, ExchangeError> {
        let venue_id = symbol.map(|s| self.venue_id(s)).unwrap_or_else(|| "all".to_string());
        let http = post(
            BASE_URL,
            &format!("/user_transactions/{venue_id}/"),
            &[("offset", "0".to_string())],
            BodyMode::FormUrlEncoded,
            Duration::from_secs(10),
        );
        let response = self
            .orchestrator
            .execute(http, Some(&self.signer), 1.0)
            .await?;
        let rows = response.body.as_array().cloned().unwrap_or_default();

        let mut trades: Vec<MyTrade> = rows
            .iter()
            .filter(|row| safe_int(row, "type", -1) == 2)
            .map(|row| {
                let timestamp = safe_int(row, "datetime", 0) * 1000;
                MyTrade {
                    trade: Trade::new(
                        safe_string(row, "id", ""),
                        symbol.unwrap_or_default(),
                        safe_float(row, "price", 0.0),
                        safe_float(row, "amount", 0.0),
                        Side::Buy,
                        timestamp,
                        iso8601_from_millis(timestamp),
                        row.clone(),
                    ),
                    order_id: safe_string(row, "order_id", ""),
                    fee: safe_float_opt(row, "fee").map(|cost| xchange_model::trade::Fee {
                        cost,
                        currency: None,
                    }),
                    is_maker: None,
                }
            })
            .collect();

        if let Some(limit) = limit {
            trades.truncate(limit);
        }
        Ok(trades)
    }

    async fn fetch_balance(&self) -> Result<Balances, ExchangeError> {
        let http = post(BASE_URL, "/balance/", &[], BodyMode::FormUrlEncoded, Duration::from_secs(10));
        let response = self
            .orchestrator
            .execute(http, Some(&self.signer), 1.0)
            .await?;
        let body = self.map_envelope(response.body)?;

        let mut currencies = HashMap::new();
        if let Value::Object(map) = &body {
            let mut seen = std::collections::HashSet::new();
            for key in map.keys() {
                if let Some(code) = key.strip_suffix("_balance") {
                    let code = code.split('_').next().unwrap_or(code);
                    if !seen.insert(code.to_string()) {
                        continue;
                    }
                    let free = safe_float(&body, &format!("{code}_available"), 0.0);
                    let total = safe_float(&body, &format!("{code}_balance"), 0.0);
                    currencies.insert(code.to_uppercase(), CurrencyBalance::from_total(total, free));
                }
            }
        }

        Ok(Balances {
            currencies,
            info: body,
            timestamp: 0,
            datetime: String::new(),
        })
    }

    /// Bitstamp's fee schedule is per-pair via `/fees/trading/{pair}/` (capability on, unlike
    /// most venues here, since the endpoint is simple to normalize).
    async fn fetch_trading_fees(&self) -> Result<TradingFees, ExchangeError> {
        let http = post(BASE_URL, "/fees/trading/", &[], BodyMode::FormUrlEncoded, Duration::from_secs(10));
        let response = self
            .orchestrator
            .execute(http, Some(&self.signer), 1.0)
            .await?;
        let rows = response.body.as_array().cloned().unwrap_or_default();

        let mut by_symbol = HashMap::new();
        for row in &rows {
            if let Some(market) = row.get("market") {
                let venue_id = safe_string(market, "market_symbol", "");
                let symbol = self.unified_symbol(&venue_id);
                let fees = row.get("fees").cloned().unwrap_or(Value::Null);
                by_symbol.insert(
                    symbol,
                    xchange_instrument::fee::FeeRate {
                        maker: safe_float(&fees, "maker", 0.0),
                        taker: safe_float(&fees, "taker", 0.0),
                    },
                );
            }
        }

        Ok(TradingFees {
            default: xchange_instrument::fee::FeeRate { maker: 0.0, taker: 0.0 },
            by_symbol,
        })
    }

    async fn close_all_ws(&self) {}
}

/// Bitstamp WS subscribe dialect (spec §4.9).
pub fn subscribe_message(channel: &str) -> WsMessage {
    WsMessage::Text(
        serde_json::json!({"event": "bts:subscribe", "data": {"channel": channel}}).to_string(),
    )
}

pub fn dispatch_channel(value: &Value) -> Option<&str> {
    value.get("channel").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scenario: §8.2. The quotes in the spec's written formula mark string boundaries for
    /// readability; the actual signed payload concatenates the raw values with none.
    #[test]
    fn signer_matches_fixture_vector() {
        let expected = hmac_sha256_hex(
            "BITSTAMP KGETwww.bitstamp.net/api/v2/ticker/btcusd/11111111-2222-3333-4444-5555555555551700000000000v2",
            "S",
        );
        let actual = bitstamp_signature(
            "K",
            "S",
            "GET",
            "/api/v2/ticker/btcusd/",
            "11111111-2222-3333-4444-555555555555",
            "1700000000000",
            None,
            "",
        );
        assert_eq!(actual, expected);
    }

    #[test]
    fn body_only_included_when_present() {
        let without_body = bitstamp_signature("K", "S", "POST", "/p/", "n", "t", None, "");
        let with_body = bitstamp_signature("K", "S", "POST", "/p/", "n", "t", Some("application/x-www-form-urlencoded"), "amount=1");
        assert_ne!(without_body, with_body);
    }
}
