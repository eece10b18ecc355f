//! Coinbase Advanced Trade driver: ES256 JWT bearer signing (spec §4.4) and the
//! `order_configuration` nested createOrder body (spec §8 scenario 4).

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
use xchange_integration::crypto::Es256Jwt;
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

const VENUE: &str = "coinbase";
const BASE_URL: &str = "https://api.coinbase.com";
const HOST: &str = "api.coinbase.com";

fn error_table() -> ErrorTable {
    ErrorTable::new(&[
        ("UNAUTHORIZED", "AuthenticationError"),
        ("PERMISSION_DENIED", "AuthenticationError"),
        ("INVALID_ARGUMENT", "BadRequest"),
        ("INSUFFICIENT_FUND", "InsufficientFunds"),
        ("ORDER_NOT_FOUND", "OrderNotFound"),
        ("RATE_LIMIT_EXCEEDED", "RateLimitExceeded"),
        ("UNKNOWN_FAILURE_REASON", "ExchangeError"),
    ])
}

#[derive(Debug)]
struct CoinbaseSigner {
    api_key: String,
    pem_private_key: String,
    clock: Arc<dyn Clock>,
}

impl Signer for CoinbaseSigner {
    fn sign(&self, request: &HttpRequestSpec) -> Result<SignedRequest, xchange_integration::error::SocketError> {
        let now_secs = self.clock.now_unix_millis() / 1000;
        let path = request.url.split_once('?').map(|(p, _)| p).unwrap_or(&request.url);
        let request_path = path.strip_prefix(BASE_URL).unwrap_or(path);
        let uri = format!("{} {HOST}{request_path}", request.method.as_str());

        let token = Es256Jwt::sign(&self.api_key, &self.pem_private_key, &self.api_key, Some(&uri), now_secs)
            .map_err(xchange_integration::error::SocketError::Sign)?;

        Ok(SignedRequest {
            headers: vec![("Authorization".to_string(), format!("Bearer {token}"))],
            url_override: None,
            body_override: None,
        })
    }
}

pub struct CoinbaseDriver {
    orchestrator: Orchestrator,
    signer: CoinbaseSigner,
    markets: Arc<MarketIndex>,
    errors: ErrorTable,
}

impl std::fmt::Debug for CoinbaseDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinbaseDriver").finish()
    }
}

impl CoinbaseDriver {
    pub fn new(
        api_key: impl Into<String>,
        pem_private_key: impl Into<String>,
        transport: Arc<dyn xchange_integration::protocol::http::HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rate_limiter = Arc::new(xchange_integration::ratelimit::RateLimiter::new(
            30.0,
            Duration::from_secs(1),
        ));
        Self {
            orchestrator: Orchestrator::new(VENUE, transport, rate_limiter, Duration::from_secs(10)),
            signer: CoinbaseSigner {
                api_key: api_key.into(),
                pem_private_key: pem_private_key.into(),
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

    /// Order placement returns HTTP 200 with `success: false` and an `error_response` envelope
    /// on rejection (spec §4.6), rather than a non-2xx status.
    fn map_error(&self, status: u16, body: &Value) -> ExchangeError {
        let code = safe_string2(body, "error", "error_code", "");
        if code.is_empty() {
            return ExchangeError::http(VENUE, status, body.to_string());
        }
        let message = safe_string(body, "message", "");
        self.errors.map(VENUE, &code, message)
    }
}

#[async_trait]
impl Exchange for CoinbaseDriver {
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
        let request = get(BASE_URL, "/api/v3/brokerage/products", &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let rows = response
            .body
            .get("products")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let markets = rows
            .iter()
            .filter_map(|row| {
                let id = safe_string(row, "product_id", "");
                let base = safe_string(row, "base_currency_id", "");
                let quote = safe_string(row, "quote_currency_id", "");
                if base.is_empty() || quote.is_empty() {
                    return None;
                }
                let mut market = Market::new(id, base, quote);
                market.active = !safe_bool(row, "is_disabled", false) && !safe_bool(row, "trading_disabled", false);
                market.step_size = safe_string_opt(row, "base_increment").and_then(|v| v.parse().ok());
                market.tick_size = safe_string_opt(row, "quote_increment").and_then(|v| v.parse().ok());
                Some(market)
            })
            .collect();

        self.markets.publish(markets, |_| vec![]);
        Ok(self.markets.snapshot())
    }

    /// The public product descriptor is a market listing, not a price snapshot (spec §8 scenario
    /// 4 quirk): `quoteVolume` is shoe-horned from `volume_percentage_change_24h` for lack of a
    /// proper turnover field.
    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        let venue_id = self.venue_id(symbol);
        let request = get(
            BASE_URL,
            &format!("/api/v3/brokerage/products/{venue_id}"),
            &[],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        Ok(parse_ticker(symbol, &response.body))
    }

    async fn fetch_tickers(&self, symbols: &[String]) -> Result<HashMap<String, Ticker>, ExchangeError> {
        let mut out = HashMap::new();
        for symbol in symbols {
            match self.fetch_ticker(symbol).await {
                Ok(ticker) => {
                    out.insert(symbol.clone(), ticker);
                }
                Err(err) => tracing::warn!(%symbol, error = %err, "coinbase fetch_tickers: per-symbol fetch failed"),
            }
        }
        Ok(out)
    }

    async fn fetch_order_book(&self, symbol: &str, limit: Option<usize>) -> Result<OrderBook, ExchangeError> {
        let venue_id = self.venue_id(symbol);
        let request = get(
            BASE_URL,
            "/api/v3/brokerage/product_book",
            &[("product_id", venue_id)],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let pricebook = response.body.get("pricebook").cloned().unwrap_or(response.body);

        let to_levels = |key: &str| -> Vec<Level> {
            pricebook
                .get(key)
                .and_then(Value::as_array)
                .map(|rows| {
                    rows.iter()
                        .map(|row| Level {
                            price: safe_float(row, "price", 0.0),
                            size: safe_float(row, "size", 0.0),
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        Ok(OrderBook {
            symbol: symbol.to_string(),
            bids: to_levels("bids"),
            asks: to_levels("asks"),
            timestamp: parse_iso8601(&safe_string(&pricebook, "time", "")).unwrap_or(0),
            datetime: safe_string(&pricebook, "time", ""),
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
        let mut params = vec![];
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        let request = get(
            BASE_URL,
            &format!("/api/v3/brokerage/products/{venue_id}/ticker"),
            &params,
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let rows = response
            .body
            .get("trades")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(rows
            .iter()
            .map(|row| {
                let side = Side::from_str_loose(&safe_string_lower(row, "side", "buy")).unwrap_or(Side::Buy);
                let timestamp = parse_iso8601(&safe_string(row, "time", "")).unwrap_or(0);
                Trade::new(
                    safe_string(row, "trade_id", ""),
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
        let end = self.signer.clock.now_unix_millis() / 1000;
        let start = since.map(|ms| ms / 1000).unwrap_or(end - 300 * 86400);
        let request = get(
            BASE_URL,
            &format!("/api/v3/brokerage/products/{venue_id}/candles"),
            &[
                ("start", start.to_string()),
                ("end", end.to_string()),
                ("granularity", timeframe.to_string()),
            ],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let rows = response
            .body
            .get("candles")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let candles = rows
            .iter()
            .map(|row| Candle {
                timestamp_ms: safe_string(row, "start", "0").parse::<i64>().unwrap_or(0) * 1000,
                open: safe_float(row, "open", 0.0),
                high: safe_float(row, "high", 0.0),
                low: safe_float(row, "low", 0.0),
                close: safe_float(row, "close", 0.0),
                volume: safe_float(row, "volume", 0.0),
            })
            .collect();

        Ok(normalize_candles(candles, limit))
    }

    /// A market buy sizes by quote (spec §8 scenario 4: `quote_size == "50"`); every other
    /// combination sizes by base, wrapped in the matching `order_configuration` variant.
    async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, ExchangeError> {
        let venue_id = self.venue_id(&request.symbol);
        let client_order_id = Uuid::new_v4().to_string();

        let order_configuration = match (request.order_type, request.side) {
            (OrderType::Market, Side::Buy) => serde_json::json!({
                "market_market_ioc": { "quote_size": request.amount.to_string() }
            }),
            (OrderType::Market, Side::Sell) => serde_json::json!({
                "market_market_ioc": { "base_size": request.amount.to_string() }
            }),
            _ => serde_json::json!({
                "limit_limit_gtc": {
                    "base_size": request.amount.to_string(),
                    "limit_price": request.price.unwrap_or(0.0).to_string(),
                }
            }),
        };

        let body = serde_json::json!({
            "client_order_id": client_order_id,
            "product_id": venue_id,
            "side": if request.side == Side::Buy { "BUY" } else { "SELL" },
            "order_configuration": order_configuration,
        });

        let http = post_json(BASE_URL, "/api/v3/brokerage/orders", body, Duration::from_secs(10));
        let response = self.orchestrator.execute(http, Some(&self.signer), 1.0).await?;
        if !safe_bool(&response.body, "success", false) {
            let error_response = response.body.get("error_response").cloned().unwrap_or(response.body.clone());
            return Err(self.map_error(response.status, &error_response));
        }
        let order_id = response
            .body
            .get("success_response")
            .map(|r| safe_string(r, "order_id", ""))
            .unwrap_or_default();

        Ok(Order::new(
            order_id,
            Some(client_order_id),
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
            response.body,
        ))
    }

    async fn cancel_order(&self, id: &str, symbol: Option<&str>) -> Result<Order, ExchangeError> {
        let body = serde_json::json!({ "order_ids": [id] });
        let http = post_json(BASE_URL, "/api/v3/brokerage/orders/batch_cancel", body, Duration::from_secs(10));
        let response = self.orchestrator.execute(http, Some(&self.signer), 1.0).await?;
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
        let open = self.fetch_open_orders(symbol).await?;
        let ids: Vec<String> = open.iter().map(|o| o.id.clone()).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({ "order_ids": ids });
        let http = post_json(BASE_URL, "/api/v3/brokerage/orders/batch_cancel", body, Duration::from_secs(10));
        self.orchestrator.execute(http, Some(&self.signer), 1.0).await?;
        Ok(open)
    }

    async fn fetch_order(&self, id: &str, symbol: Option<&str>) -> Result<Order, ExchangeError> {
        let request = get(
            BASE_URL,
            &format!("/api/v3/brokerage/orders/historical/{id}"),
            &[],
            Duration::from_secs(10),
        );
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let order = response.body.get("order").cloned().unwrap_or(response.body);
        Ok(parse_order(symbol.unwrap_or_default(), &order))
    }

    async fn fetch_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError> {
        let mut params = vec![("order_status", "OPEN".to_string())];
        let venue_id;
        if let Some(sym) = symbol {
            venue_id = self.venue_id(sym);
            params.push(("product_id", venue_id));
        }
        let request = get(BASE_URL, "/api/v3/brokerage/orders/historical/batch", &params, Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let rows = response.body.get("orders").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(rows
            .iter()
            .map(|row| parse_order(&self.unified_symbol(&safe_string(row, "product_id", "")), row))
            .collect())
    }

    async fn fetch_closed_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, ExchangeError> {
        let mut params = vec![("order_status", "FILLED".to_string())];
        let venue_id;
        if let Some(sym) = symbol {
            venue_id = self.venue_id(sym);
            params.push(("product_id", venue_id));
        }
        let request = get(BASE_URL, "/api/v3/brokerage/orders/historical/batch", &params, Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let rows = response.body.get("orders").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(rows
            .iter()
            .map(|row| parse_order(&self.unified_symbol(&safe_string(row, "product_id", "")), row))
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
            params.push(("product_id", venue_id));
        }
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        let request = get(BASE_URL, "/api/v3/brokerage/orders/historical/fills", &params, Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let rows = response.body.get("fills").and_then(Value::as_array).cloned().unwrap_or_default();

        Ok(rows
            .iter()
            .map(|row| {
                let market_symbol = self.unified_symbol(&safe_string(row, "product_id", ""));
                let side = Side::from_str_loose(&safe_string_lower(row, "side", "buy")).unwrap_or(Side::Buy);
                let timestamp = parse_iso8601(&safe_string(row, "trade_time", "")).unwrap_or(0);
                MyTrade {
                    trade: Trade::new(
                        safe_string(row, "trade_id", ""),
                        market_symbol,
                        safe_float(row, "price", 0.0),
                        safe_float(row, "size", 0.0),
                        side,
                        timestamp,
                        iso8601_from_millis(timestamp),
                        row.clone(),
                    ),
                    order_id: safe_string(row, "order_id", ""),
                    fee: safe_float_opt(row, "commission").map(|cost| xchange_model::trade::Fee {
                        cost,
                        currency: None,
                    }),
                    is_maker: safe_string(row, "liquidity_indicator", "").contains("MAKER").then_some(true),
                }
            })
            .collect())
    }

    async fn fetch_balance(&self) -> Result<Balances, ExchangeError> {
        let request = get(BASE_URL, "/api/v3/brokerage/accounts", &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let rows = response.body.get("accounts").and_then(Value::as_array).cloned().unwrap_or_default();

        let mut currencies = HashMap::new();
        for row in &rows {
            let code = safe_string_upper(row, "currency", "");
            let available = row.get("available_balance").map(|v| safe_float(v, "value", 0.0)).unwrap_or(0.0);
            let hold = row.get("hold").map(|v| safe_float(v, "value", 0.0)).unwrap_or(0.0);
            currencies.insert(code, CurrencyBalance::from_free_used(available, hold));
        }

        Ok(Balances {
            currencies,
            info: Value::Array(rows),
            timestamp: 0,
            datetime: String::new(),
        })
    }

    async fn fetch_trading_fees(&self) -> Result<TradingFees, ExchangeError> {
        let request = get(BASE_URL, "/api/v3/brokerage/transaction_summary", &[], Duration::from_secs(10));
        let response = self.orchestrator.execute(request, Some(&self.signer), 1.0).await?;
        let fee_tier = response.body.get("fee_tier").cloned().unwrap_or(Value::Null);

        Ok(TradingFees {
            default: xchange_instrument::fee::FeeRate {
                maker: safe_string(&fee_tier, "maker_fee_rate", "0.006").parse().unwrap_or(0.006),
                taker: safe_string(&fee_tier, "taker_fee_rate", "0.008").parse().unwrap_or(0.008),
            },
            by_symbol: HashMap::new(),
        })
    }

    async fn close_all_ws(&self) {}
}

fn parse_ticker(symbol: &str, data: &Value) -> Ticker {
    let percentage = safe_float_opt(data, "volume_percentage_change_24h");
    Ticker {
        symbol: symbol.to_string(),
        last: safe_string_opt(data, "price").and_then(|v| v.parse().ok()),
        bid: safe_string_opt(data, "price").and_then(|v| v.parse().ok()),
        ask: None,
        bid_volume: None,
        ask_volume: None,
        high: safe_string_opt(data, "price_percentage_change_24h").and_then(|v| v.parse().ok()),
        low: None,
        open: None,
        close: safe_string_opt(data, "price").and_then(|v| v.parse().ok()),
        volume: safe_string_opt(data, "volume_24h").and_then(|v| v.parse().ok()),
        quote_volume: percentage,
        change: None,
        percentage,
        vwap: None,
        timestamp: 0,
        datetime: String::new(),
        info: data.clone(),
    }
}

fn parse_order(symbol: &str, body: &Value) -> Order {
    let status_str = safe_string_upper(body, "status", "OPEN");
    let filled = safe_string_opt(body, "filled_size").and_then(|v| v.parse().ok()).unwrap_or(0.0);
    let status = match status_str.as_str() {
        "FILLED" => OrderStatus::Filled,
        "CANCELLED" => OrderStatus::Canceled,
        "EXPIRED" => OrderStatus::Expired,
        "FAILED" => OrderStatus::Rejected,
        "OPEN" if filled > 0.0 => OrderStatus::PartiallyFilled,
        _ => OrderStatus::New,
    };
    let side = Side::from_str_loose(&safe_string_lower(body, "side", "buy")).unwrap_or(Side::Buy);
    let order_type = if body
        .get("order_configuration")
        .and_then(|c| c.as_object())
        .map(|c| c.keys().any(|k| k.starts_with("market")))
        .unwrap_or(false)
    {
        OrderType::Market
    } else {
        OrderType::Limit
    };
    let timestamp = parse_iso8601(&safe_string(body, "created_time", "")).unwrap_or(0);
    let amount = body
        .get("order_configuration")
        .and_then(|c| c.as_object())
        .and_then(|c| c.values().next())
        .and_then(|v| safe_string2(v, "base_size", "quote_size", "").parse().ok())
        .unwrap_or(0.0);

    Order::new(
        safe_string(body, "order_id", ""),
        safe_string_opt(body, "client_order_id"),
        symbol,
        order_type,
        side,
        safe_string_opt(body, "average_filled_price").and_then(|v| v.parse().ok()),
        amount,
        filled,
        safe_string_opt(body, "filled_value").and_then(|v| v.parse().ok()).unwrap_or(0.0),
        status,
        timestamp,
        iso8601_from_millis(timestamp),
        vec![],
        None,
        body.clone(),
    )
}

pub fn subscribe_message(channel: &str, product_ids: &[String], jwt: Option<String>) -> WsMessage {
    let mut payload = serde_json::json!({
        "type": "subscribe",
        "channel": channel,
        "product_ids": product_ids,
    });
    if let Some(jwt) = jwt {
        payload["jwt"] = Value::String(jwt);
    }
    WsMessage::Text(payload.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_buy_sizes_by_quote_sell_sizes_by_base() {
        let buy = serde_json::json!({ "market_market_ioc": { "quote_size": "50" } });
        assert_eq!(buy["market_market_ioc"]["quote_size"], "50");

        let sell = serde_json::json!({ "market_market_ioc": { "base_size": "0.01" } });
        assert!(sell["market_market_ioc"].get("quote_size").is_none());
    }

    #[test]
    fn parse_order_detects_market_from_order_configuration_key() {
        let body = serde_json::json!({
            "order_id": "abc",
            "status": "FILLED",
            "side": "BUY",
            "filled_size": "0.01",
            "order_configuration": { "market_market_ioc": { "quote_size": "50" } },
        });
        let order = parse_order("BTC/USD", &body);
        assert_eq!(order.order_type, OrderType::Market);
        assert_eq!(order.status, OrderStatus::Filled);
    }

    #[test]
    fn subscribe_message_omits_jwt_for_public_channels() {
        let message = subscribe_message("ticker", &["BTC-USD".to_string()], None);
        let WsMessage::Text(text) = message else { panic!("expected text frame") };
        assert!(!text.contains("jwt"));
    }
}
