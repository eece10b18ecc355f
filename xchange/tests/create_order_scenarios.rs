//! End-to-end `create_order` scenarios against fake transports (spec §8), exercising the full
//! sign -> execute -> envelope-unwrap -> normalize path for drivers whose createOrder body shape
//! is venue specific.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use xchange::exchange::CreateOrderRequest;
use xchange::venue::coinbase::CoinbaseDriver;
use xchange::venue::kucoin::KucoinDriver;
use xchange::venue::pionex::PionexDriver;
use xchange::Exchange;
use xchange_integration::clock::FixedClock;
use xchange_integration::error::SocketError;
use xchange_integration::protocol::http::{HttpRequestSpec, HttpResponseSpec, HttpTransport};
use xchange_model::status::{OrderType, Side};

const TEST_CLOCK_MS: i64 = 1_700_000_000_000;

/// Records every request it's handed and replays a fixed JSON body back as a 200 response.
#[derive(Debug)]
struct RecordingTransport {
    response_body: String,
    seen: Mutex<Vec<HttpRequestSpec>>,
}

impl RecordingTransport {
    fn new(response_body: impl Into<String>) -> Self {
        Self {
            response_body: response_body.into(),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn execute(&self, request: HttpRequestSpec) -> Result<HttpResponseSpec, SocketError> {
        self.seen.lock().unwrap().push(request);
        Ok(HttpResponseSpec {
            status: 200,
            headers: Default::default(),
            body: self.response_body.clone().into_bytes().into(),
        })
    }
}

/// Coinbase market buys size by quote (spec §8 scenario 4): `quote_size == "50"`, not
/// `base_size`, and the body carries a fresh UUID `client_order_id`.
#[tokio::test]
async fn coinbase_market_buy_sizes_by_quote_with_generated_client_order_id() {
    let transport = Arc::new(RecordingTransport::new(
        r#"{"success": true, "success_response": {"order_id": "srv-1"}}"#,
    ));
    let driver = CoinbaseDriver::new(
        "api-key",
        include_str!("fixtures/p256_test_key.pem"),
        transport.clone(),
        Arc::new(FixedClock(TEST_CLOCK_MS)),
    );

    let request = CreateOrderRequest::new("BTC/USD", OrderType::Market, Side::Buy, 50.0);
    let order = driver.create_order(request).await.unwrap();
    assert_eq!(order.id, "srv-1");

    let seen = transport.seen.lock().unwrap();
    let sent_body = seen.last().unwrap().body.as_ref().unwrap().clone();
    let parsed: serde_json::Value = serde_json::from_slice(&sent_body).unwrap();
    assert_eq!(parsed["order_configuration"]["market_market_ioc"]["quote_size"], "50");
    assert!(parsed["order_configuration"]["market_market_ioc"].get("base_size").is_none());
    assert!(!parsed["client_order_id"].as_str().unwrap().is_empty());
}

/// KuCoin's candle endpoint returns `[time, open, close, high, low, volume, turnover]`,
/// newest-first (spec §8 scenario 3): the driver must reorder into OHLC and chronological order.
#[tokio::test]
async fn kucoin_fetch_ohlcv_reshapes_and_reorders_candles() {
    let transport = Arc::new(RecordingTransport::new(
        r#"{"code":"200000","data":[
            ["1700000060","10","15","12","8","100","1200"],
            ["1700000000","9","12","11","7","80","900"]
        ]}"#,
    ));
    let driver = KucoinDriver::new(
        "key",
        "secret",
        "passphrase",
        transport,
        Arc::new(FixedClock(TEST_CLOCK_MS)),
    );

    let candles = driver.fetch_ohlcv("BTC/USDT", "1min", None, None).await.unwrap();
    assert_eq!(candles.len(), 2);
    assert_eq!(candles[0].timestamp_ms, 1_700_000_000_000);
    assert_eq!(candles[0].open, 9.0);
    assert_eq!(candles[0].high, 11.0);
    assert_eq!(candles[0].low, 7.0);
    assert_eq!(candles[0].close, 12.0);
    assert_eq!(candles[1].timestamp_ms, 1_700_000_060_000);
}

/// Pionex market buys carry `amount` (quote); market sells carry `size` (base) (spec §9).
#[tokio::test]
async fn pionex_market_buy_uses_amount_market_sell_uses_size() {
    let transport = Arc::new(RecordingTransport::new(
        r#"{"result": true, "data": {"orderId": "po-1"}}"#,
    ));
    let driver = PionexDriver::new("key", "secret", transport.clone(), Arc::new(FixedClock(TEST_CLOCK_MS)));

    driver
        .create_order(CreateOrderRequest::new("BTC/USDT", OrderType::Market, Side::Buy, 50.0))
        .await
        .unwrap();
    {
        let seen = transport.seen.lock().unwrap();
        let body = seen.last().unwrap().body.as_ref().unwrap().clone();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["amount"], "50");
        assert!(parsed.get("size").is_none());
    }

    driver
        .create_order(CreateOrderRequest::new("BTC/USDT", OrderType::Market, Side::Sell, 0.01))
        .await
        .unwrap();
    let seen = transport.seen.lock().unwrap();
    let body = seen.last().unwrap().body.as_ref().unwrap().clone();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["size"], "0.01");
    assert!(parsed.get("amount").is_none());
}
