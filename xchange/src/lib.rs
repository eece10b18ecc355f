//! A unified client library for cryptocurrency exchange REST and WebSocket APIs (spec §1).
//!
//! A single [`Exchange`] trait fronts nine venue drivers (Binance-family, Bitrue, Bitstamp,
//! Bittrex, Coinbase Advanced Trade, Kraken, KuCoin, LBank, Pionex), each translating its own
//! wire dialect — signing scheme, rate limits, error codes, and WebSocket framing — into the
//! same normalized [`Market`](xchange_instrument::market::Market), [`Ticker`], [`OrderBook`],
//! [`Order`] and [`Candle`] shapes. The core itself depends on nothing venue specific: just a
//! [`Clock`](xchange_integration::clock::Clock), an
//! [`HttpTransport`](xchange_integration::protocol::http::HttpTransport), a
//! [`WsTransport`](xchange_integration::protocol::websocket::WsTransport), and per-venue
//! [`Credentials`].

pub mod capability;
pub mod credentials;
pub mod exchange;
pub mod orchestrator;
pub mod venue;

pub use capability::Capabilities;
pub use credentials::{Credentials, DriverConfig};
pub use exchange::{CreateOrderRequest, Exchange};
pub use orchestrator::{Orchestrator, RawResponse};

pub use venue::binance::BinanceDriver;
pub use venue::bitrue::BitrueDriver;
pub use venue::bitstamp::BitstampDriver;
pub use venue::bittrex::BittrexDriver;
pub use venue::coinbase::CoinbaseDriver;
pub use venue::kraken::KrakenDriver;
pub use venue::kucoin::KucoinDriver;
pub use venue::lbank::LbankDriver;
pub use venue::pionex::PionexDriver;
