//! Per-venue drivers (spec §4): each module owns a [`Signer`](xchange_integration::protocol::http::Signer),
//! an [`ErrorTable`](common::ErrorTable), and an [`Exchange`](crate::exchange::Exchange) impl for
//! one venue's REST/WebSocket dialect.

pub mod common;

pub mod binance;
pub mod bitrue;
pub mod bitstamp;
pub mod bittrex;
pub mod coinbase;
pub mod kraken;
pub mod kucoin;
pub mod lbank;
pub mod pionex;
