//! Capability bits (spec §9): "not inheritance but a capability set" gating which unified
//! methods a venue driver actually implements. A caller invoking an unsupported method gets
//! [`xchange_model::ExchangeError::FeatureUnsupported`].

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub fetch_ticker: bool,
    pub fetch_tickers: bool,
    pub fetch_order_book: bool,
    pub fetch_trades: bool,
    pub fetch_ohlcv: bool,
    pub create_order: bool,
    pub cancel_order: bool,
    pub cancel_all_orders: bool,
    pub fetch_order: bool,
    pub fetch_open_orders: bool,
    pub fetch_closed_orders: bool,
    pub fetch_my_trades: bool,
    pub fetch_balance: bool,
    pub fetch_trading_fees: bool,
    pub watch_ticker: bool,
    pub watch_order_book: bool,
    pub watch_trades: bool,
    pub watch_orders: bool,
    pub watch_my_trades: bool,
}

impl Default for Capabilities {
    /// Every driver starts from the common baseline (spec §4.8) and turns off what it doesn't
    /// implement.
    fn default() -> Self {
        Self {
            fetch_ticker: true,
            fetch_tickers: true,
            fetch_order_book: true,
            fetch_trades: true,
            fetch_ohlcv: true,
            create_order: true,
            cancel_order: true,
            cancel_all_orders: false,
            fetch_order: true,
            fetch_open_orders: true,
            fetch_closed_orders: false,
            fetch_my_trades: true,
            fetch_balance: true,
            fetch_trading_fees: false,
            watch_ticker: false,
            watch_order_book: false,
            watch_trades: false,
            watch_orders: false,
            watch_my_trades: false,
        }
    }
}

/// Raised by a driver's public method when the relevant [`Capabilities`] bit is off.
#[macro_export]
macro_rules! require_capability {
    ($self:expr, $bit:ident, $venue:expr, $method:expr) => {
        if !$self.capabilities().$bit {
            return Err(xchange_model::ExchangeError::FeatureUnsupported {
                venue: $venue,
                method: $method,
            });
        }
    };
}
