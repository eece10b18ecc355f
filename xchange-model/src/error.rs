//! The unified error taxonomy (spec §7). Every driver's error mapper converts venue HTTP
//! statuses and error envelopes into one of these kinds.

use thiserror::Error;

/// `"{venueId} {code}: {message}"` or `"{venueId} HTTP {status}: {body}"` (spec §7), with
/// venue-raw fields attached where available for diagnosis.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("{venue} AuthenticationError: {message}")]
    AuthenticationError { venue: &'static str, message: String },

    #[error("{venue} BadRequest: {message}")]
    BadRequest { venue: &'static str, message: String },

    #[error("{venue} BadSymbol: {message}")]
    BadSymbol { venue: &'static str, message: String },

    #[error("{venue} InvalidOrder: {message}")]
    InvalidOrder { venue: &'static str, message: String },

    #[error("{venue} OrderNotFound: {message}")]
    OrderNotFound { venue: &'static str, message: String },

    #[error("{venue} InsufficientFunds: {message}")]
    InsufficientFunds { venue: &'static str, message: String },

    #[error("{venue} RateLimitExceeded: {message}")]
    RateLimitExceeded { venue: &'static str, message: String },

    #[error("{venue} ExchangeNotAvailable: {message}")]
    ExchangeNotAvailable { venue: &'static str, message: String },

    #[error("{venue} ExchangeError: {message}")]
    ExchangeError { venue: &'static str, message: String },

    #[error("{venue} NetworkError: {message}")]
    NetworkError { venue: &'static str, message: String },

    #[error("{venue} RequestTimeout: {message}")]
    RequestTimeout { venue: &'static str, message: String },

    #[error("{venue} does not support {method}")]
    FeatureUnsupported { venue: &'static str, method: &'static str },
}

impl ExchangeError {
    /// Builds an [`ExchangeError`] from the `&'static str` kind tags produced by
    /// [`xchange_integration::protocol::http::map_http_status`] and per-venue error tables.
    pub fn from_kind(venue: &'static str, kind: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            "AuthenticationError" => Self::AuthenticationError { venue, message },
            "BadRequest" => Self::BadRequest { venue, message },
            "BadSymbol" => Self::BadSymbol { venue, message },
            "InvalidOrder" => Self::InvalidOrder { venue, message },
            "OrderNotFound" => Self::OrderNotFound { venue, message },
            "InsufficientFunds" => Self::InsufficientFunds { venue, message },
            "RateLimitExceeded" => Self::RateLimitExceeded { venue, message },
            "ExchangeNotAvailable" => Self::ExchangeNotAvailable { venue, message },
            "NetworkError" => Self::NetworkError { venue, message },
            "RequestTimeout" => Self::RequestTimeout { venue, message },
            _ => Self::ExchangeError { venue, message },
        }
    }

    pub fn http(venue: &'static str, status: u16, body: impl Into<String>) -> Self {
        let kind = xchange_integration::protocol::http::map_http_status(status);
        Self::from_kind(venue, kind, format!("HTTP {status}: {}", body.into()))
    }
}

impl From<xchange_integration::error::SocketError> for ExchangeError {
    fn from(error: xchange_integration::error::SocketError) -> Self {
        use xchange_integration::error::SocketError;
        match error {
            SocketError::HttpTimeout(_) => Self::RequestTimeout {
                venue: "unknown",
                message: error.to_string(),
            },
            SocketError::Http(_) | SocketError::WebSocket(_) => Self::NetworkError {
                venue: "unknown",
                message: error.to_string(),
            },
            other => Self::ExchangeError {
                venue: "unknown",
                message: other.to_string(),
            },
        }
    }
}
