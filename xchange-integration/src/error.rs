use thiserror::Error;

/// Transport-level errors generated by `xchange-integration`.
///
/// This sits below the per-venue [`ExchangeError`](https://docs.rs/xchange-model) taxonomy: a
/// driver's error mapper turns a `SocketError` (and venue error envelopes) into the unified
/// kind a caller actually wants.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("deserialising JSON error: {error} for payload: {payload}")]
    Deserialise {
        error: serde_json::Error,
        payload: String,
    },

    #[error("serialising JSON error: {0}")]
    Serialise(serde_json::Error),

    #[error("query string serialisation error: {0}")]
    QueryParams(#[from] serde_urlencoded::ser::Error),

    #[error("error parsing Url: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("error subscribing to resources over the socket: {0}")]
    Subscribe(String),

    #[error("WebSocket stream terminated with closing frame: {0}")]
    Terminated(String),

    #[error("{entity} does not support: {item}")]
    Unsupported { entity: &'static str, item: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("HTTP request timed out")]
    HttpTimeout(reqwest::Error),

    #[error("HTTP response (status={0}) error: {1}")]
    HttpResponse(reqwest::StatusCode, String),

    #[error("cryptographic signing error: {0}")]
    Sign(String),

    #[error("failed to decompress WebSocket frame: {0}")]
    Decompress(String),
}

impl From<reqwest::Error> for SocketError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            SocketError::HttpTimeout(error)
        } else {
            SocketError::Http(error)
        }
    }
}
