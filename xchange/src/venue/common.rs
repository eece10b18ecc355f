//! Shared helpers every venue module builds on: HTTP request construction and the per-venue
//! error-code table pattern (spec §4.6).

use std::collections::HashMap;
use std::time::Duration;
use xchange_integration::coerce::build_encoded_query;
use xchange_integration::protocol::http::{BodyMode, HttpMethod, HttpRequestSpec};
use xchange_model::ExchangeError;

/// A venue's `code -> unified kind` table (spec §4.6). Unknown codes fall back to
/// `ExchangeError` via [`ErrorTable::map`]'s caller.
#[derive(Debug, Clone, Default)]
pub struct ErrorTable {
    codes: HashMap<&'static str, &'static str>,
}

impl ErrorTable {
    pub fn new(entries: &[(&'static str, &'static str)]) -> Self {
        Self {
            codes: entries.iter().copied().collect(),
        }
    }

    /// Builds an [`ExchangeError`] for `venue`, looking up `code` in the table and falling back
    /// to the generic `ExchangeError` kind when absent.
    pub fn map(&self, venue: &'static str, code: &str, message: impl Into<String>) -> ExchangeError {
        let kind = self.codes.get(code).copied().unwrap_or("ExchangeError");
        ExchangeError::from_kind(venue, kind, message)
    }

    /// Scans `message` for each known substring key, in table order, returning the first match
    /// (spec §4.6: Kraken's `error` array is matched by message substring, not an exact code).
    pub fn map_by_substring(
        &self,
        venue: &'static str,
        message: &str,
    ) -> ExchangeError {
        for (needle, kind) in &self.codes {
            if message.contains(needle) {
                return ExchangeError::from_kind(venue, kind, message.to_string());
            }
        }
        ExchangeError::ExchangeError {
            venue,
            message: message.to_string(),
        }
    }
}

/// Builds a GET request with an alphabetized, percent-encoded query string (spec §4.1).
pub fn get(base_url: &str, path: &str, params: &[(&str, String)], timeout: Duration) -> HttpRequestSpec {
    let query = build_encoded_query(params);
    let url = if query.is_empty() {
        format!("{base_url}{path}")
    } else {
        format!("{base_url}{path}?{query}")
    };
    HttpRequestSpec {
        method: HttpMethod::Get,
        url,
        headers: Vec::new(),
        body: None,
        timeout,
    }
}

pub fn delete(base_url: &str, path: &str, params: &[(&str, String)], timeout: Duration) -> HttpRequestSpec {
    let mut spec = get(base_url, path, params, timeout);
    spec.method = HttpMethod::Delete;
    spec
}

/// Builds a POST request, body-encoded per `mode` (spec §4.5 step 3).
pub fn post(
    base_url: &str,
    path: &str,
    params: &[(&str, String)],
    mode: BodyMode,
    timeout: Duration,
) -> HttpRequestSpec {
    let (body, content_type) = match mode {
        BodyMode::FormUrlEncoded => (
            build_encoded_query(params),
            "application/x-www-form-urlencoded",
        ),
        BodyMode::Json => {
            let object: serde_json::Map<String, serde_json::Value> = params
                .iter()
                .map(|(k, v)| ((*k).to_string(), serde_json::Value::String(v.clone())))
                .collect();
            (
                serde_json::Value::Object(object).to_string(),
                "application/json",
            )
        }
    };

    HttpRequestSpec {
        method: HttpMethod::Post,
        url: format!("{base_url}{path}"),
        headers: vec![("Content-Type".to_string(), content_type.to_string())],
        body: Some(body.into_bytes().into()),
        timeout,
    }
}

/// Builds a POST request with a pre-serialized JSON body (used whenever the body shape is
/// nested, e.g. Coinbase's `order_configuration`).
pub fn post_json(base_url: &str, path: &str, body: serde_json::Value, timeout: Duration) -> HttpRequestSpec {
    HttpRequestSpec {
        method: HttpMethod::Post,
        url: format!("{base_url}{path}"),
        headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        body: Some(body.to_string().into_bytes().into()),
        timeout,
    }
}
