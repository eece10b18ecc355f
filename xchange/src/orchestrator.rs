//! The request orchestrator (spec §4.5): rate-limit, sign, execute, map errors.
//!
//! Grounded on the teacher's `barter-integration` `RestClient`, generalized from a single fixed
//! signer to a per-call signer reference so one orchestrator instance serves every endpoint a
//! driver exposes, signed or not.

use std::sync::Arc;
use std::time::Duration;
use xchange_integration::protocol::http::{HttpRequestSpec, HttpTransport, Signer};
use xchange_model::ExchangeError;

/// Owned by every driver (spec §3 "Base exchange runtime"): wires the rate limiter, HTTP
/// transport, and a venue's error-mapping into one `execute` call.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    pub venue: &'static str,
    pub transport: Arc<dyn HttpTransport>,
    pub rate_limiter: Arc<xchange_integration::ratelimit::RateLimiter>,
    pub timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        venue: &'static str,
        transport: Arc<dyn HttpTransport>,
        rate_limiter: Arc<xchange_integration::ratelimit::RateLimiter>,
        timeout: Duration,
    ) -> Self {
        Self {
            venue,
            transport,
            rate_limiter,
            timeout,
        }
    }

    /// Runs steps 1, 2, 4, 5 of spec §4.5. Step 3 (URL/body composition) and step 6/7 (envelope
    /// unwrapping and venue error-code mapping) are driver concerns, since they're dialect
    /// specific; this only applies the HTTP-status fallback taxonomy (spec §4.6) to non-2xx
    /// responses, which every venue shares.
    pub async fn execute(
        &self,
        mut request: HttpRequestSpec,
        signer: Option<&dyn Signer>,
        weight: f64,
    ) -> Result<RawResponse, ExchangeError> {
        self.rate_limiter.consume(weight.max(1.0)).await;

        if let Some(signer) = signer {
            let signed = signer
                .sign(&request)
                .map_err(|e| ExchangeError::AuthenticationError {
                    venue: self.venue,
                    message: e.to_string(),
                })?;
            request.headers.extend(signed.headers);
            if let Some(url) = signed.url_override {
                request.url = url;
            }
            if let Some(body) = signed.body_override {
                request.body = Some(body);
            }
        }

        let response = self.transport.execute(request).await.map_err(|e| {
            use xchange_integration::error::SocketError;
            match e {
                SocketError::HttpTimeout(_) => ExchangeError::RequestTimeout {
                    venue: self.venue,
                    message: e.to_string(),
                },
                other => ExchangeError::NetworkError {
                    venue: self.venue,
                    message: other.to_string(),
                },
            }
        })?;

        if !(200..300).contains(&response.status) {
            return Err(ExchangeError::http(
                self.venue,
                response.status,
                String::from_utf8_lossy(&response.body).into_owned(),
            ));
        }

        let body: serde_json::Value = serde_json::from_slice(&response.body).map_err(|e| {
            ExchangeError::ExchangeError {
                venue: self.venue,
                message: format!("invalid JSON response: {e}"),
            }
        })?;

        Ok(RawResponse {
            status: response.status,
            headers: response.headers,
            body,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: std::collections::HashMap<String, String>,
    pub body: serde_json::Value,
}
