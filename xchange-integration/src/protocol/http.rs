//! HTTP transport abstraction and the signed-request orchestrator (spec §4.4, §4.5).
//!
//! The teacher's `RestClient` wraps a `reqwest::Client` directly; here the transport is an
//! injectable [`HttpTransport`] so a driver can be exercised in tests against a fake transport
//! that replays canned fixtures (spec §8) without opening real sockets.

use crate::error::SocketError;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Content encoding for a request body (spec §4.5 step 3).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BodyMode {
    FormUrlEncoded,
    Json,
}

/// A fully-built HTTP request, independent of any concrete HTTP client library.
#[derive(Debug, Clone)]
pub struct HttpRequestSpec {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpResponseSpec {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

/// The (b) HTTP transport collaborator from spec §1. `ReqwestTransport` is the production
/// implementation; tests supply a fake.
#[async_trait]
pub trait HttpTransport: Send + Sync + Debug {
    async fn execute(&self, request: HttpRequestSpec) -> Result<HttpResponseSpec, SocketError>;
}

/// Production [`HttpTransport`] backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequestSpec) -> Result<HttpResponseSpec, SocketError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_lowercase(), v.to_owned())))
            .collect();
        let body = response.bytes().await?;

        Ok(HttpResponseSpec { status, headers, body })
    }
}

/// Per-venue signer hook (spec §4.4). Given a built request, produces whatever headers and/or
/// URL rewriting the venue's authentication scheme requires.
///
/// Modelled as a plain function-valued contract (spec §9: "express as function-valued fields
/// on the driver ... not ad-hoc overrides baked into the orchestrator") rather than inheritance.
pub trait Signer: Send + Sync + Debug {
    /// Signs `request`, returning the headers to attach and, for signers that must rewrite the
    /// target (Binance-family POST signature-in-URL, Coinbase JWT bearer), an optional full URL
    /// override.
    fn sign(&self, request: &HttpRequestSpec) -> Result<SignedRequest, SocketError>;
}

#[derive(Debug, Clone, Default)]
pub struct SignedRequest {
    pub headers: Vec<(String, String)>,
    pub url_override: Option<String>,
    pub body_override: Option<Bytes>,
}

/// Maps a non-2xx HTTP response or a parsed venue error envelope into the unified taxonomy
/// (spec §4.6, §7). Returns the raw message string; callers convert into
/// `xchange_model::ExchangeError` with venue context attached.
pub trait ErrorMapper: Send + Sync + Debug {
    /// Maps a venue-specific error code (already extracted from the envelope) to a unified
    /// error-kind tag, used by drivers to build `xchange_model::ExchangeError`.
    fn map_code(&self, code: &str, message: &str) -> (&'static str, String);
}

/// Default HTTP-status fallback taxonomy (spec §4.6): used when a venue error table has no
/// entry for the encountered code, or when the envelope carries no code at all.
pub fn map_http_status(status: u16) -> &'static str {
    match status {
        400 => "BadRequest",
        401 | 403 => "AuthenticationError",
        404 => "ExchangeError",
        429 | 418 => "RateLimitExceeded",
        500..=599 => "ExchangeNotAvailable",
        _ => "ExchangeError",
    }
}
