//! Per-venue credential material (spec §6): the one external collaborator beyond clock and
//! transports that the core consumes.

use std::time::Duration;

/// Write-once at construction (spec §5); never logged.
#[derive(Clone, Default)]
pub struct Credentials {
    pub api_key: Option<String>,
    /// Raw string for most venues; base64 for Kraken; a PEM-encoded EC P-256 private key for
    /// Coinbase Advanced Trade.
    pub secret: Option<String>,
    /// KuCoin only.
    pub passphrase: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .field("passphrase", &self.passphrase.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            secret: Some(secret.into()),
            passphrase: None,
        }
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }

    pub fn secret(&self) -> &str {
        self.secret.as_deref().unwrap_or_default()
    }
}

/// Driver-wide construction options (spec §6: `timeout`, `verbose`, `enableRateLimit`,
/// `recvWindow`).
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub credentials: Credentials,
    pub timeout: Duration,
    pub verbose: bool,
    pub enable_rate_limit: bool,
    /// Binance-family `recvWindow`, milliseconds.
    pub recv_window: i64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            timeout: Duration::from_secs(10),
            verbose: false,
            enable_rate_limit: true,
            recv_window: 5_000,
        }
    }
}

impl DriverConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            ..Default::default()
        }
    }
}
