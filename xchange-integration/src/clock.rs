//! The clock collaborator (spec §1: the core consumes only a clock, an HTTP transport, a
//! WebSocket transport, and credential material). Injectable so signer determinism (spec §8)
//! is testable without depending on wall-clock time.

use std::fmt::Debug;

pub trait Clock: Send + Sync + Debug {
    /// Milliseconds since the Unix epoch.
    fn now_unix_millis(&self) -> i64;

    /// Microseconds since the Unix epoch, used by Kraken's nonce (spec §4.4).
    fn now_unix_micros(&self) -> i64 {
        self.now_unix_millis() * 1_000
    }
}

/// Real wall-clock time via `chrono`.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock frozen at a fixed instant, for signer-determinism tests (spec §8).
#[derive(Debug, Copy, Clone)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_unix_millis(&self) -> i64 {
        self.0
    }
}
