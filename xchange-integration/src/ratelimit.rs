//! Client-side token-bucket rate limiter over "weight" units (spec §4.3).
//!
//! Parameterized by `capacity` (bucket size) and `interval` (replenish window): the bucket
//! refills continuously at `capacity / interval` tokens per second. `consume` suspends the
//! caller until enough capacity is available and only deducts on success, so a cancelled
//! waiter (the future simply dropped) never decrements the bucket.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Bucket {
    capacity: f64,
    tokens: f64,
    interval: Duration,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed > Duration::ZERO {
            let rate = self.capacity / self.interval.as_secs_f64();
            self.tokens = (self.tokens + rate * elapsed.as_secs_f64()).min(self.capacity);
            self.last_refill = now;
        }
    }
}

/// A per-driver rate limiter. Internally synchronized (spec §5): safe to share across
/// concurrently executing requests on the same driver.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(capacity: f64, interval: Duration) -> Self {
        Self {
            bucket: Mutex::new(Bucket {
                capacity,
                tokens: capacity,
                interval,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Blocks the caller until `weight` units of capacity are available, then deducts them.
    ///
    /// A dropped (cancelled) `consume` future never mutates the bucket: the deduction only
    /// happens on the synchronous fast path below, never across a suspension point.
    pub async fn consume(&self, weight: f64) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock();
                bucket.refill();
                if bucket.tokens >= weight {
                    bucket.tokens -= weight;
                    None
                } else {
                    let deficit = weight - bucket.tokens;
                    let rate = bucket.capacity / bucket.interval.as_secs_f64();
                    Some(Duration::from_secs_f64((deficit / rate).max(0.001)))
                }
            };

            match wait {
                None => return,
                Some(duration) => tokio::time::sleep(duration).await,
            }
        }
    }

    /// Reconciles drift using a server-provided `used-weight` header: sets the consumed count
    /// directly rather than accumulating on top of the locally tracked usage.
    pub fn update_from_header(&self, used_weight: f64) {
        let mut bucket = self.bucket.lock();
        bucket.refill();
        bucket.tokens = (bucket.capacity - used_weight).clamp(0.0, bucket.capacity);
    }

    /// Current available token count, primarily for tests.
    pub fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock();
        bucket.refill();
        bucket.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn consume_deducts_capacity() {
        let limiter = RateLimiter::new(10.0, Duration::from_secs(1));
        limiter.consume(4.0).await;
        assert!((limiter.available() - 6.0).abs() < 0.5);
    }

    #[tokio::test]
    async fn cancelled_waiter_does_not_consume() {
        let limiter = RateLimiter::new(1.0, Duration::from_secs(60));
        limiter.consume(1.0).await;
        assert!(limiter.available() < 0.1);

        let fut = limiter.consume(1.0);
        drop(fut); // never polled to completion: must not deduct

        // Still essentially empty - cancellation did not reserve capacity twice, nor consume.
        assert!(limiter.available() < 0.1);
    }

    #[tokio::test]
    async fn update_from_header_reconciles_drift() {
        let limiter = RateLimiter::new(100.0, Duration::from_secs(1));
        limiter.update_from_header(80.0);
        assert!((limiter.available() - 20.0).abs() < 0.5);
    }
}
