use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{self, Duration, Instant};

/// Serializes requests to a rate limited API.
///
/// Only one permit is outstanding at a time, and a new permit is not handed out before the
/// backoff recorded by the previous holder has elapsed.
#[derive(Debug)]
pub struct RateLimiter {
    not_before: Mutex<Instant>,
}

/// Exclusive right to issue one request.
///
/// Dropping the permit without calling [`RateLimitPermit::release`] releases it with no backoff.
#[derive(Debug)]
pub struct RateLimitPermit<'a> {
    not_before: MutexGuard<'a, Instant>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            not_before: Mutex::new(Instant::now()),
        }
    }

    pub async fn acquire(&self) -> RateLimitPermit<'_> {
        let not_before = self.not_before.lock().await;
        if Instant::now() < *not_before {
            tracing::debug!(
                "waiting {:?} before next request",
                *not_before - Instant::now()
            );
            time::sleep_until(*not_before).await;
        }

        RateLimitPermit { not_before }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitPermit<'_> {
    /// Releases the permit. The next permit is granted no earlier than `backoff` from now.
    pub fn release(mut self, backoff: Duration) {
        *self.not_before = Instant::now() + backoff;
    }
}
