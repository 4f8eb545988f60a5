//! Minimum-interval gate for calls to rate-limited services.
//!
//! Every caller of [`MinIntervalGate::wait`] is released no sooner than
//! `interval` after the previous release. Callers are serialized through
//! the gate, so it also bounds concurrency to one call at a time.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct MinIntervalGate {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl MinIntervalGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep until the interval since the previous release has elapsed.
    /// The first call never waits.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
