//! Fixed-window write budget per owner.
//!
//! The limiter is an owned value injected into [`crate::Quire`]; there is no
//! process-global counter. Each key gets `limit` admissions per window; the
//! counter resets once the window has elapsed. Expired windows are evicted
//! in bulk at most once per window length from [`FixedWindowLimiter::check_at`],
//! so the map stays bounded by the keys active in the last two windows.
//! [`FixedWindowLimiter::sweep`] forces an eviction pass.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
struct Windows<K> {
    by_key: HashMap<K, Window>,
    swept_at: Option<Instant>,
}

impl<K: Eq + Hash> Windows<K> {
    fn sweep_due(&self, now: Instant, window: Duration) -> bool {
        self.swept_at
            .map_or(true, |at| now.saturating_duration_since(at) >= window)
    }

    fn evict_expired(&mut self, now: Instant, window: Duration) -> usize {
        let before = self.by_key.len();
        self.by_key
            .retain(|_, w| now.saturating_duration_since(w.started) < window);
        self.swept_at = Some(now);
        let evicted = before - self.by_key.len();
        if evicted > 0 {
            debug!(
                subsystem = "core",
                component = "rate_limit",
                op = "sweep",
                evicted,
                tracked = self.by_key.len(),
                "Evicted expired windows"
            );
        }
        evicted
    }
}

/// Fixed-window counter store.
#[derive(Debug)]
pub struct FixedWindowLimiter<K = crate::models::OwnerId> {
    limit: u32,
    window: Duration,
    windows: Mutex<Windows<K>>,
}

impl<K: Eq + Hash + Clone> FixedWindowLimiter<K> {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(Windows {
                by_key: HashMap::new(),
                swept_at: None,
            }),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admit one request for `key`.
    pub fn check(&self, key: &K) -> Result<()> {
        self.check_at(key, Instant::now())
    }

    /// Admit one request for `key` as of `now`.
    pub fn check_at(&self, key: &K, now: Instant) -> Result<()> {
        let mut windows = self
            .windows
            .lock()
            .map_err(|_| Error::Persistence("rate limiter state poisoned".to_string()))?;

        if windows.sweep_due(now, self.window) {
            windows.evict_expired(now, self.window);
        }

        let entry = windows.by_key.entry(key.clone()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.saturating_duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.limit {
            let elapsed = now.saturating_duration_since(entry.started);
            let retry_after = self.window.saturating_sub(elapsed);
            warn!(
                subsystem = "core",
                component = "rate_limit",
                limit = self.limit,
                retry_after_ms = retry_after.as_millis() as u64,
                "Write budget exhausted"
            );
            return Err(Error::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }

        entry.count += 1;
        Ok(())
    }

    /// Drop every window that has elapsed as of `now`. Returns the number evicted.
    pub fn sweep(&self, now: Instant) -> usize {
        match self.windows.lock() {
            Ok(mut windows) => windows.evict_expired(now, self.window),
            Err(_) => 0,
        }
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.windows.lock().map(|w| w.by_key.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_up_to_limit() {
        let limiter = FixedWindowLimiter::<&str>::new(3, Duration::from_secs(60));
        let now = Instant::now();

        for _ in 0..3 {
            limiter.check_at(&"alice", now).unwrap();
        }
        let err = limiter.check_at(&"alice", now).unwrap_err();
        assert!(matches!(err, Error::RateLimited { retry_after_secs: 60 }));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = FixedWindowLimiter::<&str>::new(1, Duration::from_secs(60));
        let now = Instant::now();

        limiter.check_at(&"alice", now).unwrap();
        limiter.check_at(&"bob", now).unwrap();
        assert!(limiter.check_at(&"alice", now).is_err());
    }

    #[test]
    fn test_window_resets() {
        let limiter = FixedWindowLimiter::<&str>::new(1, Duration::from_secs(10));
        let start = Instant::now();

        limiter.check_at(&"alice", start).unwrap();
        assert!(limiter
            .check_at(&"alice", start + Duration::from_secs(9))
            .is_err());
        limiter
            .check_at(&"alice", start + Duration::from_secs(10))
            .unwrap();
    }

    #[test]
    fn test_retry_after_counts_down() {
        let limiter = FixedWindowLimiter::<&str>::new(1, Duration::from_secs(30));
        let start = Instant::now();
        limiter.check_at(&"alice", start).unwrap();

        let err = limiter
            .check_at(&"alice", start + Duration::from_secs(20))
            .unwrap_err();
        assert!(matches!(err, Error::RateLimited { retry_after_secs: 10 }));
    }

    #[test]
    fn test_sweep_evicts_expired() {
        let limiter = FixedWindowLimiter::<u32>::new(5, Duration::from_secs(10));
        let start = Instant::now();
        limiter.check_at(&1, start).unwrap();
        limiter
            .check_at(&2, start + Duration::from_secs(5))
            .unwrap();

        assert_eq!(limiter.sweep(start + Duration::from_secs(12)), 1);
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn test_admission_evicts_idle_keys() {
        let window = Duration::from_secs(10);
        let limiter = FixedWindowLimiter::<u32>::new(5, window);
        let start = Instant::now();

        limiter.check_at(&1, start).unwrap();
        limiter.check_at(&2, start + window * 2).unwrap();

        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn test_admission_sweeps_at_most_once_per_window() {
        let window = Duration::from_secs(10);
        let limiter = FixedWindowLimiter::<u32>::new(5, window);
        let start = Instant::now();

        limiter.check_at(&1, start).unwrap();
        limiter.check_at(&2, start + Duration::from_secs(9)).unwrap();
        // Key 1 expired at 10s but the last sweep ran at 0s, so 15s sweeps it.
        limiter.check_at(&3, start + Duration::from_secs(15)).unwrap();
        assert_eq!(limiter.tracked(), 2);

        // 19s: key 2 has expired, but the next sweep is not due until 25s.
        limiter.check_at(&4, start + Duration::from_secs(19)).unwrap();
        assert_eq!(limiter.tracked(), 3);

        // 25s: keys 2 and 3 go, key 4 stays.
        limiter.check_at(&5, start + Duration::from_secs(25)).unwrap();
        assert_eq!(limiter.tracked(), 2);
    }
}
