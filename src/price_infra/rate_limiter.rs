use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use crate::config::RateLimitConfig;
use crate::utils::clock::{Clock, SystemClock};

/// Fixed-window admission control keyed by caller identity.
///
/// All buckets sit behind one mutex. Each call holds it for a single
/// O(1) read-modify-write and never across I/O or an `.await`.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    max_requests: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
}

struct Bucket {
    count: u32,
    window_start: Instant,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self::with_clock(max_requests, window, Arc::new(SystemClock))
    }

    pub fn with_clock(max_requests: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        RateLimiter {
            buckets: Mutex::new(HashMap::new()),
            max_requests,
            window,
            clock,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window())
    }

    /// Admit or deny one request for `key`.
    pub fn allow(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut buckets = self.lock();

        if let Some(bucket) = buckets.get_mut(key) {
            if now.duration_since(bucket.window_start) < self.window {
                if bucket.count < self.max_requests {
                    bucket.count += 1;
                    return true;
                }
                return false;
            }
        }

        // Absent or expired: start a fresh window
        if self.max_requests == 0 {
            return false;
        }
        buckets.insert(key.to_string(), Bucket {
            count: 1,
            window_start: now,
        });
        true
    }

    /// Drop buckets whose window has elapsed. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let mut buckets = self.lock();
        let before = buckets.len();
        buckets.retain(|_, bucket| now.duration_since(bucket.window_start) < self.window);
        before - buckets.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Bucket>> {
        // Buckets stay consistent even if a holder panicked mid-update
        self.buckets.lock().unwrap_or_else(|e| e.into_inner())
    }
}
