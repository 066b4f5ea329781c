//! Fixed-window request counting per caller.
//!
//! The limiter is an injected store so call sites never touch the map
//! directly; a distributed implementation can replace [`MemoryRateLimiter`]
//! without changing the routes. Counters live only in process memory; a
//! restart silently resets them, which is an accepted weakness at this scale.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl Decision {
    pub fn is_limited(&self) -> bool {
        matches!(self, Decision::Limited { .. })
    }
}

pub trait RateLimiter: Send + Sync {
    /// Count one request against `key` and decide whether it fits inside the
    /// current window. Increment-then-compare is atomic per key.
    fn check(&self, key: &str, limit: u32, window: Duration) -> Decision;
}

struct Window {
    count: u32,
    reset_at: Instant,
}

#[derive(Default)]
pub struct MemoryRateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimiter for MemoryRateLimiter {
    fn check(&self, key: &str, limit: u32, window: Duration) -> Decision {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap();
        let entry = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            reset_at: now + window,
        });

        // The window resets wholesale, exactly once per boundary.
        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + window;
        }

        if entry.count >= limit {
            Decision::Limited {
                retry_after: entry.reset_at.saturating_duration_since(now),
            }
        } else {
            entry.count += 1;
            Decision::Allowed {
                remaining: limit - entry.count,
            }
        }
    }
}
