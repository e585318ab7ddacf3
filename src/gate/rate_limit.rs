use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Per-client state of the current window.
#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    window_start: Instant,
}

/// Fixed-window request counter keyed by client.
///
/// A window is reset lazily by the first request arriving after it expired.
/// A `limit` of 0 turns limiting off.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    entries: Mutex<HashMap<String, WindowEntry>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Counts a request of `client` and reports whether it is within the limit.
    pub fn check(&self, client: &str) -> bool {
        self.check_at(client, Instant::now())
    }

    pub(crate) fn check_at(&self, client: &str, now: Instant) -> bool {
        if self.limit == 0 {
            return true;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get_mut(client) {
            Some(entry) if now.saturating_duration_since(entry.window_start) > self.window => {
                entry.count = 1;
                entry.window_start = now;
                true
            }
            Some(entry) => {
                entry.count = entry.count.saturating_add(1);
                entry.count <= self.limit
            }
            None => {
                entries.insert(
                    client.to_owned(),
                    WindowEntry {
                        count: 1,
                        window_start: now,
                    },
                );
                true
            }
        }
    }
}
