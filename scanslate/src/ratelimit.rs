//! Per-client fixed-window admission control.
//!
//! Each client key owns a [`RateWindow`]. A request is admitted while the
//! window's count is below the limit; once the window has elapsed the count
//! starts again from zero. Rejected requests do not consume a slot.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Deserialize;

/// Parsed `N/unit` policy such as `10/minute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct RateLimitSpec {
    pub limit: u32,
    pub window: Duration,
}

impl RateLimitSpec {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }
}

impl fmt::Display for RateLimitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}s", self.limit, self.window.as_secs())
    }
}

fn parse_unit(unit: &str) -> Option<u64> {
    match unit.trim().to_lowercase().as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => Some(1),
        "m" | "min" | "mins" | "minute" | "minutes" => Some(60),
        "h" | "hr" | "hour" | "hours" => Some(3600),
        "d" | "day" | "days" => Some(86_400),
        _ => None,
    }
}

impl FromStr for RateLimitSpec {
    type Err = String;

    /// Accepts `10/minute`, `10 per minute`, `100/hour`, `5/s`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (count, unit) = trimmed
            .split_once('/')
            .or_else(|| trimmed.split_once(" per "))
            .ok_or_else(|| format!("expected '<count>/<unit>', got '{trimmed}'"))?;

        let limit: u32 = count
            .trim()
            .parse()
            .map_err(|e| format!("invalid request count '{}': {e}", count.trim()))?;
        if limit == 0 {
            return Err("request count must be greater than zero".to_string());
        }

        let secs = parse_unit(unit).ok_or_else(|| format!("unknown time unit '{}'", unit.trim()))?;

        Ok(Self::new(limit, Duration::from_secs(secs)))
    }
}

impl TryFrom<String> for RateLimitSpec {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u32 },
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct RateWindow {
    pub client_key: String,
    pub window_start: Instant,
    pub count: u32,
}

/// Shared admission counter. Clones share the same windows.
#[derive(Clone, Default)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<String, RateWindow>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    // Window updates are plain field writes; a poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateWindow>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn admit(&self, client_key: &str, limit: u32, window: Duration) -> Admission {
        self.admit_at(client_key, limit, window, Instant::now())
    }

    pub fn admit_at(
        &self,
        client_key: &str,
        limit: u32,
        window: Duration,
        now: Instant,
    ) -> Admission {
        let mut windows = self.lock();
        let entry = windows
            .entry(client_key.to_string())
            .or_insert_with(|| RateWindow {
                client_key: client_key.to_string(),
                window_start: now,
                count: 0,
            });

        if now.saturating_duration_since(entry.window_start) >= window {
            entry.window_start = now;
            entry.count = 0;
        }

        if entry.count >= limit {
            let elapsed = now.saturating_duration_since(entry.window_start);
            return Admission::Denied {
                retry_after: window.saturating_sub(elapsed),
            };
        }

        entry.count += 1;
        Admission::Allowed {
            remaining: limit - entry.count,
        }
    }

    /// Drop windows that have fully elapsed. Returns how many were removed.
    pub fn sweep(&self, window: Duration) -> usize {
        self.sweep_at(window, Instant::now())
    }

    pub fn sweep_at(&self, window: Duration, now: Instant) -> usize {
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|_, w| now.saturating_duration_since(w.window_start) < window);
        before - windows.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }
}
