//! In-memory sliding-window login rate limiter.
//!
//! Each client IP gets one [`RateLimitCounter`]. A counter's window starts at its first
//! attempt and resets on the first access after the window has fully elapsed. At most
//! `max_attempts` requests are admitted per window; the rest are blocked until the window
//! resets.
//!
//! # Limitations
//!
//! Counters live in process memory. A restart clears them and several instances each keep
//! their own, so an attacker spreading requests across instances gets `max_attempts` per
//! instance. This is a throttle, not a security boundary.
//!
//! # Example
//!
//! ```rust
//! use shopkeep_core::services::{LoginRateLimiter, RateLimitConfig, RateLimitDecision};
//!
//! let limiter = LoginRateLimiter::new(RateLimitConfig::default());
//! for _ in 0..5 {
//!     assert!(limiter.check_and_record("10.0.0.5").is_allowed());
//! }
//! assert!(matches!(
//!     limiter.check_and_record("10.0.0.5"),
//!     RateLimitDecision::Block { .. }
//! ));
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::{sync::watch, task::JoinHandle};

const DEFAULT_SWEEP_PERIOD: std::time::Duration = std::time::Duration::from_secs(15 * 60);

/// Configuration for the login rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Length of a counting window.
    pub window: Duration,
    /// Attempts admitted per window.
    pub max_attempts: u32,
}

impl RateLimitConfig {
    pub fn new(window: Duration, max_attempts: u32) -> Self {
        Self {
            window,
            max_attempts,
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::minutes(15),
            max_attempts: 5,
        }
    }
}

/// Attempts observed from one IP in its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitCounter {
    pub count: u32,
    pub window_start: DateTime<Utc>,
}

impl RateLimitCounter {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.window_start > window
    }
}

/// Result of [`LoginRateLimiter::check_and_record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// The attempt was counted and may proceed.
    Allow {
        /// Attempts left in the current window after this one.
        remaining: u32,
        /// When the current window ends.
        reset_at: DateTime<Utc>,
    },
    /// The window is exhausted. Nothing was counted.
    Block {
        /// Seconds until the window ends, at least 1.
        retry_after_seconds: u64,
        /// `retry_after_seconds` rounded up to whole minutes, at least 1.
        retry_after_minutes: u64,
        /// When the current window ends.
        reset_at: DateTime<Utc>,
    },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allow { .. })
    }

    pub fn remaining(&self) -> u32 {
        match self {
            RateLimitDecision::Allow { remaining, .. } => *remaining,
            RateLimitDecision::Block { .. } => 0,
        }
    }

    pub fn reset_at(&self) -> DateTime<Utc> {
        match self {
            RateLimitDecision::Allow { reset_at, .. } | RateLimitDecision::Block { reset_at, .. } => {
                *reset_at
            }
        }
    }

    /// Seconds to wait before retrying, or `None` when allowed.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            RateLimitDecision::Block {
                retry_after_seconds,
                ..
            } => Some(*retry_after_seconds),
            RateLimitDecision::Allow { .. } => None,
        }
    }

    /// Whole minutes to wait before retrying, or `None` when allowed.
    pub fn retry_after_minutes(&self) -> Option<u64> {
        match self {
            RateLimitDecision::Block {
                retry_after_minutes,
                ..
            } => Some(*retry_after_minutes),
            RateLimitDecision::Allow { .. } => None,
        }
    }
}

/// Per-IP login throttle.
///
/// Cheap to clone; clones share the same counters. Construct one per process and hand it to
/// whatever serves login requests.
#[derive(Debug, Clone)]
pub struct LoginRateLimiter {
    counters: Arc<DashMap<String, RateLimitCounter>>,
    config: RateLimitConfig,
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl LoginRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            counters: Arc::new(DashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count an attempt from `ip` unless its window is exhausted.
    pub fn check_and_record(&self, ip: &str) -> RateLimitDecision {
        self.check_and_record_at(ip, Utc::now())
    }

    /// [`check_and_record`](Self::check_and_record) against an explicit clock.
    pub fn check_and_record_at(&self, ip: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let window = self.config.window;

        // The entry guard holds the shard lock until the end of this function, so the
        // reset/compare/increment below is atomic per key.
        let mut counter = self
            .counters
            .entry(ip.to_string())
            .or_insert_with(|| RateLimitCounter::new(now));

        if counter.is_expired(now, window) {
            counter.count = 0;
            counter.window_start = now;
        }

        let reset_at = counter.window_start + window;

        if counter.count >= self.config.max_attempts {
            let left_ms = (window - (now - counter.window_start)).num_milliseconds().max(0) as u64;
            let retry_after_seconds = left_ms.div_ceil(1000).max(1);
            let retry_after_minutes = retry_after_seconds.div_ceil(60).max(1);

            tracing::debug!(
                ip = %ip,
                count = counter.count,
                retry_after_seconds,
                "Login attempt rate limited"
            );

            return RateLimitDecision::Block {
                retry_after_seconds,
                retry_after_minutes,
                reset_at,
            };
        }

        counter.count += 1;

        RateLimitDecision::Allow {
            remaining: self.config.max_attempts - counter.count,
            reset_at,
        }
    }

    /// Drop counters whose window has elapsed. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let window = self.config.window;
        let before = self.counters.len();
        self.counters
            .retain(|_, counter| !counter.is_expired(now, window));
        before.saturating_sub(self.counters.len())
    }

    /// Number of tracked IPs.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Current counter for `ip`, if any.
    pub fn counter(&self, ip: &str) -> Option<RateLimitCounter> {
        self.counters.get(ip).map(|counter| *counter)
    }

    /// How often the sweep task runs: once per window, or every 15 minutes when the window is
    /// not positive.
    pub fn sweep_period(&self) -> std::time::Duration {
        self.config
            .window
            .to_std()
            .ok()
            .filter(|period| !period.is_zero())
            .unwrap_or(DEFAULT_SWEEP_PERIOD)
    }

    /// Start a background task that sweeps expired counters once per window.
    ///
    /// The task exits when `shutdown` changes or its sender is dropped.
    pub fn start_sweep_task(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let limiter = self.clone();
        let period = self.sweep_period();

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(period);
            // The first tick completes immediately; nothing can be expired yet.
            interval_timer.tick().await;

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let purged = limiter.sweep();
                        if purged > 0 {
                            tracing::debug!(
                                purged,
                                tracked = limiter.len(),
                                "Swept expired login rate limit counters"
                            );
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down login rate limiter sweep task");
                        break;
                    }
                }
            }
        })
    }
}
