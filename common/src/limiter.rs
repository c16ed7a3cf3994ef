// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Policy-driven rate limiting on top of [`VisitorTracker`].
//!
//! Each [`RateLimiter`] owns its own table, so a client exhausting the login
//! budget does not eat into the budget of any other route. Services build one
//! limiter per policy:
//!
//! - global: 100 requests per minute
//! - login: 5 requests per minute
//! - review create: 5 requests per minute
//! - review update: 10 requests per minute

use crate::clock::{to_delta, Clock, SystemClock};
use crate::visitor::{Admission, VisitorRecord, VisitorTracker};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Shortest interval a sweeper will run at.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Limits applied by one limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Short name used in logs
    pub name: String,
    /// Requests admitted per window
    pub max_requests: u32,
    /// Window length
    pub window: Duration,
    /// Error message returned once the limit is hit
    pub message: String,
}

impl RateLimitPolicy {
    pub fn new(
        name: impl Into<String>,
        max_requests: u32,
        window: Duration,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            max_requests,
            window,
            message: message.into(),
        }
    }

    /// Policy with a one minute window.
    pub fn per_minute(name: impl Into<String>, max_requests: u32, message: impl Into<String>) -> Self {
        Self::new(name, max_requests, Duration::from_secs(60), message)
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed {
        /// Remaining requests in current window
        remaining: u32,
        /// Time until window resets
        reset_in: Duration,
    },
    /// Request is rate limited
    Limited {
        /// Time until the current window ends
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Thread-safe fixed-window rate limiter for a single policy.
#[derive(Debug)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    tracker: VisitorTracker,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter that reads the system clock.
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: RateLimitPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            tracker: VisitorTracker::new(),
            clock,
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Admit or reject one request from `identity`.
    pub async fn check(&self, identity: &str) -> RateLimitResult {
        let now = self.clock.now();
        let admission = self
            .tracker
            .hit(identity, now, self.policy.max_requests, to_delta(self.policy.window))
            .await;

        match admission {
            Admission::Admitted {
                count,
                window_start,
            } => RateLimitResult::Allowed {
                remaining: self.policy.max_requests.saturating_sub(count),
                reset_in: self.until_window_end(window_start, now),
            },
            Admission::Denied { window_start } => {
                let retry_after = self.until_window_end(window_start, now);
                debug!(
                    policy = %self.policy.name,
                    identity,
                    ?retry_after,
                    "Rate limit exceeded"
                );
                RateLimitResult::Limited { retry_after }
            }
        }
    }

    /// Drop records idle for a full window. Returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        let removed = self
            .tracker
            .sweep(self.clock.now(), to_delta(self.policy.window))
            .await;
        if removed > 0 {
            debug!(policy = %self.policy.name, removed, "Swept idle visitors");
        }
        removed
    }

    /// Run [`cleanup`](Self::cleanup) every `interval` until the task is aborted.
    ///
    /// Intervals shorter than [`MIN_SWEEP_INTERVAL`] are raised to it.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.cleanup().await;
            }
        })
    }

    /// Current record for `identity`, if one is tracked.
    pub async fn visitor(&self, identity: &str) -> Option<VisitorRecord> {
        self.tracker.get(identity).await
    }

    /// Number of identities currently tracked.
    pub async fn tracked(&self) -> usize {
        self.tracker.len().await
    }

    fn until_window_end(&self, window_start: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        let elapsed = (now - window_start).to_std().unwrap_or(Duration::ZERO);
        self.policy.window.saturating_sub(elapsed)
    }
}
