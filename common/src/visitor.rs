// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window visitor counters.
//!
//! One [`VisitorTracker`] holds the counters for a single rate-limit policy.
//! A record is created on an identity's first request, reset whenever its
//! window has elapsed, and dropped by [`VisitorTracker::sweep`] once the
//! identity has been idle for longer than the staleness threshold.
//!
//! Windows are fixed, not sliding: a client that bursts at the end of one
//! window and the start of the next can get up to twice the limit through
//! in a short span.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Counter state for one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitorRecord {
    /// Start of the current window
    pub window_start: DateTime<Utc>,
    /// Time of the most recent request, admitted or not
    pub last_seen: DateTime<Utc>,
    /// Requests admitted in the current window
    pub count: u32,
}

/// Outcome of recording a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted {
        count: u32,
        window_start: DateTime<Utc>,
    },
    Denied {
        window_start: DateTime<Utc>,
    },
}

/// Per-policy table of visitor records.
#[derive(Debug, Default)]
pub struct VisitorTracker {
    visitors: Mutex<HashMap<String, VisitorRecord>>,
}

impl VisitorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request from `identity` at `now`.
    ///
    /// The whole check-then-increment runs under the table lock. A denied
    /// request refreshes `last_seen` but never increments the counter.
    pub async fn hit(
        &self,
        identity: &str,
        now: DateTime<Utc>,
        max_requests: u32,
        window: TimeDelta,
    ) -> Admission {
        let fresh = VisitorRecord {
            window_start: now,
            last_seen: now,
            count: 0,
        };

        let mut visitors = self.visitors.lock().await;
        let record = visitors.entry(identity.to_string()).or_insert(fresh);
        if now - record.window_start >= window {
            *record = fresh;
        }

        record.last_seen = now;
        if record.count < max_requests {
            record.count += 1;
            Admission::Admitted {
                count: record.count,
                window_start: record.window_start,
            }
        } else {
            Admission::Denied {
                window_start: record.window_start,
            }
        }
    }

    /// Drop every record idle for at least `stale_after`. Returns how many were removed.
    pub async fn sweep(&self, now: DateTime<Utc>, stale_after: TimeDelta) -> usize {
        let mut visitors = self.visitors.lock().await;
        let before = visitors.len();
        visitors.retain(|_, record| now - record.last_seen < stale_after);
        before - visitors.len()
    }

    pub async fn get(&self, identity: &str) -> Option<VisitorRecord> {
        self.visitors.lock().await.get(identity).copied()
    }

    pub async fn len(&self) -> usize {
        self.visitors.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.visitors.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minute() -> TimeDelta {
        TimeDelta::seconds(60)
    }

    #[tokio::test]
    async fn test_first_hit_creates_record() {
        let tracker = VisitorTracker::new();
        let now = Utc::now();

        let admission = tracker.hit("10.0.0.1", now, 3, minute()).await;
        assert_eq!(
            admission,
            Admission::Admitted {
                count: 1,
                window_start: now
            }
        );

        let record = tracker.get("10.0.0.1").await.unwrap();
        assert_eq!(record.count, 1);
        assert_eq!(record.window_start, now);
    }

    #[tokio::test]
    async fn test_denied_hits_do_not_count() {
        let tracker = VisitorTracker::new();
        let now = Utc::now();

        for _ in 0..2 {
            tracker.hit("10.0.0.1", now, 2, minute()).await;
        }
        for _ in 0..5 {
            let admission = tracker.hit("10.0.0.1", now, 2, minute()).await;
            assert!(matches!(admission, Admission::Denied { .. }));
        }

        assert_eq!(tracker.get("10.0.0.1").await.unwrap().count, 2);
    }

    #[tokio::test]
    async fn test_window_resets_from_window_start() {
        let tracker = VisitorTracker::new();
        let start = Utc::now();

        tracker.hit("a", start, 1, minute()).await;
        // Activity inside the window does not push the window forward
        let denied = tracker.hit("a", start + TimeDelta::seconds(59), 1, minute()).await;
        assert!(matches!(denied, Admission::Denied { .. }));

        let admitted = tracker.hit("a", start + minute(), 1, minute()).await;
        assert_eq!(
            admitted,
            Admission::Admitted {
                count: 1,
                window_start: start + minute()
            }
        );
    }

    #[tokio::test]
    async fn test_sweep_removes_idle_records() {
        let tracker = VisitorTracker::new();
        let start = Utc::now();

        tracker.hit("idle", start, 5, minute()).await;
        tracker.hit("active", start + TimeDelta::seconds(50), 5, minute()).await;

        let removed = tracker.sweep(start + TimeDelta::seconds(70), minute()).await;
        assert_eq!(removed, 1);
        assert!(tracker.get("idle").await.is_none());
        assert!(tracker.get("active").await.is_some());
        assert_eq!(tracker.len().await, 1);
    }
}
