// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Professor aggregate recomputation.
//!
//! After every review mutation the handler calls
//! [`AggregatePipeline::trigger`] and returns without waiting. Each
//! recomputation pass reads the professor's full review set and writes the
//! derived columns back; the result is a pure function of that read.
//!
//! Passes for one professor never overlap. A trigger that arrives while a
//! pass is running marks the professor dirty, and the worker runs exactly one
//! more pass once the current one ends. Any number of triggers during a pass
//! collapse into that single follow-up, and the follow-up starts after the
//! last of them, so the final write always reflects the latest mutation.
//! A semaphore caps how many professors are recomputed at once.
//!
//! Failures are logged and dropped; the next mutation retries implicitly.

use crate::models::{AggregateStats, Review};
use crate::store::{ReviewStore, StoreError};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, info};

/// Reduce a review set to its aggregate statistics.
pub fn summarize(reviews: &[Review]) -> AggregateStats {
    if reviews.is_empty() {
        return AggregateStats::default();
    }

    let n = reviews.len() as f64;
    let rating_sum: f64 = reviews.iter().map(|r| r.rating).sum();
    let difficulty_sum: f64 = reviews.iter().map(|r| r.difficulty).sum();
    let would_take_again = reviews.iter().filter(|r| r.would_take_again).count() as f64;

    AggregateStats {
        average_rating: rating_sum / n,
        review_count: reviews.len() as i64,
        average_difficulty: difficulty_sum / n,
        would_take_again_percent: (100.0 * would_take_again / n).round() as i64,
    }
}

/// One recomputation pass: read every review, reduce, write back.
pub async fn recompute(
    store: &dyn ReviewStore,
    professor_id: i64,
) -> Result<AggregateStats, StoreError> {
    let reviews = store.list_reviews(professor_id).await?;
    let stats = summarize(&reviews);
    store.write_aggregate(professor_id, &stats).await?;
    Ok(stats)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Running,
    Dirty,
}

struct Inner {
    store: Arc<dyn ReviewStore>,
    slots: Mutex<HashMap<i64, Slot>>,
    permits: Semaphore,
    idle: Notify,
}

impl Inner {
    fn slots(&self) -> MutexGuard<'_, HashMap<i64, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn run(self: Arc<Self>, professor_id: i64) {
        loop {
            match self.permits.acquire().await {
                Ok(_permit) => match recompute(self.store.as_ref(), professor_id).await {
                    Ok(stats) => info!(
                        professor_id,
                        review_count = stats.review_count,
                        average_rating = stats.average_rating,
                        "Recomputed professor aggregates"
                    ),
                    Err(err) => error!(
                        professor_id,
                        error = %err,
                        "Aggregate recomputation failed"
                    ),
                },
                Err(_) => {
                    error!(professor_id, "Recompute semaphore closed");
                }
            }

            let again = {
                let mut slots = self.slots();
                if slots.get(&professor_id).copied() == Some(Slot::Dirty) {
                    slots.insert(professor_id, Slot::Running);
                    true
                } else {
                    slots.remove(&professor_id);
                    if slots.is_empty() {
                        self.idle.notify_waiters();
                    }
                    false
                }
            };
            if !again {
                return;
            }
            debug!(professor_id, "Professor changed during recompute, running again");
        }
    }
}

/// Fire-and-forget aggregate recomputation, serialized per professor.
#[derive(Clone)]
pub struct AggregatePipeline {
    inner: Arc<Inner>,
}

impl AggregatePipeline {
    pub fn new(store: Arc<dyn ReviewStore>, max_concurrent: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                slots: Mutex::new(HashMap::new()),
                permits: Semaphore::new(max_concurrent.max(1)),
                idle: Notify::new(),
            }),
        }
    }

    /// Schedule a recomputation for `professor_id`. Never blocks on the store.
    pub fn trigger(&self, professor_id: i64) {
        {
            let mut slots = self.inner.slots();
            match slots.entry(professor_id) {
                Entry::Occupied(mut slot) => {
                    slot.insert(Slot::Dirty);
                    debug!(professor_id, "Recompute already running, marked dirty");
                    return;
                }
                Entry::Vacant(slot) => {
                    slot.insert(Slot::Running);
                }
            }
        }

        tokio::spawn(self.inner.clone().run(professor_id));
    }

    /// No recomputation is running or pending.
    pub fn is_idle(&self) -> bool {
        self.inner.slots().is_empty()
    }

    /// Wait until every scheduled recomputation has finished.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}
