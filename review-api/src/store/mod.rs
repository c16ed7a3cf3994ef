// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Persistence for professors and reviews.
//!
//! Ownership of a review is enforced by the store itself: update and delete
//! take the caller's verified email and only touch a row whose
//! `user_email` matches, in the same request that mutates it.

pub mod memory;
pub mod supabase;

use crate::models::{AggregateStats, NewReview, Professor, Review, ReviewInput};
use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("data store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("data store returned status {status}")]
    Status { status: u16 },

    #[error("data store response could not be parsed: {0}")]
    Decode(String),

    #[error("data store did not return the written row")]
    MissingRow,
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Professors on `campus`, highest average rating first.
    async fn list_professors(&self, campus: &str) -> Result<Vec<Professor>, StoreError>;

    async fn get_professor(&self, id: i64) -> Result<Option<Professor>, StoreError>;

    /// Reviews of a professor, newest first.
    async fn list_reviews(&self, professor_id: i64) -> Result<Vec<Review>, StoreError>;

    /// The review `user_email` left for a professor, if any.
    async fn find_user_review(
        &self,
        professor_id: i64,
        user_email: &str,
    ) -> Result<Option<Review>, StoreError>;

    async fn create_review(&self, review: &NewReview) -> Result<Review, StoreError>;

    /// Update a review owned by `owner_email`. `None` when no such review exists
    /// under that professor and owner.
    async fn update_review(
        &self,
        professor_id: i64,
        review_id: i64,
        owner_email: &str,
        changes: &ReviewInput,
    ) -> Result<Option<Review>, StoreError>;

    /// Delete a review owned by `owner_email`. `false` when nothing matched.
    async fn delete_review(
        &self,
        professor_id: i64,
        review_id: i64,
        owner_email: &str,
    ) -> Result<bool, StoreError>;

    async fn write_aggregate(
        &self,
        professor_id: i64,
        stats: &AggregateStats,
    ) -> Result<(), StoreError>;
}
