// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! In-process [`ReviewStore`] for local development and tests.

use super::{ReviewStore, StoreError};
use crate::models::{AggregateStats, NewReview, Professor, Review, ReviewInput};
use async_trait::async_trait;
use grademyprof_common::{Clock, SystemClock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    professors: BTreeMap<i64, Professor>,
    reviews: BTreeMap<i64, Review>,
    next_review_id: i64,
}

/// Professor and review tables held in memory.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::seeded(std::iter::empty(), clock)
    }

    pub fn with_professors(professors: impl IntoIterator<Item = Professor>) -> Self {
        Self::seeded(professors, Arc::new(SystemClock))
    }

    pub fn seeded(professors: impl IntoIterator<Item = Professor>, clock: Arc<dyn Clock>) -> Self {
        let mut tables = Tables {
            next_review_id: 1,
            ..Tables::default()
        };
        for professor in professors {
            tables.professors.insert(professor.id, professor);
        }
        Self {
            tables: Arc::new(RwLock::new(tables)),
            clock,
        }
    }

    pub async fn insert_professor(&self, professor: Professor) {
        self.tables
            .write()
            .await
            .professors
            .insert(professor.id, professor);
    }

    /// A handful of professors for running the API without a database.
    pub fn demo() -> Self {
        Self::with_professors([
            demo_professor(1, "A. Sharma", "Computer Science", "pilani"),
            demo_professor(2, "R. Iyer", "Mathematics", "pilani"),
            demo_professor(3, "S. Rao", "Electrical Engineering", "goa"),
            demo_professor(4, "K. Menon", "Physics", "hyderabad"),
        ])
    }
}

fn demo_professor(id: i64, name: &str, department: &str, campus: &str) -> Professor {
    Professor {
        id,
        name: name.to_string(),
        department: department.to_string(),
        campus: campus.to_string(),
        university: "BITS Pilani".to_string(),
        average_rating: 0.0,
        review_count: 0,
        average_difficulty: 0.0,
        would_take_again_percent: 0,
    }
}

fn owned_by<'a>(
    tables: &'a mut Tables,
    professor_id: i64,
    review_id: i64,
    owner_email: &str,
) -> Option<&'a mut Review> {
    tables
        .reviews
        .get_mut(&review_id)
        .filter(|r| r.professor_id == professor_id && r.user_email == owner_email)
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn list_professors(&self, campus: &str) -> Result<Vec<Professor>, StoreError> {
        let tables = self.tables.read().await;
        let mut professors: Vec<Professor> = tables
            .professors
            .values()
            .filter(|p| p.campus == campus)
            .cloned()
            .collect();
        professors.sort_by(|a, b| b.average_rating.total_cmp(&a.average_rating));
        Ok(professors)
    }

    async fn get_professor(&self, id: i64) -> Result<Option<Professor>, StoreError> {
        Ok(self.tables.read().await.professors.get(&id).cloned())
    }

    async fn list_reviews(&self, professor_id: i64) -> Result<Vec<Review>, StoreError> {
        let tables = self.tables.read().await;
        let mut reviews: Vec<Review> = tables
            .reviews
            .values()
            .filter(|r| r.professor_id == professor_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(reviews)
    }

    async fn find_user_review(
        &self,
        professor_id: i64,
        user_email: &str,
    ) -> Result<Option<Review>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .reviews
            .values()
            .find(|r| r.professor_id == professor_id && r.user_email == user_email)
            .cloned())
    }

    async fn create_review(&self, review: &NewReview) -> Result<Review, StoreError> {
        let mut tables = self.tables.write().await;
        let id = tables.next_review_id;
        tables.next_review_id += 1;

        let stored = Review {
            id,
            professor_id: review.professor_id,
            user_email: review.user_email.clone(),
            student_name: review.student_name.clone(),
            rating: review.rating,
            difficulty: review.difficulty,
            would_take_again: review.would_take_again,
            course: review.course.clone(),
            comment: review.comment.clone(),
            created_at: self.clock.now(),
        };
        tables.reviews.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_review(
        &self,
        professor_id: i64,
        review_id: i64,
        owner_email: &str,
        changes: &ReviewInput,
    ) -> Result<Option<Review>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(review) = owned_by(&mut tables, professor_id, review_id, owner_email) else {
            return Ok(None);
        };

        review.student_name = changes.student_name.clone();
        review.rating = changes.rating;
        review.difficulty = changes.difficulty;
        review.would_take_again = changes.would_take_again;
        review.course = changes.course.clone();
        review.comment = changes.comment.clone();
        Ok(Some(review.clone()))
    }

    async fn delete_review(
        &self,
        professor_id: i64,
        review_id: i64,
        owner_email: &str,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if owned_by(&mut tables, professor_id, review_id, owner_email).is_none() {
            return Ok(false);
        }
        tables.reviews.remove(&review_id);
        Ok(true)
    }

    async fn write_aggregate(
        &self,
        professor_id: i64,
        stats: &AggregateStats,
    ) -> Result<(), StoreError> {
        // PostgREST PATCH on a missing row is a no-op too
        if let Some(professor) = self.tables.write().await.professors.get_mut(&professor_id) {
            professor.apply_stats(stats);
        }
        Ok(())
    }
}
