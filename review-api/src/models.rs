// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later
//! Data models for professors and reviews

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lowest accepted rating or difficulty score.
pub const MIN_SCORE: f64 = 1.0;
/// Highest accepted rating or difficulty score.
pub const MAX_SCORE: f64 = 5.0;

/// Professor row, including the derived aggregate columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Professor {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub campus: String,
    #[serde(default)]
    pub university: String,
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub review_count: i64,
    #[serde(default)]
    pub average_difficulty: f64,
    #[serde(default)]
    pub would_take_again_percent: i64,
}

impl Professor {
    pub fn stats(&self) -> AggregateStats {
        AggregateStats {
            average_rating: self.average_rating,
            review_count: self.review_count,
            average_difficulty: self.average_difficulty,
            would_take_again_percent: self.would_take_again_percent,
        }
    }

    pub fn apply_stats(&mut self, stats: &AggregateStats) {
        self.average_rating = stats.average_rating;
        self.review_count = stats.review_count;
        self.average_difficulty = stats.average_difficulty;
        self.would_take_again_percent = stats.would_take_again_percent;
    }
}

/// Stored review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub professor_id: i64,
    /// Verified email of the submitter; the ownership key for edits
    pub user_email: String,
    #[serde(default)]
    pub student_name: String,
    pub rating: f64,
    pub difficulty: f64,
    #[serde(default)]
    pub would_take_again: bool,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Client-editable review fields, used for both create and update bodies.
///
/// Any `user_email` in the body is ignored: attribution always comes from
/// the verified session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewInput {
    #[serde(default)]
    pub student_name: String,
    pub rating: f64,
    pub difficulty: f64,
    #[serde(default)]
    pub would_take_again: bool,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub comment: String,
}

impl ReviewInput {
    /// Check score ranges. Returns the client-facing message on failure.
    pub fn validate(&self) -> Result<(), String> {
        check_score("rating", self.rating)?;
        check_score("difficulty", self.difficulty)
    }

    pub fn into_new_review(self, professor_id: i64, user_email: &str) -> NewReview {
        NewReview {
            professor_id,
            user_email: user_email.to_string(),
            student_name: self.student_name,
            rating: self.rating,
            difficulty: self.difficulty,
            would_take_again: self.would_take_again,
            course: self.course,
            comment: self.comment,
        }
    }
}

fn check_score(field: &str, value: f64) -> Result<(), String> {
    if (MIN_SCORE..=MAX_SCORE).contains(&value) {
        Ok(())
    } else {
        Err(format!("{field} must be between 1 and 5"))
    }
}

/// Review row as inserted; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReview {
    pub professor_id: i64,
    pub user_email: String,
    pub student_name: String,
    pub rating: f64,
    pub difficulty: f64,
    pub would_take_again: bool,
    pub course: String,
    pub comment: String,
}

/// Derived professor statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub average_rating: f64,
    pub review_count: i64,
    pub average_difficulty: f64,
    pub would_take_again_percent: i64,
}

/// Response for `GET /api/professors/{id}/user-review`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReviewStatus {
    pub has_reviewed: bool,
    pub existing_review: Option<Review>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
