// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the review API.

use crate::aggregate::AggregatePipeline;
use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, Result};
use crate::models::{MessageResponse, Professor, Review, ReviewInput, UserReviewStatus};
use crate::store::ReviewStore;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use grademyprof_common::protocol::HealthResponse;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Shared application state.
pub struct AppState {
    pub store: Arc<dyn ReviewStore>,
    pub pipeline: AggregatePipeline,
    pub default_campus: String,
}

#[derive(Debug, Deserialize)]
pub struct CampusQuery {
    pub campus: Option<String>,
}

pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse::new("Hello World"))
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy(
        "grademyprof-api",
        env!("CARGO_PKG_VERSION"),
    ))
}

pub async fn list_professors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CampusQuery>,
) -> Result<Json<Vec<Professor>>> {
    let campus = query
        .campus
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| state.default_campus.clone());
    Ok(Json(state.store.list_professors(&campus).await?))
}

pub async fn get_professor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Professor>> {
    let id = parse_id(&id, "professor")?;
    state
        .store
        .get_professor(id)
        .await?
        .map(Json)
        .ok_or(ApiError::ProfessorNotFound)
}

pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Review>>> {
    let id = parse_id(&id, "professor")?;
    Ok(Json(state.store.list_reviews(id).await?))
}

/// Submit a review, attributed to the verified caller.
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Extension(user): Extension<AuthenticatedUser>,
    body: std::result::Result<Json<ReviewInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Review>)> {
    let professor_id = parse_id(&id, "professor")?;
    let input = review_body(body)?;

    if state.store.get_professor(professor_id).await?.is_none() {
        return Err(ApiError::ProfessorNotFound);
    }

    let review = state
        .store
        .create_review(&input.into_new_review(professor_id, &user.email))
        .await?;
    info!(
        professor_id,
        review_id = review.id,
        user = %user.email,
        "Review created"
    );

    state.pipeline.trigger(professor_id);
    Ok((StatusCode::CREATED, Json(review)))
}

/// Edit one of the caller's own reviews.
pub async fn update_review(
    State(state): State<Arc<AppState>>,
    Path((id, review_id)): Path<(String, String)>,
    Extension(user): Extension<AuthenticatedUser>,
    body: std::result::Result<Json<ReviewInput>, JsonRejection>,
) -> Result<Json<Review>> {
    let professor_id = parse_id(&id, "professor")?;
    let review_id = parse_id(&review_id, "review")?;
    let input = review_body(body)?;

    let review = state
        .store
        .update_review(professor_id, review_id, &user.email, &input)
        .await?
        .ok_or_else(|| {
            debug!(professor_id, review_id, user = %user.email, "Update matched no owned review");
            ApiError::ReviewNotFound
        })?;
    info!(professor_id, review_id, user = %user.email, "Review updated");

    state.pipeline.trigger(professor_id);
    Ok(Json(review))
}

/// Delete one of the caller's own reviews.
pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    Path((id, review_id)): Path<(String, String)>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<MessageResponse>> {
    let professor_id = parse_id(&id, "professor")?;
    let review_id = parse_id(&review_id, "review")?;

    if !state
        .store
        .delete_review(professor_id, review_id, &user.email)
        .await?
    {
        debug!(professor_id, review_id, user = %user.email, "Delete matched no owned review");
        return Err(ApiError::ReviewNotFound);
    }
    info!(professor_id, review_id, user = %user.email, "Review deleted");

    state.pipeline.trigger(professor_id);
    Ok(Json(MessageResponse::new("Review deleted successfully")))
}

/// Whether the caller has already reviewed this professor.
pub async fn user_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<UserReviewStatus>> {
    let professor_id = parse_id(&id, "professor")?;
    let existing = state
        .store
        .find_user_review(professor_id, &user.email)
        .await?;

    Ok(Json(UserReviewStatus {
        has_reviewed: existing.is_some(),
        existing_review: existing,
    }))
}

fn parse_id(raw: &str, what: &str) -> Result<i64> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::BadRequest(format!("Invalid {what} id"))),
    }
}

fn review_body(body: std::result::Result<Json<ReviewInput>, JsonRejection>) -> Result<ReviewInput> {
    let Json(input) = body.map_err(|rejection| {
        debug!(error = %rejection, "Rejected review body");
        ApiError::BadRequest("Invalid request body".to_string())
    })?;
    input.validate().map_err(ApiError::BadRequest)?;
    Ok(input)
}
