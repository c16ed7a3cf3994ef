// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Supabase (PostgREST) backed [`ReviewStore`].
//!
//! Tables: `professor` and `reviews`. Every request carries the anon key as
//! both `apikey` and bearer token. Writes ask for `return=representation` so
//! the stored row comes back in the same round trip, and owner-scoped writes
//! put the owner in the filter so a non-matching row is simply not touched.

use super::{ReviewStore, StoreError};
use crate::config::{as_base, ConfigError};
use crate::models::{AggregateStats, NewReview, Professor, Review, ReviewInput};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

const PROFESSOR_TABLE: &str = "professor";
const REVIEW_TABLE: &str = "reviews";

/// Upstream bodies are logged at most this long.
const MAX_LOGGED_BODY: usize = 512;

pub struct SupabaseStore {
    rest_url: Url,
    http: reqwest::Client,
}

impl SupabaseStore {
    pub fn new(base_url: &Url, anon_key: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let invalid_key = |reason: String| ConfigError::Invalid {
            name: "SUPABASE_ANON_KEY",
            reason,
        };

        let mut headers = HeaderMap::new();
        let mut apikey = HeaderValue::from_str(anon_key).map_err(|e| invalid_key(e.to_string()))?;
        apikey.set_sensitive(true);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {anon_key}"))
            .map_err(|e| invalid_key(e.to_string()))?;
        bearer.set_sensitive(true);
        headers.insert("apikey", apikey);
        headers.insert(AUTHORIZATION, bearer);

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::Invalid {
                name: "UPSTREAM_TIMEOUT_SECS",
                reason: e.to_string(),
            })?;

        let rest_url = as_base(base_url).join("rest/v1/").map_err(|e| ConfigError::Invalid {
            name: "SUPABASE_URL",
            reason: e.to_string(),
        })?;

        Ok(Self { rest_url, http })
    }

    fn request(&self, method: Method, table: &str, filters: &[(&str, String)]) -> RequestBuilder {
        let mut url = self.rest_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(table);
        }
        if !filters.is_empty() {
            url.set_query(Some(&encode_query(filters)));
        }
        self.http.request(method, url)
    }

    async fn rows<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Vec<T>, StoreError> {
        let body = checked_body(request.send().await?).await?;
        serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

/// PostgREST equality filter.
fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

fn encode_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

async fn checked_body(response: Response) -> Result<String, StoreError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        debug!(
            status = status.as_u16(),
            body = truncate(&body),
            "Data store request failed"
        );
        return Err(StoreError::Status {
            status: status.as_u16(),
        });
    }
    Ok(body)
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_LOGGED_BODY) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}

#[async_trait]
impl ReviewStore for SupabaseStore {
    async fn list_professors(&self, campus: &str) -> Result<Vec<Professor>, StoreError> {
        self.rows(self.request(
            Method::GET,
            PROFESSOR_TABLE,
            &[
                ("campus", eq(campus)),
                ("order", "average_rating.desc".to_string()),
            ],
        ))
        .await
    }

    async fn get_professor(&self, id: i64) -> Result<Option<Professor>, StoreError> {
        let rows: Vec<Professor> = self
            .rows(self.request(Method::GET, PROFESSOR_TABLE, &[("id", eq(id))]))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn list_reviews(&self, professor_id: i64) -> Result<Vec<Review>, StoreError> {
        self.rows(self.request(
            Method::GET,
            REVIEW_TABLE,
            &[
                ("professor_id", eq(professor_id)),
                ("order", "created_at.desc".to_string()),
            ],
        ))
        .await
    }

    async fn find_user_review(
        &self,
        professor_id: i64,
        user_email: &str,
    ) -> Result<Option<Review>, StoreError> {
        let rows: Vec<Review> = self
            .rows(self.request(
                Method::GET,
                REVIEW_TABLE,
                &[
                    ("professor_id", eq(professor_id)),
                    ("user_email", eq(user_email)),
                    ("limit", "1".to_string()),
                ],
            ))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn create_review(&self, review: &NewReview) -> Result<Review, StoreError> {
        let rows: Vec<Review> = self
            .rows(
                self.request(Method::POST, REVIEW_TABLE, &[])
                    .header("Prefer", "return=representation")
                    .json(review),
            )
            .await?;
        rows.into_iter().next().ok_or(StoreError::MissingRow)
    }

    async fn update_review(
        &self,
        professor_id: i64,
        review_id: i64,
        owner_email: &str,
        changes: &ReviewInput,
    ) -> Result<Option<Review>, StoreError> {
        let rows: Vec<Review> = self
            .rows(
                self.request(
                    Method::PATCH,
                    REVIEW_TABLE,
                    &[
                        ("id", eq(review_id)),
                        ("professor_id", eq(professor_id)),
                        ("user_email", eq(owner_email)),
                    ],
                )
                .header("Prefer", "return=representation")
                .json(changes),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_review(
        &self,
        professor_id: i64,
        review_id: i64,
        owner_email: &str,
    ) -> Result<bool, StoreError> {
        let rows: Vec<Review> = self
            .rows(
                self.request(
                    Method::DELETE,
                    REVIEW_TABLE,
                    &[
                        ("id", eq(review_id)),
                        ("professor_id", eq(professor_id)),
                        ("user_email", eq(owner_email)),
                    ],
                )
                .header("Prefer", "return=representation"),
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn write_aggregate(
        &self,
        professor_id: i64,
        stats: &AggregateStats,
    ) -> Result<(), StoreError> {
        let request = self
            .request(Method::PATCH, PROFESSOR_TABLE, &[("id", eq(professor_id))])
            .header("Prefer", "return=minimal")
            .json(stats);
        checked_body(request.send().await?).await?;
        Ok(())
    }
}
