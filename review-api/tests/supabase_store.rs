// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! PostgREST wire behaviour of the Supabase store.

use grademyprof_api::aggregate::recompute;
use grademyprof_api::models::{AggregateStats, NewReview, ReviewInput};
use grademyprof_api::store::{ReviewStore, StoreError, SupabaseStore};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ANON_KEY: &str = "anon-key-for-tests";

fn store(server: &MockServer) -> SupabaseStore {
    SupabaseStore::new(
        &Url::parse(&server.uri()).unwrap(),
        ANON_KEY,
        Duration::from_secs(2),
    )
    .unwrap()
}

fn review_row(id: i64, email: &str, rating: f64, difficulty: f64, again: bool) -> Value {
    json!({
        "id": id,
        "professor_id": 7,
        "user_email": email,
        "student_name": "Anon",
        "rating": rating,
        "difficulty": difficulty,
        "would_take_again": again,
        "course": "CS F211",
        "comment": "ok",
        "created_at": "2025-01-15T10:30:00.123456+00:00",
    })
}

#[tokio::test]
async fn test_list_professors_sends_filters_and_keys() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/professor"))
        .and(query_param("campus", "eq.hyderabad"))
        .and(query_param("order", "average_rating.desc"))
        .and(header("apikey", ANON_KEY))
        .and(header("authorization", format!("Bearer {ANON_KEY}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 4,
            "name": "K. Menon",
            "department": "Physics",
            "campus": "hyderabad",
            "university": "BITS Pilani",
            "average_rating": 4.25,
            "review_count": 8,
            "average_difficulty": 3.5,
            "would_take_again_percent": 75
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let professors = store(&server).list_professors("hyderabad").await.unwrap();
    assert_eq!(professors.len(), 1);
    assert_eq!(professors[0].name, "K. Menon");
    assert_eq!(professors[0].would_take_again_percent, 75);
}

#[tokio::test]
async fn test_missing_professor_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/professor"))
        .and(query_param("id", "eq.99"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    assert!(store(&server).get_professor(99).await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_review_asks_for_representation() {
    let server = MockServer::start().await;
    let new_review = NewReview {
        professor_id: 7,
        user_email: "alice@example.com".to_string(),
        student_name: "Anon".to_string(),
        rating: 4.0,
        difficulty: 2.0,
        would_take_again: true,
        course: "CS F211".to_string(),
        comment: "ok".to_string(),
    };
    Mock::given(method("POST"))
        .and(path("/rest/v1/reviews"))
        .and(header("prefer", "return=representation"))
        .and(body_json(&new_review))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([review_row(11, "alice@example.com", 4.0, 2.0, true)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let created = store(&server).create_review(&new_review).await.unwrap();
    assert_eq!(created.id, 11);
    assert_eq!(created.user_email, "alice@example.com");
}

#[tokio::test]
async fn test_owner_scoped_writes_filter_on_email() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/reviews"))
        .and(query_param("id", "eq.11"))
        .and(query_param("professor_id", "eq.7"))
        .and(query_param("user_email", "eq.alice+cs@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([review_row(
            11,
            "alice+cs@example.com",
            3.0,
            3.0,
            false
        )])))
        .mount(&server)
        .await;
    // Nothing matches for anyone else
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/reviews"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = store(&server);
    let changes = ReviewInput {
        student_name: "Anon".to_string(),
        rating: 3.0,
        difficulty: 3.0,
        would_take_again: false,
        course: "CS F211".to_string(),
        comment: "ok".to_string(),
    };
    let updated = store
        .update_review(7, 11, "alice+cs@example.com", &changes)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.rating, 3.0);

    assert!(!store.delete_review(7, 11, "bob@example.com").await.unwrap());
}

#[tokio::test]
async fn test_error_status_is_reported_without_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(500).set_body_string("relation \"reviews\" does not exist"),
        )
        .mount(&server)
        .await;

    let err = store(&server).list_reviews(7).await.unwrap_err();
    assert!(matches!(err, StoreError::Status { status: 500 }));
    assert!(!err.to_string().contains("relation"));
}

#[tokio::test]
async fn test_recompute_patches_professor_aggregates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/reviews"))
        .and(query_param("professor_id", "eq.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            review_row(1, "a@example.com", 5.0, 3.0, true),
            review_row(2, "b@example.com", 3.0, 5.0, false),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/professor"))
        .and(query_param("id", "eq.7"))
        .and(body_json(json!({
            "average_rating": 4.0,
            "review_count": 2,
            "average_difficulty": 4.0,
            "would_take_again_percent": 50
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let stats = recompute(&store(&server), 7).await.unwrap();
    assert_eq!(
        stats,
        AggregateStats {
            average_rating: 4.0,
            review_count: 2,
            average_difficulty: 4.0,
            would_take_again_percent: 50,
        }
    );
}

#[tokio::test]
async fn test_recompute_stops_when_read_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    assert!(recompute(&store(&server), 7).await.is_err());
}
