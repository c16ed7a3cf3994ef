// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Router-level tests: in-memory store, mocked auth bridge.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use grademyprof_api::config::RateLimitConfig;
use grademyprof_api::models::Professor;
use grademyprof_api::{
    cors_layer, router, AggregatePipeline, AppState, BridgeClient, Limiters, MemoryStore,
    ReviewStore,
};
use grademyprof_common::{Clock, ManualClock};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{header as header_is, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ALICE: &str = "alice@pilani.bits-pilani.ac.in";
const BOB: &str = "bob@pilani.bits-pilani.ac.in";

fn professor(id: i64, name: &str, campus: &str, rating: f64) -> Professor {
    Professor {
        id,
        name: name.to_string(),
        department: "Computer Science".to_string(),
        campus: campus.to_string(),
        university: "BITS Pilani".to_string(),
        average_rating: rating,
        review_count: 0,
        average_difficulty: 0.0,
        would_take_again_percent: 0,
    }
}

async fn mock_bridge() -> MockServer {
    let server = MockServer::start().await;
    for (token, email) in [("alice-token", ALICE), ("bob-token", BOB)] {
        Mock::given(method("GET"))
            .and(path("/verify-token"))
            .and(header_is("authorization", format!("Bearer {token}").as_str()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"valid": true, "email": email})),
            )
            .with_priority(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid or expired token"})),
        )
        .with_priority(10)
        .mount(&server)
        .await;
    server
}

struct Harness {
    app: Router,
    store: Arc<MemoryStore>,
    pipeline: AggregatePipeline,
    clock: Arc<ManualClock>,
}

fn harness(bridge_uri: &str) -> Harness {
    let clock = Arc::new(ManualClock::default());
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let store = Arc::new(MemoryStore::seeded(
        [
            professor(1, "A. Sharma", "pilani", 3.5),
            professor(2, "R. Iyer", "pilani", 4.5),
            professor(3, "S. Rao", "goa", 4.0),
        ],
        dyn_clock.clone(),
    ));
    let dyn_store: Arc<dyn ReviewStore> = store.clone();
    let pipeline = AggregatePipeline::new(dyn_store.clone(), 4);
    let state = Arc::new(AppState {
        store: dyn_store,
        pipeline: pipeline.clone(),
        default_campus: "pilani".to_string(),
    });
    let bridge = Arc::new(
        BridgeClient::new(&Url::parse(bridge_uri).unwrap(), Duration::from_secs(2)).unwrap(),
    );
    let limiters = Limiters::with_clock(&RateLimitConfig::default(), dyn_clock);
    let cors = cors_layer(&["http://localhost:5173".to_string()]);

    Harness {
        app: router(state, bridge, &limiters, cors),
        store,
        pipeline,
        clock,
    }
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn send_json(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn delete(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("DELETE").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn review_body(rating: f64, difficulty: f64, again: bool) -> Value {
    json!({
        "student_name": "Anon",
        "rating": rating,
        "difficulty": difficulty,
        "would_take_again": again,
        "course": "CS F211",
        "comment": "Clear lectures",
    })
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_root_and_health() {
    let bridge = mock_bridge().await;
    let h = harness(&bridge.uri());

    let (status, body) = call(&h.app, get("/", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Hello World"}));

    let (status, body) = call(&h.app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "grademyprof-api");
}

#[tokio::test]
async fn test_professor_listing_by_campus() {
    let bridge = mock_bridge().await;
    let h = harness(&bridge.uri());

    let (status, body) = call(&h.app, get("/api/professors", None)).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![2, 1]);

    let (_, body) = call(&h.app, get("/api/professors?campus=goa", None)).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "S. Rao");
}

#[tokio::test]
async fn test_single_professor_lookup() {
    let bridge = mock_bridge().await;
    let h = harness(&bridge.uri());

    let (status, body) = call(&h.app, get("/api/professors/3", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["campus"], "goa");

    let (status, body) = call(&h.app, get("/api/professors/99", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Professor not found"}));

    let (status, _) = call(&h.app, get("/api/professors/abc", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_review_attributes_to_verified_subject() {
    let bridge = mock_bridge().await;
    let h = harness(&bridge.uri());

    let mut body = review_body(5.0, 3.0, true);
    body["user_email"] = json!("someone-else@example.com");
    let (status, created) = call(
        &h.app,
        send_json("POST", "/api/professors/1/reviews", Some("alice-token"), body),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["user_email"], ALICE);
    assert_eq!(created["professor_id"], 1);

    let (status, created) = call(
        &h.app,
        send_json(
            "POST",
            "/api/professors/1/reviews",
            Some("bob-token"),
            review_body(3.0, 5.0, false),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["user_email"], BOB);

    h.pipeline.wait_idle().await;
    let (_, professor) = call(&h.app, get("/api/professors/1", None)).await;
    assert_eq!(professor["average_rating"], 4.0);
    assert_eq!(professor["average_difficulty"], 4.0);
    assert_eq!(professor["review_count"], 2);
    assert_eq!(professor["would_take_again_percent"], 50);
}

#[tokio::test]
async fn test_reviews_listed_newest_first() {
    let bridge = mock_bridge().await;
    let h = harness(&bridge.uri());

    for token in ["alice-token", "bob-token"] {
        call(
            &h.app,
            send_json(
                "POST",
                "/api/professors/2/reviews",
                Some(token),
                review_body(4.0, 2.0, true),
            ),
        )
        .await;
        h.clock.advance(Duration::from_secs(10));
    }

    let (status, body) = call(&h.app, get("/api/professors/2/reviews", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["user_email"], BOB);
    assert_eq!(body[1]["user_email"], ALICE);
}

#[tokio::test]
async fn test_create_on_unknown_professor_is_404() {
    let bridge = mock_bridge().await;
    let h = harness(&bridge.uri());

    let (status, body) = call(
        &h.app,
        send_json(
            "POST",
            "/api/professors/404/reviews",
            Some("alice-token"),
            review_body(4.0, 2.0, true),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Professor not found");
}

#[tokio::test]
async fn test_invalid_review_bodies_have_no_side_effects() {
    let bridge = mock_bridge().await;
    let h = harness(&bridge.uri());

    let (status, body) = call(
        &h.app,
        send_json(
            "POST",
            "/api/professors/1/reviews",
            Some("alice-token"),
            review_body(6.0, 2.0, true),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "rating must be between 1 and 5");

    let (status, body) = call(
        &h.app,
        send_json(
            "POST",
            "/api/professors/1/reviews",
            Some("alice-token"),
            json!({"comment": "no scores"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request body");

    assert!(h.store.list_reviews(1).await.unwrap().is_empty());
    assert!(h.pipeline.is_idle());
}

#[tokio::test]
async fn test_protected_routes_require_a_session() {
    let bridge = mock_bridge().await;
    let h = harness(&bridge.uri());

    let (status, body) = call(
        &h.app,
        send_json("POST", "/api/professors/1/reviews", None, review_body(4.0, 2.0, true)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing authorization token");

    let request = Request::builder()
        .uri("/api/professors/1/user-review")
        .header(header::AUTHORIZATION, "Basic YWxpY2U6cHc=")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(&h.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&h.app, get("/api/professors/1/user-review", Some("forged"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired token");

    let (status, _) = call(&h.app, delete("/api/professors/1/reviews/1", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unreachable_bridge_fails_closed() {
    let h = harness("http://127.0.0.1:1");

    let (status, body) = call(
        &h.app,
        send_json(
            "POST",
            "/api/professors/1/reviews",
            Some("alice-token"),
            review_body(4.0, 2.0, true),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Auth service unavailable");
    assert!(h.store.list_reviews(1).await.unwrap().is_empty());

    // Public routes keep working
    let (status, _) = call(&h.app, get("/api/professors/1", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_misbehaving_bridge_fails_closed() {
    let bridge = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&bridge)
        .await;
    let h = harness(&bridge.uri());

    let (status, _) = call(&h.app, get("/api/professors/1/user-review", Some("alice-token"))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_only_the_author_can_edit_or_delete() {
    let bridge = mock_bridge().await;
    let h = harness(&bridge.uri());

    let (_, created) = call(
        &h.app,
        send_json(
            "POST",
            "/api/professors/1/reviews",
            Some("alice-token"),
            review_body(5.0, 3.0, true),
        ),
    )
    .await;
    let review_uri = format!("/api/professors/1/reviews/{}", created["id"]);

    let (status, body) = call(
        &h.app,
        send_json("PATCH", &review_uri, Some("bob-token"), review_body(1.0, 5.0, false)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Review not found"}));

    let (status, _) = call(&h.app, delete(&review_uri, Some("bob-token"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Right author, review addressed under another professor
    let other = format!("/api/professors/2/reviews/{}", created["id"]);
    let (status, _) = call(&h.app, delete(&other, Some("alice-token"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let stored = h.store.list_reviews(1).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].rating, 5.0);

    let (status, updated) = call(
        &h.app,
        send_json("PATCH", &review_uri, Some("alice-token"), review_body(2.0, 4.0, false)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["rating"], 2.0);
    assert_eq!(updated["user_email"], ALICE);

    h.pipeline.wait_idle().await;
    let (_, professor) = call(&h.app, get("/api/professors/1", None)).await;
    assert_eq!(professor["average_rating"], 2.0);
    assert_eq!(professor["would_take_again_percent"], 0);

    let (status, body) = call(&h.app, delete(&review_uri, Some("alice-token"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Review deleted successfully"}));

    h.pipeline.wait_idle().await;
    let (_, professor) = call(&h.app, get("/api/professors/1", None)).await;
    assert_eq!(professor["average_rating"], 0.0);
    assert_eq!(professor["review_count"], 0);
    assert_eq!(professor["average_difficulty"], 0.0);
    assert_eq!(professor["would_take_again_percent"], 0);
}

#[tokio::test]
async fn test_user_review_status() {
    let bridge = mock_bridge().await;
    let h = harness(&bridge.uri());

    let (status, body) = call(&h.app, get("/api/professors/1/user-review", Some("alice-token"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"hasReviewed": false, "existingReview": null}));

    call(
        &h.app,
        send_json(
            "POST",
            "/api/professors/1/reviews",
            Some("alice-token"),
            review_body(4.0, 2.0, true),
        ),
    )
    .await;

    let (_, body) = call(&h.app, get("/api/professors/1/user-review", Some("alice-token"))).await;
    assert_eq!(body["hasReviewed"], true);
    assert_eq!(body["existingReview"]["user_email"], ALICE);

    let (_, body) = call(&h.app, get("/api/professors/1/user-review", Some("bob-token"))).await;
    assert_eq!(body["hasReviewed"], false);
}

#[tokio::test]
async fn test_create_limit_only_counts_authenticated_requests() {
    let bridge = mock_bridge().await;
    let h = harness(&bridge.uri());

    for _ in 0..3 {
        let (status, _) = call(
            &h.app,
            send_json("POST", "/api/professors/1/reviews", Some("forged"), review_body(4.0, 2.0, true)),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    for _ in 0..5 {
        let (status, _) = call(
            &h.app,
            send_json(
                "POST",
                "/api/professors/1/reviews",
                Some("alice-token"),
                review_body(4.0, 2.0, true),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let response = h
        .app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/professors/1/reviews",
            Some("alice-token"),
            review_body(4.0, 2.0, true),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    // Edits have their own budget
    let review = h.store.list_reviews(1).await.unwrap().remove(0);
    let (status, _) = call(
        &h.app,
        send_json(
            "PATCH",
            &format!("/api/professors/1/reviews/{}", review.id),
            Some("alice-token"),
            review_body(3.0, 3.0, true),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    h.clock.advance(Duration::from_secs(60));
    let (status, _) = call(
        &h.app,
        send_json(
            "POST",
            "/api/professors/1/reviews",
            Some("alice-token"),
            review_body(4.0, 2.0, true),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_global_limit_applies_to_public_routes() {
    let bridge = mock_bridge().await;
    let h = harness(&bridge.uri());

    for _ in 0..100 {
        let (status, _) = call(&h.app, get("/", None)).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = call(&h.app, get("/api/professors", None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "Too many requests, slow down");
}

#[tokio::test]
async fn test_global_limit_ignores_spoofed_forwarding() {
    let bridge = mock_bridge().await;
    let h = harness(&bridge.uri());

    let from_peer = |forwarded_for: String| {
        let mut request = get("/", None);
        request
            .headers_mut()
            .insert("x-forwarded-for", forwarded_for.parse().unwrap());
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([203, 0, 113, 9], 443))));
        request
    };

    for i in 0..100 {
        let (status, _) = call(&h.app, from_peer(format!("10.9.{}.{}", i / 250, i % 250))).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = call(&h.app, from_peer("10.9.9.9".to_string())).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_cors_preflight_allows_configured_origin() {
    let bridge = mock_bridge().await;
    let h = harness(&bridge.uri());

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/professors/1/reviews")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
        .body(Body::empty())
        .unwrap();
    let response = assert_ok!(h.app.clone().oneshot(request).await);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );

    let request = Request::builder()
        .uri("/")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert!(!response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}
