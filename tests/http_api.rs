//! HTTP contract of the reservation routes, driven through the router with
//! the in-memory store behind it.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use movie_reservation::config::{AppConfig, BookingConfig, Config, DatabaseConfig, JwtConfig};
use movie_reservation::controllers;
use movie_reservation::models::{Movie, MovieId, UserId};
use movie_reservation::storage::MemoryStore;
use movie_reservation::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "http-test-secret";
const DATE: &str = "2024-05-01";

fn config() -> Config {
    Config {
        app: AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            rust_log: "movie_reservation=debug".to_string(),
        },
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            pool_size: 1,
            acquire_timeout_ms: 1_000,
        },
        jwt: JwtConfig {
            secret: SECRET.to_string(),
        },
        booking: BookingConfig { timeout_ms: 5_000 },
    }
}

async fn app() -> Router {
    let store = MemoryStore::new();
    store.add_user(UserId(1)).await;
    store.add_user(UserId(2)).await;
    store
        .add_movie(Movie {
            id: MovieId(1),
            title: "Alien".to_string(),
            year: 1979,
            description: String::new(),
            image_url: "alien.jpg".to_string(),
            genres: vec![],
            cast: vec![],
        })
        .await;

    controllers::routes().with_state(Arc::new(AppState::with_store(store, config())))
}

// Токен в том виде, в каком его выпускает сервис аутентификации
fn token(user: i32) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        &json!({ "_id": user.to_string() }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn request(method: Method, uri: &str, user: Option<i32>, body: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user)));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn reserve(app: &Router, user: i32, seats: &[&str]) -> (StatusCode, Value) {
    let body = json!({ "date": DATE, "seats": seats }).to_string();
    send(app, request(Method::POST, "/movie/1/reserve", Some(user), Some(&body))).await
}

#[tokio::test]
async fn reserve_returns_booked_seats() {
    let app = app().await;

    let (status, body) = reserve(&app, 1, &["A1", "A2"]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["date"], DATE);
    assert_eq!(body["seats"], json!(["A1", "A2"]));
    assert_eq!(body["reservation_ids"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn malformed_body_is_invalid_json() {
    let app = app().await;

    let (status, body) = send(
        &app,
        request(Method::POST, "/movie/1/reserve", Some(1), Some("{\"seats\": [")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "invalid json" }));
}

#[tokio::test]
async fn validation_and_conflicts_use_error_body() {
    let app = app().await;

    let (status, body) = reserve(&app, 1, &["A1", "A2", "A3", "A4", "A5", "A6"]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "max 5 seats per reservation" }));

    let (status, body) = reserve(&app, 1, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "date and seat are required" }));

    assert_eq!(reserve(&app, 1, &["B1"]).await.0, StatusCode::OK);
    let (status, body) = reserve(&app, 2, &["B1"]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({ "error": "seat already reserved" }));

    let payload = json!({ "date": DATE, "seats": ["A1"] }).to_string();
    let (status, body) = send(
        &app,
        request(Method::POST, "/movie/99/reserve", Some(1), Some(&payload)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "movie 99 not found" }));
}

#[tokio::test]
async fn listing_is_keyed_by_movie_id() {
    let app = app().await;
    reserve(&app, 1, &["A2"]).await;
    reserve(&app, 1, &["A1"]).await;

    let (status, body) = send(&app, request(Method::GET, "/user/reservations", Some(1), None)).await;
    assert_eq!(status, StatusCode::OK);

    let bundles = body["reservations"]["1"].as_array().unwrap();
    assert_eq!(bundles.len(), 1);
    assert_eq!(bundles[0]["title"], "Alien");
    assert_eq!(bundles[0]["image_url"], "alien.jpg");
    assert_eq!(bundles[0]["date"], DATE);
    assert_eq!(bundles[0]["seats"], json!(["A1", "A2"]));
    assert!(bundles[0]["reservation_ids"]["A1"].is_i64());

    let (_, body) = send(&app, request(Method::GET, "/user/reservations", Some(2), None)).await;
    assert_eq!(body, json!({ "reservations": {} }));
}

#[tokio::test]
async fn cancel_reports_message_and_ownership() {
    let app = app().await;
    let (_, booked) = reserve(&app, 1, &["C1"]).await;
    let id = booked["reservation_ids"][0].as_i64().unwrap();
    let uri = format!("/user/reservations/{id}");

    let (status, body) = send(&app, request(Method::DELETE, &uri, Some(2), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": format!("reservation {id} belongs to another user") }));

    for _ in 0..2 {
        let (status, body) = send(&app, request(Method::DELETE, &uri, Some(1), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "reservation canceled" }));
    }

    let (status, body) = send(&app, request(Method::DELETE, "/user/reservations/777", Some(1), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "reservation 777 not found" }));
}

#[tokio::test]
async fn requests_without_known_user_are_unauthorized() {
    let app = app().await;

    let (status, _) = send(&app, request(Method::GET, "/user/reservations", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Подписан верно, но такого пользователя нет
    let (status, _) = send(&app, request(Method::GET, "/user/reservations", Some(3), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let uri = format!("/user/reservations?token={}", token(2));
    let (status, _) = send(&app, request(Method::GET, &uri, None, None)).await;
    assert_eq!(status, StatusCode::OK);
}
