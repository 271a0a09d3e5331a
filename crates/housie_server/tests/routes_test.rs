//! Tests for the HTTP surface.

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use housie_engine::EngineConfig;
use housie_server::{AppState, GameHost, HOST_TOKEN_HEADER, router};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

const TOKEN: &str = "open-sesame";

fn app() -> Router {
    let handle = GameHost::spawn(EngineConfig::default().with_ticket_seed(12));
    router(AppState::new(handle, Some(TOKEN.to_string())))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    host: bool,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if host {
        request = request.header(HOST_TOKEN_HEADER, TOKEN);
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .expect("valid request");

    let response = app.clone().oneshot(request).await.expect("infallible");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

async fn created(app: &Router, tickets: usize) -> Value {
    let (status, state) = send(
        app,
        Method::POST,
        "/game",
        true,
        Some(json!({ "ticketCount": tickets })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{state}");
    state
}

#[tokio::test]
async fn test_healthz() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/healthz", false, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn test_initial_state() {
    let app = app();
    let (status, state) = send(&app, Method::GET, "/state", false, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["status"], "NO_ACTIVE_GAME");
    assert_eq!(state["tickets"], json!([]));
}

#[tokio::test]
async fn test_create_requires_host_token() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/game",
        false,
        Some(json!({ "ticketCount": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let state = created(&app, 3).await;
    assert_eq!(state["status"], "BOOKING_OPEN");
    assert_eq!(state["tickets"].as_array().map(Vec::len), Some(3));
    assert_eq!(state["tickets"][0]["id"], "T-01");
}

#[tokio::test]
async fn test_wrong_token_is_a_player() {
    let handle = GameHost::spawn(EngineConfig::default());
    let app = router(AppState::new(handle, Some(TOKEN.to_string())));
    let request = Request::builder()
        .method(Method::POST)
        .uri("/game")
        .header(HOST_TOKEN_HEADER, "guess")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "ticketCount": 3 }).to_string()))
        .expect("valid request");

    let response = app.oneshot(request).await.expect("infallible");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_ticket_count_validation() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/game",
        true,
        Some(json!({ "ticketCount": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_malformed_bodies_use_error_shape() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/game",
        true,
        Some(json!({ "tickets": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_BODY");
    assert!(body["message"].is_string());

    let (status, body) = send(
        &app,
        Method::POST,
        "/game/countdown",
        true,
        Some(json!({ "seconds": -5 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_BODY");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/game")
        .header(HOST_TOKEN_HEADER, TOKEN)
        .header("content-type", "application/json")
        .body(Body::from("{ticketCount:"))
        .expect("valid request");
    let response = app.clone().oneshot(request).await.expect("infallible");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body: Value = serde_json::from_slice(&bytes).expect("json error body");
    assert_eq!(body["code"], "INVALID_BODY");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/game")
        .header(HOST_TOKEN_HEADER, TOKEN)
        .body(Body::from(json!({ "ticketCount": 3 }).to_string()))
        .expect("valid request");
    let response = app.clone().oneshot(request).await.expect("infallible");
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let (_, state) = send(&app, Method::GET, "/state", false, None).await;
    assert_eq!(state["status"], "NO_ACTIVE_GAME");
}

#[tokio::test]
async fn test_booking_lifecycle() {
    let app = app();
    created(&app, 3).await;

    let (status, state) = send(
        &app,
        Method::POST,
        "/tickets/T-02/booking",
        false,
        Some(json!({ "playerName": "Meera" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["tickets"][1]["isBooked"], true);
    assert_eq!(state["tickets"][1]["bookedBy"], "Meera");

    let (status, body) = send(
        &app,
        Method::POST,
        "/tickets/T-02/booking",
        false,
        Some(json!({ "playerName": "Kiran" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_BOOKED");

    let (status, state) = send(
        &app,
        Method::PUT,
        "/tickets/T-02/booking",
        false,
        Some(json!({ "playerName": "Meera K" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["tickets"][1]["bookedBy"], "Meera K");

    let (status, state) = send(&app, Method::DELETE, "/tickets/T-02/booking", false, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["tickets"][1]["isBooked"], false);
    assert_eq!(state["tickets"][1]["bookedBy"], Value::Null);
}

#[tokio::test]
async fn test_booking_rejections() {
    let app = app();
    created(&app, 2).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/tickets/T-09/booking",
        false,
        Some(json!({ "playerName": "Asha" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "TICKET_NOT_FOUND");

    let (status, body) = send(
        &app,
        Method::POST,
        "/tickets/T-01/booking",
        false,
        Some(json!({ "playerName": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (status, body) = send(&app, Method::DELETE, "/tickets/T-01/booking", false, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "NOT_BOOKED");
}

#[tokio::test]
async fn test_pending_requests_need_host_confirmation() {
    let app = app();
    created(&app, 2).await;

    let (status, state) = send(
        &app,
        Method::POST,
        "/tickets/T-01/pending",
        false,
        Some(json!({ "playerName": "Ravi" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["tickets"][0]["isPending"], true);
    assert_eq!(state["tickets"][0]["pendingPlayerName"], "Ravi");

    let (status, body) = send(
        &app,
        Method::POST,
        "/tickets/T-01/pending/confirm",
        false,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, state) = send(
        &app,
        Method::POST,
        "/tickets/T-01/pending/confirm",
        true,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["tickets"][0]["isBooked"], true);
    assert_eq!(state["tickets"][0]["bookedBy"], "Ravi");
    assert_eq!(state["tickets"][0]["isPending"], false);

    send(
        &app,
        Method::POST,
        "/tickets/T-02/pending",
        false,
        Some(json!({ "playerName": "Sana" })),
    )
    .await;
    let (status, state) = send(&app, Method::DELETE, "/tickets/T-02/pending", true, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["tickets"][1]["isPending"], false);
    assert_eq!(state["tickets"][1]["isBooked"], false);
}

#[tokio::test]
async fn test_sequence_accepts_list_and_text() {
    let app = app();
    created(&app, 2).await;

    let (status, state) = send(
        &app,
        Method::PUT,
        "/game/sequence",
        true,
        Some(json!({ "sequence": [90, 1, 45] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["drawSequence"], json!([90, 1, 45]));

    let (status, state) = send(
        &app,
        Method::PUT,
        "/game/sequence",
        true,
        Some(json!({ "sequence": "7, 8 9" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["drawSequence"], json!([7, 8, 9]));

    let (status, body) = send(
        &app,
        Method::PUT,
        "/game/sequence",
        true,
        Some(json!({ "sequence": [4, 91] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (_, state) = send(&app, Method::GET, "/state", false, None).await;
    assert_eq!(state["drawSequence"], json!([7, 8, 9]));
}

#[tokio::test]
async fn test_countdown_guards() {
    let app = app();
    created(&app, 2).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/game/countdown",
        true,
        Some(json!({ "seconds": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "NO_BOOKED_TICKETS");

    send(
        &app,
        Method::POST,
        "/tickets/T-01/booking",
        false,
        Some(json!({ "playerName": "Asha" })),
    )
    .await;
    let (status, state) = send(
        &app,
        Method::POST,
        "/game/countdown",
        true,
        Some(json!({ "seconds": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["status"], "COUNTDOWN");
    assert!(state["countdownEndTime"].is_string());

    let (status, body) = send(
        &app,
        Method::POST,
        "/tickets/T-02/booking",
        false,
        Some(json!({ "playerName": "Late" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "WRONG_STATUS");
}

#[tokio::test]
async fn test_reset_returns_to_idle() {
    let app = app();
    created(&app, 2).await;

    let (status, _) = send(&app, Method::DELETE, "/game", false, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, state) = send(&app, Method::DELETE, "/game", true, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["status"], "NO_ACTIVE_GAME");
    assert_eq!(state["tickets"], json!([]));
}
