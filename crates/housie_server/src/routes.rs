//! HTTP and WebSocket surface for the live game.
//!
//! Mutations answer with the resulting [`GameState`]; rejections answer with
//! `{ "code", "message" }` and are never broadcast. `/ws` pushes a snapshot on
//! connect and then every engine event.

use crate::runtime::{GameHandle, HostError};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Path, Request, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use housie_engine::{Actor, GameError, GameEvent, GameState, GuardViolation, TicketId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, instrument, warn};

/// Header carrying the host's shared secret.
pub const HOST_TOKEN_HEADER: &str = "x-host-token";

/// Shared state for every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    handle: GameHandle,
    host_token: Option<Arc<str>>,
}

impl AppState {
    /// Creates handler state; without a token nobody is treated as host.
    pub fn new(handle: GameHandle, host_token: Option<String>) -> Self {
        Self {
            handle,
            host_token: host_token.map(Arc::from),
        }
    }
}

/// Builds the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/state", get(get_state))
        .route("/ws", get(ws_handler))
        .route("/game", post(create_game).delete(reset_game))
        .route("/game/sequence", put(set_sequence))
        .route("/game/countdown", post(start_countdown))
        .route(
            "/tickets/{ticket_id}/booking",
            post(book_ticket).put(edit_booking).delete(unbook_ticket),
        )
        .route(
            "/tickets/{ticket_id}/pending",
            post(request_pending).delete(cancel_pending),
        )
        .route("/tickets/{ticket_id}/pending/confirm", post(confirm_pending))
        .with_state(state)
}

/// The requesting actor, privileged when it presents the host token.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Actor);

impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(HOST_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        let privileged = match (presented, state.host_token.as_deref()) {
            (Some(presented), Some(expected)) => presented == expected,
            _ => false,
        };
        Ok(Caller(Actor::new(privileged)))
    }
}

/// Error body sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable reason.
    pub message: String,
}

/// A rejected request.
#[derive(Debug, derive_more::Display, derive_more::From)]
pub enum ApiError {
    /// The engine or its host refused the operation.
    #[display("{}", _0)]
    Host(HostError),
    /// The body was missing, not JSON, or the wrong shape.
    #[display("{}", _0)]
    Body(JsonRejection),
}

impl std::error::Error for ApiError {}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        ApiError::Host(HostError::Game(err))
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Host(HostError::Game(GameError::Guard(GuardViolation::Unauthorized(_)))) => {
                StatusCode::FORBIDDEN
            }
            ApiError::Host(HostError::Game(GameError::Guard(_))) => StatusCode::CONFLICT,
            ApiError::Host(HostError::Game(GameError::Validation(_))) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Host(HostError::Closed) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Body(rejection) => rejection.status(),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Host(HostError::Game(err)) => err.code(),
            ApiError::Host(HostError::Closed) => "UNAVAILABLE",
            ApiError::Body(_) => "INVALID_BODY",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<Json<GameState>, ApiError>;

/// JSON request body whose rejections answer with [`ErrorBody`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// Body of `POST /game`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    /// Tickets to deal.
    pub ticket_count: usize,
}

/// Body of `PUT /game/sequence`: a number list or comma/space separated text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceRequest {
    /// The new draw order.
    pub sequence: SequenceInput,
}

/// Accepted draw sequence encodings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SequenceInput {
    /// `[5, 17, 90]`
    Numbers(Vec<i64>),
    /// `"5, 17 90"`
    Text(String),
}

/// Body of `POST /game/countdown`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountdownRequest {
    /// Requested countdown, clamped by the engine.
    pub seconds: u64,
}

/// Body of the booking endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRequest {
    /// Player the ticket is for.
    pub player_name: String,
}

async fn healthz() -> &'static str {
    "ok"
}

async fn get_state(State(state): State<AppState>) -> ApiResult {
    Ok(Json(state.handle.snapshot().await?))
}

#[instrument(skip(state, caller))]
async fn create_game(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(request): ApiJson<CreateGameRequest>,
) -> ApiResult {
    Ok(Json(state.handle.create_game(caller, request.ticket_count).await?))
}

#[instrument(skip(state, caller))]
async fn reset_game(State(state): State<AppState>, Caller(caller): Caller) -> ApiResult {
    Ok(Json(state.handle.reset_game(caller).await?))
}

#[instrument(skip_all)]
async fn set_sequence(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(request): ApiJson<SequenceRequest>,
) -> ApiResult {
    let updated = match request.sequence {
        SequenceInput::Numbers(numbers) => state.handle.set_draw_sequence(caller, numbers).await?,
        SequenceInput::Text(text) => state.handle.set_draw_sequence_text(caller, text).await?,
    };
    Ok(Json(updated))
}

#[instrument(skip(state, caller))]
async fn start_countdown(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(request): ApiJson<CountdownRequest>,
) -> ApiResult {
    Ok(Json(state.handle.start_countdown(caller, request.seconds).await?))
}

#[instrument(skip(state, caller))]
async fn book_ticket(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(ticket_id): Path<String>,
    ApiJson(request): ApiJson<PlayerRequest>,
) -> ApiResult {
    let updated = state
        .handle
        .book_ticket(caller, TicketId::from(ticket_id), request.player_name)
        .await?;
    Ok(Json(updated))
}

#[instrument(skip(state, caller))]
async fn edit_booking(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(ticket_id): Path<String>,
    ApiJson(request): ApiJson<PlayerRequest>,
) -> ApiResult {
    let updated = state
        .handle
        .edit_booking(caller, TicketId::from(ticket_id), request.player_name)
        .await?;
    Ok(Json(updated))
}

#[instrument(skip(state, caller))]
async fn unbook_ticket(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(ticket_id): Path<String>,
) -> ApiResult {
    Ok(Json(state.handle.unbook_ticket(caller, TicketId::from(ticket_id)).await?))
}

#[instrument(skip(state, caller))]
async fn request_pending(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(ticket_id): Path<String>,
    ApiJson(request): ApiJson<PlayerRequest>,
) -> ApiResult {
    let updated = state
        .handle
        .request_pending_booking(caller, TicketId::from(ticket_id), request.player_name)
        .await?;
    Ok(Json(updated))
}

#[instrument(skip(state, caller))]
async fn confirm_pending(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(ticket_id): Path<String>,
) -> ApiResult {
    Ok(Json(state.handle.confirm_pending(caller, TicketId::from(ticket_id)).await?))
}

#[instrument(skip(state, caller))]
async fn cancel_pending(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(ticket_id): Path<String>,
) -> ApiResult {
    Ok(Json(state.handle.cancel_pending(caller, TicketId::from(ticket_id)).await?))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (snapshot, mut events) = match state.handle.subscribe_with_snapshot().await {
        Ok(subscription) => subscription,
        Err(err) => {
            warn!(error = %err, "Rejecting observer");
            return;
        }
    };
    info!("Observer connected");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let write_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    send_event(&tx, &GameEvent::Snapshot(Box::new(snapshot)));

    let broadcast_task = {
        let tx = tx.clone();
        let handle = state.handle.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => send_event(&tx, &event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Observer lagged, resending snapshot");
                        match handle.snapshot().await {
                            Ok(current) => send_event(&tx, &GameEvent::Snapshot(Box::new(current))),
                            Err(_) => break,
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    };

    // Observers are read-only; inbound frames only matter for close.
    while let Some(Ok(message)) = receiver.next().await {
        if let Message::Close(_) = message {
            break;
        }
    }

    write_task.abort();
    broadcast_task.abort();
    info!("Observer disconnected");
}

fn send_event(tx: &mpsc::UnboundedSender<Message>, event: &GameEvent) {
    match serde_json::to_string(event) {
        Ok(payload) => {
            if tx.send(Message::Text(payload.into())).is_err() {
                debug!("Observer writer closed");
            }
        }
        Err(err) => warn!(error = %err, "Failed to encode event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use housie_engine::ValidationError;

    #[test]
    fn test_status_mapping() {
        let forbidden = ApiError::from(GameError::from(GuardViolation::Unauthorized("createGame")));
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(forbidden.code(), "UNAUTHORIZED");

        let conflict = ApiError::from(GameError::from(GuardViolation::NoBookedTickets));
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let invalid = ApiError::from(GameError::from(ValidationError::EmptyPlayerName));
        assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(invalid.code(), "INVALID_INPUT");

        let closed = ApiError::from(HostError::Closed);
        assert_eq!(closed.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_sequence_input_accepts_both_forms() {
        let numbers: SequenceRequest =
            serde_json::from_str(r#"{"sequence": [5, 17, 90]}"#).expect("list form");
        assert!(matches!(numbers.sequence, SequenceInput::Numbers(ref n) if n == &vec![5, 17, 90]));

        let text: SequenceRequest =
            serde_json::from_str(r#"{"sequence": "5, 17 90"}"#).expect("text form");
        assert!(matches!(text.sequence, SequenceInput::Text(_)));
    }
}
