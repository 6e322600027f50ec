//! HTTP gateway for the interview engine.
//!
//! Error kinds map to status codes: NotFound → 404, InvalidInput and
//! SessionCompleted → 400, everything else → 500. Bodies carry
//! `{kind, reason}` - never stack traces. Dropping a request future
//! (client disconnect) cancels the in-flight turn via the
//! request-scoped token's drop guard.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use elicit_core::{Error, InterviewMode, SessionId};
use elicit_engine::SessionService;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct AppState {
    pub sessions: Arc<SessionService>,
    pub started_at: Instant,
}

struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) | Error::SessionCompleted(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "kind": self.0.kind(),
            "reason": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

type ApiResult = std::result::Result<Response, ApiError>;

#[derive(Deserialize)]
struct CreateSessionRequest {
    methodology: String,
    concept_id: String,
    #[serde(default)]
    mode: InterviewMode,
    max_turns: Option<u32>,
    #[serde(default)]
    config: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct ProcessTurnRequest {
    text: String,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/sessions", post(create_session_handler).get(list_sessions_handler))
        .route(
            "/sessions/:id",
            get(get_session_handler).delete(delete_session_handler),
        )
        .route("/sessions/:id/start", post(start_session_handler))
        .route("/sessions/:id/turns", post(process_turn_handler))
        .route("/sessions/:id/graph", get(session_graph_handler))
        .route("/sessions/:id/scoring/:turn", get(scoring_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_gateway(state: Arc<AppState>, bind_addr: SocketAddr) -> std::io::Result<()> {
    let app = build_router(state);
    info!("Elicit gateway v{} listening on {}", env!("CARGO_PKG_VERSION"), bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(std::io::Error::other)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.list_sessions().len(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateSessionRequest>,
) -> ApiResult {
    let session = state.sessions.create_session(
        &body.methodology,
        &body.concept_id,
        body.mode,
        body.max_turns,
        body.config,
    )?;
    Ok((StatusCode::CREATED, Json(session)).into_response())
}

async fn list_sessions_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let sessions = state.sessions.list_sessions();
    Json(json!({
        "total": sessions.len(),
        "sessions": sessions,
    }))
}

async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let session = state.sessions.get_session(&SessionId::new(id))?;
    Ok(Json(session).into_response())
}

async fn delete_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    state.sessions.delete_session(&SessionId::new(id))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn start_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let session_id = SessionId::new(id);
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let opening_question = state.sessions.start_session(&session_id, cancel).await?;
    Ok(Json(json!({
        "session_id": session_id,
        "opening_question": opening_question,
    }))
    .into_response())
}

async fn process_turn_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ProcessTurnRequest>,
) -> ApiResult {
    let session_id = SessionId::new(id);
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let result = state
        .sessions
        .process_turn(&session_id, &body.text, cancel)
        .await?;
    Ok(Json(result).into_response())
}

async fn session_graph_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let (nodes, edges) = state.sessions.session_graph(&SessionId::new(id))?;
    Ok(Json(json!({
        "nodes": nodes,
        "edges": edges,
    }))
    .into_response())
}

async fn scoring_handler(
    State(state): State<Arc<AppState>>,
    Path((id, turn)): Path<(String, u32)>,
) -> ApiResult {
    let trace = state.sessions.scoring_for_turn(&SessionId::new(id), turn)?;
    let winner = trace
        .candidates
        .iter()
        .find(|c| c.winner)
        .map(|c| c.strategy);
    Ok(Json(json!({
        "turn_number": trace.turn_number,
        "candidates": trace.candidates,
        "winner_strategy_id": winner,
    }))
    .into_response())
}
