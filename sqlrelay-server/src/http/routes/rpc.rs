//! RPC endpoint: the session state machine at the protocol boundary.
//!
//! `POST /rpc` carries one tagged request; the session id travels in the
//! `x-session-id` header. An `initialize` request with no session id binds a
//! new session and returns its id (header and body). Any other request is
//! routed into the existing handler for its id, or rejected. `DELETE /rpc`
//! is transport closure: the mapping is removed, idempotently.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};

use sqlrelay_core::RelayError;

use crate::http::error::ApiError;
use crate::rpc::protocol::{RpcRequest, RpcResponse, ServerInfo};
use crate::session::SessionHandler;
use crate::state::AppState;

pub const SESSION_HEADER: &str = "x-session-id";

fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok())
}

/// POST /rpc
async fn rpc(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RpcRequest>,
) -> Result<Response, ApiError> {
    match session_id(&headers) {
        None => match request {
            RpcRequest::Initialize { client } => {
                let handler = SessionHandler::new(state.clone(), client);
                let id = state.sessions().create(handler);
                tracing::info!(session_id = %id, "session initialized");
                let body = Json(RpcResponse::Initialized {
                    session_id: id.clone(),
                    server: ServerInfo::current(),
                });
                Ok(([(SESSION_HEADER, id)], body).into_response())
            }
            other => {
                tracing::debug!(op = other.op_name(), "request without session id rejected");
                Err(RelayError::UnknownSession {
                    id: "(missing)".into(),
                }
                .into())
            }
        },
        Some(id) => {
            let handler = state
                .sessions()
                .get(id)
                .ok_or_else(|| RelayError::UnknownSession { id: id.to_string() })?;
            let response = handler.handle(request).await?;
            Ok(Json(response).into_response())
        }
    }
}

/// DELETE /rpc - transport closure
async fn close(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    if let Some(id) = session_id(&headers) {
        if state.sessions().remove(id) {
            tracing::info!(session_id = %id, "session closed");
        }
    }
    StatusCode::NO_CONTENT
}

/// RPC routes
pub fn router() -> Router<AppState> {
    Router::new().route("/rpc", post(rpc).delete(close))
}
