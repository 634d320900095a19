//! HTTP handlers
//!
//! Reads go through the advisory path; writes always take the session lock so
//! they interleave safely with PHP requests on the same session.

use crate::{AppState, CurrentSession, WebResult};
use axum::{
    extract::{Path, State},
    response::Json,
};
use phpsess_core::{PhpValue, SessionError, SessionRecord};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Current session data, JSON fields decoded
pub async fn get_session(
    State(state): State<AppState>,
    CurrentSession(session_id): CurrentSession,
) -> WebResult<Json<SessionRecord>> {
    let record = state.sessions.require(session_id.as_ref()).await?;
    Ok(Json(record))
}

/// Set one field under the session lock and return the updated session
pub async fn put_session_field(
    State(state): State<AppState>,
    Path(field): Path<String>,
    Json(value): Json<serde_json::Value>,
) -> WebResult<Json<SessionRecord>> {
    let value = PhpValue::from(value);
    let kind = value.kind();

    let record = state
        .sessions
        .lock(None, move |session| {
            Box::pin(async move {
                session.insert(field, value);
                Ok::<_, SessionError>(session.clone())
            })
        })
        .await?;

    info!(kind, "Session field updated over HTTP");
    Ok(Json(record))
}

/// Remove the session data
pub async fn delete_session(State(state): State<AppState>) -> WebResult<Json<DeleteResponse>> {
    let deleted = state.sessions.delete(None).await?;
    Ok(Json(DeleteResponse { deleted }))
}
