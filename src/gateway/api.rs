//! HTTP handlers for the session endpoints.
//!
//! Handlers only translate between JSON and [`SessionStore`] calls; every
//! session rule lives in the store.

use super::view::{format_inactivity, format_local, SessionView};
use super::AppState;
use crate::sessions::{Identity, SessionError};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;

// ── Request bodies ───────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default, rename = "macAddress")]
    pub mac_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionIdBody {
    #[serde(default, rename = "sessionID")]
    pub session_id: Option<String>,
}

// ── Helpers ──────────────────────────────────────────────────────

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn session_error_response(err: &SessionError) -> Response {
    let status = match err {
        SessionError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        SessionError::NotFound(_) => StatusCode::NOT_FOUND,
        SessionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "session store failure");
    }
    error_response(status, err.to_string())
}

/// Unwrap a JSON body, answering malformed input with 400.
fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|Json(value)| value)
        .map_err(|rejection| error_response(StatusCode::BAD_REQUEST, rejection.body_text()))
}

/// Pull a non-empty `sessionID` out of the body.
fn require_session_id(body: Result<Json<SessionIdBody>, JsonRejection>) -> Result<String, Response> {
    let body = parse_body(body)?;
    body.session_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "sessionID is required"))
}

// ── Handlers ────────────────────────────────────────────────────

/// GET /welcome: service banner
pub async fn handle_welcome() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Welcome to the session control API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /login: open a session
pub async fn handle_login(
    State(state): State<AppState>,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> Response {
    let body = match parse_body(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };

    let identity = Identity::new(
        body.email.unwrap_or_default(),
        body.nickname.unwrap_or_default(),
    );
    let mac_address = body.mac_address.unwrap_or_default();

    match state.store.create(identity, &mac_address).await {
        Ok(record) => Json(serde_json::json!({
            "message": "Logged in successfully",
            "sessionID": record.id,
        }))
        .into_response(),
        Err(e) => session_error_response(&e),
    }
}

/// POST /logout: end a session
pub async fn handle_logout(
    State(state): State<AppState>,
    body: Result<Json<SessionIdBody>, JsonRejection>,
) -> Response {
    let session_id = match require_session_id(body) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.store.delete(&session_id).await {
        Ok(_) => Json(serde_json::json!({"message": "Logged out successfully"})).into_response(),
        Err(e) => session_error_response(&e),
    }
}

/// PUT /update: keep a session alive
pub async fn handle_update(
    State(state): State<AppState>,
    body: Result<Json<SessionIdBody>, JsonRejection>,
) -> Response {
    let session_id = match require_session_id(body) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.store.touch(&session_id).await {
        Ok(record) => Json(serde_json::json!({
            "message": "Session updated",
            "session": SessionView::from(record),
        }))
        .into_response(),
        Err(e) => session_error_response(&e),
    }
}

/// POST /status: inspect a session without refreshing it
pub async fn handle_status(
    State(state): State<AppState>,
    body: Result<Json<SessionIdBody>, JsonRejection>,
) -> Response {
    let session_id = match require_session_id(body) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.store.get(&session_id).await {
        Ok(record) => {
            let idle = record.idle_duration(state.clock.now());
            let last_accessed_at = format_local(record.last_accessed_at, state.display_tz);
            Json(serde_json::json!({
                "message": "Session active",
                "session": SessionView::from(record),
                "lastAccessedAt": last_accessed_at,
                "inactivityTime": format_inactivity(idle),
            }))
            .into_response()
        }
        Err(e) => session_error_response(&e),
    }
}

/// GET /sessions: all live sessions in creation order
pub async fn handle_list(State(state): State<AppState>) -> impl IntoResponse {
    let sessions: Vec<SessionView> = state
        .store
        .list()
        .await
        .into_iter()
        .map(SessionView::from)
        .collect();

    Json(serde_json::json!({
        "count": sessions.len(),
        "sessions": sessions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_map_to_distinct_statuses() {
        let statuses: Vec<StatusCode> = [
            SessionError::InvalidInput { field: "email" },
            SessionError::NotFound("x".into()),
            SessionError::Internal("collision".into()),
        ]
        .iter()
        .map(|e| session_error_response(e).status())
        .collect();

        assert_eq!(
            statuses,
            vec![
                StatusCode::BAD_REQUEST,
                StatusCode::NOT_FOUND,
                StatusCode::INTERNAL_SERVER_ERROR
            ]
        );
    }

    #[test]
    fn blank_session_id_is_rejected() {
        let body = Ok(Json(SessionIdBody {
            session_id: Some("   ".into()),
        }));
        let resp = require_session_id(body).unwrap_err();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = Ok(Json(SessionIdBody {
            session_id: Some(" abc ".into()),
        }));
        assert_eq!(require_session_id(body).unwrap(), "abc");
    }
}
