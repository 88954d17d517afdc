use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::application::error::HttpError;

use super::super::models::{SessionRequest, SessionResponse};
use super::AdminState;

pub(super) async fn admin_session_create(
    State(state): State<AdminState>,
    Json(request): Json<SessionRequest>,
) -> Response {
    match state.sessions.issue(&request.user) {
        Ok(issued) => (
            StatusCode::CREATED,
            Json(SessionResponse::new(issued, &state.session_cookie)),
        )
            .into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn admin_session_revoke(
    State(state): State<AdminState>,
    Path(token): Path<String>,
) -> Response {
    match state.sessions.revoke(&token) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}
