use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::application::{content::PageInput, error::HttpError};

use super::super::models::PageResponse;
use super::AdminState;

pub(super) async fn admin_page_upsert(
    State(state): State<AdminState>,
    Path(slug): Path<String>,
    Json(input): Json<PageInput>,
) -> Response {
    match state.content.upsert(&slug, input) {
        Ok(page) => Json(PageResponse::from(&page)).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn admin_page_delete(
    State(state): State<AdminState>,
    Path(slug): Path<String>,
) -> Response {
    match state.content.delete(&slug) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}
