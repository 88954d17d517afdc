use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{application::error::HttpError, cache::evict_all};

use super::AdminState;

/// Drop every cached page. Evicting an empty or disabled cache succeeds.
pub(super) async fn evict_page_cache(State(state): State<AdminState>) -> Response {
    let Some(store) = state.cache.as_ref() else {
        return StatusCode::NO_CONTENT.into_response();
    };

    match evict_all(store, "admin") {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}
