//! HTTP surfaces: the public site behind the page cache and the admin API.

mod admin;
mod middleware;
mod models;
mod public;

pub use admin::{AdminState, build_admin_router};
pub use models::{PageResponse, SessionRequest, SessionResponse};
pub use public::{HttpState, build_router};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

async fn health() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
