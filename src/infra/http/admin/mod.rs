mod cache;
mod pages;
mod sessions;
mod state;

pub use state::AdminState;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use super::{
    health,
    middleware::{log_responses, set_request_context},
};

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/caches/page", delete(cache::evict_page_cache))
        .route(
            "/pages/{slug}",
            put(pages::admin_page_upsert).delete(pages::admin_page_delete),
        )
        .route("/sessions", post(sessions::admin_session_create))
        .route("/sessions/{token}", delete(sessions::admin_session_revoke))
        .route("/_health", get(health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}
