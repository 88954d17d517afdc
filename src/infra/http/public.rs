use axum::{
    Json, Router,
    extract::{Path, State},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    application::{
        content::{ContentError, ContentService},
        error::HttpError,
    },
    cache::{CacheState, page_cache_layer},
    presentation::views::{
        IndexTemplate, IndexView, LayoutChrome, LayoutContext, PageTemplate, PageView,
        render_not_found_response, render_page_response,
    },
};

use super::{
    health,
    middleware::{log_responses, set_request_context},
    models::PageResponse,
};

#[derive(Clone)]
pub struct HttpState {
    pub content: ContentService,
    pub cache: Option<CacheState>,
}

pub fn build_router(state: HttpState) -> Router {
    // Everything the cache may see. Eligibility and qualification decide
    // per request what is actually stored.
    let cached_routes = Router::new()
        .route("/", get(index))
        .route("/{slug}", get(page_detail))
        .route("/api/pages/{slug}", get(page_json))
        .fallback(fallback);

    let cached_routes = if let Some(cache_state) = state.cache.clone() {
        cached_routes.layer(middleware::from_fn_with_state(
            cache_state,
            page_cache_layer,
        ))
    } else {
        cached_routes
    };

    let static_routes = Router::new().route("/_health", get(health));

    cached_routes
        .merge(static_routes)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn index(State(state): State<HttpState>) -> Response {
    let pages = state.content.list();
    let chrome = LayoutChrome::for_pages(&pages);
    let content = IndexView::new(pages.iter().find(|page| page.slug == "index"), &pages);
    render_page_response(IndexTemplate {
        view: LayoutContext::new(chrome, content),
    })
}

async fn page_detail(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    let pages = state.content.list();
    let chrome = LayoutChrome::for_pages(&pages);

    match state.content.get(&slug) {
        Ok(page) => render_page_response(PageTemplate {
            view: LayoutContext::new(chrome, PageView::from(&page)),
        }),
        Err(ContentError::NotFound(_)) => render_not_found_response(chrome),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn page_json(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    match state.content.get(&slug) {
        Ok(page) => Json(PageResponse::from(&page)).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn fallback(State(state): State<HttpState>) -> Response {
    render_not_found_response(LayoutChrome::for_pages(&state.content.list()))
}
