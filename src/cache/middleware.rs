//! Page cache middleware.
//!
//! Per request: check eligibility, then either serve a stored artifact, or
//! run the pipeline with its response body routed through a capture, or pass
//! straight through. At most one store read and one store write per request.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use metrics::counter;
use tracing::{debug, instrument, warn};

use super::{
    capture::capture_response,
    config::CacheConfig,
    key::{CacheKey, CacheKeyBuilder},
    policy,
    principal::PrincipalResolver,
    responder::CacheResponder,
    store::SharedStore,
};

const METRIC_HIT_TOTAL: &str = "page_cache_hit_total";
const METRIC_MISS_TOTAL: &str = "page_cache_miss_total";
const METRIC_SKIP_TOTAL: &str = "page_cache_skip_total";

/// Shared cache state for the middleware.
#[derive(Clone)]
pub struct CacheState {
    pub config: CacheConfig,
    pub store: SharedStore,
    keys: CacheKeyBuilder,
    principals: Arc<dyn PrincipalResolver>,
    responder: CacheResponder,
}

impl CacheState {
    pub fn new(
        config: CacheConfig,
        store: SharedStore,
        principals: Arc<dyn PrincipalResolver>,
    ) -> Self {
        Self {
            keys: CacheKeyBuilder::new(config.default_scheme.clone()),
            responder: CacheResponder::new(&config),
            config,
            store,
            principals,
        }
    }

    /// Returns the cache key of a request the rules admit, or the reason they
    /// do not. The principal is checked separately.
    fn admit(&self, request: &Request<Body>) -> Result<CacheKey, &'static str> {
        policy::check_request(request)?;

        self.keys.build(request).map_err(|err| {
            debug!(error = %err, "request has no usable cache key");
            "cache_key"
        })
    }

    async fn is_anonymous(&self, headers: &HeaderMap) -> bool {
        self.principals.resolve(headers).await.is_anonymous()
    }
}

/// Middleware serving and capturing rendered pages.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn page_cache_layer(
    State(cache): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.config.enabled {
        return next.run(request).await;
    }

    // The request body is not `Sync`; resolve from owned headers so no
    // borrow of the request is held across the await.
    let headers = request.headers().clone();
    let ruled = cache.admit(&request);
    let admitted = match ruled {
        Ok(key) if cache.is_anonymous(&headers).await => Ok(key),
        Ok(_) => Err("principal"),
        Err(reason) => Err(reason),
    };

    let key = match admitted {
        Ok(key) => key,
        Err(reason) => {
            counter!(METRIC_SKIP_TOTAL, "reason" => reason).increment(1);
            debug!(cache = "page", outcome = "skip", reason, "request not eligible");
            return next.run(request).await;
        }
    };

    match cache.store.get(&key) {
        Ok(Some(artifact)) => {
            counter!(METRIC_HIT_TOTAL).increment(1);
            debug!(cache = "page", outcome = "hit", key = %key, "serving cached page");
            return cache.responder.serve(request.headers(), &artifact);
        }
        Ok(None) => {}
        Err(err) => {
            warn!(key = %key, error = %err, "page cache read failed; treating as miss");
        }
    }

    counter!(METRIC_MISS_TOTAL).increment(1);
    debug!(cache = "page", outcome = "miss", key = %key, "rendering page");
    let generation = cache.store.generation();

    let (parts, body) = next.run(request).await.into_parts();
    if let Err(reason) = policy::qualify_response(&parts) {
        debug!(cache = "page", key = %key, reason, "response not cacheable");
        return Response::from_parts(parts, body);
    }

    capture_response(
        parts,
        body,
        key,
        cache.store.clone(),
        cache.config.max_body_bytes,
        generation,
    )
}
