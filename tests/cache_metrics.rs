use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use metrics_util::debugging::DebuggingRecorder;
use page_cache::{
    cache::{
        CacheConfig, CacheState, MemoryStore, Principal, PrincipalResolver, RenderedPage,
        evict_all, page_cache_layer,
    },
    infra::telemetry,
};
use serial_test::serial;
use tower::ServiceExt;

struct Everyone;

#[async_trait]
impl PrincipalResolver for Everyone {
    async fn resolve(&self, _headers: &HeaderMap) -> Principal {
        Principal::Anonymous
    }
}

#[tokio::test]
#[serial]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let config = CacheConfig {
        max_entries: 1,
        ..Default::default()
    };
    let store = MemoryStore::shared(&config);
    let cache_state = CacheState::new(config, store.clone(), Arc::new(Everyone));

    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/{slug}",
            get(move || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let mut response = Html("<p>page</p>").into_response();
                    response.extensions_mut().insert(RenderedPage);
                    response
                }
            }),
        )
        .layer(middleware::from_fn_with_state(cache_state, page_cache_layer));

    // miss + store, hit, miss + store + evict, skip
    for (uri, cache_control) in [
        ("/one", None),
        ("/one", None),
        ("/two", None),
        ("/two", Some("no-store")),
    ] {
        let mut request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::HOST, "example.com");
        if let Some(value) = cache_control {
            request = request.header(header::CACHE_CONTROL, value);
        }
        let response: Response = app
            .clone()
            .oneshot(request.body(Body::empty()).expect("request should build"))
            .await
            .expect("router should respond");
        assert_eq!(response.status(), StatusCode::OK);
        to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should collect");
    }

    let request = Request::builder()
        .uri("/two")
        .header(header::HOST, "example.com")
        .header(header::IF_MODIFIED_SINCE, "Fri, 01 Jan 2100 00:00:00 GMT")
        .body(Body::empty())
        .expect("request should build");
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

    evict_all(&store, "test").expect("clear should succeed");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "page_cache_hit_total",
        "page_cache_miss_total",
        "page_cache_skip_total",
        "page_cache_store_total",
        "page_cache_evict_total",
        "page_cache_not_modified_total",
        "page_cache_clear_total",
        "page_cache_entries",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
