//! Serves stored artifacts in place of the rendering pipeline.

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::stream;
use metrics::counter;

use super::artifact::Artifact;
use super::config::CacheConfig;
use super::http_date;

/// Diagnostic header naming the instant the artifact was captured.
pub const CACHED_AT_HEADER: &str = "x-page-cache-at";

const METRIC_NOT_MODIFIED_TOTAL: &str = "page_cache_not_modified_total";

#[derive(Debug, Clone)]
pub struct CacheResponder {
    cache_control: HeaderValue,
}

impl CacheResponder {
    pub fn new(config: &CacheConfig) -> Self {
        let cache_control = HeaderValue::from_str(&config.cache_control_value())
            .unwrap_or_else(|_| HeaderValue::from_static("no-cache"));
        Self { cache_control }
    }

    /// Build the response for a cache hit.
    ///
    /// A request whose `If-Modified-Since` is not older than the artifact gets
    /// an empty `304 Not Modified`. Anything else gets the full snapshot.
    pub fn serve(&self, request_headers: &HeaderMap, artifact: &Artifact) -> Response {
        let last_modified = http_date::to_header_value(artifact.timestamp());

        if is_unmodified_since(request_headers, artifact) {
            counter!(METRIC_NOT_MODIFIED_TOTAL).increment(1);
            let mut response = StatusCode::NOT_MODIFIED.into_response();
            let headers = response.headers_mut();
            headers.insert(header::CACHE_CONTROL, self.cache_control.clone());
            if let Some(value) = last_modified {
                headers.insert(header::LAST_MODIFIED, value);
            }
            return response;
        }

        let chunks: Vec<Result<_, std::convert::Infallible>> =
            artifact.chunks().iter().cloned().map(Ok).collect();
        let mut response = Response::new(Body::from_stream(stream::iter(chunks)));
        *response.status_mut() = artifact.status();

        let headers = response.headers_mut();
        if let Some(value) = last_modified.clone() {
            headers.insert(header::LAST_MODIFIED, value);
        }
        for name in artifact.headers().keys() {
            if headers.contains_key(name) {
                continue;
            }
            for value in artifact.headers().get_all(name) {
                headers.append(name.clone(), value.clone());
            }
        }
        headers.insert(header::CACHE_CONTROL, self.cache_control.clone());
        if let Some(value) = last_modified {
            headers.insert(CACHED_AT_HEADER, value);
        }

        response
    }
}

fn is_unmodified_since(request_headers: &HeaderMap, artifact: &Artifact) -> bool {
    let Some(since) = request_headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|value| value.to_str().ok())
        .and_then(http_date::parse)
    else {
        return false;
    };
    // HTTP-dates carry whole seconds only.
    artifact.timestamp().unix_timestamp() <= since.unix_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use time::{Duration, macros::datetime};

    fn artifact() -> Artifact {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        headers.append(header::VARY, HeaderValue::from_static("Accept"));
        headers.append(header::VARY, HeaderValue::from_static("Accept-Language"));
        Artifact::new(
            StatusCode::OK,
            &headers,
            vec![Bytes::from_static(b"<html>"), Bytes::from_static(b"A</html>")],
            datetime!(2024-05-01 12:00:00.400 UTC),
        )
        .expect("storable")
    }

    fn responder() -> CacheResponder {
        CacheResponder::new(&CacheConfig::default())
    }

    #[tokio::test]
    async fn full_response_replays_snapshot() {
        let response = responder().serve(&HeaderMap::new(), &artifact());

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/html");
        assert_eq!(headers.get_all(header::VARY).iter().count(), 2);
        assert_eq!(
            headers[header::CACHE_CONTROL],
            "max-age=3, s-maxage=120, must-revalidate"
        );
        assert_eq!(headers[CACHED_AT_HEADER], "Wed, 01 May 2024 12:00:00 GMT");
        assert_eq!(headers[header::LAST_MODIFIED], "Wed, 01 May 2024 12:00:00 GMT");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        assert_eq!(body, Bytes::from_static(b"<html>A</html>"));
    }

    #[tokio::test]
    async fn matching_validator_yields_not_modified() {
        let mut request = HeaderMap::new();
        request.insert(
            header::IF_MODIFIED_SINCE,
            HeaderValue::from_static("Wed, 01 May 2024 12:00:00 GMT"),
        );

        let response = responder().serve(&request, &artifact());

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert!(response.headers().contains_key(header::CACHE_CONTROL));
        assert!(!response.headers().contains_key(header::CONTENT_TYPE));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        assert!(body.is_empty());
    }

    #[test]
    fn older_validator_yields_full_body() {
        let older = datetime!(2024-05-01 12:00:00 UTC) - Duration::seconds(1);
        let mut request = HeaderMap::new();
        request.insert(
            header::IF_MODIFIED_SINCE,
            http_date::to_header_value(older).expect("formattable"),
        );

        let response = responder().serve(&request, &artifact());
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn malformed_validator_is_ignored() {
        let mut request = HeaderMap::new();
        request.insert(header::IF_MODIFIED_SINCE, HeaderValue::from_static("yesterday"));

        let response = responder().serve(&request, &artifact());
        assert_eq!(response.status(), StatusCode::OK);
    }
}
