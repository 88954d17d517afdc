//! Response capture.
//!
//! [`CaptureBody`] sits between the rendering pipeline and the client. Every
//! data frame is forwarded untouched while an owned copy is appended to the
//! pending artifact. The artifact is published once, and only once the inner
//! body has reported a clean end of stream. Errors, oversized bodies and early
//! drops (client went away) discard the copy.

use std::{
    pin::Pin,
    task::{Context, Poll, ready},
};

use axum::{
    body::Body,
    http::{HeaderMap, StatusCode, response},
    response::Response,
};
use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use metrics::counter;
use pin_project::{pin_project, pinned_drop};
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::artifact::Artifact;
use super::key::CacheKey;
use super::store::SharedStore;

const METRIC_STORE_TOTAL: &str = "page_cache_store_total";
const METRIC_STORE_ERROR_TOTAL: &str = "page_cache_store_error_total";

/// Buffered copy of a response that has not finished streaming yet.
pub(crate) struct PendingArtifact {
    key: CacheKey,
    status: StatusCode,
    headers: HeaderMap,
    captured_at: OffsetDateTime,
    chunks: Vec<Bytes>,
    buffered: usize,
    limit: usize,
    store: SharedStore,
    generation: u64,
}

impl PendingArtifact {
    pub(crate) fn new(
        key: CacheKey,
        parts: &response::Parts,
        store: SharedStore,
        limit: usize,
        generation: u64,
    ) -> Self {
        Self {
            key,
            status: parts.status,
            headers: parts.headers.clone(),
            captured_at: OffsetDateTime::now_utc(),
            chunks: Vec::new(),
            buffered: 0,
            limit,
            store,
            generation,
        }
    }

    /// Copy a chunk into the buffer. Returns `false` once the limit is passed.
    fn push(&mut self, chunk: &Bytes) -> bool {
        self.buffered = self.buffered.saturating_add(chunk.len());
        if self.buffered > self.limit {
            return false;
        }
        // The pipeline may reuse its buffer once the frame is forwarded.
        self.chunks.push(Bytes::copy_from_slice(chunk));
        true
    }

    fn publish(self) {
        let Self {
            key,
            status,
            headers,
            captured_at,
            chunks,
            buffered,
            store,
            generation,
            ..
        } = self;

        let artifact = match Artifact::new(status, &headers, chunks, captured_at) {
            Ok(artifact) => artifact,
            Err(err) => {
                debug!(key = %key, error = %err, "Captured response is not storable");
                return;
            }
        };

        match store.put_if_generation(key.clone(), artifact, generation) {
            Ok(true) => {
                counter!(METRIC_STORE_TOTAL).increment(1);
                debug!(key = %key, bytes = buffered, "Stored page artifact");
            }
            Ok(false) => {
                debug!(key = %key, "Dropped capture rendered before a cache clear");
            }
            Err(err) => {
                counter!(METRIC_STORE_ERROR_TOTAL).increment(1);
                warn!(key = %key, error = %err, "Failed to store page artifact");
            }
        }
    }
}

/// Body wrapper that tees data frames into a [`PendingArtifact`].
#[pin_project(PinnedDrop)]
pub struct CaptureBody<B> {
    #[pin]
    inner: B,
    pending: Option<PendingArtifact>,
}

impl<B> CaptureBody<B> {
    pub(crate) fn new(inner: B, pending: PendingArtifact) -> Self {
        Self {
            inner,
            pending: Some(pending),
        }
    }
}

impl<B> HttpBody for CaptureBody<B>
where
    B: HttpBody<Data = Bytes>,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();
        let polled = ready!(this.inner.as_mut().poll_frame(cx));

        match &polled {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref()
                    && let Some(pending) = this.pending.as_mut()
                    && !pending.push(data)
                {
                    if let Some(abandoned) = this.pending.take() {
                        debug!(
                            key = %abandoned.key,
                            limit = abandoned.limit,
                            "Abandoned capture of oversized page body"
                        );
                    }
                }
                if this.inner.is_end_stream()
                    && let Some(pending) = this.pending.take()
                {
                    pending.publish();
                }
            }
            Some(Err(_)) => {
                if let Some(abandoned) = this.pending.take() {
                    debug!(key = %abandoned.key, "Discarded capture after body error");
                }
            }
            None => {
                if let Some(pending) = this.pending.take() {
                    pending.publish();
                }
            }
        }

        Poll::Ready(polled)
    }

    fn is_end_stream(&self) -> bool {
        // Keep the server polling until the capture has been settled.
        self.pending.is_none() && self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[pinned_drop]
impl<B> PinnedDrop for CaptureBody<B> {
    fn drop(self: Pin<&mut Self>) {
        if let Some(abandoned) = self.project().pending.take() {
            debug!(key = %abandoned.key, "Discarded capture of unfinished page body");
        }
    }
}

/// Rebuild a qualified response with its body routed through a capture.
///
/// `generation` is the store generation read before the pipeline ran; a clear
/// after that point makes the capture unpublishable. Bodies that declare more
/// bytes than `limit` are passed through as-is.
pub(crate) fn capture_response(
    parts: response::Parts,
    body: Body,
    key: CacheKey,
    store: SharedStore,
    limit: usize,
    generation: u64,
) -> Response {
    if body.size_hint().lower() > limit as u64 {
        debug!(key = %key, limit, "Page body exceeds capture limit");
        return Response::from_parts(parts, body);
    }

    let pending = PendingArtifact::new(key, &parts, store, limit, generation);
    Response::from_parts(parts, Body::new(CaptureBody::new(body, pending)))
}

#[cfg(test)]
mod tests {
    use std::io;

    use axum::http::{HeaderValue, Request, header};
    use futures::stream;
    use http_body_util::BodyExt;

    use super::*;
    use crate::cache::config::CacheConfig;
    use crate::cache::key::CacheKeyBuilder;
    use crate::cache::store::{CacheStore, MemoryStore};

    fn key() -> CacheKey {
        let request = Request::builder()
            .uri("/about")
            .header(header::HOST, "example.com")
            .body(())
            .expect("request should build");
        CacheKeyBuilder::new("http").build(&request).expect("key")
    }

    fn html_parts() -> response::Parts {
        let mut parts = Response::new(()).into_parts().0;
        parts.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        parts
    }

    fn chunked(chunks: Vec<Result<&'static str, io::Error>>) -> Body {
        Body::from_stream(stream::iter(
            chunks
                .into_iter()
                .map(|chunk| chunk.map(|s| Bytes::from_static(s.as_bytes()))),
        ))
    }

    fn captured(body: Body, store: &SharedStore, limit: usize) -> Body {
        let generation = store.generation();
        capture_response(html_parts(), body, key(), store.clone(), limit, generation)
            .into_body()
    }

    #[tokio::test]
    async fn multi_chunk_body_is_forwarded_and_stored_in_order() {
        let store = MemoryStore::shared(&CacheConfig::default());
        let body = captured(
            chunked(vec![Ok("<html>"), Ok("A"), Ok("</html>")]),
            &store,
            1024,
        );

        let forwarded = axum::body::to_bytes(body, usize::MAX).await.expect("body");
        assert_eq!(forwarded, Bytes::from_static(b"<html>A</html>"));

        let artifact = store.get(&key()).expect("get").expect("stored");
        assert_eq!(artifact.chunks().len(), 3);
        assert_eq!(artifact.body_bytes(), forwarded);
        assert_eq!(artifact.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn single_shot_body_is_stored() {
        let store = MemoryStore::shared(&CacheConfig::default());
        let body = captured(Body::from("<html>A</html>"), &store, 1024);

        let forwarded = axum::body::to_bytes(body, usize::MAX).await.expect("body");

        let artifact = store.get(&key()).expect("get").expect("stored");
        assert_eq!(artifact.body_bytes(), forwarded);
    }

    #[tokio::test]
    async fn empty_body_is_stored() {
        let store = MemoryStore::shared(&CacheConfig::default());
        let body = captured(Body::empty(), &store, 1024);

        let forwarded = axum::body::to_bytes(body, usize::MAX).await.expect("body");
        assert!(forwarded.is_empty());

        let artifact = store.get(&key()).expect("get").expect("stored");
        assert_eq!(artifact.body_len(), 0);
    }

    #[tokio::test]
    async fn nothing_is_stored_before_the_stream_ends() {
        let store = MemoryStore::shared(&CacheConfig::default());
        let mut body = captured(chunked(vec![Ok("<html>"), Ok("</html>")]), &store, 1024);

        let first = body.frame().await.expect("frame").expect("ok");
        assert_eq!(first.into_data().expect("data"), Bytes::from_static(b"<html>"));
        assert!(store.is_empty());

        drop(body);
        assert!(store.is_empty(), "a dropped body must not publish");
    }

    #[tokio::test]
    async fn clear_during_capture_discards_it() {
        let store = MemoryStore::shared(&CacheConfig::default());
        let mut body = captured(chunked(vec![Ok("<html>"), Ok("old</html>")]), &store, 1024);

        body.frame().await.expect("frame").expect("ok");
        store.clear().expect("clear");
        while let Some(frame) = body.frame().await {
            frame.expect("ok");
        }

        assert!(store.get(&key()).expect("get").is_none());
    }

    #[tokio::test]
    async fn stream_error_discards_capture() {
        let store = MemoryStore::shared(&CacheConfig::default());
        let body = captured(
            chunked(vec![Ok("<html>"), Err(io::Error::other("render failed"))]),
            &store,
            1024,
        );

        assert!(axum::body::to_bytes(body, usize::MAX).await.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn oversized_stream_is_forwarded_but_not_stored() {
        let store = MemoryStore::shared(&CacheConfig::default());
        let body = captured(chunked(vec![Ok("12345"), Ok("67890")]), &store, 8);

        let forwarded = axum::body::to_bytes(body, usize::MAX).await.expect("body");
        assert_eq!(forwarded, Bytes::from_static(b"1234567890"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn declared_oversized_body_skips_capture() {
        let store = MemoryStore::shared(&CacheConfig::default());
        let body = captured(Body::from("1234567890"), &store, 4);

        let forwarded = axum::body::to_bytes(body, usize::MAX).await.expect("body");
        assert_eq!(forwarded.len(), 10);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn capture_keeps_stream_open_until_settled() {
        let store = MemoryStore::shared(&CacheConfig::default());
        let body = captured(Body::empty(), &store, 1024);

        assert!(!body.is_end_stream());
    }
}
