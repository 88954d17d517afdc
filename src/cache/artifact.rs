//! The stored snapshot of a cacheable response.

use axum::http::{HeaderMap, HeaderName, StatusCode, header};
use bytes::{Bytes, BytesMut};
use thiserror::Error;
use time::OffsetDateTime;

/// Headers that describe a single connection and must not be replayed.
static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("refusing to store non-success status {0}")]
    NonSuccessStatus(StatusCode),
}

/// Immutable snapshot of a rendered response: status, filtered headers,
/// body chunks in production order and the instant it was captured.
#[derive(Debug, Clone)]
pub struct Artifact {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<Bytes>,
    timestamp: OffsetDateTime,
}

impl Artifact {
    /// Build an artifact from a finished response.
    ///
    /// `Cache-Control` and hop-by-hop headers are dropped; the cache-control
    /// directive is recomputed whenever the artifact is served.
    pub fn new(
        status: StatusCode,
        headers: &HeaderMap,
        body: Vec<Bytes>,
        timestamp: OffsetDateTime,
    ) -> Result<Self, ArtifactError> {
        if !status.is_success() {
            return Err(ArtifactError::NonSuccessStatus(status));
        }

        Ok(Self {
            status,
            headers: storable_headers(headers),
            body,
            timestamp,
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn chunks(&self) -> &[Bytes] {
        &self.body
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    /// Total body length across all chunks.
    pub fn body_len(&self) -> usize {
        self.body.iter().map(Bytes::len).sum()
    }

    /// Concatenate the chunks into one contiguous buffer.
    pub fn body_bytes(&self) -> Bytes {
        let mut joined = BytesMut::with_capacity(self.body_len());
        for chunk in &self.body {
            joined.extend_from_slice(chunk);
        }
        joined.freeze()
    }
}

fn storable_headers(headers: &HeaderMap) -> HeaderMap {
    // Connection may nominate further per-connection headers.
    let nominated: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    let mut stored = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if name == header::CACHE_CONTROL
            || HOP_BY_HOP.contains(name)
            || nominated.iter().any(|n| n.as_str() == name.as_str())
        {
            continue;
        }
        stored.append(name.clone(), value.clone());
    }
    stored
}
