//! Cache key derivation.
//!
//! A key is the request's absolute URI in ASCII-normalized form. Requests
//! arriving in origin form (`GET /about`) are made absolute with the `Host`
//! header and the configured public scheme.

use std::fmt;

use axum::http::{Request, header, uri::Authority};
use thiserror::Error;
use url::Url;

/// Normalized absolute URI identifying one cached page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("request carries no authority and no Host header")]
    MissingAuthority,
    #[error("invalid Host header")]
    InvalidHost,
    #[error("request URI cannot be normalized: {0}")]
    Unparseable(#[from] url::ParseError),
    #[error("request URI is not hierarchical")]
    NotHierarchical,
}

/// Derives [`CacheKey`]s from requests. Pure; never touches the store.
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    default_scheme: String,
}

impl CacheKeyBuilder {
    pub fn new(default_scheme: impl Into<String>) -> Self {
        Self {
            default_scheme: default_scheme.into(),
        }
    }

    pub fn build<B>(&self, request: &Request<B>) -> Result<CacheKey, KeyError> {
        let uri = request.uri();
        let scheme = uri.scheme_str().unwrap_or(&self.default_scheme);

        let authority = match uri.authority() {
            Some(authority) => authority.clone(),
            None => request
                .headers()
                .get(header::HOST)
                .ok_or(KeyError::MissingAuthority)?
                .to_str()
                .map_err(|_| KeyError::InvalidHost)?
                .parse::<Authority>()
                .map_err(|_| KeyError::InvalidHost)?,
        };

        let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
        let absolute = format!("{scheme}://{}{path_and_query}", host_port(&authority));
        let mut url = Url::parse(&absolute)?;
        if url.cannot_be_a_base() {
            return Err(KeyError::NotHierarchical);
        }
        url.set_fragment(None);

        Ok(CacheKey(url.into()))
    }
}

// Drops any userinfo so credentials never end up in a key.
fn host_port(authority: &Authority) -> &str {
    let raw = authority.as_str();
    raw.rsplit_once('@').map_or(raw, |(_, host)| host)
}
