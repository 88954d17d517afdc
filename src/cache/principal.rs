//! Principal resolution contract consumed by the cache filter.

use async_trait::async_trait;
use axum::http::HeaderMap;

/// Who a request acts on behalf of, as far as caching is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    Authenticated(String),
    /// Credentials were presented but could not be resolved.
    Unresolved,
}

impl Principal {
    /// Only a positively anonymous request may use the cache.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }
}

/// Resolves the principal behind a request from its headers.
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Principal;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_anonymous_counts_as_anonymous() {
        assert!(Principal::Anonymous.is_anonymous());
        assert!(!Principal::Authenticated("ada".into()).is_anonymous());
        assert!(!Principal::Unresolved.is_anonymous());
    }
}
