//! Editor sessions and the principal resolver the page cache consults.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::cache::{Principal, PrincipalResolver};

const TOKEN_PREFIX: &str = "ps";
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session user must not be empty")]
    EmptyUser,
    #[error("invalid session token")]
    Invalid,
}

#[derive(Debug, Clone)]
struct SessionRecord {
    user: String,
    hashed_secret: Vec<u8>,
    created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct SessionIssued {
    pub user: String,
    pub token: String,
    pub created_at: OffsetDateTime,
}

/// Sessions keyed by token prefix; only a hash of the secret is kept.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, SessionRecord>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, user: &str) -> Result<SessionIssued, SessionError> {
        let user = user.trim();
        if user.is_empty() {
            return Err(SessionError::EmptyUser);
        }

        let prefix = Uuid::new_v4().simple().to_string()[..12].to_string();
        let secret = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let token = format!("{TOKEN_PREFIX}_{prefix}_{secret}");
        let created_at = OffsetDateTime::now_utc();

        self.sessions.insert(
            prefix,
            SessionRecord {
                user: user.to_string(),
                hashed_secret: hash_secret(&secret),
                created_at,
            },
        );

        Ok(SessionIssued {
            user: user.to_string(),
            token,
            created_at,
        })
    }

    /// Resolve a token to its user name.
    pub fn authenticate(&self, token: &str) -> Result<String, SessionError> {
        let (prefix, secret) = parse_token(token).ok_or(SessionError::Invalid)?;
        let record = self.sessions.get(prefix).ok_or(SessionError::Invalid)?;

        if record.hashed_secret.ct_eq(&hash_secret(secret)).unwrap_u8() == 0 {
            return Err(SessionError::Invalid);
        }
        debug!(
            user = %record.user,
            age_seconds = (OffsetDateTime::now_utc() - record.created_at).whole_seconds(),
            "Session authenticated"
        );
        Ok(record.user.clone())
    }

    pub fn revoke(&self, token: &str) -> Result<(), SessionError> {
        // Prove possession before removing.
        self.authenticate(token)?;
        let (prefix, _) = parse_token(token).ok_or(SessionError::Invalid)?;
        self.sessions.remove(prefix);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn parse_token(token: &str) -> Option<(&str, &str)> {
    let mut parts = token.splitn(3, '_');
    if parts.next()? != TOKEN_PREFIX {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if prefix.is_empty() || secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some((prefix, secret))
}

/// Resolves principals from the session cookie or a bearer token.
///
/// Presented credentials that do not resolve yield [`Principal::Unresolved`]
/// rather than anonymous, so a stale or forged session never reads a page
/// rendered for everyone.
pub struct SessionPrincipalResolver {
    sessions: Arc<SessionStore>,
    cookie_name: String,
}

impl SessionPrincipalResolver {
    pub fn new(sessions: Arc<SessionStore>, cookie_name: impl Into<String>) -> Self {
        Self {
            sessions,
            cookie_name: cookie_name.into(),
        }
    }

    fn credential<'a>(&self, headers: &'a HeaderMap) -> Credential<'a> {
        if let Some(value) = headers.get(header::AUTHORIZATION) {
            return match value.to_str().ok().and_then(|raw| raw.strip_prefix("Bearer ")) {
                Some(token) => Credential::Token(token),
                None => Credential::Malformed,
            };
        }

        for value in headers.get_all(header::COOKIE) {
            let Ok(raw) = value.to_str() else {
                return Credential::Malformed;
            };
            for pair in raw.split(';') {
                let Some((name, token)) = pair.trim().split_once('=') else {
                    continue;
                };
                if name == self.cookie_name {
                    return Credential::Token(token.trim_matches('"'));
                }
            }
        }

        Credential::Absent
    }
}

/// What a request presents as proof of a session.
#[derive(Debug, PartialEq, Eq)]
enum Credential<'a> {
    Absent,
    Token(&'a str),
    /// Present but unreadable, e.g. a non-Bearer scheme or non-UTF-8 bytes.
    Malformed,
}

#[async_trait]
impl PrincipalResolver for SessionPrincipalResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Principal {
        match self.credential(headers) {
            Credential::Absent => Principal::Anonymous,
            Credential::Token(token) => match self.sessions.authenticate(token) {
                Ok(user) => Principal::Authenticated(user),
                Err(_) => Principal::Unresolved,
            },
            Credential::Malformed => Principal::Unresolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn resolver() -> (Arc<SessionStore>, SessionPrincipalResolver) {
        let sessions = Arc::new(SessionStore::new());
        let resolver = SessionPrincipalResolver::new(sessions.clone(), "PAGE_SESSION");
        (sessions, resolver)
    }

    #[test]
    fn issued_tokens_authenticate_until_revoked() {
        let store = SessionStore::new();
        let issued = store.issue("ada").expect("issued");

        assert_eq!(store.authenticate(&issued.token).expect("valid"), "ada");
        store.revoke(&issued.token).expect("revoked");
        assert!(store.authenticate(&issued.token).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn tampered_secret_is_rejected() {
        let store = SessionStore::new();
        let issued = store.issue("ada").expect("issued");
        let mut forged = issued.token.clone();
        forged.pop();
        forged.push('x');

        assert!(store.authenticate(&forged).is_err());
        assert!(store.revoke(&forged).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn empty_user_is_rejected() {
        assert!(matches!(
            SessionStore::new().issue("  "),
            Err(SessionError::EmptyUser)
        ));
    }

    #[test]
    fn credentials_are_classified() {
        let (_, resolver) = resolver();

        assert_eq!(resolver.credential(&HeaderMap::new()), Credential::Absent);

        let mut bearer = HeaderMap::new();
        bearer.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(resolver.credential(&bearer), Credential::Token("abc"));

        let mut basic = HeaderMap::new();
        basic.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic YWRhOg=="));
        assert_eq!(resolver.credential(&basic), Credential::Malformed);

        let mut binary = HeaderMap::new();
        binary.insert(
            header::COOKIE,
            HeaderValue::from_bytes(b"PAGE_SESSION=\xff").expect("header"),
        );
        assert_eq!(resolver.credential(&binary), Credential::Malformed);
    }

    #[tokio::test]
    async fn no_credentials_is_anonymous() {
        let (_, resolver) = resolver();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));

        assert_eq!(resolver.resolve(&headers).await, Principal::Anonymous);
    }

    #[tokio::test]
    async fn session_cookie_resolves_user() {
        let (sessions, resolver) = resolver();
        let issued = sessions.issue("ada").expect("issued");
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; PAGE_SESSION={}", issued.token))
                .expect("header"),
        );

        assert_eq!(
            resolver.resolve(&headers).await,
            Principal::Authenticated("ada".into())
        );
    }

    #[tokio::test]
    async fn bearer_token_resolves_user() {
        let (sessions, resolver) = resolver();
        let issued = sessions.issue("ada").expect("issued");
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", issued.token)).expect("header"),
        );

        assert_eq!(
            resolver.resolve(&headers).await,
            Principal::Authenticated("ada".into())
        );
    }

    #[tokio::test]
    async fn unknown_or_malformed_credentials_are_unresolved() {
        let (_, resolver) = resolver();

        let mut stale = HeaderMap::new();
        stale.insert(header::COOKIE, HeaderValue::from_static("PAGE_SESSION=expired"));
        assert_eq!(resolver.resolve(&stale).await, Principal::Unresolved);

        let mut basic = HeaderMap::new();
        basic.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic YWRhOg=="));
        assert_eq!(resolver.resolve(&basic).await, Principal::Unresolved);

        let mut binary = HeaderMap::new();
        binary.insert(
            header::COOKIE,
            HeaderValue::from_bytes(b"PAGE_SESSION=\xff").expect("header"),
        );
        assert_eq!(resolver.resolve(&binary).await, Principal::Unresolved);
    }
}
