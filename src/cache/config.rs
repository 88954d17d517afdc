//! Page cache configuration.
//!
//! Resolved from the `[cache]` section of `page-cache.toml` plus the public
//! scheme of the server section (needed to build absolute cache keys).

use std::num::NonZeroUsize;

use serde::Deserialize;

const DEFAULT_MAX_ENTRIES: usize = 1000;
const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;
const DEFAULT_BROWSER_MAX_AGE_SECS: u64 = 3;
const DEFAULT_SHARED_MAX_AGE_SECS: u64 = 120;
const DEFAULT_SCHEME: &str = "http";

/// Runtime configuration of the page cache layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Master switch; when off the filter passes every request through.
    pub enabled: bool,
    /// Upper bound on stored artifacts in the in-memory store.
    pub max_entries: usize,
    /// Captures whose body grows past this many bytes are abandoned.
    pub max_body_bytes: usize,
    /// `max-age` advertised on responses served from cache.
    pub browser_max_age_seconds: u64,
    /// `s-maxage` advertised on responses served from cache.
    pub shared_max_age_seconds: u64,
    /// Scheme used for keys when the request target is in origin form.
    pub default_scheme: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: DEFAULT_MAX_ENTRIES,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            browser_max_age_seconds: DEFAULT_BROWSER_MAX_AGE_SECS,
            shared_max_age_seconds: DEFAULT_SHARED_MAX_AGE_SECS,
            default_scheme: DEFAULT_SCHEME.to_string(),
        }
    }
}

impl From<&crate::config::Settings> for CacheConfig {
    fn from(settings: &crate::config::Settings) -> Self {
        let cache = &settings.cache;
        Self {
            enabled: cache.enabled,
            max_entries: cache.max_entries.get(),
            max_body_bytes: cache.max_body_bytes.get(),
            browser_max_age_seconds: cache.browser_max_age.as_secs(),
            shared_max_age_seconds: cache.shared_max_age.as_secs(),
            default_scheme: settings.server.public_scheme.clone(),
        }
    }
}

impl CacheConfig {
    /// Returns the entry bound as NonZeroUsize, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }

    /// The `Cache-Control` directive stamped on every cache-served response.
    pub fn cache_control_value(&self) -> String {
        format!(
            "max-age={}, s-maxage={}, must-revalidate",
            self.browser_max_age_seconds, self.shared_max_age_seconds
        )
    }
}
