//! Page cache
//!
//! Stores rendered HTML pages for anonymous visitors and replays them without
//! invoking the rendering pipeline:
//!
//! - **Policy**: ordered request and response predicates, failing closed
//! - **Capture**: tees the streamed body into an [`Artifact`] and publishes it
//!   once the stream completes cleanly
//! - **Responder**: replays artifacts with conditional-request handling
//! - **Sentry**: clears the whole store when content changes
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! max_entries = 1000
//! max_body_bytes = 4194304
//! browser_max_age_seconds = 3
//! shared_max_age_seconds = 120
//! ```

mod artifact;
mod capture;
mod config;
mod events;
pub mod http_date;
mod key;
mod lock;
mod middleware;
pub mod policy;
mod principal;
mod responder;
mod sentry;
mod store;

pub use artifact::{Artifact, ArtifactError};
pub use capture::CaptureBody;
pub use config::CacheConfig;
pub use events::{ContentEvent, ContentNotifier, EventKind};
pub use key::{CacheKey, CacheKeyBuilder, KeyError};
pub use middleware::{CacheState, page_cache_layer};
pub use policy::RenderedPage;
pub use principal::{Principal, PrincipalResolver};
pub use responder::{CACHED_AT_HEADER, CacheResponder};
pub use sentry::{InvalidationSentry, evict_all};
pub use store::{CacheStore, MemoryStore, SharedStore, StoreError};
