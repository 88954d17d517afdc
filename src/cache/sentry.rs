//! Whole-cache invalidation.
//!
//! The relationship between a content change and the rendered URLs that
//! embed it is not tracked, so every trigger clears the entire store.

use metrics::counter;
use tokio::{
    sync::broadcast::{Receiver, error::RecvError},
    task::JoinHandle,
};
use tracing::{info, warn};

use super::events::ContentEvent;
use super::store::{SharedStore, StoreError};

const METRIC_CLEAR_TOTAL: &str = "page_cache_clear_total";

/// Clear the store and record why.
pub fn evict_all(store: &SharedStore, reason: &'static str) -> Result<(), StoreError> {
    let dropped = store.len();
    store.clear()?;
    counter!(METRIC_CLEAR_TOTAL, "reason" => reason).increment(1);
    info!(reason, dropped, "Cleared page cache");
    Ok(())
}

/// Listens for content changes and clears the page cache.
pub struct InvalidationSentry {
    store: SharedStore,
}

impl InvalidationSentry {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Run until the notifier is dropped.
    pub fn spawn(self, mut events: Receiver<ContentEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        info!(
                            event_id = %event.id,
                            kind = event.kind.as_str(),
                            "Content changed"
                        );
                        self.clear("content_changed");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Missed events still mean content changed.
                        warn!(skipped, "Content event receiver lagged");
                        self.clear("content_changed");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn clear(&self, reason: &'static str) {
        if let Err(err) = evict_all(&self.store, reason) {
            warn!(error = %err, "Failed to clear page cache");
        }
    }
}
