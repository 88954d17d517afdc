//! Content-changed notifications.
//!
//! The content service publishes an event after every successful write; the
//! invalidation sentry is the only subscriber inside this crate.

use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 64;

/// A single content change.
#[derive(Debug, Clone)]
pub struct ContentEvent {
    /// Unique identifier, for correlating log lines.
    pub id: Uuid,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl ContentEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// What changed. The cache does not act on the payload; it is carried for
/// logging only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    PageUpserted { slug: String },
    PageDeleted { slug: String },
    /// Site-wide data (navigation, settings) changed.
    SiteUpdated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PageUpserted { .. } => "page_upserted",
            EventKind::PageDeleted { .. } => "page_deleted",
            EventKind::SiteUpdated => "site_updated",
        }
    }
}

/// Fan-out channel of [`ContentEvent`]s.
#[derive(Debug, Clone)]
pub struct ContentNotifier {
    sender: broadcast::Sender<ContentEvent>,
}

impl Default for ContentNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ContentNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Having no subscriber is not an error.
    pub fn publish(&self, kind: EventKind) {
        let event = ContentEvent::new(kind);
        let id = event.id;
        let kind = event.kind.as_str();
        match self.sender.send(event) {
            Ok(receivers) => debug!(%id, kind, receivers, "Published content event"),
            Err(_) => debug!(%id, kind, "Content event has no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ContentEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let notifier = ContentNotifier::default();
        let mut receiver = notifier.subscribe();

        notifier.publish(EventKind::PageUpserted {
            slug: "about".into(),
        });

        let event = receiver.recv().await.expect("event");
        assert_eq!(
            event.kind,
            EventKind::PageUpserted {
                slug: "about".into()
            }
        );
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let notifier = ContentNotifier::new(4);
        notifier.publish(EventKind::SiteUpdated);
    }
}
