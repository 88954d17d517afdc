//! In-memory content store standing in for the rendering pipeline's data.
//!
//! Every successful write publishes a content event so cached pages that may
//! embed the changed content are dropped.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

use crate::cache::{ContentNotifier, EventKind};

const SOURCE: &str = "application::content::ContentService";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("page `{0}` not found")]
    NotFound(String),
    #[error("`{0}` is not a valid slug")]
    InvalidSlug(String),
    #[error("page title must not be empty")]
    EmptyTitle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub slug: String,
    pub title: String,
    pub body: String,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageInput {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Clone)]
pub struct ContentService {
    pages: Arc<DashMap<String, PageRecord>>,
    notifier: ContentNotifier,
}

impl ContentService {
    pub fn new(notifier: ContentNotifier) -> Self {
        Self {
            pages: Arc::new(DashMap::new()),
            notifier,
        }
    }

    /// A service holding the starter pages. Seeding publishes no events.
    pub fn seeded(notifier: ContentNotifier) -> Self {
        let service = Self::new(notifier);
        let now = OffsetDateTime::now_utc();
        for (slug, title, body) in [
            ("index", "Home", "Welcome. Pages listed below are served from the page cache."),
            ("about", "About", "A small site rendered once and replayed from memory."),
        ] {
            service.pages.insert(
                slug.to_string(),
                PageRecord {
                    slug: slug.to_string(),
                    title: title.to_string(),
                    body: body.to_string(),
                    updated_at: now,
                },
            );
        }
        service
    }

    pub fn get(&self, slug: &str) -> Result<PageRecord, ContentError> {
        self.pages
            .get(slug)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ContentError::NotFound(slug.to_string()))
    }

    /// All pages ordered by slug.
    pub fn list(&self) -> Vec<PageRecord> {
        let mut pages: Vec<PageRecord> = self
            .pages
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        pages.sort_by(|a, b| a.slug.cmp(&b.slug));
        pages
    }

    pub fn upsert(&self, slug: &str, input: PageInput) -> Result<PageRecord, ContentError> {
        validate_slug(slug)?;
        let title = input.title.trim();
        if title.is_empty() {
            return Err(ContentError::EmptyTitle);
        }

        let record = PageRecord {
            slug: slug.to_string(),
            title: title.to_string(),
            body: input.body,
            updated_at: OffsetDateTime::now_utc(),
        };
        self.pages.insert(slug.to_string(), record.clone());

        info!(target = SOURCE, slug, "Page saved");
        self.notifier.publish(EventKind::PageUpserted {
            slug: slug.to_string(),
        });
        Ok(record)
    }

    pub fn delete(&self, slug: &str) -> Result<(), ContentError> {
        if self.pages.remove(slug).is_none() {
            return Err(ContentError::NotFound(slug.to_string()));
        }

        info!(target = SOURCE, slug, "Page deleted");
        self.notifier.publish(EventKind::PageDeleted {
            slug: slug.to_string(),
        });
        Ok(())
    }
}

fn validate_slug(slug: &str) -> Result<(), ContentError> {
    if slug.is_empty() || slug::slugify(slug) != slug {
        return Err(ContentError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ContentEvent;

    fn input(title: &str) -> PageInput {
        PageInput {
            title: title.to_string(),
            body: "Body".to_string(),
        }
    }

    #[test]
    fn seeded_service_has_starter_pages() {
        let service = ContentService::seeded(ContentNotifier::default());
        let slugs: Vec<String> = service.list().into_iter().map(|p| p.slug).collect();
        assert_eq!(slugs, vec!["about".to_string(), "index".to_string()]);
    }

    #[tokio::test]
    async fn upsert_publishes_event() {
        let notifier = ContentNotifier::default();
        let mut events = notifier.subscribe();
        let service = ContentService::new(notifier);

        let record = service.upsert("hello-world", input(" Hello ")).expect("saved");
        assert_eq!(record.title, "Hello");

        let event: ContentEvent = events.recv().await.expect("event");
        assert_eq!(
            event.kind,
            EventKind::PageUpserted {
                slug: "hello-world".into()
            }
        );
    }

    #[test]
    fn invalid_input_is_rejected() {
        let service = ContentService::new(ContentNotifier::default());

        assert!(matches!(
            service.upsert("Not A Slug", input("x")),
            Err(ContentError::InvalidSlug(_))
        ));
        assert!(matches!(
            service.upsert("ok", input("   ")),
            Err(ContentError::EmptyTitle)
        ));
    }

    #[tokio::test]
    async fn delete_publishes_event_and_reports_missing() {
        let notifier = ContentNotifier::default();
        let service = ContentService::seeded(notifier.clone());
        let mut events = notifier.subscribe();

        service.delete("about").expect("deleted");
        assert!(matches!(service.get("about"), Err(ContentError::NotFound(_))));
        assert!(matches!(
            service.delete("about"),
            Err(ContentError::NotFound(_))
        ));

        let event = events.recv().await.expect("event");
        assert_eq!(
            event.kind,
            EventKind::PageDeleted {
                slug: "about".into()
            }
        );
    }
}
