use serde::{Deserialize, Serialize};

use crate::application::{content::PageRecord, session::SessionIssued};
use crate::presentation::views::format_timestamp;

#[derive(Debug, Deserialize, Serialize)]
pub struct PageResponse {
    pub slug: String,
    pub title: String,
    pub body: String,
    pub updated_at: String,
}

impl From<&PageRecord> for PageResponse {
    fn from(record: &PageRecord) -> Self {
        Self {
            slug: record.slug.clone(),
            title: record.title.clone(),
            body: record.body.clone(),
            updated_at: format_timestamp(record.updated_at),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SessionRequest {
    pub user: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SessionResponse {
    pub user: String,
    pub token: String,
    pub cookie_name: String,
    pub created_at: String,
}

impl SessionResponse {
    pub fn new(issued: SessionIssued, cookie_name: &str) -> Self {
        Self {
            user: issued.user,
            token: issued.token,
            cookie_name: cookie_name.to_string(),
            created_at: format_timestamp(issued.created_at),
        }
    }
}
