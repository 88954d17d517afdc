use std::sync::Arc;

use crate::application::{content::ContentService, session::SessionStore};
use crate::cache::SharedStore;

#[derive(Clone)]
pub struct AdminState {
    pub content: ContentService,
    pub sessions: Arc<SessionStore>,
    pub session_cookie: String,
    /// Absent when the page cache is disabled.
    pub cache: Option<SharedStore>,
}
