use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::application::content::PageRecord;
use crate::application::error::{ErrorReport, HttpError};
use crate::cache::RenderedPage;

const SITE_TITLE: &str = "Page Cache";

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Render a content page and mark it as a fully rendered page.
///
/// Only responses built here carry [`RenderedPage`]; error pages and API
/// output never do.
pub fn render_page_response<T: Template>(template: T) -> Response {
    match render_template(template) {
        Ok(html) => {
            let mut response = (StatusCode::OK, html).into_response();
            response.extensions_mut().insert(RenderedPage);
            response
        }
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let view = LayoutContext::new(chrome, ErrorPageView::not_found());
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

pub struct NavigationLinkView {
    pub href: String,
    pub label: String,
}

pub struct LayoutChrome {
    pub site_title: String,
    pub navigation: Vec<NavigationLinkView>,
    pub rendered_at: String,
}

impl LayoutChrome {
    /// Chrome with one navigation link per page, index excluded.
    pub fn for_pages(pages: &[PageRecord]) -> Self {
        let navigation = pages
            .iter()
            .filter(|page| page.slug != "index")
            .map(|page| NavigationLinkView {
                href: format!("/{}", page.slug),
                label: page.title.clone(),
            })
            .collect();

        Self {
            site_title: SITE_TITLE.to_string(),
            navigation,
            rendered_at: format_timestamp(OffsetDateTime::now_utc()),
        }
    }
}

pub struct LayoutContext<T> {
    pub chrome: LayoutChrome,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self { chrome, content }
    }
}

pub struct PageLinkView {
    pub slug: String,
    pub title: String,
}

pub struct IndexView {
    pub title: String,
    pub intro: String,
    pub pages: Vec<PageLinkView>,
}

impl IndexView {
    pub fn new(index: Option<&PageRecord>, pages: &[PageRecord]) -> Self {
        Self {
            title: index.map_or_else(|| SITE_TITLE.to_string(), |page| page.title.clone()),
            intro: index.map(|page| page.body.clone()).unwrap_or_default(),
            pages: pages
                .iter()
                .filter(|page| page.slug != "index")
                .map(|page| PageLinkView {
                    slug: page.slug.clone(),
                    title: page.title.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<IndexView>,
}

pub struct PageView {
    pub title: String,
    pub paragraphs: Vec<String>,
    pub updated_at: String,
}

impl From<&PageRecord> for PageView {
    fn from(record: &PageRecord) -> Self {
        Self {
            title: record.title.clone(),
            paragraphs: record
                .body
                .split("\n\n")
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
            updated_at: format_timestamp(record.updated_at),
        }
    }
}

#[derive(Template)]
#[template(path = "page.html")]
pub struct PageTemplate {
    pub view: LayoutContext<PageView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

pub fn format_timestamp(instant: OffsetDateTime) -> String {
    instant
        .format(&Rfc3339)
        .unwrap_or_else(|_| instant.unix_timestamp().to_string())
}
