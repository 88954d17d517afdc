//! Cacheability policy.
//!
//! Two ordered rule lists, each evaluated short-circuit. Request rules decide
//! whether a request may read from or write to the cache; response rules
//! decide whether a produced response may be stored. Every rule fails closed:
//! a header it cannot parse makes the rule fail.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header, response},
};
use http_body::Body as _;

/// Response extension set by the template rendering path. HTML alone does
/// not prove a response is a fully rendered page.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderedPage;

pub struct RequestRule {
    pub name: &'static str,
    pub check: fn(&Request<Body>) -> bool,
}

pub struct ResponseRule {
    pub name: &'static str,
    pub check: fn(&response::Parts) -> bool,
}

pub const REQUEST_RULES: &[RequestRule] = &[
    RequestRule {
        name: "method_is_get",
        check: method_is_get,
    },
    RequestRule {
        name: "no_request_body",
        check: carries_no_body,
    },
    RequestRule {
        name: "cache_control_allows",
        check: cache_control_allows,
    },
    RequestRule {
        name: "accepts_html",
        check: accepts_html,
    },
];

pub const RESPONSE_RULES: &[ResponseRule] = &[
    ResponseRule {
        name: "content_type_is_html",
        check: content_type_is_html,
    },
    ResponseRule {
        name: "status_is_success",
        check: status_is_success,
    },
    ResponseRule {
        name: "rendered_page",
        check: rendered_page,
    },
    ResponseRule {
        name: "sets_no_cookie",
        check: sets_no_cookie,
    },
];

/// Returns the name of the first request rule that fails.
pub fn check_request(request: &Request<Body>) -> Result<(), &'static str> {
    match REQUEST_RULES.iter().find(|rule| !(rule.check)(request)) {
        Some(rule) => Err(rule.name),
        None => Ok(()),
    }
}

/// Returns the name of the first response rule that fails.
pub fn qualify_response(parts: &response::Parts) -> Result<(), &'static str> {
    match RESPONSE_RULES.iter().find(|rule| !(rule.check)(parts)) {
        Some(rule) => Err(rule.name),
        None => Ok(()),
    }
}

const BYPASS_DIRECTIVES: [&str; 3] = ["no-cache", "no-store", "private"];

fn method_is_get(request: &Request<Body>) -> bool {
    request.method() == Method::GET
}

fn carries_no_body(request: &Request<Body>) -> bool {
    let headers = request.headers();
    if headers.contains_key(header::TRANSFER_ENCODING) {
        return false;
    }
    let declared_empty = headers.get_all(header::CONTENT_LENGTH).iter().all(|value| {
        value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            == Some(0)
    });
    declared_empty && request.body().size_hint().exact() == Some(0)
}

fn cache_control_allows(request: &Request<Body>) -> bool {
    for value in request.headers().get_all(header::CACHE_CONTROL) {
        let Some(elements) = value.to_str().ok().and_then(split_list) else {
            return false;
        };
        for element in elements {
            let Some(name) = directive_name(element) else {
                return false;
            };
            if BYPASS_DIRECTIVES
                .iter()
                .any(|bypass| name.eq_ignore_ascii_case(bypass))
            {
                return false;
            }
        }
    }
    true
}

fn accepts_html(request: &Request<Body>) -> bool {
    let mut values = request.headers().get_all(header::ACCEPT).iter().peekable();
    // No Accept header means any media type is acceptable.
    if values.peek().is_none() {
        return true;
    }

    let mut accepted = false;
    for value in values {
        let Some(ranges) = value.to_str().ok().and_then(split_list) else {
            return false;
        };
        for range in ranges {
            let Some(media) = MediaRange::parse(range) else {
                return false;
            };
            accepted |= media.quality > 0.0 && media.covers_html();
        }
    }
    accepted
}

fn content_type_is_html(parts: &response::Parts) -> bool {
    let mut values = parts.headers.get_all(header::CONTENT_TYPE).iter();
    let (Some(value), None) = (values.next(), values.next()) else {
        return false;
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("text/html"))
}

fn status_is_success(parts: &response::Parts) -> bool {
    parts.status.is_success() && parts.status != StatusCode::PARTIAL_CONTENT
}

fn rendered_page(parts: &response::Parts) -> bool {
    parts.extensions.get::<RenderedPage>().is_some()
}

fn sets_no_cookie(parts: &response::Parts) -> bool {
    !parts.headers.contains_key(header::SET_COOKIE)
}

struct MediaRange<'a> {
    kind: &'a str,
    subtype: &'a str,
    quality: f32,
}

impl<'a> MediaRange<'a> {
    fn parse(range: &'a str) -> Option<Self> {
        let mut sections = range.split(';');
        let (kind, subtype) = sections.next()?.trim().split_once('/')?;
        if !is_token(kind) || !is_token(subtype) || (kind == "*" && subtype != "*") {
            return None;
        }

        let mut quality = 1.0;
        for param in sections {
            let (name, value) = param.trim().split_once('=')?;
            let (name, value) = (name.trim(), value.trim());
            if name.eq_ignore_ascii_case("q") {
                quality = value.parse::<f32>().ok().filter(|q| (0.0..=1.0).contains(q))?;
            } else if !is_token(name) || !(is_token(value) || is_quoted(value)) {
                return None;
            }
        }

        Some(Self {
            kind,
            subtype,
            quality,
        })
    }

    fn covers_html(&self) -> bool {
        (self.kind == "*" && self.subtype == "*")
            || (self.kind.eq_ignore_ascii_case("text")
                && (self.subtype == "*" || self.subtype.eq_ignore_ascii_case("html")))
    }
}

/// Split a comma-separated header list, honoring quoted strings.
/// Returns `None` for an unterminated quote.
fn split_list(value: &str) -> Option<Vec<&str>> {
    let mut items = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (index, c) in value.char_indices() {
        if in_quotes {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quotes = false;
            }
        } else if c == '"' {
            in_quotes = true;
        } else if c == ',' {
            items.push(value[start..index].trim());
            start = index + 1;
        }
    }
    if in_quotes {
        return None;
    }
    items.push(value[start..].trim());
    items.retain(|item| !item.is_empty());
    Some(items)
}

fn directive_name(element: &str) -> Option<&str> {
    match element.split_once('=') {
        Some((name, argument)) => {
            let (name, argument) = (name.trim(), argument.trim());
            (is_token(name) && (is_token(argument) || is_quoted(argument))).then_some(name)
        }
        None => is_token(element).then_some(element),
    }
}

fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c))
}

fn is_quoted(value: &str) -> bool {
    value.len() >= 2 && value.starts_with('"') && value.ends_with('"')
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Response};

    fn request() -> axum::http::request::Builder {
        Request::builder()
            .method(Method::GET)
            .uri("/about")
            .header(header::HOST, "example.com")
    }

    fn page_parts(content_type: &str, status: StatusCode) -> response::Parts {
        let mut parts = Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, content_type)
            .body(())
            .expect("response should build")
            .into_parts()
            .0;
        parts.extensions.insert(RenderedPage);
        parts
    }

    #[test]
    fn plain_anonymous_get_is_eligible() {
        let req = request()
            .header(header::ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .body(Body::empty())
            .unwrap();
        assert_eq!(check_request(&req), Ok(()));
    }

    #[test]
    fn non_get_methods_are_rejected() {
        for method in [Method::POST, Method::HEAD, Method::PUT, Method::DELETE] {
            let req = request().method(method).body(Body::empty()).unwrap();
            assert_eq!(check_request(&req), Err("method_is_get"));
        }
    }

    #[test]
    fn request_with_body_is_rejected() {
        let req = request().body(Body::from("payload")).unwrap();
        assert_eq!(check_request(&req), Err("no_request_body"));

        let req = request()
            .header(header::CONTENT_LENGTH, "12")
            .body(Body::empty())
            .unwrap();
        assert_eq!(check_request(&req), Err("no_request_body"));

        let req = request()
            .header(header::CONTENT_LENGTH, "twelve")
            .body(Body::empty())
            .unwrap();
        assert_eq!(check_request(&req), Err("no_request_body"));

        let req = request()
            .header(header::TRANSFER_ENCODING, "chunked")
            .body(Body::empty())
            .unwrap();
        assert_eq!(check_request(&req), Err("no_request_body"));
    }

    #[test]
    fn explicit_zero_content_length_is_fine() {
        let req = request()
            .header(header::CONTENT_LENGTH, "0")
            .body(Body::empty())
            .unwrap();
        assert_eq!(check_request(&req), Ok(()));
    }

    #[test]
    fn bypass_directives_are_rejected() {
        for value in ["no-cache", "no-store", "private", "max-age=0, No-Store"] {
            let req = request()
                .header(header::CACHE_CONTROL, value)
                .body(Body::empty())
                .unwrap();
            assert_eq!(check_request(&req), Err("cache_control_allows"), "{value}");
        }
    }

    #[test]
    fn harmless_cache_control_is_allowed() {
        for value in ["max-age=0", "max-stale", "no-transform, min-fresh=10", ""] {
            let req = request()
                .header(header::CACHE_CONTROL, value)
                .body(Body::empty())
                .unwrap();
            assert_eq!(check_request(&req), Ok(()), "{value}");
        }
    }

    #[test]
    fn unparseable_cache_control_fails_closed() {
        for value in ["max-age=\"10", "=oops", "max age=1", "a=b=c"] {
            let req = request()
                .header(header::CACHE_CONTROL, value)
                .body(Body::empty())
                .unwrap();
            assert_eq!(check_request(&req), Err("cache_control_allows"), "{value}");
        }

        let req = request()
            .header(
                header::CACHE_CONTROL,
                HeaderValue::from_bytes(b"max-age=\xff").unwrap(),
            )
            .body(Body::empty())
            .unwrap();
        assert_eq!(check_request(&req), Err("cache_control_allows"));
    }

    #[test]
    fn quoted_commas_do_not_split_directives() {
        let req = request()
            .header(header::CACHE_CONTROL, "community=\"a, no-store\"")
            .body(Body::empty())
            .unwrap();
        assert_eq!(check_request(&req), Ok(()));
    }

    #[test]
    fn accept_variants() {
        let eligible = [
            "text/html",
            "*/*",
            "text/*",
            "TEXT/HTML; charset=utf-8",
            "application/json, text/html;q=0.1",
        ];
        for value in eligible {
            let req = request()
                .header(header::ACCEPT, value)
                .body(Body::empty())
                .unwrap();
            assert_eq!(check_request(&req), Ok(()), "{value}");
        }

        let rejected = [
            "application/json",
            "text/html;q=0",
            "",
            "*/html",
            "text/html;q=2",
            "text",
        ];
        for value in rejected {
            let req = request()
                .header(header::ACCEPT, value)
                .body(Body::empty())
                .unwrap();
            assert_eq!(check_request(&req), Err("accepts_html"), "{value}");
        }
    }

    #[test]
    fn missing_accept_is_treated_as_wildcard() {
        let req = request().body(Body::empty()).unwrap();
        assert_eq!(check_request(&req), Ok(()));
    }

    #[test]
    fn rules_short_circuit_in_order() {
        let req = request()
            .method(Method::POST)
            .header(header::CACHE_CONTROL, "no-store")
            .header(header::ACCEPT, "application/json")
            .body(Body::from("x"))
            .unwrap();
        assert_eq!(check_request(&req), Err("method_is_get"));
    }

    #[test]
    fn rendered_html_success_qualifies() {
        let parts = page_parts("text/html; charset=utf-8", StatusCode::OK);
        assert_eq!(qualify_response(&parts), Ok(()));
    }

    #[test]
    fn content_type_must_be_exactly_html() {
        for content_type in [
            "application/json",
            "application/xhtml+xml",
            "text/plain",
            "text/*",
        ] {
            let parts = page_parts(content_type, StatusCode::OK);
            assert_eq!(
                qualify_response(&parts),
                Err("content_type_is_html"),
                "{content_type}"
            );
        }
    }

    #[test]
    fn non_success_status_does_not_qualify() {
        for status in [
            StatusCode::NOT_FOUND,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::MOVED_PERMANENTLY,
            StatusCode::PARTIAL_CONTENT,
        ] {
            let parts = page_parts("text/html", status);
            assert_eq!(qualify_response(&parts), Err("status_is_success"), "{status}");
        }
    }

    #[test]
    fn unmarked_html_does_not_qualify() {
        let mut parts = page_parts("text/html", StatusCode::OK);
        parts.extensions.clear();
        assert_eq!(qualify_response(&parts), Err("rendered_page"));
    }

    #[test]
    fn cookie_setting_response_does_not_qualify() {
        let mut parts = page_parts("text/html", StatusCode::OK);
        parts
            .headers
            .insert(header::SET_COOKIE, HeaderValue::from_static("sid=1"));
        assert_eq!(qualify_response(&parts), Err("sets_no_cookie"));
    }
}
