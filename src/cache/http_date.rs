//! IMF-fixdate formatting and parsing (`Sun, 06 Nov 1994 08:49:37 GMT`).

use axum::http::HeaderValue;
use time::{
    OffsetDateTime, PrimitiveDateTime, UtcOffset, format_description::BorrowedFormatItem,
    macros::format_description,
};

const IMF_FIXDATE: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Format an instant as an HTTP-date header value.
///
/// Returns `None` only for instants outside the four-digit year range.
pub fn to_header_value(instant: OffsetDateTime) -> Option<HeaderValue> {
    let formatted = instant.to_offset(UtcOffset::UTC).format(IMF_FIXDATE).ok()?;
    HeaderValue::from_str(&formatted).ok()
}

/// Parse an HTTP-date header value. Obsolete date forms are not accepted.
pub fn parse(value: &str) -> Option<OffsetDateTime> {
    PrimitiveDateTime::parse(value.trim(), IMF_FIXDATE)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}
