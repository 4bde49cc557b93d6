//! Header names, media types and the small header grammars shared by the
//! metadata fetcher, the validator and the ranger.

use crate::error::{RangeError, Result};
use http::header::HeaderName;
use http::{HeaderMap, HeaderValue};
use std::fmt;
use std::time::SystemTime;

pub const RANGE: HeaderName = http::header::RANGE;
pub const ACCEPT_RANGES: HeaderName = http::header::ACCEPT_RANGES;
pub const CONTENT_RANGE: HeaderName = http::header::CONTENT_RANGE;
pub const CONTENT_TYPE: HeaderName = http::header::CONTENT_TYPE;
pub const CONTENT_LENGTH: HeaderName = http::header::CONTENT_LENGTH;
pub const ETAG: HeaderName = http::header::ETAG;
pub const LAST_MODIFIED: HeaderName = http::header::LAST_MODIFIED;
pub const DATE: HeaderName = http::header::DATE;
pub const IF_MATCH: HeaderName = http::header::IF_MATCH;
pub const IF_UNMODIFIED_SINCE: HeaderName = http::header::IF_UNMODIFIED_SINCE;

/// Media type of a multi-range response body
pub const MULTIPART_BYTERANGES: &str = "multipart/byteranges";

/// The only range unit this crate reads with
pub const BYTES_UNIT: &str = "bytes";

/// `Accept-Ranges` value meaning range requests are refused
pub const ACCEPT_RANGES_NONE: &str = "none";

/// An entity tag, kept byte-for-byte as the server sent it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ETag(HeaderValue);

impl ETag {
    /// Parse an `ETag` header value.
    ///
    /// Grammar: `[ "W/" ] DQUOTE *etagc DQUOTE`, where `etagc` is `%x21`,
    /// `%x23-7E` or any byte from `%x80` up.
    pub fn parse(value: &HeaderValue) -> Result<Self> {
        let bytes = value.as_bytes();
        let opaque = bytes.strip_prefix(b"W/").unwrap_or(bytes);
        let valid = opaque.len() >= 2
            && opaque[0] == b'"'
            && opaque[opaque.len() - 1] == b'"'
            && opaque[1..opaque.len() - 1]
                .iter()
                .all(|&b| b == 0x21 || (0x23..=0x7e).contains(&b) || b >= 0x80);
        if !valid {
            return Err(RangeError::InvalidETag(lossy(value)));
        }
        Ok(ETag(value.clone()))
    }

    pub fn is_weak(&self) -> bool {
        self.0.as_bytes().starts_with(b"W/")
    }

    /// The quoted opaque tag without the weak prefix
    pub fn opaque(&self) -> &[u8] {
        let bytes = self.0.as_bytes();
        bytes.strip_prefix(b"W/").unwrap_or(bytes)
    }

    /// Strong comparison: both strong and byte-identical
    pub fn strong_eq(&self, other: &ETag) -> bool {
        !self.is_weak() && !other.is_weak() && self.opaque() == other.opaque()
    }

    pub fn header_value(&self) -> &HeaderValue {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&lossy(&self.0))
    }
}

pub(crate) fn lossy(value: &HeaderValue) -> String {
    String::from_utf8_lossy(value.as_bytes()).into_owned()
}

/// Parse the `ETag` header if present
pub fn etag(headers: &HeaderMap) -> Result<Option<ETag>> {
    headers
        .get(&ETAG)
        .map(ETag::parse)
        .transpose()
}

/// Parse an HTTP-date header if present; a malformed date is an error
pub fn http_date(headers: &HeaderMap, name: &HeaderName) -> Result<Option<SystemTime>> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let invalid = || RangeError::InvalidDate {
        header: name.to_string(),
        value: lossy(value),
    };
    let text = value.to_str().map_err(|_| invalid())?;
    httpdate::parse_http_date(text)
        .map(Some)
        .map_err(|_| invalid())
}

/// Format a timestamp as an IMF-fixdate header value
pub fn format_http_date(time: SystemTime) -> String {
    httpdate::fmt_http_date(time)
}

/// Collect every advertised range unit across all `Accept-Ranges` lines.
///
/// A line that is not visible ASCII is an error.
pub fn accept_ranges(headers: &HeaderMap) -> Result<Vec<String>> {
    let mut units = Vec::new();
    for value in headers.get_all(&ACCEPT_RANGES) {
        let line = value
            .to_str()
            .map_err(|_| RangeError::InvalidAcceptRanges(lossy(value)))?;
        units.extend(
            line.split(',')
                .map(str::trim)
                .filter(|unit| !unit.is_empty())
                .map(str::to_string),
        );
    }
    Ok(units)
}

/// Decide whether `unit` may be used given the advertised units.
///
/// No advertisement is tacit support. An explicit `none` refuses all
/// ranges. Otherwise the unit has to be listed, compared ASCII
/// case-insensitively.
pub fn check_accept_ranges(accepted: &[String], unit: &str) -> Result<()> {
    if accepted.is_empty() {
        return Ok(());
    }
    if accepted
        .iter()
        .any(|u| u.eq_ignore_ascii_case(ACCEPT_RANGES_NONE))
    {
        return Err(RangeError::RangesNotSupported);
    }
    if accepted.iter().any(|u| u.eq_ignore_ascii_case(unit)) {
        return Ok(());
    }
    Err(RangeError::UnitNotAccepted {
        unit: unit.to_string(),
        accepted: accepted.to_vec(),
    })
}
