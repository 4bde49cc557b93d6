//! `Content-Range` grammar
//!
//! Parsing follows the RFC 7233 profile, which accepts any range unit:
//!
//! ```text
//! Content-Range          = range-unit SP content-range-resp
//! byte-range-resp        = first-byte-pos "-" last-byte-pos "/" ( complete-length / "*" )
//! unsatisfied-range-resp = "*/" complete-length
//! ```
//!
//! Everything fails closed: any deviation is an
//! [`InvalidContentRange`](RangeError::InvalidContentRange) error.

use crate::error::{RangeError, Result};
use std::fmt;

/// A satisfied byte range as reported by a server.
///
/// Always `first <= last`, and `last < complete_length` when the
/// complete length is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParsedByteRange {
    first: u64,
    last: u64,
    complete_length: Option<u64>,
}

impl ParsedByteRange {
    /// Parse a `byte-range-resp`, e.g. `0-99/1000` or `0-99/*`
    pub fn parse(resp: &str) -> Result<Self> {
        let invalid = || RangeError::InvalidContentRange(resp.to_string());

        let (range, length) = resp.split_once('/').ok_or_else(invalid)?;
        let (first, last) = range.split_once('-').ok_or_else(invalid)?;
        let first = parse_position(first).ok_or_else(invalid)?;
        let last = parse_position(last).ok_or_else(invalid)?;
        let complete_length = match length {
            "*" => None,
            digits => Some(parse_position(digits).ok_or_else(invalid)?),
        };

        if first > last {
            return Err(invalid());
        }
        if let Some(length) = complete_length {
            if last >= length {
                return Err(invalid());
            }
        }

        Ok(ParsedByteRange {
            first,
            last,
            complete_length,
        })
    }

    pub fn first(&self) -> u64 {
        self.first
    }

    pub fn last(&self) -> u64 {
        self.last
    }

    pub fn complete_length(&self) -> Option<u64> {
        self.complete_length
    }

    /// Number of bytes in the range
    pub fn len(&self) -> u64 {
        self.last - self.first + 1
    }

    /// Whether this range ends on the last byte of the resource
    pub fn reaches_end(&self) -> bool {
        self.complete_length == Some(self.last + 1)
    }
}

impl fmt::Display for ParsedByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.complete_length {
            Some(length) => write!(f, "{}-{}/{}", self.first, self.last, length),
            None => write!(f, "{}-{}/*", self.first, self.last),
        }
    }
}

/// A "range not satisfiable" outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnsatisfiedRange {
    /// Total length, when the server disclosed it
    pub complete_length: Option<u64>,
}

impl UnsatisfiedRange {
    /// Parse an `unsatisfied-range-resp`, e.g. `*/1000`
    pub fn parse(resp: &str) -> Result<Self> {
        let length = resp
            .strip_prefix("*/")
            .and_then(parse_position)
            .ok_or_else(|| RangeError::InvalidContentRange(resp.to_string()))?;
        Ok(UnsatisfiedRange {
            complete_length: Some(length),
        })
    }
}

/// Either shape of a `bytes` content range response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRange {
    Satisfied(ParsedByteRange),
    Unsatisfied(UnsatisfiedRange),
}

impl ContentRange {
    /// Parse the part of a `Content-Range` value that follows the unit
    pub fn parse_resp(resp: &str) -> Result<Self> {
        if resp.starts_with('*') {
            UnsatisfiedRange::parse(resp).map(ContentRange::Unsatisfied)
        } else {
            ParsedByteRange::parse(resp).map(ContentRange::Satisfied)
        }
    }
}

/// Split a `Content-Range` value into its unit and the response part.
///
/// The unit must be a non-empty token, split from the rest at the first
/// space. The rest must be non-empty and made of bytes `0x01..=0x7F`.
pub fn split_content_range(value: &str) -> Result<(&str, &str)> {
    let invalid = || RangeError::InvalidContentRange(value.to_string());

    let (unit, resp) = value.split_once(' ').ok_or_else(invalid)?;
    if unit.is_empty() || !unit.bytes().all(is_tchar) {
        return Err(invalid());
    }
    if resp.is_empty() || !resp.bytes().all(|b| (0x01..=0x7f).contains(&b)) {
        return Err(invalid());
    }
    Ok((unit, resp))
}

/// Parse a full `Content-Range` header value into its unit and shape.
pub fn parse_content_range(value: &str) -> Result<(&str, ContentRange)> {
    let (unit, resp) = split_content_range(value)?;
    Ok((unit, ContentRange::parse_resp(resp)?))
}

/// `1*DIGIT` that fits a signed 64-bit position
fn parse_position(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value = digits.parse::<u64>().ok()?;
    (value <= i64::MAX as u64).then_some(value)
}

fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}
