//! HTTP range fetching
//!
//! [`HttpRanger`] sends one range request per call and exposes the
//! satisfied ranges of the response as a pull-based sequence of
//! [`RangePart`]s, unwrapping single-range and `multipart/byteranges`
//! bodies alike.
//!
//! A part borrows its [`RangeParts`] mutably, so it has to be dropped
//! before the next one can be requested. Unread bytes of a dropped part
//! are skipped; dropping the whole sequence early releases the
//! connection without reading the rest of the body.

use crate::cancel::CancelScope;
use crate::content_range::{split_content_range, ParsedByteRange, UnsatisfiedRange};
use crate::error::{RangeError, Result};
use crate::headers::{
    self, BYTES_UNIT, CONTENT_RANGE, CONTENT_TYPE, MULTIPART_BYTERANGES, RANGE,
};
use crate::specifier::Specifier;
use crate::transport::{RequestFactory, Transport};
use bytes::{Buf, Bytes};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use reqwest::Response;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Issues range requests for one resource
pub struct HttpRanger<T> {
    transport: T,
    factory: Arc<dyn RequestFactory>,
}

impl<T: Transport> HttpRanger<T> {
    pub fn new(transport: T, factory: Arc<dyn RequestFactory>) -> Self {
        HttpRanger { transport, factory }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Request the ranges described by `specifier`.
    ///
    /// # Returns
    /// * `Ok(RangeParts)` for a `206 Partial Content` response
    /// * `Err(RangeError::RangeNotSatisfiable)` for `416`
    /// * `Err(RangeError::UnexpectedStatus)` for any other status
    /// * `Err(RangeError::RangesNotSupported | UnitNotAccepted)` when the
    ///   response's `Accept-Ranges` rules out the requested unit
    pub async fn fetch(&self, specifier: &Specifier, scope: &CancelScope) -> Result<RangeParts> {
        let unit = specifier.unit();

        let mut request = self.factory.new_request(Method::GET)?;
        let range = HeaderValue::from_str(specifier.as_str())
            .map_err(|e| RangeError::InvalidRequest(format!("invalid Range {}: {}", specifier, e)))?;
        request.headers_mut().insert(RANGE, range);

        debug!(
            "Requesting unit={} ranges={} url={}",
            unit,
            specifier.range_set(),
            request.url()
        );
        let response = self.transport.execute(request, scope).await?;
        let status = response.status();
        debug!("Received range response status={} for range={}", status, specifier);

        headers::check_accept_ranges(&headers::accept_ranges(response.headers())?, unit)?;

        match status {
            StatusCode::PARTIAL_CONTENT => {}
            StatusCode::RANGE_NOT_SATISFIABLE => {
                let unsatisfied = unsatisfied_range(response.headers(), unit)?;
                debug!("Range {} not satisfiable: {:?}", specifier, unsatisfied);
                return Err(RangeError::RangeNotSatisfiable(unsatisfied));
            }
            other => {
                warn!("Unexpected status {} for range={}", other, specifier);
                return Err(RangeError::UnexpectedStatus {
                    status: other.as_u16(),
                    reason: other.canonical_reason().unwrap_or_default().to_string(),
                });
            }
        }

        let state = match multipart_boundary(response.headers())? {
            Some(boundary) => {
                info!("Multipart byteranges response for range={}", specifier);
                PartsState::Multipart {
                    multipart: multer::Multipart::new(response.bytes_stream(), boundary),
                    yielded: false,
                }
            }
            None => PartsState::Single(Some(response)),
        };

        Ok(RangeParts {
            unit: unit.to_string(),
            scope: scope.clone(),
            state,
        })
    }
}

/// Decode the `Content-Range` of a 416 response
fn unsatisfied_range(headers: &HeaderMap, unit: &str) -> Result<UnsatisfiedRange> {
    let value = match headers.get(&CONTENT_RANGE) {
        Some(value) if !value.is_empty() => value,
        _ => {
            return Ok(UnsatisfiedRange {
                complete_length: None,
            })
        }
    };
    let text = value
        .to_str()
        .map_err(|_| RangeError::InvalidContentRange(headers::lossy(value)))?;
    let (resp_unit, resp) = split_content_range(text)?;
    check_unit(unit, resp_unit)?;
    UnsatisfiedRange::parse(resp)
}

/// Boundary of a `multipart/byteranges` body, `None` for any other type.
///
/// Once the type name matches, a malformed value or a missing boundary
/// is an error.
fn multipart_boundary(headers: &HeaderMap) -> Result<Option<String>> {
    let Some(value) = headers.get(&CONTENT_TYPE) else {
        return Ok(None);
    };
    let essence = value
        .as_bytes()
        .split(|&b| b == b';')
        .next()
        .unwrap_or_default()
        .trim_ascii();
    if !essence.eq_ignore_ascii_case(MULTIPART_BYTERANGES.as_bytes()) {
        return Ok(None);
    }

    let invalid = || RangeError::InvalidContentType(headers::lossy(value));
    let media_type: mime::Mime = value
        .to_str()
        .map_err(|_| invalid())?
        .parse()
        .map_err(|_| invalid())?;
    let boundary = media_type
        .get_param(mime::BOUNDARY)
        .map(|b| b.as_str().trim_matches('"').to_string())
        .filter(|b| !b.is_empty())
        .ok_or_else(invalid)?;
    Ok(Some(boundary))
}

fn check_unit(expected: &str, actual: &str) -> Result<()> {
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(RangeError::UnitMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

enum PartsState {
    Single(Option<Response>),
    Multipart {
        multipart: multer::Multipart<'static>,
        yielded: bool,
    },
}

/// The satisfied ranges of one range response, in response order
pub struct RangeParts {
    unit: String,
    scope: CancelScope,
    state: PartsState,
}

impl RangeParts {
    /// Advance to the next satisfied range.
    ///
    /// Returns `Ok(None)` once every range has been produced.
    pub async fn next_part(&mut self) -> Result<Option<RangePart<'_>>> {
        let (content_range, body) = match &mut self.state {
            PartsState::Single(response) => {
                let Some(response) = response.take() else {
                    return Ok(None);
                };
                let content_range = response
                    .headers()
                    .get(&CONTENT_RANGE)
                    .cloned()
                    .ok_or(RangeError::MissingContentRange)?;
                (content_range, PartBody::Whole(response))
            }
            PartsState::Multipart { multipart, yielded } => {
                let field = self
                    .scope
                    .run(async { Ok(multipart.next_field().await?) })
                    .await?;
                let Some(field) = field else {
                    if !*yielded {
                        return Err(RangeError::EmptyMultipartRanges);
                    }
                    return Ok(None);
                };
                *yielded = true;
                let content_range = field
                    .headers()
                    .get(&CONTENT_RANGE)
                    .cloned()
                    .ok_or(RangeError::MissingContentRange)?;
                (content_range, PartBody::Field(field))
            }
        };

        let text = content_range
            .to_str()
            .map_err(|_| RangeError::InvalidContentRange(headers::lossy(&content_range)))?;
        let (unit, resp) = split_content_range(text)?;
        check_unit(&self.unit, unit)?;
        let byte_range = if unit.eq_ignore_ascii_case(BYTES_UNIT) {
            Some(ParsedByteRange::parse(resp)?)
        } else {
            None
        };
        debug!("Range part {}", text);

        Ok(Some(RangePart {
            content_range: resp.to_string(),
            byte_range,
            body,
            buffered: Bytes::new(),
            scope: self.scope.clone(),
            _parts: PhantomData,
        }))
    }
}

enum PartBody {
    Whole(Response),
    Field(multer::Field<'static>),
}

/// One satisfied range and its content.
///
/// Valid until the next call to [`RangeParts::next_part`].
pub struct RangePart<'a> {
    content_range: String,
    byte_range: Option<ParsedByteRange>,
    body: PartBody,
    buffered: Bytes,
    scope: CancelScope,
    _parts: PhantomData<&'a mut RangeParts>,
}

impl RangePart<'_> {
    /// The `Content-Range` payload after the unit, e.g. `0-99/1000`
    pub fn content_range(&self) -> &str {
        &self.content_range
    }

    /// The parsed range, present for the `bytes` unit
    pub fn byte_range(&self) -> Option<&ParsedByteRange> {
        self.byte_range.as_ref()
    }

    /// Next chunk of content, `None` at the end of this part
    pub async fn chunk(&mut self) -> Result<Option<Bytes>> {
        if !self.buffered.is_empty() {
            return Ok(Some(std::mem::take(&mut self.buffered)));
        }
        loop {
            let chunk = match &mut self.body {
                PartBody::Whole(response) => {
                    self.scope.run(async { Ok(response.chunk().await?) }).await?
                }
                PartBody::Field(field) => {
                    self.scope.run(async { Ok(field.chunk().await?) }).await?
                }
            };
            match chunk {
                Some(chunk) if chunk.is_empty() => continue,
                other => return Ok(other),
            }
        }
    }

    /// Fill `dst` from the content; returns fewer bytes than `dst.len()`
    /// only when the part ends first.
    pub async fn read_full(&mut self, dst: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < dst.len() {
            let Some(mut chunk) = self.chunk().await? else {
                break;
            };
            let n = chunk.len().min(dst.len() - filled);
            dst[filled..filled + n].copy_from_slice(&chunk[..n]);
            chunk.advance(n);
            self.buffered = chunk;
            filled += n;
        }
        Ok(filled)
    }

    /// Whether any content is left, without consuming it
    pub async fn has_remaining(&mut self) -> Result<bool> {
        match self.chunk().await? {
            Some(chunk) => {
                self.buffered = chunk;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Skip the rest of the content, returning how many bytes were skipped
    pub async fn discard(&mut self) -> Result<u64> {
        let mut skipped = 0;
        while let Some(chunk) = self.chunk().await? {
            skipped += chunk.len() as u64;
        }
        Ok(skipped)
    }

    /// Read the rest of the content into memory
    pub async fn bytes(&mut self) -> Result<Bytes> {
        let mut collected = Vec::new();
        while let Some(chunk) = self.chunk().await? {
            collected.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(collected))
    }
}
