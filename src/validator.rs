//! Resource identity pinning
//!
//! A [`Validator`] is chosen once from a resource's metadata. Wrapping a
//! transport in [`ValidatingTransport`] makes every request conditional on
//! it and rejects every response that cannot be tied back to it.

use crate::cancel::CancelScope;
use crate::error::{RangeError, Result};
use crate::headers::{self, ETag, IF_MATCH, IF_UNMODIFIED_SINCE, LAST_MODIFIED};
use crate::metadata_fetcher::ResourceMetadata;
use crate::transport::Transport;
use async_trait::async_trait;
use http::{HeaderMap, HeaderValue, StatusCode};
use reqwest::{Request, Response};
use std::fmt;
use std::time::SystemTime;
use tracing::{debug, warn};

/// The identity pin of a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validator {
    /// A strong entity tag, sent as `If-Match`
    StrongETag(ETag),
    /// A Last-Modified time known to be strong, sent as
    /// `If-Unmodified-Since`
    LastModified(SystemTime),
}

impl Validator {
    /// Set the precondition header, replacing any existing value
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<()> {
        match self {
            Validator::StrongETag(etag) => {
                headers.insert(IF_MATCH, etag.header_value().clone());
            }
            Validator::LastModified(time) => {
                let value = HeaderValue::from_str(&headers::format_http_date(*time))
                    .map_err(|e| RangeError::InvalidRequest(e.to_string()))?;
                headers.insert(IF_UNMODIFIED_SINCE, value);
            }
        }
        Ok(())
    }

    /// Confirm response headers still identify the pinned resource.
    ///
    /// The header of the pinned kind must be present and equal; a missing
    /// header cannot confirm identity and is a mismatch too.
    pub fn check(&self, response_headers: &HeaderMap) -> Result<()> {
        let actual = match self {
            Validator::StrongETag(expected) => match headers::etag(response_headers)? {
                Some(actual) if actual.strong_eq(expected) => return Ok(()),
                Some(actual) => actual.to_string(),
                None => "no ETag".to_string(),
            },
            Validator::LastModified(expected) => {
                match headers::http_date(response_headers, &LAST_MODIFIED)? {
                    Some(actual) if actual == *expected => return Ok(()),
                    Some(actual) => headers::format_http_date(actual),
                    None => "no Last-Modified".to_string(),
                }
            }
        };
        Err(RangeError::ValidatorMismatch {
            expected: self.to_string(),
            actual,
        })
    }
}

impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::StrongETag(etag) => write!(f, "ETag {}", etag),
            Validator::LastModified(time) => {
                write!(f, "Last-Modified {}", headers::format_http_date(*time))
            }
        }
    }
}

/// Chooses the strongest validator a resource's metadata allows
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatorBuilder {
    validate_last_modified: bool,
}

impl ValidatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opt in to pinning by Last-Modified when no strong ETag exists
    pub fn validate_last_modified(mut self, enabled: bool) -> Self {
        self.validate_last_modified = enabled;
        self
    }

    /// Select a validator.
    ///
    /// A strong ETag always wins. Otherwise, if enabled, Last-Modified is
    /// used when it is strictly earlier than the response's own `Date`.
    pub fn build(&self, metadata: &ResourceMetadata) -> Result<Validator> {
        if let Some(etag) = metadata.etag.as_ref().filter(|etag| !etag.is_weak()) {
            debug!("Pinning resource by strong ETag {}", etag);
            return Ok(Validator::StrongETag(etag.clone()));
        }

        if self.validate_last_modified {
            if let (Some(last_modified), Some(date)) = (metadata.last_modified, metadata.date) {
                if last_modified < date {
                    debug!(
                        "Pinning resource by Last-Modified {}",
                        headers::format_http_date(last_modified)
                    );
                    return Ok(Validator::LastModified(last_modified));
                }
            }
        }

        Err(RangeError::NoApplicableValidator)
    }

    /// Select a validator and wrap `transport` with it
    pub fn wrap<T: Transport>(
        &self,
        metadata: &ResourceMetadata,
        transport: T,
    ) -> Result<ValidatingTransport<T>> {
        Ok(ValidatingTransport::new(transport, self.build(metadata)?))
    }
}

/// A [`Transport`] that pins every exchange to one [`Validator`]
#[derive(Debug, Clone)]
pub struct ValidatingTransport<T> {
    inner: T,
    validator: Validator,
}

impl<T> ValidatingTransport<T> {
    pub fn new(inner: T, validator: Validator) -> Self {
        ValidatingTransport { inner, validator }
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }
}

#[async_trait]
impl<T: Transport> Transport for ValidatingTransport<T> {
    async fn execute(&self, mut request: Request, scope: &CancelScope) -> Result<Response> {
        self.validator.apply(request.headers_mut())?;
        let response = self.inner.execute(request, scope).await?;

        let status = response.status();
        if status == StatusCode::PRECONDITION_FAILED {
            warn!("Precondition failed for pinned {}", self.validator);
            return Err(RangeError::ValidatorMismatch {
                expected: self.validator.to_string(),
                actual: status.to_string(),
            });
        }
        if status.is_success() {
            if let Err(e) = self.validator.check(response.headers()) {
                warn!("Response rejected by validator: {}", e);
                return Err(e);
            }
        }
        Ok(response)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use reqwest::Url;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::{Duration, UNIX_EPOCH};

    /// Replays canned responses and records the requests it saw
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        responses: Mutex<VecDeque<http::Response<Vec<u8>>>>,
        pub(crate) requests: Mutex<Vec<HeaderMap>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(responses: Vec<http::Response<Vec<u8>>>) -> Self {
            ScriptedTransport {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(&self, request: Request, scope: &CancelScope) -> Result<Response> {
            scope.check()?;
            self.requests.lock().unwrap().push(request.headers().clone());
            let response = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted response left");
            Ok(Response::from(response))
        }
    }

    fn response(status: u16, headers: &[(&'static str, &str)]) -> http::Response<Vec<u8>> {
        let mut builder = http::Response::builder().status(status);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Vec::new()).unwrap()
    }

    fn request() -> Request {
        Request::new(
            http::Method::GET,
            Url::parse("http://example.com/file").unwrap(),
        )
    }

    fn etag(value: &'static str) -> ETag {
        ETag::parse(&HeaderValue::from_static(value)).unwrap()
    }

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_strong_etag_preferred() {
        let metadata = ResourceMetadata {
            etag: Some(etag("\"v1\"")),
            last_modified: Some(at(100)),
            date: Some(at(200)),
            ..Default::default()
        };
        let validator = ValidatorBuilder::new()
            .validate_last_modified(true)
            .build(&metadata)
            .unwrap();
        assert_eq!(validator, Validator::StrongETag(etag("\"v1\"")));
    }

    #[test]
    fn test_weak_etag_without_opt_in_fails() {
        let metadata = ResourceMetadata {
            etag: Some(etag("W/\"v1\"")),
            last_modified: Some(at(100)),
            date: Some(at(200)),
            ..Default::default()
        };
        assert!(matches!(
            ValidatorBuilder::new().build(&metadata),
            Err(RangeError::NoApplicableValidator)
        ));
    }

    #[test]
    fn test_last_modified_before_date() {
        let metadata = ResourceMetadata {
            etag: Some(etag("W/\"v1\"")),
            last_modified: Some(at(100)),
            date: Some(at(200)),
            ..Default::default()
        };
        let validator = ValidatorBuilder::new()
            .validate_last_modified(true)
            .build(&metadata)
            .unwrap();
        assert_eq!(validator, Validator::LastModified(at(100)));
    }

    #[test]
    fn test_last_modified_not_before_date_is_weak() {
        for date in [100, 50] {
            let metadata = ResourceMetadata {
                last_modified: Some(at(100)),
                date: Some(at(date)),
                ..Default::default()
            };
            assert!(ValidatorBuilder::new()
                .validate_last_modified(true)
                .build(&metadata)
                .is_err());
        }
    }

    #[test]
    fn test_last_modified_without_date_fails() {
        let metadata = ResourceMetadata {
            last_modified: Some(at(100)),
            ..Default::default()
        };
        assert!(ValidatorBuilder::new()
            .validate_last_modified(true)
            .build(&metadata)
            .is_err());
    }

    #[test]
    fn test_apply_overwrites() {
        let mut headers = HeaderMap::new();
        headers.append(IF_MATCH, HeaderValue::from_static("\"old\""));
        headers.append(IF_MATCH, HeaderValue::from_static("\"older\""));
        Validator::StrongETag(etag("\"v1\"")).apply(&mut headers).unwrap();
        let values: Vec<_> = headers.get_all(IF_MATCH).iter().collect();
        assert_eq!(values, vec!["\"v1\""]);

        Validator::LastModified(at(784111777))
            .apply(&mut headers)
            .unwrap();
        assert_eq!(
            headers[IF_UNMODIFIED_SINCE],
            "Sun, 06 Nov 1994 08:49:37 GMT"
        );
    }

    #[tokio::test]
    async fn test_matching_responses_pass() {
        let transport = ValidatingTransport::new(
            ScriptedTransport::new(vec![
                response(206, &[("etag", "\"v1\"")]),
                response(206, &[("etag", "\"v1\"")]),
            ]),
            Validator::StrongETag(etag("\"v1\"")),
        );
        let scope = CancelScope::new();
        for _ in 0..2 {
            let response = transport.execute(request(), &scope).await.unwrap();
            assert_eq!(response.status(), 206);
        }
        let seen = transport.inner.requests.lock().unwrap();
        assert!(seen.iter().all(|h| h[IF_MATCH] == "\"v1\""));
    }

    #[tokio::test]
    async fn test_etag_drift_is_mismatch() {
        let transport = ValidatingTransport::new(
            ScriptedTransport::new(vec![
                response(206, &[("etag", "\"v1\"")]),
                response(206, &[("etag", "\"v2\"")]),
            ]),
            Validator::StrongETag(etag("\"v1\"")),
        );
        let scope = CancelScope::new();
        assert!(transport.execute(request(), &scope).await.is_ok());

        let result = transport.execute(request(), &scope).await;
        match result {
            Err(RangeError::ValidatorMismatch { expected, actual }) => {
                assert_eq!(expected, "ETag \"v1\"");
                assert_eq!(actual, "\"v2\"");
            }
            other => panic!("expected validator mismatch, got {:?}", other.map(|r| r.status())),
        }
    }

    #[tokio::test]
    async fn test_missing_header_is_mismatch() {
        let transport = ValidatingTransport::new(
            ScriptedTransport::new(vec![response(206, &[])]),
            Validator::LastModified(at(784111777)),
        );
        let result = transport.execute(request(), &CancelScope::new()).await;
        assert!(matches!(result, Err(RangeError::ValidatorMismatch { .. })));
    }

    #[tokio::test]
    async fn test_last_modified_drift_is_mismatch() {
        let transport = ValidatingTransport::new(
            ScriptedTransport::new(vec![response(
                200,
                &[("last-modified", "Mon, 07 Nov 1994 08:49:37 GMT")],
            )]),
            Validator::LastModified(at(784111777)),
        );
        let result = transport.execute(request(), &CancelScope::new()).await;
        assert!(matches!(result, Err(RangeError::ValidatorMismatch { .. })));
    }

    #[tokio::test]
    async fn test_precondition_failed_is_mismatch() {
        let transport = ValidatingTransport::new(
            ScriptedTransport::new(vec![response(412, &[])]),
            Validator::StrongETag(etag("\"v1\"")),
        );
        let result = transport.execute(request(), &CancelScope::new()).await;
        assert!(matches!(result, Err(RangeError::ValidatorMismatch { .. })));
    }

    #[tokio::test]
    async fn test_unsatisfiable_passes_through() {
        let transport = ValidatingTransport::new(
            ScriptedTransport::new(vec![response(416, &[("content-range", "bytes */10")])]),
            Validator::StrongETag(etag("\"v1\"")),
        );
        let response = transport
            .execute(request(), &CancelScope::new())
            .await
            .unwrap();
        assert_eq!(response.status(), 416);
    }
}
