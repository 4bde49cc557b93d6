//! Random access reads over range requests
//!
//! One [`BytesReader::read_at`] call issues exactly one range request and
//! copies the answer into exactly one buffer.

use crate::cancel::CancelScope;
use crate::error::{RangeError, Result};
use crate::ranger::HttpRanger;
use crate::specifier::Specifier;
use crate::transport::Transport;
use tracing::debug;

/// Outcome of a positioned read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadResult {
    /// Bytes copied into the buffer
    pub len: usize,
    /// Whether the read ended at the end of the resource
    pub eof: bool,
}

impl ReadResult {
    pub fn new(len: usize, eof: bool) -> Self {
        ReadResult { len, eof }
    }

    pub fn eof(len: usize) -> Self {
        ReadResult { len, eof: true }
    }
}

/// Reads byte windows of a resource through an [`HttpRanger`]
pub struct BytesReader<T> {
    ranger: HttpRanger<T>,
}

impl<T: Transport> BytesReader<T> {
    pub fn new(ranger: HttpRanger<T>) -> Self {
        BytesReader { ranger }
    }

    /// Read `buf.len()` bytes starting at `offset`.
    ///
    /// The server may legitimately return fewer bytes only when its range
    /// ends on the last byte of the resource; the result then carries
    /// `eof`. A range the server cannot satisfy is end of data when the
    /// offset lies at or past the resource's length, and an error
    /// otherwise.
    pub async fn read_at(
        &self,
        buf: &mut [u8],
        offset: u64,
        scope: &CancelScope,
    ) -> Result<ReadResult> {
        if buf.is_empty() {
            return Ok(ReadResult::new(0, false));
        }

        let length = buf.len() as u64;
        let first = offset;
        let last = offset
            .checked_add(length - 1)
            .filter(|&last| last <= i64::MAX as u64)
            .ok_or(RangeError::PositionOverflow { offset, length })?;

        let specifier = Specifier::bytes(&[first as i64, last as i64]);
        let mut parts = match self.ranger.fetch(&specifier, scope).await {
            Ok(parts) => parts,
            Err(RangeError::RangeNotSatisfiable(unsatisfied)) => {
                return match unsatisfied.complete_length {
                    Some(length) if first < length => {
                        Err(RangeError::UnsatisfiableInBounds { first, length })
                    }
                    _ => {
                        debug!("Read at {} is past the end of the resource", first);
                        Ok(ReadResult::eof(0))
                    }
                }
            }
            Err(e) => return Err(e),
        };

        let result = {
            let mut part = parts
                .next_part()
                .await?
                .ok_or(RangeError::EmptySequence)?;
            let range = *part
                .byte_range()
                .ok_or_else(|| RangeError::InvalidContentRange(part.content_range().to_string()))?;

            let expected = format!("{}-{}", first, last);
            if range.first() != first || range.last() > last {
                return Err(RangeError::range_mismatch(expected, range));
            }
            if range.last() < last && !range.reaches_end() {
                return Err(RangeError::range_mismatch(expected, range));
            }

            let n = range.len() as usize;
            let received = part.read_full(&mut buf[..n]).await?;
            if received < n {
                return Err(RangeError::ShortBody {
                    expected: n as u64,
                    received: received as u64,
                });
            }
            if part.has_remaining().await? {
                return Err(RangeError::LongBody);
            }

            ReadResult::new(n, range.reaches_end())
        };

        if parts.next_part().await?.is_some() {
            return Err(RangeError::UnexpectedMultipleRanges);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RequestTemplate;
    use crate::validator::tests::ScriptedTransport;
    use std::sync::Arc;

    fn reader(responses: Vec<http::Response<Vec<u8>>>) -> BytesReader<ScriptedTransport> {
        let factory = RequestTemplate::new("http://example.com/data.bin").unwrap();
        BytesReader::new(HttpRanger::new(
            ScriptedTransport::new(responses),
            Arc::new(factory),
        ))
    }

    fn partial(content_range: &str, body: &[u8]) -> http::Response<Vec<u8>> {
        http::Response::builder()
            .status(206)
            .header("content-range", content_range)
            .body(body.to_vec())
            .unwrap()
    }

    fn unsatisfiable(content_range: Option<&str>) -> http::Response<Vec<u8>> {
        let mut builder = http::Response::builder().status(416);
        if let Some(value) = content_range {
            builder = builder.header("content-range", value);
        }
        builder.body(Vec::new()).unwrap()
    }

    #[tokio::test]
    async fn test_zero_length_is_noop() {
        let reader = reader(vec![]);
        let result = reader
            .read_at(&mut [], 12345, &CancelScope::new())
            .await
            .unwrap();
        assert_eq!(result, ReadResult::new(0, false));
        assert!(reader.ranger_requests().is_empty());
    }

    #[tokio::test]
    async fn test_single_range() {
        let reader = reader(vec![partial("bytes 0-9/100", b"0123456789")]);
        let mut buf = [0u8; 10];
        let result = reader
            .read_at(&mut buf, 0, &CancelScope::new())
            .await
            .unwrap();
        assert_eq!(result, ReadResult::new(10, false));
        assert_eq!(&buf, b"0123456789");
        assert_eq!(reader.ranger_requests()[0]["range"], "bytes=0-9");
    }

    #[tokio::test]
    async fn test_tail_read_signals_eof() {
        let reader = reader(vec![partial("bytes 90-99/100", b"abcdefghij")]);
        let mut buf = [0u8; 10];
        let result = reader
            .read_at(&mut buf, 90, &CancelScope::new())
            .await
            .unwrap();
        assert_eq!(result, ReadResult::eof(10));
    }

    #[tokio::test]
    async fn test_truncated_at_end_of_resource() {
        let reader = reader(vec![partial("bytes 95-99/100", b"vwxyz")]);
        let mut buf = [0u8; 10];
        let result = reader
            .read_at(&mut buf, 95, &CancelScope::new())
            .await
            .unwrap();
        assert_eq!(result, ReadResult::eof(5));
        assert_eq!(&buf[..5], b"vwxyz");
    }

    #[tokio::test]
    async fn test_unsatisfiable_past_end_is_eof() {
        let reader = reader(vec![unsatisfiable(Some("bytes */100"))]);
        let mut buf = [0u8; 10];
        let result = reader
            .read_at(&mut buf, 100, &CancelScope::new())
            .await
            .unwrap();
        assert_eq!(result, ReadResult::eof(0));
    }

    #[tokio::test]
    async fn test_unsatisfiable_unknown_length_is_eof() {
        let reader = reader(vec![unsatisfiable(None)]);
        let mut buf = [0u8; 10];
        let result = reader
            .read_at(&mut buf, 5, &CancelScope::new())
            .await
            .unwrap();
        assert_eq!(result, ReadResult::eof(0));
    }

    #[tokio::test]
    async fn test_unsatisfiable_in_bounds_is_error() {
        let reader = reader(vec![unsatisfiable(Some("bytes */100"))]);
        let mut buf = [0u8; 10];
        let result = reader.read_at(&mut buf, 50, &CancelScope::new()).await;
        assert!(matches!(
            result,
            Err(RangeError::UnsatisfiableInBounds {
                first: 50,
                length: 100
            })
        ));
    }

    #[tokio::test]
    async fn test_wrong_first_byte() {
        let reader = reader(vec![partial("bytes 1-10/100", b"0123456789")]);
        let mut buf = [0u8; 10];
        let result = reader.read_at(&mut buf, 0, &CancelScope::new()).await;
        assert!(matches!(result, Err(RangeError::RangeMismatch { .. })));
    }

    #[tokio::test]
    async fn test_short_range_not_at_end() {
        let reader = reader(vec![partial("bytes 0-4/100", b"01234")]);
        let mut buf = [0u8; 10];
        let result = reader.read_at(&mut buf, 0, &CancelScope::new()).await;
        assert!(matches!(result, Err(RangeError::RangeMismatch { .. })));
    }

    #[tokio::test]
    async fn test_short_range_unknown_length() {
        let reader = reader(vec![partial("bytes 0-4/*", b"01234")]);
        let mut buf = [0u8; 10];
        let result = reader.read_at(&mut buf, 0, &CancelScope::new()).await;
        assert!(matches!(result, Err(RangeError::RangeMismatch { .. })));
    }

    #[tokio::test]
    async fn test_body_shorter_than_range() {
        let reader = reader(vec![partial("bytes 0-9/100", b"01234")]);
        let mut buf = [0u8; 10];
        let result = reader.read_at(&mut buf, 0, &CancelScope::new()).await;
        assert!(matches!(
            result,
            Err(RangeError::ShortBody {
                expected: 10,
                received: 5
            })
        ));
    }

    #[tokio::test]
    async fn test_body_longer_than_range() {
        let reader = reader(vec![partial("bytes 0-3/100", b"0123456789")]);
        let mut buf = [0u8; 4];
        let result = reader.read_at(&mut buf, 0, &CancelScope::new()).await;
        assert!(matches!(result, Err(RangeError::LongBody)));
    }

    #[tokio::test]
    async fn test_unexpected_multiple_ranges() {
        let body = b"--B\r\nContent-Range: bytes 0-3/10\r\n\r\nabcd\r\n\
--B\r\nContent-Range: bytes 6-9/10\r\n\r\nghij\r\n--B--\r\n"
            .to_vec();
        let response = http::Response::builder()
            .status(206)
            .header("content-type", "multipart/byteranges; boundary=B")
            .body(body)
            .unwrap();
        let reader = reader(vec![response]);
        let mut buf = [0u8; 4];
        let result = reader.read_at(&mut buf, 0, &CancelScope::new()).await;
        assert!(matches!(result, Err(RangeError::UnexpectedMultipleRanges)));
    }

    #[tokio::test]
    async fn test_single_part_multipart_is_accepted() {
        let body = b"--B\r\nContent-Range: bytes 0-3/10\r\n\r\nabcd\r\n--B--\r\n".to_vec();
        let response = http::Response::builder()
            .status(206)
            .header("content-type", "multipart/byteranges; boundary=B")
            .body(body)
            .unwrap();
        let reader = reader(vec![response]);
        let mut buf = [0u8; 4];
        let result = reader
            .read_at(&mut buf, 0, &CancelScope::new())
            .await
            .unwrap();
        assert_eq!(result, ReadResult::new(4, false));
        assert_eq!(&buf, b"abcd");
    }

    #[tokio::test]
    async fn test_position_overflow() {
        let reader = reader(vec![]);
        let mut buf = [0u8; 2];
        let result = reader
            .read_at(&mut buf, i64::MAX as u64, &CancelScope::new())
            .await;
        assert!(matches!(result, Err(RangeError::PositionOverflow { .. })));
    }

    impl BytesReader<ScriptedTransport> {
        fn ranger_requests(&self) -> Vec<http::HeaderMap> {
            self.ranger.transport().requests.lock().unwrap().clone()
        }
    }
}
