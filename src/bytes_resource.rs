//! A remote resource of known length
//!
//! [`BytesResource`] is built once per resource and can hand out any
//! number of independent [`BytesResourceReader`]s. Each reader keeps its
//! own position and cancellation scope; closing one never affects another
//! or the resource itself.

use crate::bytes_reader::{BytesReader, ReadResult};
use crate::cancel::{CancelReason, CancelScope};
use crate::error::{RangeError, Result};
use crate::transport::Transport;
use bytes::{Buf, Bytes};
use futures::future::BoxFuture;
use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tracing::debug;

/// A remote resource whose total length was fixed when it was built
pub struct BytesResource<T> {
    length: u64,
    reader: Arc<BytesReader<T>>,
}

impl<T> Clone for BytesResource<T> {
    fn clone(&self) -> Self {
        BytesResource {
            length: self.length,
            reader: Arc::clone(&self.reader),
        }
    }
}

impl<T: Transport + 'static> BytesResource<T> {
    pub fn new(length: u64, reader: BytesReader<T>) -> Self {
        BytesResource {
            length,
            reader: Arc::new(reader),
        }
    }

    /// Total length in bytes
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Open a reader positioned at 0.
    ///
    /// The reader's scope is a child of `scope`: cancelling `scope`
    /// stops the reader, closing the reader leaves `scope` alone.
    pub fn reader(&self, scope: &CancelScope) -> BytesResourceReader<T> {
        BytesResourceReader {
            reader: Arc::clone(&self.reader),
            length: self.length,
            offset: 0,
            scope: scope.child(),
            pending: None,
            leftover: Bytes::new(),
        }
    }
}

/// Reads one window of the resource, clamped to its length.
///
/// A window that stops at the resource's end reports `eof`. An underlying
/// read shorter than the clamped window means the server delivered less
/// than the length promised and is an error.
async fn read_clamped<T: Transport>(
    reader: &BytesReader<T>,
    length: u64,
    scope: &CancelScope,
    buf: &mut [u8],
    offset: u64,
) -> Result<ReadResult> {
    scope.check()?;
    if offset >= length {
        return Ok(ReadResult::eof(0));
    }
    let want = (length - offset).min(buf.len() as u64) as usize;
    if want == 0 {
        return Ok(ReadResult::new(0, false));
    }

    let result = reader.read_at(&mut buf[..want], offset, scope).await?;
    if result.len < want {
        return Err(RangeError::ShortBody {
            expected: want as u64,
            received: result.len as u64,
        });
    }
    Ok(ReadResult::new(want, offset + want as u64 == length))
}

/// A positioned view of a [`BytesResource`]
pub struct BytesResourceReader<T> {
    reader: Arc<BytesReader<T>>,
    length: u64,
    offset: u64,
    scope: CancelScope,
    pending: Option<BoxFuture<'static, Result<Bytes>>>,
    leftover: Bytes,
}

impl<T: Transport + 'static> BytesResourceReader<T> {
    /// Total length of the underlying resource
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Current position for [`read`](Self::read)
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Read into `buf` at `offset` without moving the position.
    ///
    /// Reads at or past the end return zero bytes with `eof`.
    pub async fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<ReadResult> {
        read_clamped(&self.reader, self.length, &self.scope, buf, offset).await
    }

    /// Read at the current position and advance it.
    ///
    /// Returns 0 once the position reaches the end of the resource.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.pending = None;
        self.leftover = Bytes::new();
        let result = self.read_at(buf, self.offset).await?;
        self.offset += result.len as u64;
        Ok(result.len)
    }

    /// Move the position.
    ///
    /// Positions before 0 or past the resource's length are rejected;
    /// the length itself is a valid position.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.scope.check()?;
        let target = match pos {
            SeekFrom::Start(n) => n as i128,
            SeekFrom::Current(n) => self.offset as i128 + n as i128,
            SeekFrom::End(n) => self.length as i128 + n as i128,
        };
        if target < 0 || target > self.length as i128 {
            return Err(RangeError::OutOfRange {
                offset: target,
                length: self.length,
            });
        }
        if target as u64 != self.offset {
            self.pending = None;
            self.leftover = Bytes::new();
        }
        self.offset = target as u64;
        Ok(self.offset)
    }

    /// Close the reader, aborting any read in flight.
    ///
    /// Every later operation fails with a cancellation that
    /// [`RangeError::is_closed`] recognises. A [`read_at`](Self::read_at)
    /// in flight on the same reader can be aborted this way; a
    /// [`read`](Self::read) holds the reader mutably, so abort it by
    /// cancelling the scope the reader was created from.
    pub fn close(&self) {
        debug!("Closing resource reader at offset {}", self.offset);
        self.scope.cancel(CancelReason::ReaderClosed);
    }

    pub fn is_closed(&self) -> bool {
        self.scope.reason() == Some(CancelReason::ReaderClosed)
    }
}

impl<T: Transport + 'static> AsyncRead for BytesResourceReader<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if !this.leftover.is_empty() {
            let n = this.leftover.len().min(buf.remaining());
            buf.put_slice(&this.leftover[..n]);
            this.leftover.advance(n);
            this.offset += n as u64;
            return Poll::Ready(Ok(()));
        }

        if this.pending.is_none() {
            let want = (buf.remaining() as u64).min(this.length.saturating_sub(this.offset));
            if want == 0 {
                this.scope.check()?;
                return Poll::Ready(Ok(()));
            }
            let reader = Arc::clone(&this.reader);
            let scope = this.scope.clone();
            let length = this.length;
            let offset = this.offset;
            this.pending = Some(Box::pin(async move {
                let mut data = vec![0u8; want as usize];
                let result = read_clamped(&reader, length, &scope, &mut data, offset).await?;
                data.truncate(result.len);
                Ok(Bytes::from(data))
            }));
        }

        let Some(pending) = this.pending.as_mut() else {
            return Poll::Ready(Ok(()));
        };
        match pending.as_mut().poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(result) => {
                this.pending = None;
                let mut data = result?;
                let n = data.len().min(buf.remaining());
                buf.put_slice(&data[..n]);
                data.advance(n);
                this.offset += n as u64;
                this.leftover = data;
                Poll::Ready(Ok(()))
            }
        }
    }
}
