//! Error types for range-request reads

use crate::cancel::CancelReason;
use crate::content_range::UnsatisfiedRange;
use thiserror::Error;

/// Result type alias for range operations
pub type Result<T> = std::result::Result<T, RangeError>;

/// Error types that can occur while reading a remote resource by ranges
#[derive(Error, Debug)]
pub enum RangeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Metadata request returned status {status}")]
    MetadataStatus { status: u16 },

    #[error("Unexpected status code {status} {reason}")]
    UnexpectedStatus { status: u16, reason: String },

    #[error("Invalid Content-Range header: {0:?}")]
    InvalidContentRange(String),

    #[error("Missing Content-Range header in 206 response")]
    MissingContentRange,

    #[error("Invalid ETag header: {0:?}")]
    InvalidETag(String),

    #[error("Invalid {header} date: {value:?}")]
    InvalidDate { header: String, value: String },

    #[error("Invalid Accept-Ranges header: {0:?}")]
    InvalidAcceptRanges(String),

    #[error("Invalid Content-Type header: {0:?}")]
    InvalidContentType(String),

    #[error("Invalid multipart body: {0}")]
    InvalidMultipart(#[from] multer::Error),

    #[error("Range requests not supported by server")]
    RangesNotSupported,

    #[error("Range unit {unit:?} not accepted, server accepts {accepted:?}")]
    UnitNotAccepted { unit: String, accepted: Vec<String> },

    #[error("No applicable validator: need a strong ETag or a usable Last-Modified")]
    NoApplicableValidator,

    #[error("Resource length is unknown")]
    UnknownLength,

    #[error("Validator mismatch: expected {expected}, got {actual}")]
    ValidatorMismatch { expected: String, actual: String },

    #[error("Range not satisfiable{}", .0.complete_length.map(|l| format!(" (complete length {l})")).unwrap_or_default())]
    RangeNotSatisfiable(UnsatisfiedRange),

    #[error("Range starting at {first} not satisfiable although resource length is {length}")]
    UnsatisfiableInBounds { first: u64, length: u64 },

    #[error("Content-Range unit mismatch: expected {expected:?}, got {actual:?}")]
    UnitMismatch { expected: String, actual: String },

    #[error("Content-Range mismatch: expected {expected}, got {actual}")]
    RangeMismatch { expected: String, actual: String },

    #[error("Range response contained no ranges")]
    EmptySequence,

    #[error("Multipart byteranges response contained no parts")]
    EmptyMultipartRanges,

    #[error("Unexpected multiple ranges in response")]
    UnexpectedMultipleRanges,

    #[error("Response body ended after {received} of {expected} bytes")]
    ShortBody { expected: u64, received: u64 },

    #[error("Response body longer than its Content-Range")]
    LongBody,

    #[error("Offset {offset} out of range for length {length}")]
    OutOfRange { offset: i128, length: u64 },

    #[error("Range position overflow at offset {offset} with length {length}")]
    PositionOverflow { offset: u64, length: u64 },

    #[error("Operation cancelled: {0}")]
    Cancelled(CancelReason),
}

impl RangeError {
    /// The server refused ranged access; the caller may fall back to a
    /// plain full-body download.
    pub fn is_capability_refusal(&self) -> bool {
        matches!(
            self,
            RangeError::RangesNotSupported
                | RangeError::UnitNotAccepted { .. }
                | RangeError::NoApplicableValidator
                | RangeError::UnknownLength
        )
    }

    /// The resource no longer matches what was pinned at build time.
    ///
    /// Retrying against the same validator cannot succeed; the resource
    /// has to be rebuilt from fresh metadata.
    pub fn is_resource_changed(&self) -> bool {
        matches!(
            self,
            RangeError::ValidatorMismatch { .. } | RangeError::UnsatisfiableInBounds { .. }
        )
    }

    /// The operation failed because its reader was closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, RangeError::Cancelled(CancelReason::ReaderClosed))
    }

    /// Build a mismatch error from the expected and received ranges
    pub fn range_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        RangeError::RangeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

impl From<RangeError> for std::io::Error {
    fn from(err: RangeError) -> Self {
        match err {
            RangeError::Io(e) => e,
            short @ RangeError::ShortBody { .. } => {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, short)
            }
            other => std::io::Error::other(other),
        }
    }
}
