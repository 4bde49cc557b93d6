//! HTTP Ranger
//!
//! Random access to remote HTTP resources through range requests.
//!
//! # Overview
//!
//! A resource is built once from a `HEAD` request. The builder checks that
//! the server takes byte ranges, records the resource's length and pins
//! its identity to a strong ETag (or, when enabled, to a usable
//! Last-Modified time). Every later read is a single conditional range
//! request, so a resource that changes underneath a reader is reported
//! instead of silently mixing versions.
//!
//! # Features
//!
//! - **Positioned Reads**: [`BytesResourceReader::read_at`] maps one buffer
//!   to one `Range` request
//! - **Sequential Reads**: `read`, `seek` and a [`tokio::io::AsyncRead`]
//!   implementation on top of positioned reads
//! - **Multipart Ranges**: [`HttpRanger`] unwraps `multipart/byteranges`
//!   bodies into a pull-based sequence of parts
//! - **Identity Pinning**: [`ValidatingTransport`] sends `If-Match` or
//!   `If-Unmodified-Since` and checks every response against the pin
//! - **Cancellation**: every network operation runs under a
//!   [`CancelScope`]; closing a reader aborts its reads in flight
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use http_ranger::{CancelScope, RangerConfig, ResourceBuilder};
//!
//! # async fn run() -> http_ranger::Result<()> {
//! let builder = ResourceBuilder::from_config(RangerConfig::default())?;
//! let scope = CancelScope::new();
//! let resource = builder.build("https://example.com/large.bin", &scope).await?;
//!
//! let reader = resource.reader(&scope);
//! let mut buf = vec![0u8; 4096];
//! let result = reader.read_at(&mut buf, 1 << 20).await?;
//! println!("read {} bytes, eof={}", result.len, result.eof);
//! reader.close();
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`ResourceBuilder`]: fetches metadata and assembles the stack below
//! - [`MetadataFetcher`]: issues `HEAD` requests and parses the headers
//! - [`ValidatorBuilder`] / [`ValidatingTransport`]: identity pinning
//! - [`HttpRanger`]: one range request, exposed as [`RangeParts`]
//! - [`BytesReader`]: one positioned read per range request
//! - [`BytesResource`] / [`BytesResourceReader`]: length-aware readers
//!
//! # Configuration
//!
//! Configuration is loaded from a YAML file:
//!
//! ```yaml
//! request_timeout_secs: 30
//! connect_timeout_secs: 10
//! validate_last_modified: false
//! user_agent: "http-ranger/0.1"
//! headers:
//!   authorization: "Bearer token"
//! ```
//!
//! See [`RangerConfig`] for details.
//!
//! # Error Handling
//!
//! Every operation returns [`RangeError`]. Helpers classify the cases a
//! caller usually acts on:
//!
//! ```rust,no_run
//! use http_ranger::RangeError;
//!
//! fn describe(err: &RangeError) -> &'static str {
//!     if err.is_capability_refusal() {
//!         "download the whole resource instead"
//!     } else if err.is_resource_changed() {
//!         "rebuild the resource"
//!     } else if err.is_closed() {
//!         "reader was closed"
//!     } else {
//!         "failed"
//!     }
//! }
//! ```

pub mod builder;
pub mod bytes_reader;
pub mod bytes_resource;
pub mod cancel;
pub mod config;
pub mod content_range;
pub mod error;
pub mod headers;
pub mod metadata_fetcher;
pub mod ranger;
pub mod specifier;
pub mod transport;
pub mod validator;

// Re-export commonly used types
pub use builder::{PinnedResource, ResourceBuilder};
pub use bytes_reader::{BytesReader, ReadResult};
pub use bytes_resource::{BytesResource, BytesResourceReader};
pub use cancel::{CancelReason, CancelScope};
pub use config::RangerConfig;
pub use content_range::{parse_content_range, ContentRange, ParsedByteRange, UnsatisfiedRange};
pub use error::{RangeError, Result};
pub use headers::ETag;
pub use metadata_fetcher::{MetadataFetcher, ResourceMetadata};
pub use ranger::{HttpRanger, RangePart, RangeParts};
pub use specifier::Specifier;
pub use transport::{ReqwestTransport, RequestFactory, RequestTemplate, Transport};
pub use validator::{ValidatingTransport, Validator, ValidatorBuilder};
