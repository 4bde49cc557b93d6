//! Metadata fetcher for retrieving resource information with HEAD requests

use crate::cancel::CancelScope;
use crate::error::{RangeError, Result};
use crate::headers::{self, ETag, CONTENT_LENGTH, DATE, LAST_MODIFIED};
use crate::transport::{RequestFactory, Transport};
use http::{HeaderMap, Method};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// What a metadata request disclosed about a resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceMetadata {
    /// Total size in bytes, `None` when the server did not say
    pub content_length: Option<u64>,
    /// Entity tag, weak or strong
    pub etag: Option<ETag>,
    /// Last modification time
    pub last_modified: Option<SystemTime>,
    /// The server's clock when it produced the response
    pub date: Option<SystemTime>,
    /// Every unit listed in `Accept-Ranges`, in order
    pub accepted_units: Vec<String>,
}

impl ResourceMetadata {
    /// Extract metadata from response headers.
    ///
    /// Missing headers are left empty. A present but malformed
    /// `Content-Length`, `ETag`, `Last-Modified` or `Date` is an error.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
        let content_length = headers
            .get(&CONTENT_LENGTH)
            .map(|value| {
                value
                    .to_str()
                    .ok()
                    .filter(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()))
                    .and_then(|v| v.parse::<u64>().ok())
                    .ok_or_else(|| {
                        RangeError::InvalidRequest(format!(
                            "invalid Content-Length {:?}",
                            headers::lossy(value)
                        ))
                    })
            })
            .transpose()?;

        Ok(ResourceMetadata {
            content_length,
            etag: headers::etag(headers)?,
            last_modified: headers::http_date(headers, &LAST_MODIFIED)?,
            date: headers::http_date(headers, &DATE)?,
            accepted_units: headers::accept_ranges(headers)?,
        })
    }

    /// Check the advertised units allow ranged reads in `unit`
    pub fn accepts_unit(&self, unit: &str) -> Result<()> {
        headers::check_accept_ranges(&self.accepted_units, unit)
    }
}

/// MetadataFetcher issues HEAD requests and extracts [`ResourceMetadata`]
pub struct MetadataFetcher<T> {
    transport: T,
}

impl<T: Transport> MetadataFetcher<T> {
    /// Create a new MetadataFetcher over the given transport
    pub fn new(transport: T) -> Self {
        MetadataFetcher { transport }
    }

    /// Fetch metadata for the resource the factory points at
    ///
    /// # Returns
    /// * `Ok(ResourceMetadata)` for any 2xx response
    /// * `Err(RangeError::MetadataStatus)` for any other status
    /// * `Err(RangeError)` for transport failures or malformed headers
    pub async fn fetch_metadata(
        &self,
        factory: &dyn RequestFactory,
        scope: &CancelScope,
    ) -> Result<ResourceMetadata> {
        let request = factory.new_request(Method::HEAD)?;
        let url = request.url().clone();
        debug!("Fetching metadata for url={}", url);

        let response = self.transport.execute(request, scope).await.map_err(|e| {
            warn!("HEAD request failed for url={}: {}", url, e);
            e
        })?;

        let status = response.status();
        debug!("Received HEAD response for url={}, status={}", url, status);

        if !status.is_success() {
            warn!("Unexpected metadata status for url={}: status={}", url, status);
            return Err(RangeError::MetadataStatus {
                status: status.as_u16(),
            });
        }

        let metadata = ResourceMetadata::from_headers(response.headers())?;

        info!(
            "Fetched metadata for url={}: size={:?}, etag={:?}, accept_ranges={:?}",
            url,
            metadata.content_length,
            metadata.etag.as_ref().map(ToString::to_string),
            metadata.accepted_units
        );

        Ok(metadata)
    }
}
