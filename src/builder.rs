//! Building a [`BytesResource`] from a URL
//!
//! The builder fetches metadata once, confirms the server takes byte
//! ranges, pins the resource's identity and wires the ranger, reader and
//! resource together.

use crate::bytes_reader::BytesReader;
use crate::bytes_resource::BytesResource;
use crate::cancel::CancelScope;
use crate::config::RangerConfig;
use crate::error::{RangeError, Result};
use crate::headers::BYTES_UNIT;
use crate::metadata_fetcher::MetadataFetcher;
use crate::ranger::HttpRanger;
use crate::transport::{ReqwestTransport, RequestFactory, RequestTemplate, Transport};
use crate::validator::{ValidatingTransport, ValidatorBuilder};
use std::sync::Arc;
use tracing::{info, warn};

/// Resources built by a [`ResourceBuilder`] over transport `T`
pub type PinnedResource<T> = BytesResource<ValidatingTransport<T>>;

/// Builds pinned, random-access views of remote resources
pub struct ResourceBuilder<T> {
    transport: T,
    config: RangerConfig,
}

impl ResourceBuilder<ReqwestTransport> {
    /// Create a builder with a reqwest transport configured from `config`
    pub fn from_config(config: RangerConfig) -> Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::from_config(&config)?;
        Ok(ResourceBuilder { transport, config })
    }
}

impl<T: Transport + Clone + 'static> ResourceBuilder<T> {
    /// Create a builder over `transport` with default configuration
    pub fn new(transport: T) -> Self {
        ResourceBuilder {
            transport,
            config: RangerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RangerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RangerConfig {
        &self.config
    }

    /// Build a resource for `url`, stamping configured headers on every
    /// request.
    pub async fn build(&self, url: &str, scope: &CancelScope) -> Result<PinnedResource<T>> {
        let factory = RequestTemplate::from_config(url, &self.config)?;
        self.build_with_factory(Arc::new(factory), scope).await
    }

    /// Build a resource whose requests come from `factory`.
    ///
    /// # Returns
    /// * `Ok(BytesResource)` pinned to the resource's strong ETag, or to
    ///   its Last-Modified time when enabled and usable
    /// * `Err(RangeError::RangesNotSupported | UnitNotAccepted)` when the
    ///   server rules out byte ranges
    /// * `Err(RangeError::UnknownLength)` without a `Content-Length`
    /// * `Err(RangeError::NoApplicableValidator)` when identity cannot be
    ///   pinned
    pub async fn build_with_factory(
        &self,
        factory: Arc<dyn RequestFactory>,
        scope: &CancelScope,
    ) -> Result<PinnedResource<T>> {
        let fetcher = MetadataFetcher::new(self.transport.clone());
        let metadata = fetcher.fetch_metadata(factory.as_ref(), scope).await?;

        metadata.accepts_unit(BYTES_UNIT)?;
        let length = metadata.content_length.ok_or_else(|| {
            warn!("Metadata response carried no Content-Length");
            RangeError::UnknownLength
        })?;

        let transport = ValidatorBuilder::new()
            .validate_last_modified(self.config.validate_last_modified)
            .wrap(&metadata, self.transport.clone())?;
        info!(
            "Built resource: length={}, validator={}",
            length,
            transport.validator()
        );

        let ranger = HttpRanger::new(transport, factory);
        Ok(BytesResource::new(length, BytesReader::new(ranger)))
    }
}
