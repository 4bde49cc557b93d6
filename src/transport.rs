//! HTTP transport and request construction
//!
//! [`Transport`] sends one fully formed request and hands back the
//! response with its body still unread. Connection pooling, TLS and
//! redirects belong to the implementation; this crate never retries.

use crate::cancel::CancelScope;
use crate::config::RangerConfig;
use crate::error::{RangeError, Result};
use async_trait::async_trait;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use reqwest::{Client, Request, Response, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Sends requests and returns responses with lazily read bodies
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: Request, scope: &CancelScope) -> Result<Response>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: Request, scope: &CancelScope) -> Result<Response> {
        (**self).execute(request, scope).await
    }
}

/// [`Transport`] backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with default timeouts
    pub fn new() -> Result<Self> {
        Self::from_config(&RangerConfig::default())
    }

    /// Create a transport with the configured timeouts
    pub fn from_config(config: &RangerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(ReqwestTransport { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: Client) -> Self {
        ReqwestTransport { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: Request, scope: &CancelScope) -> Result<Response> {
        debug!("Sending {} {}", request.method(), request.url());
        scope
            .run(async { Ok(self.client.execute(request).await?) })
            .await
    }
}

/// Produces base requests for one resource
pub trait RequestFactory: Send + Sync {
    fn new_request(&self, method: Method) -> Result<Request>;
}

/// A URL plus headers stamped on every request made for it
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    url: Url,
    headers: HeaderMap,
}

impl RequestTemplate {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| RangeError::InvalidRequest(format!("invalid URL {:?}: {}", url, e)))?;
        Ok(RequestTemplate {
            url,
            headers: HeaderMap::new(),
        })
    }

    /// Create a template carrying the configured user agent and headers
    pub fn from_config(url: &str, config: &RangerConfig) -> Result<Self> {
        let mut template = Self::new(url)?;
        if let Some(user_agent) = &config.user_agent {
            template = template.header(http::header::USER_AGENT.as_str(), user_agent)?;
        }
        for (name, value) in &config.headers {
            template = template.header(name, value)?;
        }
        Ok(template)
    }

    /// Add a header to every request; repeated names accumulate values
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| RangeError::InvalidRequest(format!("invalid header name {:?}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| RangeError::InvalidRequest(format!("invalid value for {}: {}", name, e)))?;
        self.headers.append(name, value);
        Ok(self)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl RequestFactory for RequestTemplate {
    fn new_request(&self, method: Method) -> Result<Request> {
        let mut request = Request::new(method, self.url.clone());
        *request.headers_mut() = self.headers.clone();
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_rejects_bad_url() {
        assert!(matches!(
            RequestTemplate::new("not a url"),
            Err(RangeError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_template_stamps_headers() {
        let template = RequestTemplate::new("http://example.com/file.bin")
            .unwrap()
            .header("authorization", "Bearer token")
            .unwrap();
        let request = template.new_request(Method::HEAD).unwrap();
        assert_eq!(request.method(), Method::HEAD);
        assert_eq!(request.url().as_str(), "http://example.com/file.bin");
        assert_eq!(request.headers()["authorization"], "Bearer token");
    }

    #[test]
    fn test_template_from_config() {
        let mut config = RangerConfig::default();
        config.user_agent = Some("http-ranger/test".to_string());
        config
            .headers
            .insert("x-request-source".to_string(), "tests".to_string());

        let template = RequestTemplate::from_config("http://example.com/a", &config).unwrap();
        let request = template.new_request(Method::GET).unwrap();
        assert_eq!(request.headers()["user-agent"], "http-ranger/test");
        assert_eq!(request.headers()["x-request-source"], "tests");
    }

    #[test]
    fn test_template_rejects_bad_header() {
        let template = RequestTemplate::new("http://example.com/").unwrap();
        assert!(template.header("bad name", "v").is_err());
    }

    #[test]
    fn test_reqwest_transport_creation() {
        assert!(ReqwestTransport::new().is_ok());
    }
}
