use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arango_http::{Method, Request, Response};
use async_trait::async_trait;
use tracing::trace;

use super::http::{HttpClient, HttpSession, TransportError};
use crate::errors::ConfigError;

/// Configuration of the [`DefaultHttpClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Maximum number of idle pooled connections kept per host.
    pub pool_size: usize,
    /// How long an idle pooled connection is kept alive.
    pub keep_alive: Duration,
    /// Total timeout of a single request, including reading the body.
    pub request_timeout: Duration,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
    /// Disables Nagle's algorithm on pooled connections.
    pub tcp_nodelay: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        HttpClientConfig {
            pool_size: 100,
            keep_alive: Duration::from_secs(60),
            request_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(60),
            tcp_nodelay: true,
        }
    }
}

/// Pooled HTTP client based on `reqwest`.
///
/// All sessions share one connection pool.
#[derive(Debug, Clone)]
pub struct DefaultHttpClient {
    client: reqwest::Client,
}

impl DefaultHttpClient {
    /// Builds the shared connection pool.
    pub fn new(config: HttpClientConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(config.pool_size)
            .pool_idle_timeout(config.keep_alive)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .tcp_nodelay(config.tcp_nodelay)
            .build()
            .map_err(|e| ConfigError::HttpClientBuild(e.to_string()))?;
        Ok(DefaultHttpClient { client })
    }
}

#[async_trait]
impl HttpClient for DefaultHttpClient {
    fn create_session(&self, host: &str) -> Result<Arc<dyn HttpSession>, ConfigError> {
        let url = url::Url::parse(host).map_err(|e| ConfigError::InvalidHost {
            host: host.to_owned(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidHost {
                host: host.to_owned(),
                reason: format!("unsupported scheme {:?}", url.scheme()),
            });
        }

        Ok(Arc::new(DefaultHttpSession {
            host: host.trim_end_matches('/').to_owned(),
            client: self.client.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

#[derive(Debug)]
struct DefaultHttpSession {
    host: String,
    client: reqwest::Client,
    closed: AtomicBool,
}

impl DefaultHttpSession {
    fn classify(&self, err: reqwest::Error) -> TransportError {
        let flags = ErrorFlags {
            connect: err.is_connect(),
            timeout: err.is_timeout(),
            builder: err.is_builder(),
            broken: err.is_request() || err.is_body(),
        };
        flags.into_transport_error(self.host.clone(), err.to_string())
    }
}

/// What `reqwest` reports about a failed request.
#[derive(Debug, Clone, Copy, Default)]
struct ErrorFlags {
    connect: bool,
    timeout: bool,
    builder: bool,
    broken: bool,
}

impl ErrorFlags {
    // A connect timeout carries both `connect` and `timeout`. It must stay a
    // connectivity failure so that the request moves on to the next host.
    fn into_transport_error(self, host: String, message: String) -> TransportError {
        if self.connect {
            TransportError::Connect { host, message }
        } else if self.timeout {
            TransportError::Timeout { host, message }
        } else if self.builder {
            TransportError::InvalidRequest(message)
        } else if self.broken {
            TransportError::BrokenConnection { host, message }
        } else {
            TransportError::Other(message)
        }
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

#[async_trait]
impl HttpSession for DefaultHttpSession {
    fn host(&self) -> &str {
        &self.host
    }

    async fn send_request(&self, request: &Request) -> Result<Response, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::SessionClosed(self.host.clone()));
        }

        let url = format!("{}{}", self.host, request.endpoint());
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method()), &url)
            .query(request.params());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(data) = request.data() {
            builder = builder.body(data.clone());
        }

        let response = builder.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        let resolved_url = response.url().to_string();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_owned(), value.to_owned()))
            })
            .collect();
        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        trace!(url = %resolved_url, status = status.as_u16(), "Received response");

        Ok(Response::new(
            request.method(),
            resolved_url,
            headers,
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
            body,
        ))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
