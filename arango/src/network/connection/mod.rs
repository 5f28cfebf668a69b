//! Connections to a single database.
//!
//! A connection binds a database name to the client's host sessions, host
//! resolver and compression manager. The three variants differ only in how
//! they authenticate; all of them send through the failover loop of
//! [`BaseConnection::process_request`].

mod basic;
mod jwt;
mod superuser;

use std::fmt::Debug;
use std::sync::Arc;

use arango_http::errno::{HTTP_FORBIDDEN, HTTP_UNAUTHORIZED};
use arango_http::{Deserializer, Method, Request, Response, Serializer};
use async_trait::async_trait;
use tracing::{debug, error, trace, trace_span, warn, Instrument};

use super::compression::CompressionManager;
use super::http::{HttpClient, HttpSession};
use crate::errors::{ApiOperation, ConfigError, ExecutionError, ServerError};
use crate::policies::host_resolver::HostResolver;

pub use basic::BasicConnection;
pub use jwt::JwtConnection;
pub use superuser::JwtSuperuserConnection;

/// Shared components a connection is assembled from.
#[derive(Debug, Clone)]
pub struct ConnectionParts {
    /// One session per host, in resolver index order.
    pub sessions: Arc<[Arc<dyn HttpSession>]>,
    /// Picks the host of every attempt.
    pub host_resolver: Arc<dyn HostResolver>,
    /// Sends requests through `sessions`.
    pub http_client: Arc<dyn HttpClient>,
    /// Database the requests are addressed to.
    pub db_name: String,
    /// Request compression, disabled if not set.
    pub compression: Option<Arc<dyn CompressionManager>>,
    /// Encodes request payloads.
    pub serializer: Arc<dyn Serializer>,
    /// Decodes response bodies.
    pub deserializer: Arc<dyn Deserializer>,
}

/// Whether 401/403 responses are returned to the caller or turned into errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AuthFailures {
    Raise,
    Return,
}

/// State and behaviour shared by all connection variants.
#[derive(Debug)]
pub struct BaseConnection {
    sessions: Arc<[Arc<dyn HttpSession>]>,
    host_resolver: Arc<dyn HostResolver>,
    http_client: Arc<dyn HttpClient>,
    db_name: String,
    db_endpoint: String,
    compression: Option<Arc<dyn CompressionManager>>,
    serializer: Arc<dyn Serializer>,
    deserializer: Arc<dyn Deserializer>,
}

impl BaseConnection {
    /// Fails if there are no sessions, or the resolver covers a different number of hosts.
    pub fn new(parts: ConnectionParts) -> Result<Self, ConfigError> {
        let host_count = parts.host_resolver.host_count();
        if parts.sessions.is_empty() {
            return Err(ConfigError::EmptyHostList);
        }
        if parts.sessions.len() != host_count {
            return Err(ConfigError::HostCountMismatch {
                resolver: host_count,
                sessions: parts.sessions.len(),
            });
        }

        Ok(BaseConnection {
            sessions: parts.sessions,
            host_resolver: parts.host_resolver,
            http_client: parts.http_client,
            db_endpoint: format!("/_db/{}", parts.db_name),
            db_name: parts.db_name,
            compression: parts.compression,
            serializer: parts.serializer,
            deserializer: parts.deserializer,
        })
    }

    /// Name of the database.
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// Serializer of request payloads.
    pub fn serializer(&self) -> &dyn Serializer {
        self.serializer.as_ref()
    }

    /// Deserializer of response bodies.
    pub fn deserializer(&self) -> &dyn Deserializer {
        self.deserializer.as_ref()
    }

    /// A shared handle to the deserializer, for response handlers that
    /// outlive the call.
    pub fn deserializer_handle(&self) -> Arc<dyn Deserializer> {
        Arc::clone(&self.deserializer)
    }

    /// The resolver shared with other connections of the same client.
    pub fn host_resolver(&self) -> &Arc<dyn HostResolver> {
        &self.host_resolver
    }

    /// Normalizes a raw response: computes the success flag and, for
    /// unsuccessful responses, extracts the server's error number and message.
    pub fn prep_response(&self, request: &Request, mut response: Response) -> Response {
        response.mark_status();
        if !response.is_success() {
            match self.deserializer.loads(&response.raw_body) {
                Ok(body) => response.apply_error_body(&body),
                Err(e) => debug!(
                    error = %e,
                    request = %request,
                    "Failed to decode error response body"
                ),
            }
        }
        response
    }

    /// Compresses the payload if the compression manager asks for it, and
    /// advertises the accepted response encoding.
    ///
    /// Returns whether any compression setting was applied.
    pub fn compress_request(&self, request: &mut Request) -> Result<bool, ExecutionError> {
        let Some(compression) = &self.compression else {
            return Ok(false);
        };

        let mut applied = false;
        if let Some(data) = request.data() {
            if compression.needs_compression(data) {
                let compressed = compression.compress(data)?;
                request.set_data(compressed);
                request.set_header("content-encoding", compression.content_encoding());
                applied = true;
            }
        }
        if let Some(accept) = compression.accept_encoding() {
            request.set_header("accept-encoding", accept);
            applied = true;
        }
        Ok(applied)
    }

    /// Sends a request, moving on to other hosts on connectivity failures.
    ///
    /// At most [`HostResolver::max_tries`] attempts are made. 401 and 403
    /// responses are returned as [`ExecutionError::Authentication`].
    pub async fn process_request(&self, request: &Request) -> Result<Response, ExecutionError> {
        self.process(request, AuthFailures::Raise).await
    }

    pub(crate) async fn process(
        &self,
        request: &Request,
        auth_failures: AuthFailures,
    ) -> Result<Response, ExecutionError> {
        let routed = request.with_endpoint_prefix(&self.db_endpoint);
        let max_tries = self.host_resolver.max_tries();
        let span = trace_span!(
            "Processing request",
            method = %routed.method(),
            endpoint = routed.endpoint()
        );

        let mut last_error = None;
        let mut host_index = self.host_resolver.get_host_index();
        for attempt in 0..max_tries {
            let session = self.sessions.get(host_index).ok_or_else(|| {
                ConfigError::HostCountMismatch {
                    resolver: self.host_resolver.host_count(),
                    sessions: self.sessions.len(),
                }
            })?;
            debug!(parent: &span, host = host_index, attempt, "Sending request");

            match self
                .http_client
                .send_request(session.as_ref(), &routed)
                .instrument(span.clone())
                .await
            {
                Ok(response) => {
                    trace!(parent: &span, status = response.status_code, "Request completed");
                    let response = self.prep_response(&routed, response);
                    if auth_failures == AuthFailures::Raise {
                        raise_for_auth(&routed, &response)?;
                    }
                    return Ok(response);
                }
                Err(e) if e.is_connectivity() => {
                    let previous = host_index;
                    host_index = self.host_resolver.get_host_index();
                    if host_index == previous {
                        self.host_resolver.change_host();
                        host_index = self.host_resolver.get_host_index();
                    }
                    warn!(
                        parent: &span,
                        error = %e,
                        host = previous,
                        next_host = host_index,
                        attempt,
                        "Host unreachable, switching hosts"
                    );
                    last_error = Some(e);
                }
                Err(e) => {
                    trace!(parent: &span, error = %e, "Request failed");
                    return Err(e.into());
                }
            }
        }

        error!(parent: &span, max_tries, "Can't connect to host(s) within limit");
        Err(ExecutionError::ConnectionAborted {
            method: routed.method(),
            endpoint: routed.endpoint().to_owned(),
            max_tries,
            last_error,
        })
    }
}

fn raise_for_auth(request: &Request, response: &Response) -> Result<(), ExecutionError> {
    if matches!(response.status_code, HTTP_UNAUTHORIZED | HTTP_FORBIDDEN) {
        return Err(ExecutionError::Authentication(ServerError::new(
            ApiOperation::Authentication,
            request,
            response,
        )));
    }
    Ok(())
}

/// A connection to one database, authenticating in a scheme-specific way.
#[async_trait]
pub trait Connection: Debug + Send + Sync {
    /// State shared by all variants.
    fn base(&self) -> &BaseConnection;

    /// Authenticates, compresses and sends a request through the failover loop.
    async fn send_request(&self, request: Request) -> Result<Response, ExecutionError>;

    /// Name of the database.
    fn db_name(&self) -> &str {
        self.base().db_name()
    }

    /// Checks that the server is reachable and accepts the credentials.
    ///
    /// Returns the HTTP status code.
    async fn ping(&self) -> Result<u16, ExecutionError> {
        let request = Request::new(Method::Get, "/_api/collection");
        let response = self.send_request(request.clone()).await?;
        if !response.is_success() {
            return Err(ServerError::new(ApiOperation::Ping, &request, &response).into());
        }
        Ok(response.status_code)
    }
}
