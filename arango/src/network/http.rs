use std::fmt::Debug;
use std::sync::Arc;

use arango_http::{Request, Response};
use async_trait::async_trait;
use thiserror::Error;

use crate::errors::ConfigError;

/// Error returned by the transport when no HTTP response was obtained.
///
/// HTTP error statuses are not transport errors: they come back as a
/// [`Response`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// The host could not be reached.
    #[error("Failed to connect to {host}: {message}")]
    Connect { host: String, message: String },

    /// The connection broke while the request was in flight.
    #[error("Connection to {host} was broken: {message}")]
    BrokenConnection { host: String, message: String },

    /// The request did not complete within the configured timeout.
    #[error("Request to {host} timed out: {message}")]
    Timeout { host: String, message: String },

    /// The request could not be built (e.g. an invalid header value).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The session was closed.
    #[error("Session for {0} is closed")]
    SessionClosed(String),

    /// Any other transport failure.
    #[error("HTTP transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether the error means the host could not be talked to at all.
    ///
    /// Such errors make the connection try another host.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            TransportError::Connect { .. } | TransportError::BrokenConnection { .. }
        )
    }
}

/// A session bound to a single host.
///
/// Sessions are created by an [`HttpClient`] and shared by every connection of
/// a client; their lifetime is managed by the client, not by the connections.
#[async_trait]
pub trait HttpSession: Debug + Send + Sync {
    /// Base URL of the host, e.g. `http://127.0.0.1:8529`.
    fn host(&self) -> &str;

    /// Sends one request and returns the raw response.
    ///
    /// The request endpoint is already prefixed with the database path.
    async fn send_request(&self, request: &Request) -> Result<Response, TransportError>;

    /// Releases the resources held by the session.
    async fn close(&self);
}

/// Creates sessions and sends requests through them.
///
/// The default implementation is [`DefaultHttpClient`](super::DefaultHttpClient).
/// A custom client can be passed to the
/// [`ClientBuilder`](crate::client::ClientBuilder) to replace it.
#[async_trait]
pub trait HttpClient: Debug + Send + Sync {
    /// Creates a session for `host`.
    fn create_session(&self, host: &str) -> Result<Arc<dyn HttpSession>, ConfigError>;

    /// Sends `request` through `session`.
    async fn send_request(
        &self,
        session: &dyn HttpSession,
        request: &Request,
    ) -> Result<Response, TransportError> {
        session.send_request(request).await
    }

    /// Closes `session`.
    async fn close_session(&self, session: &dyn HttpSession) {
        session.close().await
    }
}
