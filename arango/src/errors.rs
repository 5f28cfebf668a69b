//! This module contains various errors which can be returned by the driver.

use std::fmt::{self, Display};
use std::sync::Arc;

pub use arango_http::{DeserializationError, SerializationError};
use arango_http::{Method, Request, Response};
use thiserror::Error;

pub use crate::authentication::JwtError;
use crate::authentication::TextEncoding;
pub use crate::network::TransportError;

/// Error that occurred during query execution.
///
/// This is the error type of every API call made through a database wrapper.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum ExecutionError {
    /// The client or connection was configured incorrectly.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No host could be reached within the retry budget.
    #[error("Can't connect to host(s) within limit ({max_tries}) for {method} {endpoint}")]
    ConnectionAborted {
        /// Method of the abandoned request.
        method: Method,
        /// Endpoint of the abandoned request, including the database prefix.
        endpoint: String,
        /// The configured maximum number of attempts.
        max_tries: usize,
        /// The connectivity failure of the last attempt.
        #[source]
        last_error: Option<TransportError>,
    },

    /// The transport failed in a way that is not retried across hosts (e.g. a timeout).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server rejected the credentials (HTTP 401 or 403).
    #[error("Authentication failed: {0}")]
    Authentication(ServerError),

    /// The JWT token could not be refreshed.
    #[error(transparent)]
    JwtRefresh(#[from] JwtRefreshError),

    /// There was no token to build an `Authorization` header from.
    #[error("Failed to generate authorization header")]
    AuthHeader,

    /// The server answered with an error for the requested operation.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// A payload could not be serialized.
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// A response body could not be deserialized or had an unexpected shape.
    #[error(transparent)]
    Deserialization(#[from] DeserializationError),

    /// A request payload could not be compressed.
    #[error(transparent)]
    Compression(#[from] CompressionError),

    /// A document handle or body could not be resolved to a document ID
    /// of the collection.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// The result of an async job was requested before the job finished.
    #[error("Async job {job_id} is not done yet")]
    JobResultNotReady {
        /// ID of the job.
        job_id: String,
    },

    /// An immediate value was expected, but the call was deferred.
    #[error("Expected an immediate result, got {0}")]
    UnexpectedDeferredResult(&'static str),
}

impl ExecutionError {
    /// Returns the server error, if this is one (including authentication failures).
    pub fn as_server_error(&self) -> Option<&ServerError> {
        match self {
            ExecutionError::Server(e) | ExecutionError::Authentication(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn deserialization(message: impl Display) -> Self {
        ExecutionError::Deserialization(DeserializationError(message.to_string().into()))
    }
}

/// Error raised synchronously when the client, a resolver or a connection
/// is configured incorrectly. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// There needs to be at least one host to connect to.
    #[error("Empty host list")]
    EmptyHostList,

    /// The retry budget must allow trying every host at least once.
    #[error(
        "The maximum number of attempts ({max_tries}) cannot be lower than the number of hosts ({host_count})"
    )]
    MaxTriesBelowHostCount {
        /// Requested retry budget.
        max_tries: usize,
        /// Number of configured hosts.
        host_count: usize,
    },

    /// Unknown host resolver strategy name.
    #[error("Unsupported host resolver strategy: {0}")]
    UnsupportedResolverStrategy(String),

    /// Unknown authentication method name.
    #[error("Invalid authentication method: {0}")]
    UnsupportedAuthMethod(String),

    /// The selected authentication scheme lacks the credentials it needs.
    #[error("{0}")]
    MissingCredentials(&'static str),

    /// A host URL could not be parsed.
    #[error("Invalid host URL {host:?}: {reason}")]
    InvalidHost {
        /// The offending host.
        host: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The resolver and the session list disagree about the number of hosts.
    #[error("Host resolver expects {resolver} host(s), but {sessions} session(s) were created")]
    HostCountMismatch {
        /// Host count of the resolver.
        resolver: usize,
        /// Number of sessions.
        sessions: usize,
    },

    /// Credentials contain characters that the selected encoding cannot represent.
    #[error("Credentials cannot be encoded as {0}")]
    UnencodableCredentials(TextEncoding),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClientBuild(String),
}

/// Error raised when a JWT token cannot be refreshed from credentials.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum JwtRefreshError {
    /// The connection holds no username/password to log in with.
    #[error("Auth must be provided to refresh the token")]
    NoCredentials,

    /// The login payload could not be serialized.
    #[error("Failed to serialize auth data: {0}")]
    Serialization(#[source] SerializationError),

    /// The login request could not be completed.
    #[error("Failed to refresh the JWT token: {0}")]
    Request(#[source] Box<ExecutionError>),

    /// The server refused the login.
    #[error("Failed to refresh the JWT token: {status} {status_text}")]
    Rejected {
        /// HTTP status code of the login response.
        status: u16,
        /// HTTP status text of the login response.
        status_text: String,
    },

    /// The login response did not contain a token.
    #[error("Failed to refresh the JWT token: malformed response: {0}")]
    MalformedResponse(String),

    /// The server handed out a token that cannot be used.
    #[error("Failed to refresh the JWT token: {0}")]
    InvalidToken(#[source] JwtError),
}

/// Error raised when a request payload cannot be compressed.
#[derive(Error, Debug, Clone)]
#[error("Failed to compress request body: {0}")]
pub struct CompressionError(pub Arc<std::io::Error>);

impl From<std::io::Error> for CompressionError {
    fn from(err: std::io::Error) -> Self {
        CompressionError(Arc::new(err))
    }
}

/// The API operation a [`ServerError`] originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ApiOperation {
    /// Obtaining or presenting credentials (HTTP 401/403).
    Authentication,
    /// `GET /_api/collection`, used as a reachability and credentials check.
    Ping,
    /// `GET /_api/database/current`.
    DatabaseProperties,
    /// `GET /_api/database`.
    DatabaseList,
    /// `POST /_api/database`.
    DatabaseCreate,
    /// `DELETE /_api/database/{name}`.
    DatabaseDelete,
    /// `GET /_admin/status`.
    ServerStatus,
    /// `GET /_api/version`.
    ServerVersion,
    /// `GET /_api/collection`.
    CollectionList,
    /// `POST /_api/collection`.
    CollectionCreate,
    /// `DELETE /_api/collection/{name}`.
    CollectionDelete,
    /// `GET /_api/collection/{name}/properties`.
    CollectionProperties,
    /// `GET /_api/collection/{name}/count`.
    CollectionCount,
    /// `PUT /_api/collection/{name}/truncate`.
    CollectionTruncate,
    /// `GET` or `HEAD /_api/document/{handle}`.
    DocumentGet,
    /// `POST /_api/document/{collection}`.
    DocumentInsert,
    /// `PATCH /_api/document/{handle}`.
    DocumentUpdate,
    /// `PUT /_api/document/{handle}`.
    DocumentReplace,
    /// `DELETE /_api/document/{handle}`.
    DocumentDelete,
    /// A revision precondition failed (HTTP 412).
    DocumentRevision,
    /// `POST /_api/cursor`.
    AqlQueryExecute,
    /// `POST /_api/explain`.
    AqlQueryExplain,
    /// `POST /_api/query`.
    AqlQueryValidate,
    /// `GET /_api/query/current`.
    AqlQueryList,
    /// `DELETE /_api/query/{id}`.
    AqlQueryKill,
    /// `POST /_api/cursor/{id}`.
    CursorNext,
    /// `DELETE /_api/cursor/{id}`.
    CursorClose,
    /// `POST /_api/transaction/begin`.
    TransactionInit,
    /// `GET /_api/transaction/{id}`.
    TransactionStatus,
    /// `PUT /_api/transaction/{id}`.
    TransactionCommit,
    /// `DELETE /_api/transaction/{id}`.
    TransactionAbort,
    /// Any call sent with `x-arango-async` that was not accepted.
    AsyncExecute,
    /// `GET /_api/job/{id}`.
    AsyncJobStatus,
    /// `PUT /_api/job/{id}`.
    AsyncJobResult,
    /// `PUT /_api/job/{id}/cancel`.
    AsyncJobCancel,
    /// `DELETE /_api/job/{id}` and `DELETE /_api/job/expired`.
    AsyncJobClear,
    /// `GET /_api/job/{status}`.
    AsyncJobList,
}

impl Display for ApiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            ApiOperation::Authentication => "Authentication failed",
            ApiOperation::Ping => "Failed to ping the server",
            ApiOperation::DatabaseProperties => "Failed to retrieve database properties",
            ApiOperation::DatabaseList => "Failed to list databases",
            ApiOperation::DatabaseCreate => "Failed to create database",
            ApiOperation::DatabaseDelete => "Failed to delete database",
            ApiOperation::ServerStatus => "Failed to retrieve server status",
            ApiOperation::ServerVersion => "Failed to retrieve server version",
            ApiOperation::CollectionList => "Failed to list collections",
            ApiOperation::CollectionCreate => "Failed to create collection",
            ApiOperation::CollectionDelete => "Failed to delete collection",
            ApiOperation::CollectionProperties => "Failed to retrieve collection properties",
            ApiOperation::CollectionCount => "Failed to count documents",
            ApiOperation::CollectionTruncate => "Failed to truncate collection",
            ApiOperation::DocumentGet => "Failed to retrieve document",
            ApiOperation::DocumentInsert => "Failed to insert document",
            ApiOperation::DocumentUpdate => "Failed to update document",
            ApiOperation::DocumentReplace => "Failed to replace document",
            ApiOperation::DocumentDelete => "Failed to delete document",
            ApiOperation::DocumentRevision => "Document revision mismatch",
            ApiOperation::AqlQueryExecute => "Failed to execute query",
            ApiOperation::AqlQueryExplain => "Failed to explain query",
            ApiOperation::AqlQueryValidate => "Failed to validate query",
            ApiOperation::AqlQueryList => "Failed to list running queries",
            ApiOperation::AqlQueryKill => "Failed to kill query",
            ApiOperation::CursorNext => "Failed to fetch the next cursor batch",
            ApiOperation::CursorClose => "Failed to close cursor",
            ApiOperation::TransactionInit => "Failed to begin transaction",
            ApiOperation::TransactionStatus => "Failed to retrieve transaction status",
            ApiOperation::TransactionCommit => "Failed to commit transaction",
            ApiOperation::TransactionAbort => "Failed to abort transaction",
            ApiOperation::AsyncExecute => "Failed to start async execution",
            ApiOperation::AsyncJobStatus => "Failed to retrieve async job status",
            ApiOperation::AsyncJobResult => "Failed to retrieve async job result",
            ApiOperation::AsyncJobCancel => "Failed to cancel async job",
            ApiOperation::AsyncJobClear => "Failed to clear async job results",
            ApiOperation::AsyncJobList => "Failed to list async jobs",
        };
        f.write_str(description)
    }
}

/// An error reported by the server for a specific operation.
///
/// Carries everything needed to correlate the failure with server logs:
/// the HTTP status, the server's own error number and message, and the
/// original request and response.
#[derive(Debug, Clone)]
pub struct ServerError {
    /// The operation that failed.
    pub operation: ApiOperation,
    /// HTTP status code.
    pub http_code: u16,
    /// HTTP status text.
    pub http_status_text: String,
    /// Server error number (`errorNum`), if reported.
    pub error_code: Option<i64>,
    /// Server error message (`errorMessage`), if reported.
    pub error_message: Option<String>,
    /// Additional explanation added by the driver.
    pub hint: Option<String>,
    /// HTTP method of the request.
    pub method: Method,
    /// Resolved URL of the request.
    pub url: String,
    /// The request that failed.
    pub request: Box<Request>,
    /// The response the server sent.
    pub response: Box<Response>,
}

impl ServerError {
    /// Builds the error out of a normalized response.
    pub fn new(operation: ApiOperation, request: &Request, response: &Response) -> Self {
        ServerError {
            operation,
            http_code: response.status_code,
            http_status_text: response.status_text.clone(),
            error_code: response.error_code,
            error_message: response.error_message.clone(),
            hint: None,
            method: response.method,
            url: response.url.clone(),
            request: Box::new(request.clone()),
            response: Box::new(response.clone()),
        }
    }

    /// Attaches an explanation that takes precedence over the server message.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// The most specific message available: the hint, the server message, or the status text.
    pub fn message(&self) -> &str {
        self.hint
            .as_deref()
            .or(self.error_message.as_deref())
            .unwrap_or(&self.http_status_text)
    }
}

impl Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [HTTP {}]", self.operation, self.http_code)?;
        if let Some(code) = self.error_code {
            write!(f, "[ERR {code}]")?;
        }
        write!(f, " {} ({} {})", self.message(), self.method, self.url)
    }
}

impl std::error::Error for ServerError {}
