use std::fmt::{self, Display};
use std::sync::Arc;

use arango_http::errno::HTTP_ACCEPTED;
use arango_http::{Deserializer, Request, Response, Serializer};
use serde_json::Value;
use tracing::trace;

use super::job::AsyncJob;
use super::result::ApiResult;
use crate::errors::{ApiOperation, ExecutionError, ServerError};
use crate::network::Connection;

/// Turns the response to a request into a typed result.
///
/// Handlers of deferred calls are kept by the [`AsyncJob`] and run once the
/// job result is fetched, hence the `'static` bound.
pub type ResponseHandler<T> =
    Arc<dyn Fn(&Request, Response) -> Result<T, ExecutionError> + Send + Sync>;

/// How requests are executed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExecutionContext {
    /// Requests are sent as they are.
    Default,
    /// Requests join the stream transaction with the given ID.
    Transaction(String),
    /// Requests are queued by the server and executed in the background.
    Async {
        /// Whether the server keeps the result for later retrieval.
        return_result: bool,
    },
}

impl Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionContext::Default => f.write_str("default"),
            ExecutionContext::Transaction(_) => f.write_str("transaction"),
            ExecutionContext::Async { .. } => f.write_str("async"),
        }
    }
}

/// Sends requests through a connection and hands responses to a handler.
#[derive(Debug, Clone)]
pub struct Executor {
    connection: Arc<dyn Connection>,
    context: ExecutionContext,
}

impl Executor {
    /// Creates an executor for `connection` in `context`.
    pub fn new(connection: Arc<dyn Connection>, context: ExecutionContext) -> Self {
        Executor {
            connection,
            context,
        }
    }

    /// The same connection, in the default context.
    pub fn to_default(&self) -> Executor {
        Executor::new(Arc::clone(&self.connection), ExecutionContext::Default)
    }

    /// The connection requests are sent through.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Execution context of requests.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Name of the database the connection addresses.
    pub fn db_name(&self) -> &str {
        self.connection.db_name()
    }

    /// Serializer of the connection.
    pub fn serializer(&self) -> &dyn Serializer {
        self.connection.base().serializer()
    }

    /// A shared handle to the deserializer of the connection.
    pub fn deserializer(&self) -> Arc<dyn Deserializer> {
        self.connection.base().deserializer_handle()
    }

    /// Serializes a request payload.
    pub fn serialize(&self, data: &Value) -> Result<String, ExecutionError> {
        Ok(self.serializer().dumps(data)?)
    }

    /// Deserializes a response body.
    pub fn deserialize(&self, data: &[u8]) -> Result<Value, ExecutionError> {
        Ok(self.connection.base().deserializer().loads(data)?)
    }

    /// Sends `request` and converts the response with `handler`.
    ///
    /// In the async context the handler is not run; the call yields a job
    /// (or nothing, if results are not kept) instead.
    pub async fn execute<T, F>(
        &self,
        request: Request,
        handler: F,
    ) -> Result<ApiResult<T>, ExecutionError>
    where
        T: Send + 'static,
        F: Fn(&Request, Response) -> Result<T, ExecutionError> + Send + Sync + 'static,
    {
        match &self.context {
            ExecutionContext::Default => {
                let response = self.connection.send_request(request.clone()).await?;
                handler(&request, response).map(ApiResult::Value)
            }
            ExecutionContext::Transaction(id) => {
                let request = request.with_header("x-arango-trx-id", id.as_str());
                let response = self.connection.send_request(request.clone()).await?;
                handler(&request, response).map(ApiResult::Value)
            }
            ExecutionContext::Async { return_result } => {
                let mode = if *return_result { "store" } else { "true" };
                let request = request.with_header("x-arango-async", mode);
                let response = self.connection.send_request(request.clone()).await?;
                if response.status_code != HTTP_ACCEPTED {
                    return Err(
                        ServerError::new(ApiOperation::AsyncExecute, &request, &response).into(),
                    );
                }
                if !*return_result {
                    return Ok(ApiResult::None);
                }

                let job_id = response.header("x-arango-async-id").ok_or_else(|| {
                    ExecutionError::deserialization("Missing x-arango-async-id header")
                })?;
                trace!(job_id, request = %request, "Request deferred");
                Ok(ApiResult::Job(AsyncJob::new(
                    self.to_default(),
                    job_id.to_owned(),
                    request,
                    Arc::new(handler),
                )))
            }
        }
    }
}
