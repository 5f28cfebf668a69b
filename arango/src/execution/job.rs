use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arango_http::errno::{HTTP_NOT_FOUND, HTTP_NO_CONTENT, HTTP_OK};
use arango_http::{Method, Request};
use tracing::trace;

use super::executor::{Executor, ResponseHandler};
use crate::errors::{ApiOperation, ExecutionError, ServerError};

/// Status of an async job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Queued or running.
    Pending,
    /// Finished; the result can be fetched.
    Done,
}

/// Handle to a call deferred by the server.
///
/// The job remembers how to convert the stored response, so
/// [`AsyncJob::result`] yields the same type the call would have returned
/// if executed directly.
pub struct AsyncJob<T> {
    executor: Executor,
    id: String,
    request: Arc<Request>,
    handler: ResponseHandler<T>,
}

impl<T> fmt::Debug for AsyncJob<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncJob")
            .field("id", &self.id)
            .field("request", &self.request.to_string())
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> AsyncJob<T> {
    pub(crate) fn new(
        executor: Executor,
        id: String,
        request: Request,
        handler: ResponseHandler<T>,
    ) -> Self {
        AsyncJob {
            executor,
            id,
            request: Arc::new(request),
            handler,
        }
    }

    /// Server-side ID of the job.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Fetches the current status of the job.
    ///
    /// Fails if the job is unknown, e.g. because its result was already fetched.
    pub async fn status(&self) -> Result<JobStatus, ExecutionError> {
        let request = Request::new(Method::Get, format!("/_api/job/{}", self.id));
        self.executor
            .execute(request, |request, response| match response.status_code {
                HTTP_OK => Ok(JobStatus::Done),
                HTTP_NO_CONTENT => Ok(JobStatus::Pending),
                _ => Err(ServerError::new(ApiOperation::AsyncJobStatus, request, &response).into()),
            })
            .await?
            .into_value()
    }

    /// Fetches the result of a finished job.
    ///
    /// The server forgets the result once it has been fetched. Fails with
    /// [`ExecutionError::JobResultNotReady`] if the job is still pending.
    pub async fn result(&self) -> Result<T, ExecutionError> {
        let request = Request::new(Method::Put, format!("/_api/job/{}", self.id));
        let job_id = self.id.clone();
        let original = Arc::clone(&self.request);
        let handler = Arc::clone(&self.handler);
        self.executor
            .execute(request, move |request, response| {
                if response.status_code == HTTP_NO_CONTENT
                    && response.header("x-arango-async-id").is_none()
                {
                    return Err(ExecutionError::JobResultNotReady {
                        job_id: job_id.clone(),
                    });
                }
                if response.status_code == HTTP_NOT_FOUND
                    && response.header("x-arango-async-id").is_none()
                {
                    return Err(ServerError::new(ApiOperation::AsyncJobResult, request, &response)
                        .with_hint(format!("Async job {job_id} not found"))
                        .into());
                }
                handler(&original, response)
            })
            .await?
            .into_value()
    }

    /// Polls the job every `interval` until it is done, then fetches its result.
    pub async fn wait(&self, interval: Duration) -> Result<T, ExecutionError> {
        while self.status().await? == JobStatus::Pending {
            trace!(job_id = %self.id, "Async job still pending");
            tokio::time::sleep(interval).await;
        }
        self.result().await
    }

    /// Cancels a pending job.
    ///
    /// Returns `false` if the job was not found and `ignore_missing` is set.
    pub async fn cancel(&self, ignore_missing: bool) -> Result<bool, ExecutionError> {
        let request = Request::new(Method::Put, format!("/_api/job/{}/cancel", self.id));
        self.executor
            .execute(request, move |request, response| {
                if response.is_success() {
                    Ok(true)
                } else if response.status_code == HTTP_NOT_FOUND && ignore_missing {
                    Ok(false)
                } else {
                    Err(ServerError::new(ApiOperation::AsyncJobCancel, request, &response).into())
                }
            })
            .await?
            .into_value()
    }

    /// Deletes the stored result of the job.
    ///
    /// Returns `false` if the job was not found and `ignore_missing` is set.
    pub async fn clear(&self, ignore_missing: bool) -> Result<bool, ExecutionError> {
        let request = Request::new(Method::Delete, format!("/_api/job/{}", self.id));
        self.executor
            .execute(request, move |request, response| {
                if response.is_success() {
                    Ok(true)
                } else if response.status_code == HTTP_NOT_FOUND && ignore_missing {
                    Ok(false)
                } else {
                    Err(ServerError::new(ApiOperation::AsyncJobClear, request, &response).into())
                }
            })
            .await?
            .into_value()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use arango_http::{Method, Request, Response};
    use assert_matches::assert_matches;
    use ntest::timeout;
    use serde_json::{json, Value};

    use super::{AsyncJob, JobStatus};
    use crate::errors::{ApiOperation, ExecutionError};
    use crate::execution::{ExecutionContext, Executor};
    use crate::network::{BasicConnection, Connection};
    use crate::utils::test_utils::{connection_parts, MockHttpClient, Outcome};

    fn version_job(client: &Arc<MockHttpClient>) -> AsyncJob<Value> {
        let parts = connection_parts(client, &["http://a"], "single", None);
        let connection: Arc<dyn Connection> = Arc::new(BasicConnection::new(parts, None).unwrap());
        AsyncJob::new(
            Executor::new(connection, ExecutionContext::Default),
            "42".to_owned(),
            Request::new(Method::Get, "/_api/version"),
            Arc::new(
                |_: &Request, response: Response| -> Result<Value, ExecutionError> {
                    Ok(serde_json::from_slice(&response.raw_body).unwrap())
                },
            ),
        )
    }

    #[tokio::test]
    async fn status_maps_codes() {
        let client = MockHttpClient::new();
        let session = client.session("http://a");
        session.push(Outcome::raw(204, ""));
        session.push(Outcome::json(200, json!({})));
        session.push(Outcome::json(404, json!({"error": true, "errorNum": 404})));

        let job = version_job(&client);
        assert_eq!(job.status().await.unwrap(), JobStatus::Pending);
        assert_eq!(job.status().await.unwrap(), JobStatus::Done);
        assert_matches!(
            job.status().await,
            Err(ExecutionError::Server(e)) if e.operation == ApiOperation::AsyncJobStatus
        );
        assert_eq!(client.requests()[0].request.endpoint(), "/_db/_system/_api/job/42");
    }

    #[tokio::test]
    async fn result_runs_original_handler() {
        let client = MockHttpClient::new();
        let session = client.session("http://a");
        session.push(Outcome::raw(204, ""));
        session.push(
            Outcome::json(200, json!({"server": "arango", "version": "3.12.0"}))
                .with_header("x-arango-async-id", "42"),
        );

        let job = version_job(&client);
        assert_matches!(
            job.result().await,
            Err(ExecutionError::JobResultNotReady { job_id }) if job_id == "42"
        );
        let value = job.result().await.unwrap();
        assert_eq!(value["version"], "3.12.0");
        assert_eq!(client.requests()[1].request.method(), Method::Put);
    }

    #[tokio::test]
    #[timeout(5000)]
    async fn wait_polls_until_done() {
        let client = MockHttpClient::new();
        let session = client.session("http://a");
        session.push(Outcome::raw(204, ""));
        session.push(Outcome::raw(204, ""));
        session.push(Outcome::json(200, json!({})));
        session.push(Outcome::json(200, json!({"done": true})).with_header("x-arango-async-id", "42"));

        let job = version_job(&client);
        let value = job.wait(Duration::from_millis(1)).await.unwrap();
        assert_eq!(value, json!({"done": true}));
        assert_eq!(client.requests().len(), 4);
    }

    #[tokio::test]
    async fn cancel_and_clear() {
        let client = MockHttpClient::new();
        let session = client.session("http://a");
        session.push(Outcome::json(200, json!({"result": true})));
        session.push(Outcome::json(404, json!({"error": true, "errorNum": 404})));
        session.push(Outcome::json(200, json!({"result": true})));
        session.push(Outcome::json(404, json!({"error": true, "errorNum": 404})));

        let job = version_job(&client);
        assert!(job.cancel(false).await.unwrap());
        assert!(!job.cancel(true).await.unwrap());
        assert!(job.clear(false).await.unwrap());
        assert_matches!(
            job.clear(false).await,
            Err(ExecutionError::Server(e)) if e.operation == ApiOperation::AsyncJobClear
        );

        let requests = client.requests();
        assert_eq!(requests[0].request.endpoint(), "/_db/_system/_api/job/42/cancel");
        assert_eq!(requests[2].request.method(), Method::Delete);
    }
}
