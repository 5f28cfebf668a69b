use super::job::AsyncJob;
use crate::errors::ExecutionError;

/// Result of an API call.
///
/// Which variant is returned depends on the execution context of the
/// database wrapper the call was made through: default and transaction
/// contexts always yield `Value`, the async context yields `Job` (or `None`
/// when the server is told not to keep results).
#[derive(Debug)]
pub enum ApiResult<T> {
    /// The call completed.
    Value(T),
    /// The call was deferred; the result can be fetched through the job.
    Job(AsyncJob<T>),
    /// The call was deferred and its result discarded.
    None,
}

impl<T> ApiResult<T> {
    /// Returns the value of a completed call.
    ///
    /// Fails with [`ExecutionError::UnexpectedDeferredResult`] if the call
    /// was deferred.
    pub fn into_value(self) -> Result<T, ExecutionError> {
        match self {
            ApiResult::Value(value) => Ok(value),
            ApiResult::Job(_) => Err(ExecutionError::UnexpectedDeferredResult("an async job")),
            ApiResult::None => Err(ExecutionError::UnexpectedDeferredResult("no result")),
        }
    }

    /// The value of a completed call, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            ApiResult::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The job of a deferred call, if any.
    pub fn job(&self) -> Option<&AsyncJob<T>> {
        match self {
            ApiResult::Job(job) => Some(job),
            _ => None,
        }
    }

    /// Converts into the job of a deferred call, if any.
    pub fn into_job(self) -> Option<AsyncJob<T>> {
        match self {
            ApiResult::Job(job) => Some(job),
            _ => None,
        }
    }

    /// Whether the call was accepted without keeping a result.
    pub fn is_none(&self) -> bool {
        matches!(self, ApiResult::None)
    }

    /// Maps the value of a completed call, leaving deferred results untouched.
    pub fn map_value<U>(self, f: impl FnOnce(T) -> U) -> Result<ApiResult<U>, Self> {
        match self {
            ApiResult::Value(value) => Ok(ApiResult::Value(f(value))),
            ApiResult::None => Ok(ApiResult::None),
            job @ ApiResult::Job(_) => Err(job),
        }
    }
}
