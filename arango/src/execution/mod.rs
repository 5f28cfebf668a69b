//! This module holds entities that control how API calls are executed.
//! This includes:
//! - the [`Executor`], sending a request through a connection in one of three
//!   contexts (default, stream transaction, async job),
//! - the [`ApiResult`] returned by every API call,
//! - [`AsyncJob`] handles for calls deferred by the server.

mod executor;
mod job;
mod result;

pub use executor::{ExecutionContext, Executor, ResponseHandler};
pub use job::{AsyncJob, JobStatus};
pub use result::ApiResult;
