use std::collections::VecDeque;

use arango_http::errno::HTTP_NOT_FOUND;
use arango_http::{Method, Request};
use serde_json::Value;
use tracing::trace;

use super::{decode, ensure_success};
use crate::errors::{ApiOperation, ExecutionError, ServerError};
use crate::execution::Executor;

/// Server-side cursor over the results of an AQL query.
///
/// Results arrive in batches; the cursor keeps the current batch in memory
/// and fetches the next one when it runs dry. A cursor is stateful and is
/// advanced through `&mut self`.
#[derive(Debug)]
pub struct Cursor {
    executor: Executor,
    id: Option<String>,
    count: Option<u64>,
    cached: bool,
    has_more: bool,
    batch: VecDeque<Value>,
    extra: Value,
}

impl Cursor {
    pub(crate) fn new(executor: Executor, body: Value) -> Result<Self, ExecutionError> {
        let mut cursor = Cursor {
            executor,
            id: None,
            count: None,
            cached: false,
            has_more: false,
            batch: VecDeque::new(),
            extra: Value::Null,
        };
        cursor.apply_batch(body)?;
        Ok(cursor)
    }

    fn apply_batch(&mut self, mut body: Value) -> Result<usize, ExecutionError> {
        let results = match body.get_mut("result").map(Value::take) {
            Some(Value::Array(results)) => results,
            Some(other) => {
                return Err(ExecutionError::deserialization(format!(
                    "Expected a result batch, got {other}"
                )))
            }
            None => Vec::new(),
        };
        if let Some(id) = body.get("id").and_then(Value::as_str) {
            self.id = Some(id.to_owned());
        }
        if let Some(count) = body.get("count").and_then(Value::as_u64) {
            self.count = Some(count);
        }
        if let Some(extra) = body.get_mut("extra") {
            self.extra = extra.take();
        }
        self.cached = body.get("cached").and_then(Value::as_bool).unwrap_or(false);
        self.has_more = body.get("hasMore").and_then(Value::as_bool).unwrap_or(false);

        let fetched = results.len();
        self.batch.extend(results);
        Ok(fetched)
    }

    /// ID of the server-side cursor; `None` if all results fit in the first batch.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Total number of results, if requested with `count`.
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    /// Whether the results came from the query cache.
    pub fn cached(&self) -> bool {
        self.cached
    }

    /// Whether the server holds more batches.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Query statistics, warnings and profile data.
    pub fn extra(&self) -> &Value {
        &self.extra
    }

    /// Results fetched but not yet consumed.
    pub fn batch(&self) -> &VecDeque<Value> {
        &self.batch
    }

    /// Whether every result has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.batch.is_empty() && !self.has_more
    }

    /// Returns the next result, fetching a new batch if needed.
    pub async fn next(&mut self) -> Result<Option<Value>, ExecutionError> {
        if self.batch.is_empty() && self.has_more {
            self.fetch().await?;
        }
        Ok(self.batch.pop_front())
    }

    /// Fetches the next batch from the server and appends it to the
    /// current one. Returns the number of results fetched.
    pub async fn fetch(&mut self) -> Result<usize, ExecutionError> {
        let Some(id) = self.id.clone() else {
            return Ok(0);
        };
        let request = Request::new(Method::Post, format!("/_api/cursor/{id}"));
        let deserializer = self.executor.deserializer();
        let body = self
            .executor
            .execute(request, move |request, response| {
                ensure_success(ApiOperation::CursorNext, request, &response)?;
                decode(&*deserializer, &response)
            })
            .await?
            .into_value()?;
        let fetched = self.apply_batch(body)?;
        trace!(cursor_id = %id, fetched, has_more = self.has_more, "Fetched cursor batch");
        Ok(fetched)
    }

    /// Drains the cursor into a vector.
    pub async fn collect(mut self) -> Result<Vec<Value>, ExecutionError> {
        let mut results = Vec::with_capacity(self.batch.len());
        while let Some(value) = self.next().await? {
            results.push(value);
        }
        Ok(results)
    }

    /// Deletes the server-side cursor and drops unconsumed results.
    ///
    /// Returns `false` if there was no server-side cursor, or it was already
    /// gone and `ignore_missing` is set.
    pub async fn close(&mut self, ignore_missing: bool) -> Result<bool, ExecutionError> {
        self.batch.clear();
        self.has_more = false;
        let Some(id) = self.id.take() else {
            return Ok(false);
        };
        let request = Request::new(Method::Delete, format!("/_api/cursor/{id}"));
        self.executor
            .execute(request, move |request, response| {
                if response.is_success() {
                    Ok(true)
                } else if response.status_code == HTTP_NOT_FOUND && ignore_missing {
                    Ok(false)
                } else {
                    Err(ServerError::new(ApiOperation::CursorClose, request, &response).into())
                }
            })
            .await?
            .into_value()
    }
}
