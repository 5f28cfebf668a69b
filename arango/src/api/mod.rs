//! Wrappers over the REST endpoints of a database.
//!
//! Every call goes through the [`Executor`](crate::execution::Executor) of the
//! wrapper it was made on, so the same method returns a value, joins a stream
//! transaction, or is deferred as an async job depending on where it was
//! called from.

mod aql;
mod collection;
mod cursor;
mod database;

pub use aql::{Aql, QueryOptions};
pub use collection::{
    DeleteOptions, DocumentHandle, DocumentOptions, InsertOptions, OverwriteMode,
    StandardCollection, UpdateOptions,
};
pub use cursor::Cursor;
pub use database::{
    AsyncDatabase, CollectionOptions, CollectionType, Database, StandardDatabase,
    TransactionDatabase, TransactionOptions, TransactionStatus, UserOptions,
};

use arango_http::{Deserializer, Request, Response};
use serde_json::Value;

use crate::errors::{ApiOperation, ExecutionError, ServerError};

/// Fails with a [`ServerError`] for `operation` unless the response is 2xx.
fn ensure_success(
    operation: ApiOperation,
    request: &Request,
    response: &Response,
) -> Result<(), ExecutionError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(ServerError::new(operation, request, response).into())
    }
}

fn decode(deserializer: &dyn Deserializer, response: &Response) -> Result<Value, ExecutionError> {
    Ok(deserializer.loads(&response.raw_body)?)
}

/// Moves `key` out of a decoded body.
fn take_field(mut body: Value, key: &str) -> Result<Value, ExecutionError> {
    match body.get_mut(key) {
        Some(value) => Ok(value.take()),
        None => Err(ExecutionError::deserialization(format!(
            "Missing \"{key}\" in response body"
        ))),
    }
}

/// Drops the envelope fields the server adds to every successful reply.
fn strip_envelope(mut body: Value) -> Value {
    if let Value::Object(map) = &mut body {
        map.remove("error");
        map.remove("code");
    }
    body
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{strip_envelope, take_field};
    use crate::errors::ExecutionError;

    #[test]
    fn take_field_reports_missing_keys() {
        assert_eq!(take_field(json!({"result": [1]}), "result").unwrap(), json!([1]));
        let err = take_field(json!({"error": false}), "result").unwrap_err();
        assert!(matches!(err, ExecutionError::Deserialization(_)));
        assert!(err.to_string().contains("\"result\""));
    }

    #[test]
    fn envelope_is_stripped() {
        let body = json!({"error": false, "code": 200, "count": 3});
        assert_eq!(strip_envelope(body), json!({"count": 3}));
    }
}
