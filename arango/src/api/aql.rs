use arango_http::errno::HTTP_NOT_FOUND;
use arango_http::{Method, Request};
use serde_json::{json, Map, Value};

use super::cursor::Cursor;
use super::{decode, ensure_success, strip_envelope};
use crate::errors::{ApiOperation, ExecutionError, ServerError};
use crate::execution::{ApiResult, ExecutionContext, Executor};

/// Options of [`Aql::execute`]. Unset fields use the server default.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Values of the bind parameters (`@name`, `@@collection`).
    pub bind_vars: Option<Map<String, Value>>,
    /// Have the server compute the total number of results.
    pub count: Option<bool>,
    /// Maximum number of results transferred per round trip.
    pub batch_size: Option<u64>,
    /// Use the AQL query results cache.
    pub cache: Option<bool>,
    /// Maximum memory the query may use, in bytes.
    pub memory_limit: Option<u64>,
    /// Time-to-live of the cursor on the server, in seconds.
    pub ttl: Option<u64>,
    /// Allow reads from followers in a cluster.
    pub allow_dirty_read: Option<bool>,
    /// Extra options sent as the `options` object, e.g. `fullCount` or `profile`.
    pub options: Option<Map<String, Value>>,
}

impl QueryOptions {
    fn body(&self, query: &str) -> Value {
        let mut body = Map::new();
        body.insert("query".to_owned(), Value::from(query));
        let fields = [
            ("count", self.count.map(Value::from)),
            ("batchSize", self.batch_size.map(Value::from)),
            ("bindVars", self.bind_vars.clone().map(Value::Object)),
            ("cache", self.cache.map(Value::from)),
            ("memoryLimit", self.memory_limit.map(Value::from)),
            ("ttl", self.ttl.map(Value::from)),
            ("options", self.options.clone().map(Value::Object)),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                body.insert(name.to_owned(), value);
            }
        }
        Value::Object(body)
    }
}

/// AQL API wrapper.
#[derive(Debug, Clone)]
pub struct Aql {
    executor: Executor,
}

impl Aql {
    pub(crate) fn new(executor: Executor) -> Self {
        Aql { executor }
    }

    /// Runs a query and returns a cursor over its results.
    ///
    /// A cursor obtained through an async job fetches its remaining batches
    /// directly, outside of the async context.
    pub async fn execute(
        &self,
        query: &str,
        options: &QueryOptions,
    ) -> Result<ApiResult<Cursor>, ExecutionError> {
        let mut request = Request::new(Method::Post, "/_api/cursor")
            .with_data(self.executor.serialize(&options.body(query))?);
        if let Some(dirty) = options.allow_dirty_read {
            request = request.with_header("x-arango-allow-dirty-read", dirty.to_string());
        }

        let cursor_executor = match self.executor.context() {
            ExecutionContext::Async { .. } => self.executor.to_default(),
            _ => self.executor.clone(),
        };
        let deserializer = self.executor.deserializer();
        self.executor
            .execute(request, move |request, response| {
                ensure_success(ApiOperation::AqlQueryExecute, request, &response)?;
                Cursor::new(cursor_executor.clone(), decode(&*deserializer, &response)?)
            })
            .await
    }

    /// Returns the execution plan of a query without running it.
    pub async fn explain(
        &self,
        query: &str,
        bind_vars: Option<Map<String, Value>>,
        options: Option<Map<String, Value>>,
    ) -> Result<ApiResult<Value>, ExecutionError> {
        let mut body = json!({ "query": query });
        if let Some(bind_vars) = bind_vars {
            body["bindVars"] = Value::Object(bind_vars);
        }
        if let Some(options) = options {
            body["options"] = Value::Object(options);
        }
        let request =
            Request::new(Method::Post, "/_api/explain").with_data(self.executor.serialize(&body)?);
        let deserializer = self.executor.deserializer();
        self.executor
            .execute(request, move |request, response| {
                ensure_success(ApiOperation::AqlQueryExplain, request, &response)?;
                Ok(strip_envelope(decode(&*deserializer, &response)?))
            })
            .await
    }

    /// Parses a query without running it and returns the collections and
    /// bind parameters it refers to.
    pub async fn validate(&self, query: &str) -> Result<ApiResult<Value>, ExecutionError> {
        let request = Request::new(Method::Post, "/_api/query")
            .with_data(self.executor.serialize(&json!({ "query": query }))?);
        let deserializer = self.executor.deserializer();
        self.executor
            .execute(request, move |request, response| {
                ensure_success(ApiOperation::AqlQueryValidate, request, &response)?;
                Ok(strip_envelope(decode(&*deserializer, &response)?))
            })
            .await
    }

    /// Lists the running queries.
    ///
    /// `all_queries` covers every database and is only allowed in `_system`.
    pub async fn queries(&self, all_queries: bool) -> Result<ApiResult<Vec<Value>>, ExecutionError> {
        let request =
            Request::new(Method::Get, "/_api/query/current").with_param("all", all_queries);
        let deserializer = self.executor.deserializer();
        self.executor
            .execute(request, move |request, response| {
                ensure_success(ApiOperation::AqlQueryList, request, &response)?;
                match decode(&*deserializer, &response)? {
                    Value::Array(queries) => Ok(queries),
                    other => Err(ExecutionError::deserialization(format!(
                        "Expected a list of queries, got {other}"
                    ))),
                }
            })
            .await
    }

    /// Kills a running query.
    ///
    /// Returns `false` if the query was not found and `ignore_missing` is set.
    pub async fn kill(
        &self,
        query_id: &str,
        ignore_missing: bool,
        all_queries: bool,
    ) -> Result<ApiResult<bool>, ExecutionError> {
        let request = Request::new(Method::Delete, format!("/_api/query/{query_id}"))
            .with_param("all", all_queries);
        self.executor
            .execute(request, move |request, response| {
                if response.is_success() {
                    Ok(true)
                } else if response.status_code == HTTP_NOT_FOUND && ignore_missing {
                    Ok(false)
                } else {
                    Err(ServerError::new(ApiOperation::AqlQueryKill, request, &response).into())
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use serde_json::{json, Value};

    use super::{Aql, QueryOptions};
    use crate::errors::{ApiOperation, ExecutionError};
    use crate::execution::{ApiResult, ExecutionContext, Executor};
    use crate::network::{BasicConnection, Connection};
    use crate::utils::test_utils::{connection_parts, MockHttpClient, Outcome};

    fn aql(client: &Arc<MockHttpClient>, context: ExecutionContext) -> Aql {
        let parts = connection_parts(client, &["http://a"], "single", None);
        let connection: Arc<dyn Connection> = Arc::new(BasicConnection::new(parts, None).unwrap());
        Aql::new(Executor::new(connection, context))
    }

    #[tokio::test]
    async fn execute_sends_only_set_options() {
        let client = MockHttpClient::new();
        client.session("http://a").push(Outcome::json(
            201,
            json!({"result": [1, 2], "hasMore": false, "count": 2, "error": false, "code": 201}),
        ));

        let options = QueryOptions {
            count: Some(true),
            batch_size: Some(2),
            bind_vars: Some(json!({"@col": "students"}).as_object().unwrap().clone()),
            allow_dirty_read: Some(true),
            ..Default::default()
        };
        let cursor = aql(&client, ExecutionContext::Default)
            .execute("FOR s IN @@col RETURN s", &options)
            .await
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(cursor.count(), Some(2));
        assert!(!cursor.has_more());

        let request = &client.requests()[0].request;
        assert_eq!(request.endpoint(), "/_db/_system/_api/cursor");
        assert_eq!(request.header("x-arango-allow-dirty-read"), Some("true"));
        let body: Value = serde_json::from_slice(request.data().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({
                "query": "FOR s IN @@col RETURN s",
                "count": true,
                "batchSize": 2,
                "bindVars": {"@col": "students"}
            })
        );
    }

    #[tokio::test]
    async fn execute_failure_is_a_server_error() {
        let client = MockHttpClient::new();
        client.session("http://a").push(Outcome::json(
            400,
            json!({"error": true, "errorNum": 1501, "errorMessage": "syntax error"}),
        ));
        let err = aql(&client, ExecutionContext::Default)
            .execute("FOR", &QueryOptions::default())
            .await
            .unwrap_err();
        assert_matches!(
            err,
            ExecutionError::Server(e) if e.operation == ApiOperation::AqlQueryExecute
                && e.error_code == Some(1501)
        );
    }

    #[tokio::test]
    async fn async_cursor_uses_default_executor() {
        let client = MockHttpClient::new();
        let session = client.session("http://a");
        session.push(Outcome::json(202, json!({})).with_header("x-arango-async-id", "9"));
        session.push(
            Outcome::json(201, json!({"result": [1], "hasMore": true, "id": "c1"}))
                .with_header("x-arango-async-id", "9"),
        );
        session.push(Outcome::json(200, json!({"result": [2], "hasMore": false, "id": "c1"})));

        let result = aql(&client, ExecutionContext::Async { return_result: true })
            .execute("FOR i IN 1..2 RETURN i", &QueryOptions::default())
            .await
            .unwrap();
        let job = match result {
            ApiResult::Job(job) => job,
            other => panic!("expected a job, got {other:?}"),
        };
        let mut cursor = job.result().await.unwrap();
        assert_eq!(cursor.next().await.unwrap(), Some(json!(1)));
        assert_eq!(cursor.next().await.unwrap(), Some(json!(2)));

        let requests = client.requests();
        assert_eq!(requests[2].request.endpoint(), "/_db/_system/_api/cursor/c1");
        assert_eq!(requests[2].request.header("x-arango-async"), None);
    }

    #[tokio::test]
    async fn queries_and_kill() {
        let client = MockHttpClient::new();
        let session = client.session("http://a");
        session.push(Outcome::json(200, json!([{"id": "17", "query": "RETURN SLEEP(10)"}])));
        session.push(Outcome::json(200, json!({"error": false})));
        session.push(Outcome::json(404, json!({"error": true, "errorNum": 1591})));

        let aql = aql(&client, ExecutionContext::Default);
        let queries = aql.queries(false).await.unwrap().into_value().unwrap();
        assert_eq!(queries[0]["id"], "17");
        assert!(aql.kill("17", false, false).await.unwrap().into_value().unwrap());
        assert!(!aql.kill("17", true, false).await.unwrap().into_value().unwrap());

        let requests = client.requests();
        assert_eq!(requests[0].request.params()["all"], "0");
        assert_eq!(requests[1].request.endpoint(), "/_db/_system/_api/query/17");
    }

    #[tokio::test]
    async fn explain_and_validate_strip_envelope() {
        let client = MockHttpClient::new();
        let session = client.session("http://a");
        session.push(Outcome::json(
            200,
            json!({"plan": {"nodes": []}, "cacheable": true, "error": false, "code": 200}),
        ));
        session.push(Outcome::json(
            200,
            json!({"bindVars": [], "collections": ["students"], "error": false, "code": 200}),
        ));

        let aql = aql(&client, ExecutionContext::Default);
        let plan = aql
            .explain("FOR s IN students RETURN s", None, None)
            .await
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(plan, json!({"plan": {"nodes": []}, "cacheable": true}));

        let parsed = aql
            .validate("FOR s IN students RETURN s")
            .await
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(parsed["collections"], json!(["students"]));
        assert_eq!(client.requests()[1].request.endpoint(), "/_db/_system/_api/query");
    }
}
