use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

use arango_http::errno::{HTTP_FORBIDDEN, HTTP_NOT_FOUND};
use arango_http::{Method, Request};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::aql::Aql;
use super::collection::StandardCollection;
use super::{decode, ensure_success, strip_envelope, take_field};
use crate::errors::{ApiOperation, ExecutionError, ServerError};
use crate::execution::{ApiResult, ExecutionContext, Executor};
use crate::network::Connection;

const SYSTEM_DATABASE_ONLY: &str = "This request can only be executed in the _system database.";

/// Adds an explanation to permission errors of `_system`-only endpoints.
fn system_only(err: ExecutionError) -> ExecutionError {
    match err {
        ExecutionError::Authentication(e) if e.http_code == HTTP_FORBIDDEN => {
            ExecutionError::Authentication(e.with_hint(SYSTEM_DATABASE_ONLY))
        }
        ExecutionError::Server(e) if e.http_code == HTTP_FORBIDDEN => {
            ExecutionError::Server(e.with_hint(SYSTEM_DATABASE_ONLY))
        }
        other => other,
    }
}

fn string_list(value: Value) -> Result<Vec<String>, ExecutionError> {
    serde_json::from_value(value).map_err(ExecutionError::deserialization)
}

/// A user created together with a database.
#[derive(Debug, Clone)]
pub struct UserOptions {
    /// Name of the user.
    pub username: String,
    /// Password of the user.
    pub password: String,
    /// Whether the user can log in.
    pub active: bool,
    /// Arbitrary user data.
    pub extra: Map<String, Value>,
}

impl UserOptions {
    /// An active user without extra data.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        UserOptions {
            username: username.into(),
            password: password.into(),
            active: true,
            extra: Map::new(),
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "username": self.username,
            "passwd": self.password,
            "active": self.active,
            "extra": self.extra,
        })
    }
}

/// Kind of documents a collection holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionType {
    /// Plain documents.
    #[default]
    Document,
    /// Edges, with `_from` and `_to` attributes.
    Edge,
}

/// Properties of a new collection. Unset fields use the server default.
#[derive(Debug, Clone, Default)]
pub struct CollectionOptions {
    /// Document or edge collection.
    pub collection_type: CollectionType,
    /// Wait until writes are synced to disk.
    pub wait_for_sync: Option<bool>,
    /// Create a system collection; the name must start with `_`.
    pub is_system: Option<bool>,
    /// Key generator settings, e.g. `{"type": "autoincrement"}`.
    pub key_options: Option<Map<String, Value>>,
    /// Document validation rule.
    pub schema: Option<Map<String, Value>>,
    /// Cluster only.
    pub number_of_shards: Option<u32>,
    /// Attributes used to pick the shard of a document. Cluster only.
    pub shard_keys: Option<Vec<String>>,
    /// A number, or `"satellite"`.
    pub replication_factor: Option<Value>,
    /// Replicas that must acknowledge a write. Cluster only.
    pub write_concern: Option<u32>,
    /// Wait until all replicas are in sync before returning.
    pub wait_for_sync_replication: Option<bool>,
    /// Refuse to create the collection if there are not enough servers.
    pub enforce_replication_factor: Option<bool>,
}

impl CollectionOptions {
    fn body(&self, name: &str) -> Value {
        let type_code = match self.collection_type {
            CollectionType::Document => 2,
            CollectionType::Edge => 3,
        };
        let mut body = Map::new();
        body.insert("name".to_owned(), Value::from(name));
        body.insert("type".to_owned(), Value::from(type_code));
        let fields = [
            ("waitForSync", self.wait_for_sync.map(Value::from)),
            ("isSystem", self.is_system.map(Value::from)),
            ("keyOptions", self.key_options.clone().map(Value::Object)),
            ("schema", self.schema.clone().map(Value::Object)),
            ("numberOfShards", self.number_of_shards.map(Value::from)),
            ("shardKeys", self.shard_keys.clone().map(Value::from)),
            ("replicationFactor", self.replication_factor.clone()),
            ("writeConcern", self.write_concern.map(Value::from)),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                body.insert(name.to_owned(), value);
            }
        }
        Value::Object(body)
    }
}

/// Settings of a new stream transaction.
#[derive(Debug, Clone, Default)]
pub struct TransactionOptions {
    /// Collections read during the transaction.
    pub read: Vec<String>,
    /// Collections written with shared access.
    pub write: Vec<String>,
    /// Collections written with exclusive access.
    pub exclusive: Vec<String>,
    /// Wait until the commit is synced to disk.
    pub wait_for_sync: Option<bool>,
    /// Allow reading from undeclared collections.
    pub allow_implicit: Option<bool>,
    /// Seconds to wait for collection locks; 0 waits forever.
    pub lock_timeout: Option<u64>,
    /// Size limit of the transaction, in bytes.
    pub max_transaction_size: Option<u64>,
    /// Allow reads from followers for the whole transaction.
    pub allow_dirty_read: Option<bool>,
    /// Skip the fast, non-blocking lock round.
    pub skip_fast_lock_round: Option<bool>,
}

impl TransactionOptions {
    fn body(&self) -> Value {
        let mut collections = Map::new();
        for (kind, names) in [
            ("read", &self.read),
            ("write", &self.write),
            ("exclusive", &self.exclusive),
        ] {
            if !names.is_empty() {
                collections.insert(kind.to_owned(), Value::from(names.clone()));
            }
        }
        let mut body = Map::new();
        body.insert("collections".to_owned(), Value::Object(collections));
        let fields = [
            ("waitForSync", self.wait_for_sync.map(Value::from)),
            ("allowImplicit", self.allow_implicit.map(Value::from)),
            ("lockTimeout", self.lock_timeout.map(Value::from)),
            ("maxTransactionSize", self.max_transaction_size.map(Value::from)),
            ("skipFastLockRound", self.skip_fast_lock_round.map(Value::from)),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                body.insert(name.to_owned(), value);
            }
        }
        Value::Object(body)
    }
}

/// State of a stream transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Still accepting operations.
    Running,
    /// Committed successfully.
    Committed,
    /// Aborted; writes were discarded.
    Aborted,
}

impl FromStr for TransactionStatus {
    type Err = ExecutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(TransactionStatus::Running),
            "committed" => Ok(TransactionStatus::Committed),
            "aborted" => Ok(TransactionStatus::Aborted),
            other => Err(ExecutionError::deserialization(format!(
                "Unknown transaction status: {other}"
            ))),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransactionStatus::Running => "running",
            TransactionStatus::Committed => "committed",
            TransactionStatus::Aborted => "aborted",
        })
    }
}

/// Endpoints shared by every database wrapper.
///
/// The execution context of the wrapper decides what each call returns;
/// see [`ApiResult`].
#[derive(Debug, Clone)]
pub struct Database {
    executor: Executor,
}

impl Database {
    fn new(connection: Arc<dyn Connection>, context: ExecutionContext) -> Self {
        Database {
            executor: Executor::new(connection, context),
        }
    }

    /// Name of the database.
    pub fn name(&self) -> &str {
        self.executor.db_name()
    }

    /// The connection requests are sent through.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        self.executor.connection()
    }

    /// Execution context of this wrapper.
    pub fn context(&self) -> &ExecutionContext {
        self.executor.context()
    }

    /// The executor requests are sent through.
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Wrapper for the collection `name`. Does not check that it exists.
    pub fn collection(&self, name: impl Into<String>) -> StandardCollection {
        StandardCollection::new(self.executor.clone(), name)
    }

    /// AQL query API.
    pub fn aql(&self) -> Aql {
        Aql::new(self.executor.clone())
    }

    /// Properties of this database.
    pub async fn properties(&self) -> Result<ApiResult<Value>, ExecutionError> {
        let request = Request::new(Method::Get, "/_api/database/current");
        let deserializer = self.executor.deserializer();
        self.executor
            .execute(request, move |request, response| {
                ensure_success(ApiOperation::DatabaseProperties, request, &response)?;
                take_field(decode(&*deserializer, &response)?, "result")
            })
            .await
    }

    /// Status of the server: version, mode, host and process information.
    pub async fn status(&self) -> Result<ApiResult<Value>, ExecutionError> {
        let request = Request::new(Method::Get, "/_admin/status");
        let deserializer = self.executor.deserializer();
        self.executor
            .execute(request, move |request, response| {
                ensure_success(ApiOperation::ServerStatus, request, &response)?;
                decode(&*deserializer, &response)
            })
            .await
    }

    /// Server version, with build details if `details` is set.
    pub async fn version(&self, details: bool) -> Result<ApiResult<Value>, ExecutionError> {
        let request = Request::new(Method::Get, "/_api/version").with_param("details", details);
        let deserializer = self.executor.deserializer();
        self.executor
            .execute(request, move |request, response| {
                ensure_success(ApiOperation::ServerVersion, request, &response)?;
                Ok(strip_envelope(decode(&*deserializer, &response)?))
            })
            .await
    }

    /// Names of all databases. Only allowed in `_system`.
    pub async fn databases(&self) -> Result<ApiResult<Vec<String>>, ExecutionError> {
        let request = Request::new(Method::Get, "/_api/database");
        let deserializer = self.executor.deserializer();
        self.executor
            .execute(request, move |request, response| {
                if !response.is_success() {
                    return Err(system_only(
                        ServerError::new(ApiOperation::DatabaseList, request, &response).into(),
                    ));
                }
                string_list(take_field(decode(&*deserializer, &response)?, "result")?)
            })
            .await
            .map_err(system_only)
    }

    /// Checks whether a database exists. Only allowed in `_system`.
    pub async fn has_database(&self, name: &str) -> Result<ApiResult<bool>, ExecutionError> {
        let request = Request::new(Method::Get, "/_api/database");
        let name = name.to_owned();
        let deserializer = self.executor.deserializer();
        self.executor
            .execute(request, move |request, response| {
                if !response.is_success() {
                    return Err(system_only(
                        ServerError::new(ApiOperation::DatabaseList, request, &response).into(),
                    ));
                }
                let names = string_list(take_field(decode(&*deserializer, &response)?, "result")?)?;
                Ok(names.contains(&name))
            })
            .await
            .map_err(system_only)
    }

    /// Creates a database, optionally with its initial users. Only allowed in `_system`.
    pub async fn create_database(
        &self,
        name: &str,
        users: Option<&[UserOptions]>,
    ) -> Result<ApiResult<bool>, ExecutionError> {
        let mut body = json!({ "name": name });
        if let Some(users) = users {
            body["users"] = users.iter().map(UserOptions::to_json).collect();
        }
        let request =
            Request::new(Method::Post, "/_api/database").with_data(self.executor.serialize(&body)?);
        self.executor
            .execute(request, |request, response| {
                ensure_success(ApiOperation::DatabaseCreate, request, &response)
                    .map_err(system_only)?;
                Ok(true)
            })
            .await
            .map_err(system_only)
    }

    /// Drops a database. Only allowed in `_system`.
    ///
    /// Returns `false` if the database does not exist and `ignore_missing` is set.
    pub async fn delete_database(
        &self,
        name: &str,
        ignore_missing: bool,
    ) -> Result<ApiResult<bool>, ExecutionError> {
        let request = Request::new(Method::Delete, format!("/_api/database/{name}"));
        self.executor
            .execute(request, move |request, response| {
                if response.is_success() {
                    Ok(true)
                } else if response.status_code == HTTP_NOT_FOUND && ignore_missing {
                    Ok(false)
                } else {
                    Err(system_only(
                        ServerError::new(ApiOperation::DatabaseDelete, request, &response).into(),
                    ))
                }
            })
            .await
            .map_err(system_only)
    }

    /// Descriptions of the collections of this database.
    pub async fn collections(
        &self,
        exclude_system: Option<bool>,
    ) -> Result<ApiResult<Vec<Value>>, ExecutionError> {
        let request = Request::new(Method::Get, "/_api/collection")
            .with_opt_param("excludeSystem", exclude_system);
        let deserializer = self.executor.deserializer();
        self.executor
            .execute(request, move |request, response| {
                ensure_success(ApiOperation::CollectionList, request, &response)?;
                match take_field(decode(&*deserializer, &response)?, "result")? {
                    Value::Array(collections) => Ok(collections),
                    other => Err(ExecutionError::deserialization(format!(
                        "Expected a list of collections, got {other}"
                    ))),
                }
            })
            .await
    }

    /// Checks whether a collection exists.
    pub async fn has_collection(&self, name: &str) -> Result<ApiResult<bool>, ExecutionError> {
        let request = Request::new(Method::Get, format!("/_api/collection/{name}"));
        self.executor
            .execute(request, |request, response| {
                if response.is_success() {
                    Ok(true)
                } else if response.status_code == HTTP_NOT_FOUND {
                    Ok(false)
                } else {
                    Err(ServerError::new(ApiOperation::CollectionList, request, &response).into())
                }
            })
            .await
    }

    /// Creates a collection and returns its wrapper.
    pub async fn create_collection(
        &self,
        name: &str,
        options: &CollectionOptions,
    ) -> Result<ApiResult<StandardCollection>, ExecutionError> {
        let request = Request::new(Method::Post, "/_api/collection")
            .with_opt_param("waitForSyncReplication", options.wait_for_sync_replication)
            .with_opt_param("enforceReplicationFactor", options.enforce_replication_factor)
            .with_data(self.executor.serialize(&options.body(name))?);
        let collection = self.collection(name);
        self.executor
            .execute(request, move |request, response| {
                ensure_success(ApiOperation::CollectionCreate, request, &response)?;
                Ok(collection.clone())
            })
            .await
    }

    /// Drops a collection. `is_system` must be set to drop a system collection.
    ///
    /// Returns `false` if the collection does not exist and `ignore_missing` is set.
    pub async fn delete_collection(
        &self,
        name: &str,
        ignore_missing: bool,
        is_system: Option<bool>,
    ) -> Result<ApiResult<bool>, ExecutionError> {
        let request = Request::new(Method::Delete, format!("/_api/collection/{name}"))
            .with_opt_param("isSystem", is_system);
        self.executor
            .execute(request, move |request, response| {
                if response.is_success() {
                    Ok(true)
                } else if response.status_code == HTTP_NOT_FOUND && ignore_missing {
                    Ok(false)
                } else {
                    Err(ServerError::new(ApiOperation::CollectionDelete, request, &response).into())
                }
            })
            .await
    }
}

/// Database wrapper executing calls directly.
///
/// Also the entry point to stream transactions and async execution.
#[derive(Debug, Clone)]
pub struct StandardDatabase {
    db: Database,
}

impl StandardDatabase {
    /// Wraps `connection` in the default execution context.
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        StandardDatabase {
            db: Database::new(connection, ExecutionContext::Default),
        }
    }

    /// Begins a stream transaction.
    pub async fn begin_transaction(
        &self,
        options: &TransactionOptions,
    ) -> Result<TransactionDatabase, ExecutionError> {
        let mut request = Request::new(Method::Post, "/_api/transaction/begin")
            .with_data(self.executor.serialize(&options.body())?);
        if let Some(dirty) = options.allow_dirty_read {
            request = request.with_header("x-arango-allow-dirty-read", dirty.to_string());
        }
        let deserializer = self.executor.deserializer();
        let id = self
            .executor
            .execute(request, move |request, response| {
                ensure_success(ApiOperation::TransactionInit, request, &response)?;
                let result = take_field(decode(&*deserializer, &response)?, "result")?;
                match result.get("id").and_then(Value::as_str) {
                    Some(id) => Ok(id.to_owned()),
                    None => Err(ExecutionError::deserialization(
                        "Missing transaction ID in response body",
                    )),
                }
            })
            .await?
            .into_value()?;
        debug!(transaction_id = %id, db = self.name(), "Stream transaction started");
        Ok(self.fetch_transaction(id))
    }

    /// Wrapper for an already running transaction.
    pub fn fetch_transaction(&self, transaction_id: impl Into<String>) -> TransactionDatabase {
        TransactionDatabase::new(Arc::clone(self.connection()), transaction_id.into())
    }

    /// Wrapper whose calls are queued by the server and run in the background.
    ///
    /// If `return_result` is not set, the server discards the results and
    /// every call yields [`ApiResult::None`].
    pub fn begin_async_execution(&self, return_result: bool) -> AsyncDatabase {
        AsyncDatabase {
            db: Database::new(
                Arc::clone(self.connection()),
                ExecutionContext::Async { return_result },
            ),
        }
    }

    /// IDs of the async jobs with the given status (`"pending"` or `"done"`).
    pub async fn async_jobs(
        &self,
        status: &str,
        count: Option<u64>,
    ) -> Result<Vec<String>, ExecutionError> {
        let request = Request::new(Method::Get, format!("/_api/job/{status}"))
            .with_opt_param("count", count);
        let deserializer = self.executor.deserializer();
        self.executor
            .execute(request, move |request, response| {
                ensure_success(ApiOperation::AsyncJobList, request, &response)?;
                string_list(decode(&*deserializer, &response)?)
            })
            .await?
            .into_value()
    }

    /// Deletes stored async job results. Jobs still queued or running are not stopped.
    ///
    /// With a `threshold` (Unix timestamp, in seconds) only results created
    /// before it are deleted.
    pub async fn clear_async_jobs(&self, threshold: Option<f64>) -> Result<(), ExecutionError> {
        let request = match threshold {
            Some(stamp) => {
                Request::new(Method::Delete, "/_api/job/expired").with_param("stamp", stamp)
            }
            None => Request::new(Method::Delete, "/_api/job/all"),
        };
        self.executor
            .execute(request, |request, response| {
                ensure_success(ApiOperation::AsyncJobClear, request, &response)
            })
            .await?
            .into_value()
    }
}

impl Deref for StandardDatabase {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.db
    }
}

/// Database wrapper whose calls join a stream transaction.
///
/// Status, commit and abort are sent outside of the transaction.
#[derive(Debug, Clone)]
pub struct TransactionDatabase {
    db: Database,
    transaction_id: String,
    standard: Executor,
}

impl TransactionDatabase {
    fn new(connection: Arc<dyn Connection>, transaction_id: String) -> Self {
        TransactionDatabase {
            standard: Executor::new(Arc::clone(&connection), ExecutionContext::Default),
            db: Database::new(
                connection,
                ExecutionContext::Transaction(transaction_id.clone()),
            ),
            transaction_id,
        }
    }

    /// Server-side identifier of the transaction.
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    /// Current state of the transaction on the server.
    pub async fn transaction_status(&self) -> Result<TransactionStatus, ExecutionError> {
        let request = Request::new(
            Method::Get,
            format!("/_api/transaction/{}", self.transaction_id),
        );
        let deserializer = self.standard.deserializer();
        self.standard
            .execute(request, move |request, response| {
                ensure_success(ApiOperation::TransactionStatus, request, &response)?;
                let result = take_field(decode(&*deserializer, &response)?, "result")?;
                result
                    .get("status")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ExecutionError::deserialization("Missing transaction status in response body")
                    })?
                    .parse()
            })
            .await?
            .into_value()
    }

    /// Commits the transaction.
    pub async fn commit_transaction(&self) -> Result<(), ExecutionError> {
        self.finish(Method::Put, ApiOperation::TransactionCommit)
            .await
    }

    /// Aborts the transaction, discarding its writes.
    pub async fn abort_transaction(&self) -> Result<(), ExecutionError> {
        self.finish(Method::Delete, ApiOperation::TransactionAbort)
            .await
    }

    async fn finish(&self, method: Method, operation: ApiOperation) -> Result<(), ExecutionError> {
        let request = Request::new(method, format!("/_api/transaction/{}", self.transaction_id));
        self.standard
            .execute(request, move |request, response| {
                ensure_success(operation, request, &response)
            })
            .await?
            .into_value()?;
        debug!(
            transaction_id = %self.transaction_id,
            %operation,
            "Stream transaction finished"
        );
        Ok(())
    }
}

impl Deref for TransactionDatabase {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.db
    }
}

/// Database wrapper whose calls are deferred as async jobs.
#[derive(Debug, Clone)]
pub struct AsyncDatabase {
    db: Database,
}

impl Deref for AsyncDatabase {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.db
    }
}
