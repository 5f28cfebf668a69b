use std::fmt;

use arango_http::errno::{
    DOCUMENT_NOT_FOUND, HTTP_BAD_PARAMETER, HTTP_NOT_FOUND, HTTP_PRECONDITION_FAILED,
};
use arango_http::{Method, Request, Response};
use serde_json::Value;

use super::{decode, ensure_success, strip_envelope, take_field};
use crate::errors::{ApiOperation, ExecutionError, ServerError};
use crate::execution::{ApiResult, Executor};

/// Something that identifies a document of a collection: its key
/// (`"john"`), its full ID (`"students/john"`) or a body carrying `_id` or `_key`.
pub trait DocumentHandle {
    /// Resolves the full document ID within `collection`.
    fn document_id(&self, collection: &str) -> Result<String, ExecutionError>;
}

impl DocumentHandle for str {
    fn document_id(&self, collection: &str) -> Result<String, ExecutionError> {
        if self.contains('/') {
            validate_id(self, collection)?;
            Ok(self.to_owned())
        } else {
            Ok(format!("{collection}/{self}"))
        }
    }
}

impl DocumentHandle for String {
    fn document_id(&self, collection: &str) -> Result<String, ExecutionError> {
        self.as_str().document_id(collection)
    }
}

impl DocumentHandle for Value {
    fn document_id(&self, collection: &str) -> Result<String, ExecutionError> {
        if let Some(id) = self.get("_id").and_then(Value::as_str) {
            validate_id(id, collection)?;
            return Ok(id.to_owned());
        }
        if let Some(key) = self.get("_key").and_then(Value::as_str) {
            return Ok(format!("{collection}/{key}"));
        }
        Err(ExecutionError::InvalidDocument(
            "field \"_key\" or \"_id\" required".to_owned(),
        ))
    }
}

fn validate_id(id: &str, collection: &str) -> Result<(), ExecutionError> {
    match id.split_once('/') {
        Some((prefix, key)) if prefix == collection && !key.is_empty() => Ok(()),
        _ => Err(ExecutionError::InvalidDocument(format!(
            "bad collection name in document ID \"{id}\""
        ))),
    }
}

/// Fills in `_key` from `_id` when only the latter is present.
fn ensure_key_from_id(document: &mut Value, collection: &str) -> Result<(), ExecutionError> {
    let Some(map) = document.as_object_mut() else {
        return Ok(());
    };
    if map.contains_key("_key") {
        return Ok(());
    }
    let Some(id) = map.get("_id").and_then(Value::as_str) else {
        return Ok(());
    };
    validate_id(id, collection)?;
    let key = id.split_once('/').map(|(_, key)| key.to_owned());
    if let Some(key) = key {
        map.insert("_key".to_owned(), Value::String(key));
    }
    Ok(())
}

/// Read preconditions of [`StandardCollection::get`] and [`StandardCollection::has`].
#[derive(Debug, Clone, Default)]
pub struct DocumentOptions {
    /// Allow reads from followers in a cluster.
    pub allow_dirty_read: bool,
    /// Only succeed if the document revision matches this ETag.
    pub if_match: Option<String>,
    /// Only return the document if its revision differs from this ETag.
    pub if_none_match: Option<String>,
}

impl DocumentOptions {
    fn apply(&self, mut request: Request) -> Request {
        if self.allow_dirty_read {
            request = request.with_header("x-arango-allow-dirty-read", "true");
        }
        if let Some(etag) = &self.if_match {
            request = request.with_header("If-Match", etag.as_str());
        }
        if let Some(etag) = &self.if_none_match {
            request = request.with_header("If-None-Match", etag.as_str());
        }
        request
    }
}

/// What the server does when an inserted document's key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OverwriteMode {
    /// Keep the existing document, do not fail.
    Ignore,
    /// Replace the existing document.
    Replace,
    /// Merge the new document into the existing one.
    Update,
    /// Fail with a unique constraint violation.
    Conflict,
}

impl fmt::Display for OverwriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OverwriteMode::Ignore => "ignore",
            OverwriteMode::Replace => "replace",
            OverwriteMode::Update => "update",
            OverwriteMode::Conflict => "conflict",
        })
    }
}

/// Options of [`StandardCollection::insert`]. Unset fields use the server default.
#[derive(Debug, Clone, Default)]
pub struct InsertOptions {
    /// Wait until the document is synced to disk.
    pub wait_for_sync: Option<bool>,
    /// Return the stored document as `new`.
    pub return_new: Option<bool>,
    /// Return the replaced document as `old`.
    pub return_old: Option<bool>,
    /// Do not return document metadata.
    pub silent: Option<bool>,
    /// Replace an existing document with the same key.
    pub overwrite: Option<bool>,
    /// What to do if a document with the same key exists. Implies `overwrite`.
    pub overwrite_mode: Option<OverwriteMode>,
    /// In update mode, `null` values remove attributes when `false`.
    pub keep_null: Option<bool>,
    /// In update mode, merge nested objects instead of replacing them.
    pub merge_objects: Option<bool>,
    /// Refill in-memory index caches after the write.
    pub refill_index_caches: Option<bool>,
    /// Attribute holding an external version; older writes are ignored.
    pub version_attribute: Option<String>,
}

/// Options of [`StandardCollection::update`] and [`StandardCollection::replace`].
///
/// `keep_null` and `merge_objects` only apply to updates.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Ignore the `_rev` attribute of the body.
    pub ignore_revs: Option<bool>,
    /// Wait until the document is synced to disk.
    pub wait_for_sync: Option<bool>,
    /// Return the stored document as `new`.
    pub return_new: Option<bool>,
    /// Return the previous document as `old`.
    pub return_old: Option<bool>,
    /// Do not return document metadata.
    pub silent: Option<bool>,
    /// `null` values remove attributes when `false`.
    pub keep_null: Option<bool>,
    /// Merge nested objects instead of replacing them.
    pub merge_objects: Option<bool>,
    /// Refill in-memory index caches after the write.
    pub refill_index_caches: Option<bool>,
    /// Attribute holding an external version; older writes are ignored.
    pub version_attribute: Option<String>,
    /// Only succeed if the stored revision matches this ETag.
    pub if_match: Option<String>,
}

/// Options of [`StandardCollection::delete`].
#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    /// Ignore the `_rev` attribute of the handle.
    pub ignore_revs: Option<bool>,
    /// Wait until the removal is synced to disk.
    pub wait_for_sync: Option<bool>,
    /// Return the removed document as `old`.
    pub return_old: Option<bool>,
    /// Do not return document metadata.
    pub silent: Option<bool>,
    /// Refill in-memory index caches after the removal.
    pub refill_index_caches: Option<bool>,
    /// Only succeed if the stored revision matches this ETag.
    pub if_match: Option<String>,
}

/// Document metadata of a write, or `None` for silent writes.
fn write_result(
    deserializer: &dyn arango_http::Deserializer,
    silent: bool,
    response: &Response,
) -> Result<Option<Value>, ExecutionError> {
    if silent {
        Ok(None)
    } else {
        decode(deserializer, response).map(Some)
    }
}

/// API wrapper for a document collection.
#[derive(Debug, Clone)]
pub struct StandardCollection {
    executor: Executor,
    name: String,
}

impl StandardCollection {
    pub(crate) fn new(executor: Executor, name: impl Into<String>) -> Self {
        StandardCollection {
            executor,
            name: name.into(),
        }
    }

    /// Name of the collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The executor requests are sent through.
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Total number of documents in the collection.
    pub async fn count(&self) -> Result<ApiResult<u64>, ExecutionError> {
        let request = Request::new(Method::Get, format!("/_api/collection/{}/count", self.name));
        let deserializer = self.executor.deserializer();
        self.executor
            .execute(request, move |request, response| {
                ensure_success(ApiOperation::CollectionCount, request, &response)?;
                let count = take_field(decode(&*deserializer, &response)?, "count")?;
                count.as_u64().ok_or_else(|| {
                    ExecutionError::deserialization(format!("Invalid document count: {count}"))
                })
            })
            .await
    }

    /// Properties of the collection (type, key options, schema, ...).
    pub async fn properties(&self) -> Result<ApiResult<Value>, ExecutionError> {
        let request = Request::new(
            Method::Get,
            format!("/_api/collection/{}/properties", self.name),
        );
        let deserializer = self.executor.deserializer();
        self.executor
            .execute(request, move |request, response| {
                ensure_success(ApiOperation::CollectionProperties, request, &response)?;
                Ok(strip_envelope(decode(&*deserializer, &response)?))
            })
            .await
    }

    /// Removes all documents, leaving indexes intact.
    pub async fn truncate(
        &self,
        wait_for_sync: Option<bool>,
        compact: Option<bool>,
    ) -> Result<ApiResult<()>, ExecutionError> {
        let request = Request::new(
            Method::Put,
            format!("/_api/collection/{}/truncate", self.name),
        )
        .with_opt_param("waitForSync", wait_for_sync)
        .with_opt_param("compact", compact);
        self.executor
            .execute(request, |request, response| {
                ensure_success(ApiOperation::CollectionTruncate, request, &response)
            })
            .await
    }

    /// Checks whether a document exists.
    pub async fn has<D: DocumentHandle + ?Sized>(
        &self,
        document: &D,
        options: &DocumentOptions,
    ) -> Result<ApiResult<bool>, ExecutionError> {
        let id = document.document_id(&self.name)?;
        let request = options.apply(Request::new(Method::Head, format!("/_api/document/{id}")));
        self.executor
            .execute(request, |request, response| {
                if response.is_success() {
                    Ok(true)
                } else if response.status_code == HTTP_NOT_FOUND {
                    Ok(false)
                } else if response.status_code == HTTP_PRECONDITION_FAILED {
                    Err(ServerError::new(ApiOperation::DocumentRevision, request, &response).into())
                } else {
                    Err(ServerError::new(ApiOperation::DocumentGet, request, &response).into())
                }
            })
            .await
    }

    /// Fetches a document, or `None` if it does not exist.
    pub async fn get<D: DocumentHandle + ?Sized>(
        &self,
        document: &D,
        options: &DocumentOptions,
    ) -> Result<ApiResult<Option<Value>>, ExecutionError> {
        let id = document.document_id(&self.name)?;
        let request = options.apply(Request::new(Method::Get, format!("/_api/document/{id}")));
        let deserializer = self.executor.deserializer();
        self.executor
            .execute(request, move |request, response| {
                if response.is_success() {
                    return decode(&*deserializer, &response).map(Some);
                }
                match response.status_code {
                    HTTP_NOT_FOUND if response.error_code == Some(DOCUMENT_NOT_FOUND) => Ok(None),
                    HTTP_PRECONDITION_FAILED => Err(ServerError::new(
                        ApiOperation::DocumentRevision,
                        request,
                        &response,
                    )
                    .into()),
                    _ => Err(ServerError::new(ApiOperation::DocumentGet, request, &response).into()),
                }
            })
            .await
    }

    /// Inserts a new document.
    ///
    /// If the body has an `_id` but no `_key`, the key is taken from the ID.
    /// Returns the document metadata, or `None` for silent inserts.
    pub async fn insert(
        &self,
        mut document: Value,
        options: &InsertOptions,
    ) -> Result<ApiResult<Option<Value>>, ExecutionError> {
        ensure_key_from_id(&mut document, &self.name)?;
        let request = Request::new(Method::Post, format!("/_api/document/{}", self.name))
            .with_opt_param("waitForSync", options.wait_for_sync)
            .with_opt_param("returnNew", options.return_new)
            .with_opt_param("returnOld", options.return_old)
            .with_opt_param("silent", options.silent)
            .with_opt_param("overwrite", options.overwrite)
            .with_opt_param(
                "overwriteMode",
                options.overwrite_mode.map(|mode| mode.to_string()),
            )
            .with_opt_param("keepNull", options.keep_null)
            .with_opt_param("mergeObjects", options.merge_objects)
            .with_opt_param("refillIndexCaches", options.refill_index_caches)
            .with_opt_param("versionAttribute", options.version_attribute.as_deref())
            .with_data(self.executor.serialize(&document)?);

        let silent = options.silent == Some(true);
        let deserializer = self.executor.deserializer();
        self.executor
            .execute(request, move |request, response| {
                if response.is_success() {
                    return write_result(&*deserializer, silent, &response);
                }
                let err = ServerError::new(ApiOperation::DocumentInsert, request, &response);
                let err = match response.status_code {
                    HTTP_BAD_PARAMETER => err.with_hint(
                        "Body does not contain a valid JSON representation of one document.",
                    ),
                    HTTP_NOT_FOUND => err.with_hint("Collection not found."),
                    _ => err,
                };
                Err(err.into())
            })
            .await
    }

    /// Partially updates a document identified by the `_id` or `_key` of `document`.
    pub async fn update(
        &self,
        document: Value,
        options: &UpdateOptions,
    ) -> Result<ApiResult<Option<Value>>, ExecutionError> {
        let request = self
            .write_request(Method::Patch, &document, options)?
            .with_opt_param("keepNull", options.keep_null)
            .with_opt_param("mergeObjects", options.merge_objects);
        self.execute_write(request, ApiOperation::DocumentUpdate, options.silent)
            .await
    }

    /// Replaces a document identified by the `_id` or `_key` of `document`.
    pub async fn replace(
        &self,
        document: Value,
        options: &UpdateOptions,
    ) -> Result<ApiResult<Option<Value>>, ExecutionError> {
        let request = self.write_request(Method::Put, &document, options)?;
        self.execute_write(request, ApiOperation::DocumentReplace, options.silent)
            .await
    }

    fn write_request(
        &self,
        method: Method,
        document: &Value,
        options: &UpdateOptions,
    ) -> Result<Request, ExecutionError> {
        let id = document.document_id(&self.name)?;
        let mut request = Request::new(method, format!("/_api/document/{id}"))
            .with_opt_param("ignoreRevs", options.ignore_revs)
            .with_opt_param("waitForSync", options.wait_for_sync)
            .with_opt_param("returnNew", options.return_new)
            .with_opt_param("returnOld", options.return_old)
            .with_opt_param("silent", options.silent)
            .with_opt_param("refillIndexCaches", options.refill_index_caches)
            .with_opt_param("versionAttribute", options.version_attribute.as_deref())
            .with_data(self.executor.serialize(document)?);
        if let Some(etag) = &options.if_match {
            request = request.with_header("If-Match", etag.as_str());
        }
        Ok(request)
    }

    async fn execute_write(
        &self,
        request: Request,
        operation: ApiOperation,
        silent: Option<bool>,
    ) -> Result<ApiResult<Option<Value>>, ExecutionError> {
        let silent = silent == Some(true);
        let deserializer = self.executor.deserializer();
        self.executor
            .execute(request, move |request, response| {
                if response.is_success() {
                    return write_result(&*deserializer, silent, &response);
                }
                match response.status_code {
                    HTTP_PRECONDITION_FAILED => Err(ServerError::new(
                        ApiOperation::DocumentRevision,
                        request,
                        &response,
                    )
                    .into()),
                    HTTP_NOT_FOUND => Err(ServerError::new(operation, request, &response)
                        .with_hint("Document, collection or transaction not found.")
                        .into()),
                    _ => Err(ServerError::new(operation, request, &response).into()),
                }
            })
            .await
    }

    /// Deletes a document.
    ///
    /// Returns `false` if the document does not exist and `ignore_missing` is set.
    pub async fn delete<D: DocumentHandle + ?Sized>(
        &self,
        document: &D,
        ignore_missing: bool,
        options: &DeleteOptions,
    ) -> Result<ApiResult<bool>, ExecutionError> {
        let id = document.document_id(&self.name)?;
        let mut request = Request::new(Method::Delete, format!("/_api/document/{id}"))
            .with_opt_param("ignoreRevs", options.ignore_revs)
            .with_opt_param("waitForSync", options.wait_for_sync)
            .with_opt_param("returnOld", options.return_old)
            .with_opt_param("silent", options.silent)
            .with_opt_param("refillIndexCaches", options.refill_index_caches);
        if let Some(etag) = &options.if_match {
            request = request.with_header("If-Match", etag.as_str());
        }
        self.executor
            .execute(request, move |request, response| {
                if response.is_success() {
                    return Ok(true);
                }
                match response.status_code {
                    HTTP_PRECONDITION_FAILED => Err(ServerError::new(
                        ApiOperation::DocumentRevision,
                        request,
                        &response,
                    )
                    .into()),
                    HTTP_NOT_FOUND
                        if ignore_missing && response.error_code == Some(DOCUMENT_NOT_FOUND) =>
                    {
                        Ok(false)
                    }
                    HTTP_NOT_FOUND => {
                        Err(ServerError::new(ApiOperation::DocumentDelete, request, &response)
                            .with_hint("Document, collection or transaction not found.")
                            .into())
                    }
                    _ => Err(ServerError::new(ApiOperation::DocumentDelete, request, &response).into()),
                }
            })
            .await
    }
}
