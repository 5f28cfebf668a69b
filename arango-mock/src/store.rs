//! In-memory model of the databases, collections and server-side state
//! (cursors, stream transactions, async jobs) of a coordinator.

use std::collections::{BTreeMap, HashMap, VecDeque};

use arango_http::errno::{
    BAD_PARAMETER, CONFLICT, CURSOR_NOT_FOUND, DATABASE_NOT_FOUND, DATA_SOURCE_NOT_FOUND,
    DOCUMENT_NOT_FOUND, DUPLICATE_NAME, FORBIDDEN, HTTP_ERROR_NOT_FOUND, ILLEGAL_NAME,
    QUERY_NOT_FOUND, QUERY_PARSE, TRANSACTION_NOT_FOUND, UNIQUE_CONSTRAINT_VIOLATED,
};
use serde_json::{json, Map, Value};

pub(crate) const SYSTEM_DATABASE: &str = "_system";
const SERVER_VERSION: &str = "3.12.0";
const DEFAULT_BATCH_SIZE: usize = 1000;

/// An answer of the fake server, before it is turned into an HTTP response.
#[derive(Debug, Clone)]
pub(crate) struct Reply {
    pub(crate) status: u16,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Option<Value>,
}

impl Reply {
    pub(crate) fn json(status: u16, body: Value) -> Self {
        Reply {
            status,
            headers: Vec::new(),
            body: Some(body),
        }
    }

    /// Adds the `error` and `code` fields of a successful answer.
    fn envelope(status: u16, mut body: Value) -> Self {
        if let Value::Object(fields) = &mut body {
            fields.insert("error".to_owned(), Value::Bool(false));
            fields.insert("code".to_owned(), Value::from(status));
        }
        Self::json(status, body)
    }

    pub(crate) fn error(status: u16, error_num: i64, message: &str) -> Self {
        Self::json(
            status,
            json!({
                "error": true,
                "code": status,
                "errorNum": error_num,
                "errorMessage": message,
            }),
        )
    }

    pub(crate) fn empty(status: u16) -> Self {
        Reply {
            status,
            headers: Vec::new(),
            body: None,
        }
    }

    pub(crate) fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_owned(), value.into()));
        self
    }
}

/// A request as seen by the store: database prefix removed, body parsed.
pub(crate) struct Call<'a> {
    pub(crate) database: &'a str,
    pub(crate) method: &'a str,
    pub(crate) path: &'a str,
    pub(crate) params: &'a BTreeMap<String, String>,
    pub(crate) headers: &'a BTreeMap<String, String>,
    pub(crate) body: Value,
}

impl Call<'_> {
    fn flag(&self, name: &str, default: bool) -> bool {
        match self.params.get(name).map(String::as_str) {
            Some("1") | Some("true") => true,
            Some("0") | Some("false") => false,
            _ => default,
        }
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

#[derive(Debug, Default)]
struct DatabaseData {
    collections: BTreeMap<String, CollectionData>,
}

#[derive(Debug)]
struct CollectionData {
    id: String,
    kind: u64,
    is_system: bool,
    wait_for_sync: bool,
    documents: BTreeMap<String, Value>,
}

impl CollectionData {
    fn info(&self, name: &str) -> Value {
        json!({
            "id": self.id,
            "name": name,
            "type": self.kind,
            "status": 3,
            "isSystem": self.is_system,
            "globallyUniqueId": format!("h{}", self.id),
        })
    }

    fn properties(&self, name: &str) -> Value {
        let mut info = self.info(name);
        info["waitForSync"] = Value::Bool(self.wait_for_sync);
        info["keyOptions"] = json!({"type": "traditional", "allowUserKeys": true});
        info["schema"] = Value::Null;
        info["cacheEnabled"] = Value::Bool(false);
        info
    }

    fn write_status(&self, call: &Call<'_>) -> u16 {
        if self.wait_for_sync || call.flag("waitForSync", false) {
            201
        } else {
            202
        }
    }
}

#[derive(Debug)]
struct CursorData {
    remaining: VecDeque<Value>,
    batch_size: usize,
    count: Option<usize>,
}

impl CursorData {
    fn next_batch(&mut self) -> Vec<Value> {
        let size = self.batch_size.min(self.remaining.len());
        self.remaining.drain(..size).collect()
    }
}

/// Where the results of a query come from.
enum Source {
    Collection(String),
    Range(i64, i64),
    Literal(Value),
}

#[derive(Debug)]
pub(crate) struct Store {
    databases: BTreeMap<String, DatabaseData>,
    cursors: HashMap<String, CursorData>,
    transactions: HashMap<String, &'static str>,
    jobs: BTreeMap<String, Reply>,
    next_id: u64,
}

impl Store {
    pub(crate) fn new(databases: &[String]) -> Self {
        let mut store = Store {
            databases: BTreeMap::new(),
            cursors: HashMap::new(),
            transactions: HashMap::new(),
            jobs: BTreeMap::new(),
            next_id: 100,
        };
        store.create_database_data(SYSTEM_DATABASE);
        for name in databases {
            store.create_database_data(name);
        }
        store
    }

    pub(crate) fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    fn create_database_data(&mut self, name: &str) {
        let id = self.next_id();
        let mut data = DatabaseData::default();
        data.collections.insert(
            "_graphs".to_owned(),
            CollectionData {
                id,
                kind: 2,
                is_system: true,
                wait_for_sync: false,
                documents: BTreeMap::new(),
            },
        );
        self.databases.insert(name.to_owned(), data);
    }

    /// Stores the reply of an async call and returns the job ID.
    pub(crate) fn store_job(&mut self, reply: Reply) -> String {
        let id = self.next_id();
        let reply = reply.with_header("x-arango-async-id", id.clone());
        self.jobs.insert(id.clone(), reply);
        id
    }

    /// Executes an API call against the in-memory state.
    pub(crate) fn dispatch(&mut self, call: Call<'_>) -> Reply {
        if !self.databases.contains_key(call.database) {
            return Reply::error(404, DATABASE_NOT_FOUND, "database not found");
        }
        if let Some(trx) = call.header("x-arango-trx-id") {
            if self.transactions.get(trx) != Some(&"running") {
                return Reply::error(404, TRANSACTION_NOT_FOUND, "transaction not found");
            }
        }

        let segments: Vec<&str> = call.path.trim_matches('/').split('/').collect();
        match (call.method, segments.as_slice()) {
            ("GET", ["_api", "version"]) => {
                let mut body = json!({"server": "arango", "version": SERVER_VERSION, "license": "community"});
                if call.flag("details", false) {
                    body["details"] = json!({"mode": "server", "role": "SINGLE"});
                }
                Reply::json(200, body)
            }
            ("GET", ["_admin", "status"]) => Reply::json(
                200,
                json!({"server": "arango", "version": SERVER_VERSION, "mode": "server", "serverInfo": {"role": "SINGLE"}}),
            ),

            ("GET", ["_api", "database"]) => self.list_databases(&call),
            ("GET", ["_api", "database", "current"]) => Reply::envelope(
                200,
                json!({"result": {
                    "name": call.database,
                    "id": "1",
                    "path": "none",
                    "isSystem": call.database == SYSTEM_DATABASE,
                }}),
            ),
            ("POST", ["_api", "database"]) => self.create_database(&call),
            ("DELETE", ["_api", "database", name]) => self.delete_database(&call, name),

            ("GET", ["_api", "collection"]) => self.list_collections(&call),
            ("POST", ["_api", "collection"]) => self.create_collection(&call),
            ("GET", ["_api", "collection", name]) => {
                self.with_collection(&call, name, |c| Reply::envelope(200, c.info(name)))
            }
            ("GET", ["_api", "collection", name, "properties"]) => {
                self.with_collection(&call, name, |c| Reply::envelope(200, c.properties(name)))
            }
            ("GET", ["_api", "collection", name, "count"]) => self.with_collection(&call, name, |c| {
                let mut body = c.properties(name);
                body["count"] = Value::from(c.documents.len());
                Reply::envelope(200, body)
            }),
            ("PUT", ["_api", "collection", name, "truncate"]) => {
                match self.collection_mut(call.database, name) {
                    Ok(collection) => {
                        collection.documents.clear();
                        Reply::envelope(200, collection.properties(name))
                    }
                    Err(reply) => reply,
                }
            }
            ("DELETE", ["_api", "collection", name]) => self.delete_collection(&call, name),

            ("POST", ["_api", "document", col]) => self.insert_document(call, col),
            ("GET" | "HEAD", ["_api", "document", col, key]) => self.get_document(&call, col, key),
            ("PATCH" | "PUT", ["_api", "document", col, key]) => self.write_document(call, col, key),
            ("DELETE", ["_api", "document", col, key]) => self.delete_document(&call, col, key),

            ("POST", ["_api", "cursor"]) => self.create_cursor(&call),
            ("POST" | "PUT", ["_api", "cursor", id]) => self.next_batch(id),
            ("DELETE", ["_api", "cursor", id]) => match self.cursors.remove(*id) {
                Some(_) => Reply::envelope(202, json!({"id": id})),
                None => Reply::error(404, CURSOR_NOT_FOUND, "cursor not found"),
            },
            ("POST", ["_api", "explain"]) => self.explain(&call),
            ("POST", ["_api", "query"]) => self.validate(&call),
            ("GET", ["_api", "query", "current"]) => Reply::json(200, json!([])),
            ("DELETE", ["_api", "query", _]) => Reply::error(404, QUERY_NOT_FOUND, "query ID not found"),

            ("POST", ["_api", "transaction", "begin"]) => {
                let id = self.next_id();
                self.transactions.insert(id.clone(), "running");
                Reply::envelope(201, json!({"result": {"id": id, "status": "running"}}))
            }
            ("GET", ["_api", "transaction", id]) => match self.transactions.get(*id) {
                Some(status) => Reply::envelope(200, json!({"result": {"id": id, "status": status}})),
                None => Reply::error(404, TRANSACTION_NOT_FOUND, "transaction not found"),
            },
            ("PUT", ["_api", "transaction", id]) => self.finish_transaction(id, "committed"),
            ("DELETE", ["_api", "transaction", id]) => self.finish_transaction(id, "aborted"),

            ("GET", ["_api", "job", "done"]) => {
                let limit = call
                    .params
                    .get("count")
                    .and_then(|count| count.parse().ok())
                    .unwrap_or(usize::MAX);
                Reply::json(200, Value::from(self.jobs.keys().take(limit).cloned().collect::<Vec<_>>()))
            }
            ("GET", ["_api", "job", "pending"]) => Reply::json(200, json!([])),
            ("GET", ["_api", "job", id]) => match self.jobs.contains_key(*id) {
                true => Reply::envelope(200, json!({})),
                false => Reply::error(404, HTTP_ERROR_NOT_FOUND, "job not found"),
            },
            ("PUT", ["_api", "job", id]) => match self.jobs.remove(*id) {
                Some(reply) => reply,
                None => Reply::error(404, HTTP_ERROR_NOT_FOUND, "job not found"),
            },
            ("PUT", ["_api", "job", id, "cancel"]) => match self.jobs.contains_key(*id) {
                true => Reply::envelope(200, json!({"result": true})),
                false => Reply::error(404, HTTP_ERROR_NOT_FOUND, "job not found"),
            },
            ("DELETE", ["_api", "job", "all" | "expired"]) => {
                self.jobs.clear();
                Reply::envelope(200, json!({"result": true}))
            }
            ("DELETE", ["_api", "job", id]) => match self.jobs.remove(*id) {
                Some(_) => Reply::envelope(200, json!({"result": true})),
                None => Reply::error(404, HTTP_ERROR_NOT_FOUND, "job not found"),
            },

            _ => Reply::error(404, HTTP_ERROR_NOT_FOUND, "unknown path"),
        }
    }

    fn list_databases(&self, call: &Call<'_>) -> Reply {
        if call.database != SYSTEM_DATABASE {
            return Reply::error(403, FORBIDDEN, "operation only allowed in system database");
        }
        let names: Vec<&String> = self.databases.keys().collect();
        Reply::envelope(200, json!({ "result": names }))
    }

    fn create_database(&mut self, call: &Call<'_>) -> Reply {
        if call.database != SYSTEM_DATABASE {
            return Reply::error(403, FORBIDDEN, "operation only allowed in system database");
        }
        let name = match call.body.get("name").and_then(Value::as_str) {
            Some(name) if !name.is_empty() && !name.starts_with('_') => name.to_owned(),
            _ => return Reply::error(400, ILLEGAL_NAME, "database name invalid"),
        };
        if self.databases.contains_key(&name) {
            return Reply::error(409, DUPLICATE_NAME, "duplicate database name");
        }
        self.create_database_data(&name);
        Reply::envelope(201, json!({"result": true}))
    }

    fn delete_database(&mut self, call: &Call<'_>, name: &str) -> Reply {
        if call.database != SYSTEM_DATABASE || name == SYSTEM_DATABASE {
            return Reply::error(403, FORBIDDEN, "operation only allowed in system database");
        }
        match self.databases.remove(name) {
            Some(_) => Reply::envelope(200, json!({"result": true})),
            None => Reply::error(404, DATABASE_NOT_FOUND, "database not found"),
        }
    }

    fn collection(&self, database: &str, name: &str) -> Result<&CollectionData, Reply> {
        self.databases
            .get(database)
            .and_then(|db| db.collections.get(name))
            .ok_or_else(|| Reply::error(404, DATA_SOURCE_NOT_FOUND, "collection or view not found"))
    }

    fn collection_mut(&mut self, database: &str, name: &str) -> Result<&mut CollectionData, Reply> {
        self.databases
            .get_mut(database)
            .and_then(|db| db.collections.get_mut(name))
            .ok_or_else(|| Reply::error(404, DATA_SOURCE_NOT_FOUND, "collection or view not found"))
    }

    fn with_collection(
        &self,
        call: &Call<'_>,
        name: &str,
        f: impl FnOnce(&CollectionData) -> Reply,
    ) -> Reply {
        match self.collection(call.database, name) {
            Ok(collection) => f(collection),
            Err(reply) => reply,
        }
    }

    fn list_collections(&self, call: &Call<'_>) -> Reply {
        let exclude_system = call.flag("excludeSystem", false);
        let collections: Vec<Value> = self.databases[call.database]
            .collections
            .iter()
            .filter(|(_, c)| !(exclude_system && c.is_system))
            .map(|(name, c)| c.info(name))
            .collect();
        Reply::envelope(200, json!({ "result": collections }))
    }

    fn create_collection(&mut self, call: &Call<'_>) -> Reply {
        let is_system = call.body.get("isSystem").and_then(Value::as_bool).unwrap_or(false);
        let name = match call.body.get("name").and_then(Value::as_str) {
            Some(name) if !name.is_empty() && (is_system || !name.starts_with('_')) => name.to_owned(),
            _ => return Reply::error(400, ILLEGAL_NAME, "illegal name"),
        };
        let id = self.next_id();
        let db = match self.databases.get_mut(call.database) {
            Some(db) => db,
            None => return Reply::error(404, DATABASE_NOT_FOUND, "database not found"),
        };
        if db.collections.contains_key(&name) {
            return Reply::error(409, DUPLICATE_NAME, "duplicate name");
        }
        let collection = CollectionData {
            id,
            kind: call.body.get("type").and_then(Value::as_u64).unwrap_or(2),
            is_system,
            wait_for_sync: call.body.get("waitForSync").and_then(Value::as_bool).unwrap_or(false),
            documents: BTreeMap::new(),
        };
        let body = collection.properties(&name);
        db.collections.insert(name, collection);
        Reply::envelope(200, body)
    }

    fn delete_collection(&mut self, call: &Call<'_>, name: &str) -> Reply {
        let allow_system = call.flag("isSystem", false);
        let Some(db) = self.databases.get_mut(call.database) else {
            return Reply::error(404, DATABASE_NOT_FOUND, "database not found");
        };
        match db.collections.get(name) {
            None => Reply::error(404, DATA_SOURCE_NOT_FOUND, "collection or view not found"),
            Some(c) if c.is_system && !allow_system => Reply::error(403, FORBIDDEN, "forbidden"),
            Some(c) => {
                let id = c.id.clone();
                db.collections.remove(name);
                Reply::envelope(200, json!({ "id": id }))
            }
        }
    }

    fn get_document(&self, call: &Call<'_>, col: &str, key: &str) -> Reply {
        let collection = match self.collection(call.database, col) {
            Ok(collection) => collection,
            Err(reply) => return reply,
        };
        let Some(document) = collection.documents.get(key) else {
            return Reply::error(404, DOCUMENT_NOT_FOUND, "document not found");
        };
        let rev = revision(document);
        if call.header("if-none-match") == Some(rev) {
            return Reply::empty(304);
        }
        if call.header("if-match").is_some_and(|expected| expected != rev) {
            return Reply::error(412, CONFLICT, "conflict, _rev values do not match");
        }
        Reply::json(200, document.clone()).with_header("etag", format!("\"{rev}\""))
    }

    fn insert_document(&mut self, call: Call<'_>, col: &str) -> Reply {
        let Value::Object(mut document) = call.body.clone() else {
            return Reply::error(400, BAD_PARAMETER, "invalid document");
        };
        let rev = self.next_id();
        let generated_key = self.next_id();
        let collection = match self.collection_mut(call.database, col) {
            Ok(collection) => collection,
            Err(reply) => return reply,
        };
        let key = match document.get("_key") {
            Some(Value::String(key)) if !key.is_empty() => key.clone(),
            Some(_) => return Reply::error(400, BAD_PARAMETER, "illegal document key"),
            None => generated_key,
        };

        let old = collection.documents.get(&key).cloned();
        let mode = match call.params.get("overwriteMode") {
            Some(mode) => Some(mode.as_str()),
            None if call.flag("overwrite", false) => Some("replace"),
            None => None,
        };
        if let Some(old) = &old {
            match mode {
                None | Some("conflict") => {
                    return Reply::error(409, UNIQUE_CONSTRAINT_VIOLATED, "unique constraint violated")
                }
                Some("ignore") => {
                    let status = collection.write_status(&call);
                    return write_reply(status, &call, old, None, None, None);
                }
                Some("update") => {
                    let mut merged = old.as_object().cloned().unwrap_or_default();
                    merge(
                        &mut merged,
                        document,
                        call.flag("keepNull", true),
                        call.flag("mergeObjects", true),
                    );
                    document = merged;
                }
                _ => {}
            }
        }

        document.insert("_key".to_owned(), Value::from(key.as_str()));
        document.insert("_id".to_owned(), Value::from(format!("{col}/{key}")));
        document.insert("_rev".to_owned(), Value::from(rev));
        let document = Value::Object(document);
        collection.documents.insert(key, document.clone());
        let status = collection.write_status(&call);
        write_reply(status, &call, &document, old.as_ref(), Some(&document), old.as_ref())
    }

    fn write_document(&mut self, call: Call<'_>, col: &str, key: &str) -> Reply {
        let Value::Object(patch) = call.body.clone() else {
            return Reply::error(400, BAD_PARAMETER, "invalid document");
        };
        let rev = self.next_id();
        let collection = match self.collection_mut(call.database, col) {
            Ok(collection) => collection,
            Err(reply) => return reply,
        };
        let Some(old) = collection.documents.get(key).cloned() else {
            return Reply::error(404, DOCUMENT_NOT_FOUND, "document not found");
        };
        if let Err(reply) = check_revision(&call, &old, patch.get("_rev")) {
            return reply;
        }

        let mut document = if call.method == "PATCH" {
            let mut merged = old.as_object().cloned().unwrap_or_default();
            merge(
                &mut merged,
                patch,
                call.flag("keepNull", true),
                call.flag("mergeObjects", true),
            );
            merged
        } else {
            patch
        };
        document.insert("_key".to_owned(), Value::from(key));
        document.insert("_id".to_owned(), Value::from(format!("{col}/{key}")));
        document.insert("_rev".to_owned(), Value::from(rev));
        let document = Value::Object(document);
        collection.documents.insert(key.to_owned(), document.clone());
        let status = collection.write_status(&call);
        write_reply(status, &call, &document, Some(&old), Some(&document), Some(&old))
    }

    fn delete_document(&mut self, call: &Call<'_>, col: &str, key: &str) -> Reply {
        let collection = match self.collection_mut(call.database, col) {
            Ok(collection) => collection,
            Err(reply) => return reply,
        };
        let Some(old) = collection.documents.get(key).cloned() else {
            return Reply::error(404, DOCUMENT_NOT_FOUND, "document not found");
        };
        if let Err(reply) = check_revision(call, &old, None) {
            return reply;
        }
        collection.documents.remove(key);
        let status = if collection.wait_for_sync || call.flag("waitForSync", false) {
            200
        } else {
            202
        };
        write_reply(status, call, &old, None, None, Some(&old))
    }

    fn parse_query(&self, call: &Call<'_>) -> Result<Source, Reply> {
        let query = call.body.get("query").and_then(Value::as_str).unwrap_or_default().trim();
        let parse_error = || Reply::error(400, QUERY_PARSE, &format!("syntax error in query: {query}"));

        if let Some(literal) = query.strip_prefix("RETURN ") {
            return serde_json::from_str(literal)
                .map(Source::Literal)
                .map_err(|_| parse_error());
        }
        let tokens: Vec<&str> = query.split_whitespace().collect();
        let ["FOR", var, "IN", source, "RETURN", returned] = tokens.as_slice() else {
            return Err(parse_error());
        };
        if var != returned {
            return Err(parse_error());
        }
        if let Some((start, end)) = source.split_once("..") {
            return match (start.parse(), end.parse()) {
                (Ok(start), Ok(end)) => Ok(Source::Range(start, end)),
                _ => Err(parse_error()),
            };
        }
        let name = match source.strip_prefix("@@") {
            Some(bind) => call
                .body
                .get("bindVars")
                .and_then(|vars| vars.get(format!("@{bind}")))
                .and_then(Value::as_str)
                .ok_or_else(|| Reply::error(400, BAD_PARAMETER, &format!("no value specified for bind parameter @{bind}")))?,
            None => *source,
        };
        self.collection(call.database, name)?;
        Ok(Source::Collection(name.to_owned()))
    }

    fn create_cursor(&mut self, call: &Call<'_>) -> Reply {
        let source = match self.parse_query(call) {
            Ok(source) => source,
            Err(reply) => return reply,
        };
        let batch_size = match call.body.get("batchSize").and_then(Value::as_u64) {
            Some(0) => return Reply::error(400, BAD_PARAMETER, "batchSize must be positive"),
            Some(size) => size as usize,
            None => DEFAULT_BATCH_SIZE,
        };
        let results: VecDeque<Value> = match source {
            Source::Literal(value) => VecDeque::from([value]),
            Source::Range(start, end) => (start..=end).map(Value::from).collect(),
            Source::Collection(name) => match self.collection(call.database, &name) {
                Ok(collection) => collection.documents.values().cloned().collect(),
                Err(reply) => return reply,
            },
        };
        let total = results.len();
        let mut cursor = CursorData {
            remaining: results,
            batch_size,
            count: call
                .body
                .get("count")
                .and_then(Value::as_bool)
                .unwrap_or(false)
                .then_some(total),
        };

        let batch = cursor.next_batch();
        let mut body = json!({
            "result": batch,
            "hasMore": !cursor.remaining.is_empty(),
            "cached": false,
            "extra": {"stats": {"scannedFull": total, "writesExecuted": 0}, "warnings": []},
        });
        if let Some(count) = cursor.count {
            body["count"] = Value::from(count);
        }
        if !cursor.remaining.is_empty() {
            let id = self.next_id();
            body["id"] = Value::from(id.as_str());
            self.cursors.insert(id, cursor);
        }
        Reply::envelope(201, body)
    }

    fn next_batch(&mut self, id: &str) -> Reply {
        let Some(cursor) = self.cursors.get_mut(id) else {
            return Reply::error(404, CURSOR_NOT_FOUND, "cursor not found");
        };
        let batch = cursor.next_batch();
        let has_more = !cursor.remaining.is_empty();
        let mut body = json!({"result": batch, "hasMore": has_more, "id": id, "cached": false});
        if let Some(count) = cursor.count {
            body["count"] = Value::from(count);
        }
        if !has_more {
            self.cursors.remove(id);
        }
        Reply::envelope(200, body)
    }

    fn explain(&self, call: &Call<'_>) -> Reply {
        match self.parse_query(call) {
            Ok(source) => {
                let nodes = match source {
                    Source::Collection(name) => json!([{"type": "EnumerateCollectionNode", "collection": name}]),
                    Source::Range(..) => json!([{"type": "EnumerateListNode"}]),
                    Source::Literal(_) => json!([{"type": "ReturnNode"}]),
                };
                Reply::envelope(
                    200,
                    json!({"plan": {"nodes": nodes, "estimatedCost": 1}, "cacheable": true, "warnings": []}),
                )
            }
            Err(reply) => reply,
        }
    }

    fn validate(&self, call: &Call<'_>) -> Reply {
        match self.parse_query(call) {
            Ok(source) => {
                let collections = match source {
                    Source::Collection(name) => vec![name],
                    _ => Vec::new(),
                };
                let query = call.body.get("query").and_then(Value::as_str).unwrap_or_default();
                let bind_vars: Vec<&str> = query
                    .split_whitespace()
                    .filter_map(|token| token.strip_prefix('@'))
                    .collect();
                Reply::envelope(
                    200,
                    json!({"bindVars": bind_vars, "collections": collections, "ast": []}),
                )
            }
            Err(reply) => reply,
        }
    }

    fn finish_transaction(&mut self, id: &str, target: &'static str) -> Reply {
        let Some(status) = self.transactions.get_mut(id) else {
            return Reply::error(404, TRANSACTION_NOT_FOUND, "transaction not found");
        };
        if *status != "running" && *status != target {
            return Reply::error(409, CONFLICT, &format!("transaction already {status}"));
        }
        *status = target;
        Reply::envelope(200, json!({"result": {"id": id, "status": target}}))
    }
}

fn revision(document: &Value) -> &str {
    document.get("_rev").and_then(Value::as_str).unwrap_or_default()
}

fn check_revision(call: &Call<'_>, old: &Value, body_rev: Option<&Value>) -> Result<(), Reply> {
    let current = revision(old);
    let mismatch = Reply::error(412, CONFLICT, "conflict, _rev values do not match");
    if call.header("if-match").is_some_and(|expected| expected != current) {
        return Err(mismatch);
    }
    if !call.flag("ignoreRevs", true) {
        if let Some(Value::String(expected)) = body_rev {
            if expected != current {
                return Err(mismatch);
            }
        }
    }
    Ok(())
}

fn merge(target: &mut Map<String, Value>, patch: Map<String, Value>, keep_null: bool, merge_objects: bool) {
    for (key, value) in patch {
        match value {
            Value::Null if !keep_null => {
                target.remove(&key);
            }
            Value::Object(nested) if merge_objects => match target.get_mut(&key) {
                Some(Value::Object(existing)) => merge(existing, nested, keep_null, merge_objects),
                _ => {
                    target.insert(key, Value::Object(nested));
                }
            },
            value => {
                target.insert(key, value);
            }
        }
    }
}

/// Builds the metadata answer of a document write.
fn write_reply(
    status: u16,
    call: &Call<'_>,
    document: &Value,
    previous: Option<&Value>,
    new: Option<&Value>,
    old: Option<&Value>,
) -> Reply {
    if call.flag("silent", false) {
        return Reply::json(status, json!({}));
    }
    let mut body = json!({
        "_id": document["_id"],
        "_key": document["_key"],
        "_rev": document["_rev"],
    });
    if let Some(previous) = previous {
        body["_oldRev"] = previous["_rev"].clone();
    }
    if let (true, Some(new)) = (call.flag("returnNew", false), new) {
        body["new"] = new.clone();
    }
    if let (true, Some(old)) = (call.flag("returnOld", false), old) {
        body["old"] = old.clone();
    }
    Reply::json(status, body)
}
