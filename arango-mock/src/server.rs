use std::collections::BTreeMap;
use std::io::Read;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arango_http::errno::{BAD_PARAMETER, HTTP_ERROR_UNAUTHORIZED};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::actions::{EvaluationContext, Reaction, RequestRule};
use crate::errors::MockServerError;
use crate::store::{Call, Reply, Store, SYSTEM_DATABASE};

const TOKEN_ISSUER: &str = "arangodb";

/// A request received by a [`RunningMockServer`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    /// Full path, including the `/_db/{name}` prefix if the client sent one.
    pub path: String,
    pub params: BTreeMap<String, String>,
    /// Header names are lowercase.
    pub headers: BTreeMap<String, String>,
    /// Body after decompression.
    pub body: Bytes,
}

impl RecordedRequest {
    /// Looks up a header, ignoring the case of `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The body parsed as JSON, if it is valid JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Configuration of a fake coordinator. Use [`MockServer::builder`] to create one.
#[derive(Debug, Clone)]
pub struct MockServer {
    address: SocketAddr,
    credentials: Vec<(String, String)>,
    jwt_secret: String,
    token_ttl: Duration,
    databases: Vec<String>,
    request_rules: Vec<RequestRule>,
}

impl MockServer {
    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::default()
    }

    /// Binds the listening socket and starts serving in a background task.
    pub async fn start(self) -> Result<RunningMockServer, MockServerError> {
        let listener = TcpListener::bind(self.address)
            .await
            .map_err(|e| MockServerError::Listen(self.address, e))?;
        let address = listener.local_addr().map_err(MockServerError::LocalAddr)?;

        let shared = Arc::new(Shared {
            store: tokio::sync::Mutex::new(Store::new(&self.databases)),
            rules: Mutex::new(self.request_rules.clone()),
            requests: Mutex::new(Vec::new()),
            config: self,
        });
        let app = Router::new()
            .fallback(handle)
            .with_state(Arc::clone(&shared));

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });
        debug!(%address, "Mock server started");

        Ok(RunningMockServer {
            address,
            shared,
            shutdown: Some(shutdown),
            task: Some(task),
        })
    }
}

/// Builder of a [`MockServer`].
///
/// Without any user, authentication is disabled and every request is served.
#[derive(Debug, Clone)]
pub struct MockServerBuilder {
    server: MockServer,
}

impl Default for MockServerBuilder {
    fn default() -> Self {
        MockServerBuilder {
            server: MockServer {
                address: SocketAddr::from(([127, 0, 0, 1], 0)),
                credentials: Vec::new(),
                jwt_secret: "secret".to_owned(),
                token_ttl: Duration::from_secs(3600),
                databases: Vec::new(),
                request_rules: Vec::new(),
            },
        }
    }
}

impl MockServerBuilder {
    /// Address to listen on. Defaults to an ephemeral port on localhost.
    pub fn address(mut self, address: SocketAddr) -> Self {
        self.server.address = address;
        self
    }

    /// Adds a user and enables authentication.
    pub fn user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.server.credentials.push((username.into(), password.into()));
        self
    }

    /// Secret used to sign user tokens and to verify every bearer token.
    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.server.jwt_secret = secret.into();
        self
    }

    /// Lifetime of the tokens issued by `/_open/auth`.
    pub fn token_ttl(mut self, ttl: Duration) -> Self {
        self.server.token_ttl = ttl;
        self
    }

    /// Adds a database next to `_system`.
    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.server.databases.push(name.into());
        self
    }

    pub fn request_rules(mut self, rules: Vec<RequestRule>) -> Self {
        self.server.request_rules = rules;
        self
    }

    pub fn build(self) -> MockServer {
        self.server
    }
}

struct Shared {
    config: MockServer,
    store: tokio::sync::Mutex<Store>,
    rules: Mutex<Vec<RequestRule>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

#[derive(Serialize)]
struct UserClaims<'a> {
    iss: &'a str,
    iat: i64,
    exp: i64,
    preferred_username: &'a str,
}

impl Shared {
    fn issue_token(&self, username: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let issued_at = chrono::Utc::now().timestamp();
        let ttl = i64::try_from(self.config.token_ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = UserClaims {
            iss: TOKEN_ISSUER,
            iat: issued_at,
            exp: issued_at.saturating_add(ttl),
            preferred_username: username,
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
    }

    fn check_password(&self, username: &str, password: &str) -> bool {
        self.config
            .credentials
            .iter()
            .any(|(u, p)| u == username && p == password)
    }

    fn authorize(&self, request: &RecordedRequest) -> bool {
        if self.config.credentials.is_empty() {
            return true;
        }
        let Some(header) = request.header("authorization") else {
            return false;
        };
        if let Some(encoded) = strip_prefix_ignore_case(header, "basic ") {
            let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
                return false;
            };
            let decoded = String::from_utf8_lossy(&decoded);
            return decoded
                .split_once(':')
                .is_some_and(|(username, password)| self.check_password(username, password));
        }
        if let Some(token) = strip_prefix_ignore_case(header, "bearer ") {
            let mut validation = Validation::new(Algorithm::HS256);
            validation.leeway = 0;
            validation.set_issuer(&[TOKEN_ISSUER]);
            let key = DecodingKey::from_secret(self.config.jwt_secret.as_bytes());
            return match jsonwebtoken::decode::<Value>(token.trim(), &key, &validation) {
                Ok(_) => true,
                Err(e) => {
                    debug!(error = %e, "Rejected bearer token");
                    false
                }
            };
        }
        false
    }

    fn login(&self, body: &Value) -> Reply {
        let username = body.get("username").and_then(Value::as_str).unwrap_or_default();
        let password = body.get("password").and_then(Value::as_str).unwrap_or_default();
        if !self.config.credentials.is_empty() && !self.check_password(username, password) {
            return Reply::error(401, HTTP_ERROR_UNAUTHORIZED, "Wrong credentials");
        }
        match self.issue_token(username) {
            Ok(jwt) => Reply::json(200, json!({ "jwt": jwt })),
            Err(e) => Reply::error(500, BAD_PARAMETER, &e.to_string()),
        }
    }

    /// Records the request and returns its sequence number.
    fn record(&self, request: RecordedRequest) -> usize {
        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
        requests.push(request);
        requests.len() - 1
    }

    fn matching_reaction(&self, seq_no: usize, request: &RecordedRequest) -> Option<Reaction> {
        let ctx = EvaluationContext { seq_no, request };
        self.rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|RequestRule(condition, _)| condition.eval(&ctx))
            .map(|RequestRule(_, reaction)| reaction.clone())
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

/// Splits `/_db/{name}/rest` into the database name and the rest of the path.
fn split_database(path: &str) -> (&str, &str) {
    match path.strip_prefix("/_db/") {
        Some(rest) => match rest.find('/') {
            Some(slash) => (&rest[..slash], &rest[slash..]),
            None => (rest, "/"),
        },
        None => (SYSTEM_DATABASE, path),
    }
}

fn inflate(headers: &BTreeMap<String, String>, body: Bytes) -> Result<Bytes, std::io::Error> {
    if headers.get("content-encoding").map(String::as_str) != Some("deflate") {
        return Ok(body);
    }
    let mut out = Vec::new();
    flate2::read::ZlibDecoder::new(&body[..]).read_to_end(&mut out)?;
    Ok(Bytes::from(out))
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = match self.body {
            Some(body) => (status, Json(body)).into_response(),
            None => status.into_response(),
        };
        for (name, value) in self.headers {
            match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().insert(name, value);
                }
                _ => warn!("Dropping invalid response header"),
            }
        }
        response
    }
}

async fn handle(
    State(shared): State<Arc<Shared>>,
    method: Method,
    uri: Uri,
    Query(params): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let headers: BTreeMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_owned(), value.to_str().ok()?.to_owned())))
        .collect();
    let body = match inflate(&headers, body) {
        Ok(body) => body,
        Err(e) => return Reply::error(400, BAD_PARAMETER, &format!("bad deflate body: {e}")).into_response(),
    };
    let request = RecordedRequest {
        method,
        path: uri.path().to_owned(),
        params,
        headers,
        body,
    };
    debug!(method = %request.method, path = %request.path, "Mock server received request");
    let seq_no = shared.record(request.clone());

    if let Some(reaction) = shared.matching_reaction(seq_no, &request) {
        if let Some(delay) = reaction.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((status, body)) = reaction.respond_with {
            let reply = reaction
                .headers
                .into_iter()
                .fold(Reply::json(status, body), |reply, (name, value)| reply.with_header(&name, value));
            return reply.into_response();
        }
    }

    serve(&shared, &request).await.into_response()
}

async fn serve(shared: &Shared, request: &RecordedRequest) -> Reply {
    let body = if request.body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(e) => return Reply::error(400, BAD_PARAMETER, &format!("malformed JSON: {e}")),
        }
    };

    let (database, path) = split_database(&request.path);
    if request.method == Method::POST && path == "/_open/auth" {
        return shared.login(&body);
    }
    if !shared.authorize(request) {
        return Reply::error(401, HTTP_ERROR_UNAUTHORIZED, "not authorized to execute this request");
    }

    let call = Call {
        database,
        method: request.method.as_str(),
        path,
        params: &request.params,
        headers: &request.headers,
        body,
    };
    let mut store = shared.store.lock().await;
    match request.header("x-arango-async") {
        Some(mode) if !path.starts_with("/_api/job") => {
            let reply = store.dispatch(call);
            if mode == "store" {
                let id = store.store_job(reply);
                Reply::empty(202).with_header("x-arango-async-id", id)
            } else {
                Reply::empty(202)
            }
        }
        _ => store.dispatch(call),
    }
}

/// A started [`MockServer`]. The server stops when this is dropped.
pub struct RunningMockServer {
    address: SocketAddr,
    shared: Arc<Shared>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl RunningMockServer {
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Base URL to give to a client.
    pub fn url(&self) -> String {
        format!("http://{}", self.address)
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.shared
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_requests(&self) {
        self.shared
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Replaces the request rules. `None` removes every rule.
    pub fn change_request_rules(&self, rules: Option<Vec<RequestRule>>) {
        *self.shared.rules.lock().unwrap_or_else(PoisonError::into_inner) = rules.unwrap_or_default();
    }

    pub fn turn_off_rules(&self) {
        self.change_request_rules(None);
    }

    /// Stops the server and waits for in-flight requests to finish.
    pub async fn finish(mut self) -> Result<(), MockServerError> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| MockServerError::Serve(e.to_string()))?
                .map_err(|e| MockServerError::Serve(e.to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for RunningMockServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for RunningMockServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningMockServer")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{json, Value};

    use super::{split_database, MockServer};
    use crate::{setup_tracing, Condition, Reaction, RequestRule};

    async fn read_json(response: reqwest::Response) -> Value {
        serde_json::from_slice(&response.bytes().await.unwrap()).unwrap()
    }

    #[test]
    fn database_prefix() {
        assert_eq!(split_database("/_db/school/_api/version"), ("school", "/_api/version"));
        assert_eq!(split_database("/_db/school"), ("school", "/"));
        assert_eq!(split_database("/_api/version"), ("_system", "/_api/version"));
    }

    #[tokio::test]
    async fn basic_and_jwt_authentication() {
        setup_tracing();
        let server = MockServer::builder()
            .user("root", "passwd")
            .build()
            .start()
            .await
            .unwrap();
        let client = reqwest::Client::new();
        let version = format!("{}/_db/_system/_api/version", server.url());

        let anonymous = client.get(&version).send().await.unwrap();
        assert_eq!(anonymous.status().as_u16(), 401);

        let basic = client
            .get(&version)
            .basic_auth("root", Some("passwd"))
            .send()
            .await
            .unwrap();
        assert_eq!(basic.status().as_u16(), 200);

        let login = client
            .post(format!("{}/_db/_system/_open/auth", server.url()))
            .body(r#"{"username": "root", "password": "passwd"}"#)
            .send()
            .await
            .unwrap();
        let jwt = read_json(login).await["jwt"].as_str().unwrap().to_owned();
        let bearer = client
            .get(&version)
            .header("authorization", format!("bearer {jwt}"))
            .send()
            .await
            .unwrap();
        assert_eq!(bearer.status().as_u16(), 200);

        let forged = client
            .get(&version)
            .header("authorization", "bearer not.a.token")
            .send()
            .await
            .unwrap();
        assert_eq!(forged.status().as_u16(), 401);
        assert_eq!(server.requests().len(), 5);
    }

    #[tokio::test]
    async fn rules_override_answers() {
        setup_tracing();
        let server = MockServer::builder().build().start().await.unwrap();
        server.change_request_rules(Some(vec![RequestRule(
            Condition::PathContains("/_api/version".to_owned()),
            Reaction::error(503, 503, "unavailable").with_delay(Duration::from_millis(10)),
        )]));
        let client = reqwest::Client::new();

        let response = client
            .get(format!("{}/_api/version", server.url()))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 503);

        server.turn_off_rules();
        let response = client
            .get(format!("{}/_api/version", server.url()))
            .send()
            .await
            .unwrap();
        assert_eq!(read_json(response).await["server"], "arango");
    }

    #[tokio::test]
    async fn async_results_are_stored() {
        setup_tracing();
        let server = MockServer::builder().build().start().await.unwrap();
        let client = reqwest::Client::new();

        let accepted = client
            .post(format!("{}/_api/cursor", server.url()))
            .header("x-arango-async", "store")
            .body(json!({"query": "RETURN 42"}).to_string())
            .send()
            .await
            .unwrap();
        assert_eq!(accepted.status().as_u16(), 202);
        let id = accepted.headers()["x-arango-async-id"].to_str().unwrap().to_owned();

        let result = client
            .put(format!("{}/_api/job/{id}", server.url()))
            .send()
            .await
            .unwrap();
        assert_eq!(result.status().as_u16(), 201);
        assert_eq!(result.headers()["x-arango-async-id"].to_str().unwrap(), id);
        assert_eq!(read_json(result).await["result"], json!([42]));

        let gone = client
            .put(format!("{}/_api/job/{id}", server.url()))
            .send()
            .await
            .unwrap();
        assert_eq!(gone.status().as_u16(), 404);
        server.finish().await.unwrap();
    }
}
