use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arango_http::{DefaultDeserializer, DefaultSerializer, Request, Response};
use async_trait::async_trait;
use serde_json::Value;

use crate::authentication::{JwtToken, TokenOptions};
use crate::errors::ConfigError;
use crate::network::{ConnectionParts, HttpClient, HttpSession, TransportError};
use crate::policies::host_resolver::get_resolver;

pub(crate) fn setup_tracing() {
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(tracing_subscriber::fmt::TestWriter::new())
        .try_init();
}

/// What a [`MockSession`] does with the next request.
#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    Respond {
        status: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    },
    Fail(TransportError),
}

impl Outcome {
    pub(crate) fn json(status: u16, body: Value) -> Self {
        Outcome::Respond {
            status,
            headers: vec![("content-type".to_owned(), "application/json".to_owned())],
            body: body.to_string().into_bytes(),
        }
    }

    pub(crate) fn raw(status: u16, body: &str) -> Self {
        Outcome::Respond {
            status,
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    pub(crate) fn with_header(mut self, name: &str, value: &str) -> Self {
        if let Outcome::Respond { headers, .. } = &mut self {
            headers.push((name.to_owned(), value.to_owned()));
        }
        self
    }

    pub(crate) fn refused() -> Self {
        Outcome::Fail(TransportError::Connect {
            host: String::new(),
            message: "connection refused".to_owned(),
        })
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        412 => "Precondition Failed",
        500 => "Internal Server Error",
        _ => "",
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub(crate) host: String,
    pub(crate) request: Request,
}

/// Scripted session: replays queued outcomes, then the fallback outcome
/// (an empty `200` unless set otherwise).
#[derive(Debug)]
pub(crate) struct MockSession {
    host: String,
    queue: Mutex<VecDeque<Outcome>>,
    fallback: Mutex<Option<Outcome>>,
    log: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockSession {
    pub(crate) fn push(&self, outcome: Outcome) {
        self.queue.lock().unwrap().push_back(outcome);
    }

    pub(crate) fn set_fallback(&self, outcome: Outcome) {
        *self.fallback.lock().unwrap() = Some(outcome);
    }

    fn next_outcome(&self) -> Outcome {
        if let Some(outcome) = self.queue.lock().unwrap().pop_front() {
            return outcome;
        }
        self.fallback
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Outcome::json(200, serde_json::json!({})))
    }
}

#[async_trait]
impl HttpSession for MockSession {
    fn host(&self) -> &str {
        &self.host
    }

    async fn send_request(&self, request: &Request) -> Result<Response, TransportError> {
        self.log.lock().unwrap().push(RecordedRequest {
            host: self.host.clone(),
            request: request.clone(),
        });
        match self.next_outcome() {
            Outcome::Respond {
                status,
                headers,
                body,
            } => Ok(Response::new(
                request.method(),
                format!("{}{}", self.host, request.endpoint()),
                headers,
                status,
                status_text(status),
                body,
            )),
            Outcome::Fail(TransportError::Connect { message, .. }) => {
                Err(TransportError::Connect {
                    host: self.host.clone(),
                    message,
                })
            }
            Outcome::Fail(e) => Err(e),
        }
    }

    async fn close(&self) {}
}

/// In-memory transport recording every request, across all its sessions.
#[derive(Debug, Default)]
pub(crate) struct MockHttpClient {
    sessions: Mutex<HashMap<String, Arc<MockSession>>>,
    log: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockHttpClient {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(MockHttpClient::default())
    }

    /// The session of `host`, created on first use.
    pub(crate) fn session(&self, host: &str) -> Arc<MockSession> {
        let mut sessions = self.sessions.lock().unwrap();
        Arc::clone(sessions.entry(host.to_owned()).or_insert_with(|| {
            Arc::new(MockSession {
                host: host.to_owned(),
                queue: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(None),
                log: Arc::clone(&self.log),
            })
        }))
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    fn create_session(&self, host: &str) -> Result<Arc<dyn HttpSession>, ConfigError> {
        Ok(self.session(host))
    }
}

/// Parts of a `_system` connection over `client`, one session per host.
pub(crate) fn connection_parts(
    client: &Arc<MockHttpClient>,
    hosts: &[&str],
    strategy: &str,
    max_tries: Option<usize>,
) -> ConnectionParts {
    let sessions: Vec<Arc<dyn HttpSession>> = hosts
        .iter()
        .map(|host| client.session(host) as Arc<dyn HttpSession>)
        .collect();
    ConnectionParts {
        sessions: sessions.into(),
        host_resolver: get_resolver(strategy, hosts.len(), max_tries).unwrap(),
        http_client: Arc::clone(client) as Arc<dyn HttpClient>,
        db_name: "_system".to_owned(),
        compression: None,
        serializer: Arc::new(DefaultSerializer::default()),
        deserializer: Arc::new(DefaultDeserializer::default()),
    }
}

/// A token valid for `ttl_secs` seconds from now.
pub(crate) fn make_token(ttl_secs: u64) -> JwtToken {
    JwtToken::generate(
        "secret",
        TokenOptions {
            expires_in: Duration::from_secs(ttl_secs),
            ..Default::default()
        },
    )
    .unwrap()
}
