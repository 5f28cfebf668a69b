//! `ArangoClient` is the main object used in the driver.\
//! It owns the transport sessions of every host and hands out database wrappers.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use arango_http::{Deserializer, Serializer};
use futures::future::join_all;
use tracing::{debug, trace};

use super::client_builder::ClientConfig;
use crate::api::StandardDatabase;
use crate::authentication::{Auth, JwtToken};
use crate::errors::{ConfigError, ExecutionError};
use crate::network::{
    BasicConnection, CompressionManager, Connection, ConnectionParts, DefaultHttpClient,
    HttpClient, HttpSession, JwtConnection, JwtSuperuserConnection,
};
use crate::policies::host_resolver::{get_resolver, HostResolver};

/// How a database connection authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMethod {
    /// HTTP Basic authentication. Requires credentials.
    #[default]
    Basic,
    /// User JWT authentication. Requires credentials, a token, or both.
    /// With credentials, the token is obtained and refreshed automatically.
    Jwt,
    /// Superuser JWT authentication. Requires a token, which is never refreshed.
    Superuser,
}

impl FromStr for AuthMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(AuthMethod::Basic),
            "jwt" => Ok(AuthMethod::Jwt),
            "superuser" => Ok(AuthMethod::Superuser),
            other => Err(ConfigError::UnsupportedAuthMethod(other.to_owned())),
        }
    }
}

/// Per-database settings passed to [`ArangoClient::db`].
#[derive(Clone, Default)]
pub struct DatabaseOptions {
    /// Credentials, required by Basic and JWT authentication.
    pub auth: Option<Auth>,
    /// Token, required by superuser authentication. Used instead of logging in with JWT.
    pub token: Option<JwtToken>,
    /// Ping the server before returning the wrapper.
    pub verify: bool,
    /// Supersedes the client-level compression.
    pub compression: Option<Arc<dyn CompressionManager>>,
    /// Supersedes the client-level serializer.
    pub serializer: Option<Arc<dyn Serializer>>,
    /// Supersedes the client-level deserializer.
    pub deserializer: Option<Arc<dyn Deserializer>>,
}

impl DatabaseOptions {
    /// Options with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the credentials.
    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Sets the token.
    pub fn token(mut self, token: JwtToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Ping the server before returning the wrapper.
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Overrides the client-level compression.
    pub fn compression(mut self, compression: Arc<dyn CompressionManager>) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Overrides the client-level serializer.
    pub fn serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Overrides the client-level deserializer.
    pub fn deserializer(mut self, deserializer: Arc<dyn Deserializer>) -> Self {
        self.deserializer = Some(deserializer);
        self
    }
}

impl fmt::Debug for DatabaseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseOptions")
            .field("auth", &self.auth)
            .field("token", &self.token.is_some())
            .field("verify", &self.verify)
            .field("compression", &self.compression.is_some())
            .field("serializer", &self.serializer)
            .field("deserializer", &self.deserializer)
            .finish()
    }
}

/// Client of an ArangoDB deployment.
///
/// Holds one transport session per host; the sessions, the host resolver
/// and the transport are shared by every database wrapper the client creates.
pub struct ArangoClient {
    hosts: Vec<String>,
    host_resolver: Arc<dyn HostResolver>,
    http_client: Arc<dyn HttpClient>,
    sessions: Arc<[Arc<dyn HttpSession>]>,
    compression: Option<Arc<dyn CompressionManager>>,
    serializer: Arc<dyn Serializer>,
    deserializer: Arc<dyn Deserializer>,
    jwt_expire_leeway: Duration,
}

impl fmt::Debug for ArangoClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArangoClient")
            .field("hosts", &self.hosts)
            .field("host_resolver", &self.host_resolver)
            .field("http_client", &self.http_client)
            .finish_non_exhaustive()
    }
}

impl ArangoClient {
    /// Creates a client out of a configuration. No request is sent.
    pub fn connect(config: ClientConfig) -> Result<Self, ConfigError> {
        if config.hosts.is_empty() {
            return Err(ConfigError::EmptyHostList);
        }
        let host_count = config.hosts.len();
        let host_resolver = match config.host_resolver {
            Some(resolver) if resolver.host_count() != host_count => {
                return Err(ConfigError::HostCountMismatch {
                    resolver: resolver.host_count(),
                    sessions: host_count,
                })
            }
            Some(resolver) => resolver,
            None => get_resolver(&config.resolver_strategy, host_count, config.max_tries)?,
        };
        let http_client: Arc<dyn HttpClient> = match config.http_client {
            Some(client) => client,
            None => Arc::new(DefaultHttpClient::new(config.http_client_config)?),
        };
        let sessions = config
            .hosts
            .iter()
            .map(|host| http_client.create_session(host))
            .collect::<Result<Vec<_>, _>>()?;
        trace!(hosts = ?config.hosts, "Client created");

        Ok(ArangoClient {
            hosts: config.hosts,
            host_resolver,
            http_client,
            sessions: sessions.into(),
            compression: config.compression,
            serializer: config.serializer,
            deserializer: config.deserializer,
            jwt_expire_leeway: config.jwt_expire_leeway,
        })
    }

    /// Configured host URLs.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Resolver shared by every database of this client.
    pub fn host_resolver(&self) -> &Arc<dyn HostResolver> {
        &self.host_resolver
    }

    /// Client-level compression, if any.
    pub fn compression(&self) -> Option<&Arc<dyn CompressionManager>> {
        self.compression.as_ref()
    }

    /// Transport sessions, one per host, in resolver index order.
    pub fn sessions(&self) -> &[Arc<dyn HttpSession>] {
        &self.sessions
    }

    /// Version of the driver.
    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Closes every session. Database wrappers of this client become unusable.
    pub async fn close(&self) {
        join_all(
            self.sessions
                .iter()
                .map(|session| self.http_client.close_session(session.as_ref())),
        )
        .await;
        debug!(hosts = ?self.hosts, "Client closed");
    }

    /// Returns a wrapper for the database `name`.
    ///
    /// With `options.verify`, the server is pinged first and a failure is
    /// returned instead of the wrapper.
    pub async fn db(
        &self,
        name: &str,
        auth_method: AuthMethod,
        options: DatabaseOptions,
    ) -> Result<StandardDatabase, ExecutionError> {
        let parts = ConnectionParts {
            sessions: Arc::clone(&self.sessions),
            host_resolver: Arc::clone(&self.host_resolver),
            http_client: Arc::clone(&self.http_client),
            db_name: name.to_owned(),
            compression: options.compression.or_else(|| self.compression.clone()),
            serializer: options
                .serializer
                .unwrap_or_else(|| Arc::clone(&self.serializer)),
            deserializer: options
                .deserializer
                .unwrap_or_else(|| Arc::clone(&self.deserializer)),
        };

        let connection: Arc<dyn Connection> = match auth_method {
            AuthMethod::Basic => {
                if options.auth.is_none() {
                    return Err(ConfigError::MissingCredentials(
                        "Basic authentication requires credentials",
                    )
                    .into());
                }
                Arc::new(BasicConnection::new(parts, options.auth)?)
            }
            AuthMethod::Jwt => Arc::new(JwtConnection::new(
                parts,
                options.auth,
                options.token,
                self.jwt_expire_leeway,
            )?),
            AuthMethod::Superuser => Arc::new(JwtSuperuserConnection::new(parts, options.token)?),
        };

        if options.verify {
            let status = connection.ping().await?;
            debug!(db = name, status, "Connection verified");
        }
        Ok(StandardDatabase::new(connection))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use serde_json::json;

    use super::{AuthMethod, DatabaseOptions};
    use crate::authentication::Auth;
    use crate::client::ClientBuilder;
    use crate::errors::{ApiOperation, ConfigError, ExecutionError};
    use crate::network::{DefaultCompressionManager, HttpClient};
    use crate::utils::test_utils::{make_token, setup_tracing, MockHttpClient, Outcome};

    fn client(mock: &Arc<MockHttpClient>, hosts: &[&str]) -> super::ArangoClient {
        ClientBuilder::new()
            .hosts(hosts.iter().copied())
            .http_client(Arc::clone(mock) as Arc<dyn HttpClient>)
            .build()
            .unwrap()
    }

    #[test]
    fn auth_method_names() {
        assert_eq!("jwt".parse::<AuthMethod>().unwrap(), AuthMethod::Jwt);
        assert_eq!(
            "kerberos".parse::<AuthMethod>().unwrap_err(),
            ConfigError::UnsupportedAuthMethod("kerberos".to_owned())
        );
    }

    #[tokio::test]
    async fn accessors() {
        let mock = MockHttpClient::new();
        let client = client(&mock, &["http://a:8529", "http://b:8529"]);
        assert_eq!(client.hosts(), ["http://a:8529", "http://b:8529"]);
        assert_eq!(client.host_resolver().host_count(), 2);
        assert_eq!(client.host_resolver().max_tries(), 6);
        assert_eq!(client.sessions().len(), 2);
        assert_eq!(client.version(), env!("CARGO_PKG_VERSION"));
        assert!(client.compression().is_none());
        client.close().await;
    }

    #[tokio::test]
    async fn db_requires_credentials_for_the_scheme() {
        let mock = MockHttpClient::new();
        let client = client(&mock, &["http://a"]);

        assert_matches!(
            client.db("school", AuthMethod::Basic, DatabaseOptions::new()).await,
            Err(ExecutionError::Config(ConfigError::MissingCredentials(_)))
        );
        assert_matches!(
            client.db("school", AuthMethod::Jwt, DatabaseOptions::new()).await,
            Err(ExecutionError::Config(ConfigError::MissingCredentials(_)))
        );
        let options = DatabaseOptions::new().auth(Auth::new("root", "passwd"));
        assert_matches!(
            client.db("school", AuthMethod::Superuser, options).await,
            Err(ExecutionError::Config(ConfigError::MissingCredentials(_)))
        );

        let options = DatabaseOptions::new().token(make_token(3600));
        let db = client.db("school", AuthMethod::Superuser, options).await.unwrap();
        assert_eq!(db.name(), "school");
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn verify_pings_the_server() {
        setup_tracing();
        let mock = MockHttpClient::new();
        let session = mock.session("http://a");
        session.push(Outcome::json(200, json!({"result": []})));
        session.push(Outcome::json(
            404,
            json!({"error": true, "errorNum": 1228, "errorMessage": "database not found"}),
        ));
        let client = client(&mock, &["http://a"]);

        let options = DatabaseOptions::new()
            .auth(Auth::new("root", "passwd"))
            .verify(true);
        client
            .db("school", AuthMethod::Basic, options.clone())
            .await
            .unwrap();
        assert_matches!(
            client.db("missing", AuthMethod::Basic, options).await,
            Err(ExecutionError::Server(e)) if e.operation == ApiOperation::Ping
        );

        let requests = mock.requests();
        assert_eq!(requests[0].request.endpoint(), "/_db/school/_api/collection");
        assert_eq!(
            requests[0].request.header("authorization"),
            Some("Basic cm9vdDpwYXNzd2Q=")
        );
    }

    #[tokio::test]
    async fn per_database_overrides() {
        let mock = MockHttpClient::new();
        let client = client(&mock, &["http://a"]);
        let options = DatabaseOptions::new()
            .auth(Auth::new("root", "passwd"))
            .compression(Arc::new(DefaultCompressionManager::new(Some(0), 6, None)));
        let db = client.db("school", AuthMethod::Basic, options).await.unwrap();

        db.collection("students")
            .insert(json!({"_key": "john"}), &Default::default())
            .await
            .unwrap();
        let request = &mock.requests()[0].request;
        assert_eq!(request.header("content-encoding"), Some("deflate"));
    }
}
