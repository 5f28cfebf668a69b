//! ClientBuilder provides an easy way to create new clients

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arango_http::{DefaultDeserializer, DefaultSerializer, Deserializer, Serializer};

use super::arango_client::ArangoClient;
use crate::errors::ConfigError;
use crate::network::{CompressionManager, HttpClient, HttpClientConfig};
use crate::policies::host_resolver::HostResolver;

/// Address of a local server with default settings.
pub const DEFAULT_HOST: &str = "http://127.0.0.1:8529";

/// Configuration of an [`ArangoClient`].
///
/// Usually created and filled through a [`ClientBuilder`].
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URLs of the servers (coordinators, in a cluster).
    pub hosts: Vec<String>,
    /// Name of the resolver strategy: `"default"`, `"single"` or `"roundrobin"`.
    /// Ignored if `host_resolver` is set.
    pub resolver_strategy: String,
    /// Custom host resolver. Must cover exactly `hosts.len()` hosts.
    pub host_resolver: Option<Arc<dyn HostResolver>>,
    /// Attempt budget of a single request across hosts.
    /// Defaults to three attempts per host.
    pub max_tries: Option<usize>,
    /// Custom transport. If not set, a [`DefaultHttpClient`](crate::network::DefaultHttpClient)
    /// is built from `http_client_config`.
    pub http_client: Option<Arc<dyn HttpClient>>,
    /// Settings of the default transport.
    pub http_client_config: HttpClientConfig,
    /// Request compression, disabled if not set.
    pub compression: Option<Arc<dyn CompressionManager>>,
    /// Encodes request payloads.
    pub serializer: Arc<dyn Serializer>,
    /// Decodes response bodies.
    pub deserializer: Arc<dyn Deserializer>,
    /// How long before expiry a rejected JWT token is considered stale.
    pub jwt_expire_leeway: Duration,
}

impl ClientConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        ClientConfig {
            hosts: vec![DEFAULT_HOST.to_owned()],
            resolver_strategy: "default".to_owned(),
            host_resolver: None,
            max_tries: None,
            http_client: None,
            http_client_config: HttpClientConfig::default(),
            compression: None,
            serializer: Arc::new(DefaultSerializer::default()),
            deserializer: Arc::new(DefaultDeserializer::default()),
            jwt_expire_leeway: Duration::ZERO,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("hosts", &self.hosts)
            .field("resolver_strategy", &self.resolver_strategy)
            .field("host_resolver", &self.host_resolver)
            .field("max_tries", &self.max_tries)
            .field("http_client", &self.http_client)
            .field("http_client_config", &self.http_client_config)
            .field("compression", &self.compression.is_some())
            .field("jwt_expire_leeway", &self.jwt_expire_leeway)
            .finish_non_exhaustive()
    }
}

/// ClientBuilder is used to create new [`ArangoClient`] instances
/// # Example
///
/// ```
/// # use arango::client::ClientBuilder;
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ClientBuilder::new()
///     .host("http://db1:8529")
///     .host("http://db2:8529")
///     .resolver_strategy("roundrobin")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct ClientBuilder {
    /// The configuration being built.
    pub config: ClientConfig,
    explicit_hosts: bool,
}

impl ClientBuilder {
    /// Creates new ClientBuilder with default configuration
    /// # Default configuration
    /// * Hosts: `http://127.0.0.1:8529`
    /// * Resolver: `"default"` (sticks to one host until it fails)
    /// * Compression: None
    pub fn new() -> Self {
        ClientBuilder {
            config: ClientConfig::new(),
            explicit_hosts: false,
        }
    }

    /// Add a host. The first call replaces the default host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        if !self.explicit_hosts {
            self.config.hosts.clear();
            self.explicit_hosts = true;
        }
        self.config.hosts.push(host.into());
        self
    }

    /// Add a list of hosts. The first call replaces the default host.
    pub fn hosts(mut self, hosts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for host in hosts {
            self = self.host(host);
        }
        self
    }

    /// Select a resolver strategy by name.
    /// # Example
    /// ```
    /// # use arango::client::ClientBuilder;
    /// let builder = ClientBuilder::new().resolver_strategy("roundrobin");
    /// ```
    pub fn resolver_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.config.resolver_strategy = strategy.into();
        self
    }

    /// Use a custom host resolver instead of a named strategy.
    pub fn host_resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.config.host_resolver = Some(resolver);
        self
    }

    /// Set the attempt budget of a single request. Must not be lower than the host count.
    pub fn max_tries(mut self, max_tries: usize) -> Self {
        self.config.max_tries = Some(max_tries);
        self
    }

    /// Use a custom transport.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.config.http_client = Some(client);
        self
    }

    /// Configure the default transport. Ignored if a custom transport is set.
    pub fn http_client_config(mut self, config: HttpClientConfig) -> Self {
        self.config.http_client_config = config;
        self
    }

    /// Enable request compression for every database of the client.
    pub fn compression(mut self, compression: Option<Arc<dyn CompressionManager>>) -> Self {
        self.config.compression = compression;
        self
    }

    /// Use a custom serializer for request payloads.
    pub fn serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.config.serializer = serializer;
        self
    }

    /// Use a custom deserializer for response bodies.
    pub fn deserializer(mut self, deserializer: Arc<dyn Deserializer>) -> Self {
        self.config.deserializer = deserializer;
        self
    }

    /// A JWT token rejected with 401 is refreshed if it expires within `leeway`.
    pub fn jwt_expire_leeway(mut self, leeway: Duration) -> Self {
        self.config.jwt_expire_leeway = leeway;
        self
    }

    /// Builds the client. Opens no connections.
    pub fn build(self) -> Result<ArangoClient, ConfigError> {
        ArangoClient::connect(self.config)
    }
}
