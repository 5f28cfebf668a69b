use std::net::TcpListener;

use arango::authentication::Auth;
use arango::{ArangoClient, AuthMethod, ClientBuilder, DatabaseOptions, StandardDatabase};
use arango_mock::{MockServer, RunningMockServer};

pub(crate) const USERNAME: &str = "root";
pub(crate) const PASSWORD: &str = "passwd";

pub(crate) fn setup_tracing() {
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Starts a fake coordinator with the test user and a `school` database.
pub(crate) async fn start_server() -> RunningMockServer {
    MockServer::builder()
        .user(USERNAME, PASSWORD)
        .database("school")
        .build()
        .start()
        .await
        .unwrap()
}

/// An address nothing listens on.
pub(crate) fn dead_host() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{address}")
}

pub(crate) fn client(hosts: &[String]) -> ArangoClient {
    ClientBuilder::new().hosts(hosts.iter().cloned()).build().unwrap()
}

pub(crate) fn credentials() -> DatabaseOptions {
    DatabaseOptions::new().auth(Auth::new(USERNAME, PASSWORD))
}

pub(crate) async fn school(server: &RunningMockServer) -> StandardDatabase {
    client(&[server.url()])
        .db("school", AuthMethod::Basic, credentials())
        .await
        .unwrap()
}
