use std::time::Duration;

use arango::errors::ExecutionError;
use arango::network::HttpClientConfig;
use arango::policies::host_resolver::HostResolver as _;
use arango::{AuthMethod, ClientBuilder};
use arango_mock::{Condition, Reaction, RequestRule};
use assert_matches::assert_matches;

use crate::utils::{credentials, dead_host, setup_tracing, start_server};

fn quick_config() -> HttpClientConfig {
    HttpClientConfig {
        connect_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

#[tokio::test]
#[ntest::timeout(20000)]
async fn unreachable_host_is_skipped() {
    setup_tracing();
    let server = start_server().await;
    let client = ClientBuilder::new()
        .hosts([dead_host(), server.url()])
        .http_client_config(quick_config())
        .build()
        .unwrap();
    let db = client
        .db("school", AuthMethod::Basic, credentials())
        .await
        .unwrap();

    for _ in 0..3 {
        assert_eq!(db.collection("_graphs").count().await.unwrap().into_value().unwrap(), 0);
    }
    // The resolver stays on the live host once it switched.
    assert_eq!(client.host_resolver().get_host_index(), 1);
    assert_eq!(server.requests().len(), 3);
}

#[tokio::test]
#[ntest::timeout(20000)]
async fn all_hosts_unreachable() {
    setup_tracing();
    let client = ClientBuilder::new()
        .hosts([dead_host(), dead_host()])
        .max_tries(4)
        .http_client_config(quick_config())
        .build()
        .unwrap();
    let db = client
        .db("school", AuthMethod::Basic, credentials())
        .await
        .unwrap();

    let err = db.version(false).await.unwrap_err();
    assert_matches!(
        err,
        ExecutionError::ConnectionAborted { max_tries: 4, ref endpoint, .. }
            if endpoint == "/_db/school/_api/version"
    );
}

#[tokio::test]
#[ntest::timeout(20000)]
async fn server_errors_are_not_retried() {
    setup_tracing();
    let first = start_server().await;
    let second = start_server().await;
    first.change_request_rules(Some(vec![RequestRule(
        Condition::PathContains("/_api/version".to_owned()),
        Reaction::error(503, 503, "service unavailable"),
    )]));
    let client = ClientBuilder::new()
        .hosts([first.url(), second.url()])
        .build()
        .unwrap();
    let db = client
        .db("school", AuthMethod::Basic, credentials())
        .await
        .unwrap();

    let err = db.version(false).await.unwrap_err();
    assert_matches!(err, ExecutionError::Server(e) if e.http_code == 503);
    assert!(second.requests().is_empty());
}
