use std::time::Duration;

use arango::authentication::{Auth, JwtToken, TokenOptions};
use arango::errors::ExecutionError;
use arango::{AuthMethod, DatabaseOptions};
use assert_matches::assert_matches;

use crate::utils::{client, credentials, setup_tracing, start_server, PASSWORD, USERNAME};

#[tokio::test]
#[ntest::timeout(10000)]
async fn basic_authentication() {
    setup_tracing();
    let server = start_server().await;
    let client = client(&[server.url()]);

    let db = client
        .db("school", AuthMethod::Basic, credentials().verify(true))
        .await
        .unwrap();
    let version = db.version(false).await.unwrap().into_value().unwrap();
    assert_eq!(version["server"], "arango");

    let requests = server.requests();
    assert!(requests.iter().all(|r| r.path.starts_with("/_db/school/")));
    assert!(requests
        .iter()
        .all(|r| r.header("authorization").is_some_and(|h| h.starts_with("Basic "))));
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn wrong_password_fails_verification() {
    setup_tracing();
    let server = start_server().await;
    let options = DatabaseOptions::new()
        .auth(Auth::new(USERNAME, "wrong"))
        .verify(true);
    let err = client(&[server.url()])
        .db("school", AuthMethod::Basic, options)
        .await
        .unwrap_err();
    assert_matches!(err, ExecutionError::Authentication(e) if e.http_code == 401);
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn jwt_token_is_reused() {
    setup_tracing();
    let server = start_server().await;
    let db = client(&[server.url()])
        .db("school", AuthMethod::Jwt, credentials())
        .await
        .unwrap();

    for _ in 0..3 {
        db.collections(None).await.unwrap().into_value().unwrap();
    }

    let logins = server
        .requests()
        .iter()
        .filter(|r| r.path.ends_with("/_open/auth"))
        .count();
    assert_eq!(logins, 1);
    assert!(server
        .requests()
        .iter()
        .filter(|r| !r.path.ends_with("/_open/auth"))
        .all(|r| r.header("authorization").is_some_and(|h| h.starts_with("bearer "))));
}

#[tokio::test]
#[ntest::timeout(15000)]
async fn expired_jwt_token_is_refreshed() {
    setup_tracing();
    let server = arango_mock::MockServer::builder()
        .user(USERNAME, PASSWORD)
        .token_ttl(Duration::from_secs(1))
        .build()
        .start()
        .await
        .unwrap();
    let db = client(&[server.url()])
        .db("_system", AuthMethod::Jwt, credentials())
        .await
        .unwrap();

    db.version(false).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2100)).await;
    db.version(false).await.unwrap();

    let paths: Vec<String> = server.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(
        paths,
        vec![
            "/_db/_system/_open/auth",
            "/_db/_system/_api/version",
            "/_db/_system/_api/version",
            "/_db/_system/_open/auth",
            "/_db/_system/_api/version",
        ]
    );
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn superuser_token_from_secret() {
    setup_tracing();
    let server = start_server().await;
    let token = JwtToken::generate("secret", TokenOptions::default()).unwrap();
    let db = client(&[server.url()])
        .db(
            "school",
            AuthMethod::Superuser,
            DatabaseOptions::new().token(token).verify(true),
        )
        .await
        .unwrap();
    assert!(db.has_collection("_graphs").await.unwrap().into_value().unwrap());

    let forged = JwtToken::generate("not the secret", TokenOptions::default()).unwrap();
    let err = client(&[server.url()])
        .db(
            "school",
            AuthMethod::Superuser,
            DatabaseOptions::new().token(forged).verify(true),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ExecutionError::Authentication(_));
}
