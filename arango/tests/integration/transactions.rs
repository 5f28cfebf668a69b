use arango::api::{
    CollectionOptions, DocumentOptions, InsertOptions, TransactionOptions, TransactionStatus,
};
use arango::errors::ExecutionError;
use assert_matches::assert_matches;
use serde_json::json;

use crate::utils::{school, setup_tracing, start_server};

#[tokio::test]
#[ntest::timeout(10000)]
async fn commit_and_abort() {
    setup_tracing();
    let server = start_server().await;
    let db = school(&server).await;
    db.create_collection("students", &CollectionOptions::default())
        .await
        .unwrap();

    let options = TransactionOptions {
        write: vec!["students".to_owned()],
        ..Default::default()
    };
    let trx = db.begin_transaction(&options).await.unwrap();
    assert_eq!(trx.transaction_status().await.unwrap(), TransactionStatus::Running);

    trx.collection("students")
        .insert(json!({"_key": "anna"}), &InsertOptions::default())
        .await
        .unwrap();
    trx.commit_transaction().await.unwrap();
    assert_eq!(trx.transaction_status().await.unwrap(), TransactionStatus::Committed);

    let insert = server
        .requests()
        .into_iter()
        .find(|r| r.path == "/_db/school/_api/document/students")
        .unwrap();
    assert_eq!(insert.header("x-arango-trx-id"), Some(trx.transaction_id()));
    assert!(db
        .collection("students")
        .has("anna", &DocumentOptions::default())
        .await
        .unwrap()
        .into_value()
        .unwrap());

    // Calls through a finished transaction are rejected.
    let err = trx.collection("students").count().await.unwrap_err();
    assert_matches!(err, ExecutionError::Server(e) if e.http_code == 404);

    let second = db.begin_transaction(&options).await.unwrap();
    second.abort_transaction().await.unwrap();
    assert_eq!(second.transaction_status().await.unwrap(), TransactionStatus::Aborted);
    assert_matches!(second.commit_transaction().await, Err(ExecutionError::Server(_)));

    let fetched = db.fetch_transaction(second.transaction_id());
    assert_eq!(fetched.transaction_status().await.unwrap(), TransactionStatus::Aborted);
}
