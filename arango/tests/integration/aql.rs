use arango::api::{CollectionOptions, InsertOptions, QueryOptions};
use arango::errors::{ApiOperation, ExecutionError};
use assert_matches::assert_matches;
use serde_json::{json, Value};

use crate::utils::{school, setup_tracing, start_server};

#[tokio::test]
#[ntest::timeout(10000)]
async fn cursor_walks_all_batches() {
    setup_tracing();
    let server = start_server().await;
    let db = school(&server).await;

    let options = QueryOptions {
        batch_size: Some(3),
        count: Some(true),
        ..Default::default()
    };
    let mut cursor = db
        .aql()
        .execute("FOR i IN 1..10 RETURN i", &options)
        .await
        .unwrap()
        .into_value()
        .unwrap();
    assert_eq!(cursor.count(), Some(10));
    assert!(cursor.has_more());
    assert_eq!(cursor.batch().len(), 3);

    let mut seen = Vec::new();
    while let Some(value) = cursor.next().await.unwrap() {
        seen.push(value.as_i64().unwrap());
    }
    assert_eq!(seen, (1..=10).collect::<Vec<_>>());
    assert!(cursor.is_exhausted());

    let fetches = server
        .requests()
        .iter()
        .filter(|r| r.path.starts_with("/_db/school/_api/cursor/"))
        .count();
    assert_eq!(fetches, 3);
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn collection_query_with_bind_vars() {
    setup_tracing();
    let server = start_server().await;
    let db = school(&server).await;
    let students = db
        .create_collection("students", &CollectionOptions::default())
        .await
        .unwrap()
        .into_value()
        .unwrap();
    for key in ["anna", "bob"] {
        students
            .insert(json!({ "_key": key }), &InsertOptions::default())
            .await
            .unwrap();
    }

    let options = QueryOptions {
        bind_vars: json!({"@col": "students"}).as_object().cloned(),
        ..Default::default()
    };
    let keys: Vec<Value> = db
        .aql()
        .execute("FOR s IN @@col RETURN s", &options)
        .await
        .unwrap()
        .into_value()
        .unwrap()
        .collect()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s["_key"].clone())
        .collect();
    assert_eq!(keys, vec![json!("anna"), json!("bob")]);

    let parsed = db
        .aql()
        .validate("FOR s IN students RETURN s")
        .await
        .unwrap()
        .into_value()
        .unwrap();
    assert_eq!(parsed["collections"], json!(["students"]));
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn query_errors() {
    setup_tracing();
    let server = start_server().await;
    let db = school(&server).await;

    let err = db
        .aql()
        .execute("SELECT * FROM students", &QueryOptions::default())
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ExecutionError::Server(e) if e.operation == ApiOperation::AqlQueryExecute && e.http_code == 400
    );

    assert!(!db.aql().kill("17", true, false).await.unwrap().into_value().unwrap());
    assert!(db.aql().queries(false).await.unwrap().into_value().unwrap().is_empty());
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn closed_cursor_is_gone() {
    setup_tracing();
    let server = start_server().await;
    let db = school(&server).await;

    let options = QueryOptions {
        batch_size: Some(1),
        ..Default::default()
    };
    let mut cursor = db
        .aql()
        .execute("FOR i IN 1..3 RETURN i", &options)
        .await
        .unwrap()
        .into_value()
        .unwrap();
    let id = cursor.id().unwrap().to_owned();
    assert!(cursor.close(false).await.unwrap());
    assert!(cursor.is_exhausted());

    let deletes: Vec<_> = server
        .requests()
        .into_iter()
        .filter(|r| r.method == "DELETE")
        .map(|r| r.path)
        .collect();
    assert_eq!(deletes, vec![format!("/_db/school/_api/cursor/{id}")]);
}
