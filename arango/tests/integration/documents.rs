use arango::api::{
    CollectionOptions, CollectionType, DeleteOptions, DocumentOptions, InsertOptions,
    OverwriteMode, UpdateOptions,
};
use arango::errors::{ApiOperation, ExecutionError};
use assert_matches::assert_matches;
use serde_json::json;

use crate::utils::{school, setup_tracing, start_server};

#[tokio::test]
#[ntest::timeout(10000)]
async fn collection_management() {
    setup_tracing();
    let server = start_server().await;
    let db = school(&server).await;

    assert!(!db.has_collection("students").await.unwrap().into_value().unwrap());
    let options = CollectionOptions {
        collection_type: CollectionType::Edge,
        wait_for_sync: Some(true),
        ..Default::default()
    };
    let students = db
        .create_collection("students", &options)
        .await
        .unwrap()
        .into_value()
        .unwrap();
    assert_eq!(students.name(), "students");

    let properties = students.properties().await.unwrap().into_value().unwrap();
    assert_eq!(properties["type"], 3);
    assert_eq!(properties["waitForSync"], true);
    assert!(properties.get("error").is_none());

    let err = db
        .create_collection("students", &CollectionOptions::default())
        .await
        .unwrap_err();
    assert_matches!(err, ExecutionError::Server(e) if e.http_code == 409);

    let names: Vec<String> = db
        .collections(Some(true))
        .await
        .unwrap()
        .into_value()
        .unwrap()
        .into_iter()
        .map(|c| c["name"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(names, vec!["students".to_owned()]);

    assert!(db.delete_collection("students", false, None).await.unwrap().into_value().unwrap());
    assert!(!db.delete_collection("students", true, None).await.unwrap().into_value().unwrap());
    let err = db.delete_collection("students", false, None).await.unwrap_err();
    assert_matches!(err, ExecutionError::Server(e) if e.operation == ApiOperation::CollectionDelete);
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn document_lifecycle() {
    setup_tracing();
    let server = start_server().await;
    let db = school(&server).await;
    let students = db
        .create_collection("students", &CollectionOptions::default())
        .await
        .unwrap()
        .into_value()
        .unwrap();

    let inserted = students
        .insert(
            json!({"_key": "anna", "gpa": 3.5}),
            &InsertOptions {
                return_new: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .into_value()
        .unwrap()
        .unwrap();
    assert_eq!(inserted["_id"], "students/anna");
    assert_eq!(inserted["new"]["gpa"], 3.5);
    let first_rev = inserted["_rev"].as_str().unwrap().to_owned();

    assert!(students.has("anna", &DocumentOptions::default()).await.unwrap().into_value().unwrap());
    assert!(!students.has("bob", &DocumentOptions::default()).await.unwrap().into_value().unwrap());

    students
        .update(json!({"_key": "anna", "gpa": 3.8}), &UpdateOptions::default())
        .await
        .unwrap();
    let anna = students
        .get("students/anna", &DocumentOptions::default())
        .await
        .unwrap()
        .into_value()
        .unwrap()
        .unwrap();
    assert_eq!(anna["gpa"], 3.8);
    assert_ne!(anna["_rev"], first_rev.as_str());

    let stale = json!({"_key": "anna", "_rev": first_rev, "name": "Anna"});
    let err = students
        .replace(
            stale,
            &UpdateOptions {
                ignore_revs: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ExecutionError::Server(e) if e.operation == ApiOperation::DocumentRevision);

    let silent = students
        .replace(
            json!({"_key": "anna", "name": "Anna"}),
            &UpdateOptions {
                silent: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .into_value()
        .unwrap();
    assert_eq!(silent, None);
    let anna = students
        .get(&anna, &DocumentOptions::default())
        .await
        .unwrap()
        .into_value()
        .unwrap()
        .unwrap();
    assert_eq!(anna["name"], "Anna");
    assert!(anna.get("gpa").is_none());

    assert_eq!(students.count().await.unwrap().into_value().unwrap(), 1);
    assert!(students
        .delete("anna", false, &DeleteOptions::default())
        .await
        .unwrap()
        .into_value()
        .unwrap());
    assert!(!students
        .delete("anna", true, &DeleteOptions::default())
        .await
        .unwrap()
        .into_value()
        .unwrap());
    assert_eq!(
        students
            .get("anna", &DocumentOptions::default())
            .await
            .unwrap()
            .into_value()
            .unwrap(),
        None
    );
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn overwrite_modes() {
    setup_tracing();
    let server = start_server().await;
    let db = school(&server).await;
    let students = db
        .create_collection("students", &CollectionOptions::default())
        .await
        .unwrap()
        .into_value()
        .unwrap();
    students
        .insert(json!({"_key": "anna", "gpa": 3.5}), &InsertOptions::default())
        .await
        .unwrap();

    let err = students
        .insert(json!({"_key": "anna"}), &InsertOptions::default())
        .await
        .unwrap_err();
    assert_matches!(err, ExecutionError::Server(e) if e.http_code == 409);

    students
        .insert(
            json!({"_key": "anna", "year": 2}),
            &InsertOptions {
                overwrite_mode: Some(OverwriteMode::Update),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let anna = students
        .get("anna", &DocumentOptions::default())
        .await
        .unwrap()
        .into_value()
        .unwrap()
        .unwrap();
    assert_eq!(anna["gpa"], 3.5);
    assert_eq!(anna["year"], 2);

    let err = students
        .get("teachers/anna", &DocumentOptions::default())
        .await
        .unwrap_err();
    assert_matches!(err, ExecutionError::InvalidDocument(_));
    assert_eq!(server.requests().iter().filter(|r| r.path.contains("teachers")).count(), 0);
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn truncate_and_databases() {
    setup_tracing();
    let server = start_server().await;
    let school = school(&server).await;
    let students = school
        .create_collection("students", &CollectionOptions::default())
        .await
        .unwrap()
        .into_value()
        .unwrap();
    for key in ["a", "b", "c"] {
        students
            .insert(json!({ "_key": key }), &InsertOptions::default())
            .await
            .unwrap();
    }
    students.truncate(None, None).await.unwrap();
    assert_eq!(students.count().await.unwrap().into_value().unwrap(), 0);

    let err = school.databases().await.unwrap_err();
    assert_matches!(err, ExecutionError::Authentication(e) if e.http_code == 403 && e.hint.is_some());

    let system = crate::utils::client(&[server.url()])
        .db("_system", arango::AuthMethod::Basic, crate::utils::credentials())
        .await
        .unwrap();
    assert!(system.create_database("library", None).await.unwrap().into_value().unwrap());
    assert!(system.has_database("library").await.unwrap().into_value().unwrap());
    assert!(system.delete_database("library", false).await.unwrap().into_value().unwrap());
    assert!(!system.delete_database("library", true).await.unwrap().into_value().unwrap());
    assert_eq!(
        system.databases().await.unwrap().into_value().unwrap(),
        vec!["_system".to_owned(), "school".to_owned()]
    );
}
