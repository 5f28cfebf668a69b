use arango::errors::{ApiOperation, ExecutionError};
use arango::JobStatus;
use assert_matches::assert_matches;

use crate::utils::{school, setup_tracing, start_server};

#[tokio::test]
#[ntest::timeout(10000)]
async fn async_job_results() {
    setup_tracing();
    let server = start_server().await;
    let db = school(&server).await;
    let async_db = db.begin_async_execution(true);

    let job = async_db.version(false).await.unwrap().into_job().unwrap();
    assert_eq!(job.status().await.unwrap(), JobStatus::Done);
    assert_eq!(db.async_jobs("done", None).await.unwrap(), vec![job.id().to_owned()]);

    let version = job.result().await.unwrap();
    assert_eq!(version["server"], "arango");
    let err = job.result().await.unwrap_err();
    assert_matches!(err, ExecutionError::Server(e) if e.operation == ApiOperation::AsyncJobResult);

    let job = async_db.collection("_graphs").count().await.unwrap().into_job().unwrap();
    assert!(job.clear(false).await.unwrap());
    assert!(!job.clear(true).await.unwrap());
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn fire_and_forget() {
    setup_tracing();
    let server = start_server().await;
    let db = school(&server).await;

    let result = db
        .begin_async_execution(false)
        .collection("_graphs")
        .count()
        .await
        .unwrap();
    assert!(result.is_none());
    assert!(db.async_jobs("done", None).await.unwrap().is_empty());

    let async_db = db.begin_async_execution(true);
    async_db.version(false).await.unwrap();
    async_db.version(false).await.unwrap();
    assert_eq!(db.async_jobs("done", Some(1)).await.unwrap().len(), 1);
    db.clear_async_jobs(None).await.unwrap();
    assert!(db.async_jobs("done", None).await.unwrap().is_empty());
}
