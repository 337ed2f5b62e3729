use std::time::Duration;

use analysis_console_core::AnalysisResult;
use analysis_console_storage::{
    AnalysisStore, LocalBlobStore, StorageBackend, ThreadStore, UploadStore,
};
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use super::*;

struct Harness {
    router: Router,
    storage: Arc<StorageBackend>,
    _blobs: tempfile::TempDir,
}

async fn harness() -> Harness {
    let storage = Arc::new(StorageBackend::new_memory());
    let blobs = tempfile::tempdir().unwrap();
    let (event_tx, _) = broadcast::channel(16);
    let threads = Arc::new(
        ThreadSynchronizer::new(
            Arc::clone(&storage) as Arc<dyn ThreadStore>,
            Duration::from_secs(5),
        )
        .with_events(event_tx.clone()),
    );
    let analysis_service = Arc::new(
        AnalysisService::new(Arc::clone(&storage), None, Arc::clone(&threads))
            .with_events(event_tx.clone()),
    );
    let upload_service = Arc::new(
        UploadService::new(
            Arc::clone(&storage) as Arc<dyn UploadStore>,
            Arc::new(LocalBlobStore::new(blobs.path())),
        )
        .with_events(event_tx.clone()),
    );
    let analysis = AnalysisResult::new(
        "a-1".to_owned(),
        "agency-1".to_owned(),
        "client-1".to_owned(),
        None,
        "Revenue fell 8% in August.".to_owned(),
        "sales".to_owned(),
    );
    storage.save_analysis(&analysis).await.unwrap();

    let state = Arc::new(AppState {
        event_tx,
        analysis_service,
        threads,
        upload_service,
        storage_kind: storage.kind(),
    });
    Harness { router: create_router(state), storage, _blobs: blobs }
}

async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        },
        None => Body::empty(),
    };
    let response = router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn version_reports_backend() {
    let h = harness().await;
    let (status, body) = call(&h.router, Method::GET, "/api/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["storage"], "memory");
    assert_eq!(body["generation_configured"], false);
}

#[tokio::test]
async fn thread_share_and_clear_over_http() {
    let h = harness().await;

    let (status, body) = call(
        &h.router,
        Method::POST,
        "/api/analyses/a-1/thread/messages",
        Some(json!({ "content": "What drove the dip?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["index"], 0);
    call(
        &h.router,
        Method::POST,
        "/api/analyses/a-1/thread/messages",
        Some(json!({ "role": "assistant", "content": "Seasonal mix shift." })),
    )
    .await;

    let (status, body) = call(
        &h.router,
        Method::PUT,
        "/api/analyses/a-1/thread/shared/0",
        Some(json!({ "shared": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["flags_synced"], 1);
    assert_eq!(body["thread"]["messages"][1]["shared"], true);

    let (_, shared) = call(&h.router, Method::GET, "/api/clients/client-1/shared", None).await;
    assert_eq!(shared, json!([]));
    call(
        &h.router,
        Method::PUT,
        "/api/analyses/a-1/visibility",
        Some(json!({ "shared": true })),
    )
    .await;
    let (_, shared) = call(&h.router, Method::GET, "/api/clients/client-1/shared", None).await;
    assert_eq!(shared[0]["shared_replies"][0]["content"], "Seasonal mix shift.");

    let (status, body) = call(&h.router, Method::DELETE, "/api/analyses/a-1/thread", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 2);
    assert!(h.storage.list_messages("a-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn out_of_range_ordinal_is_bad_request() {
    let h = harness().await;
    let (status, body) = call(
        &h.router,
        Method::PUT,
        "/api/analyses/a-1/thread/shared/3",
        Some(json!({ "shared": true })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("ordinal 3"));
}

#[tokio::test]
async fn unknown_analysis_thread_is_not_found() {
    let h = harness().await;
    let (status, _) = call(&h.router, Method::GET, "/api/analyses/nope/thread", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reconcile_unknown_analysis_is_not_found_and_opens_nothing() {
    let h = harness().await;
    let (status, body) =
        call(&h.router, Method::POST, "/api/analyses/nope/thread/reconcile", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, body) =
        call(&h.router, Method::POST, "/api/analyses/nope/thread/detach", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detached"], false);
}

#[tokio::test]
async fn ask_without_generation_endpoint_is_unavailable() {
    let h = harness().await;
    let (status, _) = call(
        &h.router,
        Method::POST,
        "/api/analyses/a-1/thread/ask",
        Some(json!({ "instruction": "Will it recover?" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn upload_list_and_delete() {
    let h = harness().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/clients/client-1/uploads?file_name=sales.csv&period_id=2026-08")
        .header("content-type", "text/csv")
        .body(Body::from("day,revenue\n1,100\n"))
        .unwrap();
    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let record: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(record["content_type"], "text/csv");
    let id = record["id"].as_str().unwrap().to_owned();

    let (_, list) = call(&h.router, Method::GET, "/api/clients/client-1/uploads", None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = call(&h.router, Method::DELETE, &format!("/api/uploads/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(h.storage.get_upload(&id).await.unwrap().is_none());
}
