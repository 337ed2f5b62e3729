use super::*;

#[tokio::test]
async fn list_filters_by_client_and_visibility() {
    let storage = storage_with_analysis("a-1").await;
    storage.save_analysis(&create_test_analysis("a-2", "client-1")).await.unwrap();
    storage.save_analysis(&create_test_analysis("b-1", "client-2")).await.unwrap();

    assert_eq!(storage.list_analyses("client-1", false, 10).await.unwrap().len(), 2);
    assert!(storage.list_analyses("client-1", true, 10).await.unwrap().is_empty());

    assert!(storage.set_analysis_shared("a-2", true).await.unwrap());
    let shared = storage.list_analyses("client-1", true, 10).await.unwrap();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].id, "a-2");
}

#[tokio::test]
async fn set_shared_on_unknown_analysis_returns_false() {
    let storage = MemoryStorage::new();
    assert!(!storage.set_analysis_shared("missing", true).await.unwrap());
}

#[tokio::test]
async fn list_respects_limit() {
    let storage = MemoryStorage::new();
    for i in 0..5 {
        storage.save_analysis(&create_test_analysis(&format!("a-{i}"), "client-1")).await.unwrap();
    }
    assert_eq!(storage.list_analyses("client-1", false, 3).await.unwrap().len(), 3);
}
