//! Dog service tests against the in-memory engine

use kennel::request::{content_type, CONTENT_TYPE_HTML, CONTENT_TYPE_TEXT};
use kennel::{start, AppConfig, AppError, Dog, DogService, Method, MigrationPolicy, Request, StatusCode};
use kennel_core::storage::{Database, MemoryDatabase, MemoryFactory, Transaction};
use kennel_core::{open_db, KeyPath, RecordStore, TransactionMode};
use pretty_assertions::assert_eq;

/// Helper to start the service on a fresh in-memory database
async fn service() -> DogService<MemoryDatabase> {
    start(&MemoryFactory::new(), AppConfig::default()).await.unwrap()
}

fn config(version: u32, migration: MigrationPolicy) -> AppConfig {
    AppConfig {
        db_version: version,
        migration,
        ..AppConfig::default()
    }
}

fn seeded_rows() -> String {
    [
        Dog::new("Fireball", "Whippet").with_id(1),
        Dog::new("Oscar", "German Shorthaired Pointer").with_id(2),
        Dog::new("Clarice", "Whippet").with_id(3),
    ]
    .iter()
    .map(Dog::to_row)
    .collect()
}

async fn body(service: &DogService<MemoryDatabase>, method: Method, path: &str) -> String {
    let response = service.handle(&Request::new(method.clone(), path)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK, "{} {}: {}", method, path, response.body());
    response.into_body()
}

#[tokio::test]
async fn test_first_start_seeds_sample_dogs() {
    let service = service().await;

    let response = service.handle(&Request::new(Method::GET, "/dog")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), CONTENT_TYPE_HTML);
    assert_eq!(*response.body(), seeded_rows());
}

#[tokio::test]
async fn test_hello() {
    let service = service().await;
    let response = service.handle(&Request::new(Method::GET, "/hello")).await.unwrap();
    assert_eq!(response.body(), "Hello from service worker!");
    assert_eq!(content_type(&response), CONTENT_TYPE_TEXT);
}

#[tokio::test]
async fn test_unmatched_requests_are_declined() {
    let service = service().await;
    assert!(service.handle(&Request::new(Method::GET, "/cat")).await.is_none());
    assert!(service.handle(&Request::new(Method::PATCH, "/dog")).await.is_none());
    assert!(service.handle(&Request::new(Method::DELETE, "/dog")).await.is_none());
}

#[tokio::test]
async fn test_post_adds_dog_and_returns_row() {
    let service = service().await;
    let request = Request::new(Method::POST, "/dog").with_form([
        ("id", "1"),
        ("name", "Rex"),
        ("breed", "Border Collie"),
    ]);

    let response = service.handle(&request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(*response.body(), Dog::new("Rex", "Border Collie").with_id(4).to_row());

    let list = body(&service, Method::GET, "/dog").await;
    assert!(list.ends_with(&Dog::new("Rex", "Border Collie").with_id(4).to_row()));
}

#[tokio::test]
async fn test_delete_returns_remaining_rows() {
    let service = service().await;

    let rows = body(&service, Method::DELETE, "/dog/2").await;

    let expected: String = [
        Dog::new("Fireball", "Whippet").with_id(1),
        Dog::new("Clarice", "Whippet").with_id(3),
    ]
    .iter()
    .map(Dog::to_row)
    .collect();
    assert_eq!(rows, expected);
}

#[tokio::test]
async fn test_delete_missing_dog_is_not_an_error() {
    let service = service().await;
    let rows = body(&service, Method::DELETE, "/dog/999").await;
    assert_eq!(rows, seeded_rows());
}

#[tokio::test]
async fn test_delete_with_bad_id_is_bad_request() {
    let service = service().await;
    let response = service
        .handle(&Request::new(Method::DELETE, "/dog/rex"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.body().contains("rex"));
}

#[tokio::test]
async fn test_put_without_snoopy_changes_nothing() {
    let service = service().await;
    let rows = body(&service, Method::PUT, "/dog").await;
    assert_eq!(rows, seeded_rows());
}

#[tokio::test]
async fn test_put_renames_snoopy() {
    let service = service().await;
    let add = Request::new(Method::POST, "/dog").with_form([("name", "Snoopy"), ("breed", "Beagle")]);
    service.handle(&add).await.unwrap();

    let rows = body(&service, Method::PUT, "/dog").await;

    assert!(rows.contains(&Dog::new("Woodstock", "Beagle").with_id(4).to_row()));
    assert!(!rows.contains("Snoopy"));
}

#[tokio::test]
async fn test_store_failure_is_server_error() {
    let factory = MemoryFactory::new();
    let db = open_db(&factory, "empty", 1, |_db, _txn, _change| async move { Ok(()) })
        .await
        .unwrap();
    let service = DogService::new(db, AppConfig::default());

    let response = service.handle(&Request::new(Method::GET, "/dog")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body().starts_with("failed to get all records"));
}

#[tokio::test]
async fn test_reopen_same_version_keeps_data() {
    let factory = MemoryFactory::new();
    let first = start(&factory, AppConfig::default()).await.unwrap();
    first
        .handle(&Request::new(Method::POST, "/dog").with_form([("name", "Rex"), ("breed", "Pug")]))
        .await
        .unwrap();

    let second = start(&factory, AppConfig::default()).await.unwrap();
    let rows = body(&second, Method::GET, "/dog").await;
    assert!(rows.contains("Rex"));
}

#[tokio::test]
async fn test_version_bump_recreates_store() {
    let factory = MemoryFactory::new();
    let first = start(&factory, config(1, MigrationPolicy::Recreate)).await.unwrap();
    first
        .handle(&Request::new(Method::POST, "/dog").with_form([("name", "Rex"), ("breed", "Pug")]))
        .await
        .unwrap();

    let second = start(&factory, config(2, MigrationPolicy::Recreate)).await.unwrap();

    // Fresh store, fresh key generator, fresh sample data
    assert_eq!(body(&second, Method::GET, "/dog").await, seeded_rows());
}

#[tokio::test]
async fn test_version_bump_preserves_store() {
    let factory = MemoryFactory::new();
    let first = start(&factory, config(1, MigrationPolicy::Preserve)).await.unwrap();
    first
        .handle(&Request::new(Method::POST, "/dog").with_form([("name", "Rex"), ("breed", "Pug")]))
        .await
        .unwrap();

    let second = start(&factory, config(2, MigrationPolicy::Preserve)).await.unwrap();

    let mut expected = seeded_rows();
    expected.push_str(&Dog::new("Rex", "Pug").with_id(4).to_row());
    assert_eq!(body(&second, Method::GET, "/dog").await, expected);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let err = start(&MemoryFactory::new(), config(0, MigrationPolicy::Recreate))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

#[tokio::test]
async fn test_preserve_adds_missing_index() {
    let factory = MemoryFactory::new();
    let name = AppConfig::default().db_name;
    let db = open_db(&factory, &name, 1, |db, _txn, _change| async move {
        let store = RecordStore::new(db);
        let dogs = store.create_store("dogs", "id", true)?;
        store.create_index(&dogs, "breed-index", "breed", false)?;
        Ok(())
    })
    .await
    .unwrap();
    RecordStore::new(db.clone())
        .create_record("dogs", Dog::new("Snoopy", "Beagle").to_record(), None)
        .await
        .unwrap();
    db.close();

    let service = start(&factory, config(2, MigrationPolicy::Preserve)).await.unwrap();

    let txn = service
        .controller()
        .store()
        .transaction(&["dogs"], TransactionMode::ReadOnly)
        .unwrap();
    assert_eq!(txn.index_key_path("dogs", "name-index"), Ok(KeyPath::from("name")));

    // Existing records are kept and the rename can use the new index
    let rows = body(&service, Method::PUT, "/dog").await;
    assert_eq!(rows, Dog::new("Woodstock", "Beagle").with_id(1).to_row());
}
