//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use common::RetryPolicy;
use sqlx::PgPool;
use store::{KeyValueStore, PostgresKeyValueStore, StoreHandle};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresKeyValueStore::run_migrations(&temp_pool)
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store over `table` with its own pool and a cleared table
async fn get_test_store(table: &str) -> PostgresKeyValueStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(&format!("TRUNCATE TABLE {table}"))
        .execute(&pool)
        .await
        .unwrap();

    PostgresKeyValueStore::new(pool, table).unwrap()
}

#[tokio::test]
async fn test_set_and_get() {
    let store = get_test_store("stock").await;

    store.set("item-1", b"payload").await.unwrap();

    assert_eq!(
        store.get("item-1").await.unwrap(),
        Some(b"payload".to_vec())
    );
    assert_eq!(store.get("item-2").await.unwrap(), None);
}

#[tokio::test]
async fn test_set_overwrites() {
    let store = get_test_store("orders").await;

    store.set("order-1", b"v1").await.unwrap();
    store.set("order-1", b"v2").await.unwrap();

    assert_eq!(store.get("order-1").await.unwrap(), Some(b"v2".to_vec()));
}

#[tokio::test]
async fn test_bulk_round_trip_preserves_key_order() {
    let store = get_test_store("payment").await;

    store
        .set_many(&[
            ("u1".to_string(), b"10".to_vec()),
            ("u2".to_string(), b"20".to_vec()),
        ])
        .await
        .unwrap();

    let values = store
        .get_many(&["u2".to_string(), "nope".to_string(), "u1".to_string()])
        .await
        .unwrap();

    assert_eq!(
        values,
        vec![Some(b"20".to_vec()), None, Some(b"10".to_vec())]
    );
}

#[tokio::test]
async fn test_empty_bulk_operations() {
    let store = get_test_store("stock").await;

    store.set_many(&[]).await.unwrap();
    assert!(store.get_many(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reconnect_and_handle() {
    let store = get_test_store("stock").await;
    store.reconnect().await.unwrap();

    let handle = StoreHandle::new(
        Arc::new(store),
        RetryPolicy::bounded(3, Duration::from_millis(10)),
    );
    handle.set("k", b"v").await.unwrap();
    assert_eq!(handle.get("k").await.unwrap(), Some(b"v".to_vec()));
}
