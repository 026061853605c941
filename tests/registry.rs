use metadata_engine::config::ConnectionConfig;
use metadata_engine::{Engine, MemoryStore, MetadataSet, Settings};
use std::sync::Arc;

fn engine() -> Engine {
    let conn = |id: &str, kind: &str| ConnectionConfig {
        id: id.into(),
        kind: kind.into(),
        ..Default::default()
    };
    let set = MetadataSet {
        connections: vec![conn("shared", "sqlite"), conn("other", "sqlite"), conn("docs", "mongodb")],
        ..Default::default()
    };
    Engine::new(Arc::new(MemoryStore::new(set).unwrap()), Settings::default())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_lookups_open_one_pool() {
    let engine = engine();
    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.registry().get("shared").await.map(|_| ()) })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(engine.registry().connect_count(), 1);

    let pool = engine.registry().get("shared").await.unwrap();
    let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await.unwrap();
    assert_eq!(one, 1);
    assert_eq!(engine.registry().connect_count(), 1);

    engine.registry().get("other").await.unwrap();
    assert_eq!(engine.registry().connect_count(), 2);
}

#[tokio::test]
async fn unknown_or_driverless_connections_fail() {
    let engine = engine();
    let err = engine.registry().get("missing").await.unwrap_err();
    assert_eq!(err.code(), "not_found");
    let err = engine.registry().get("docs").await.unwrap_err();
    assert_eq!(err.code(), "config_error");
    assert_eq!(engine.registry().connect_count(), 0);
}
