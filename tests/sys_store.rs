mod common;

use common::{metadata, row};
use metadata_engine::config::{ModelWhereConfig, QueryTemplate};
use metadata_engine::sql::DbKind;
use metadata_engine::{Engine, ListParams, MetadataStore, Settings, SysTableStore, Value};
use serde_json::json;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use std::sync::Arc;

async fn memory_pool() -> AnyPool {
    sqlx::any::install_default_drivers();
    AnyPoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

async fn sys_store() -> SysTableStore {
    let store = SysTableStore::new(memory_pool().await, DbKind::Sqlite, &Settings::default());
    store.ensure_sys_tables().await.unwrap();
    store.import(&metadata()).await.unwrap();
    store
}

#[tokio::test]
async fn imported_metadata_loads_back_in_order() {
    let store = sys_store().await;
    let set = store.load_set().await.unwrap();
    let models: Vec<&str> = set.models.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(models, vec!["user", "dept", "order", "item", "adults"]);
    assert_eq!(set.fields.len(), metadata().fields.len());

    let fields = store.fields("user").await.unwrap();
    let columns: Vec<&str> = fields.iter().map(|f| f.column_name.as_str()).collect();
    assert_eq!(columns, vec!["id", "name", "age"]);
    assert!(store.model_by_id("nope").await.unwrap().is_none());
    assert_eq!(store.model_by_code("dept").await.unwrap().unwrap().id, "dept");
    assert!(store.relation("order", "item").await.unwrap().is_some());
    assert!(store.raw_sql("adults").await.unwrap().is_some());
}

#[tokio::test]
async fn templates_persist_through_the_store() {
    let store = sys_store().await;
    let engine = Engine::new(Arc::new(store), Settings::default());
    let templates = engine.templates();

    let t = templates
        .create_template(QueryTemplate {
            model_id: "user".into(),
            name: "adults".into(),
            conditions: vec![ModelWhereConfig {
                column_name: "age".into(),
                operator2: ">=".into(),
                value1: "18".into(),
                ..Default::default()
            }],
            ..Default::default()
        })
        .await
        .unwrap();
    templates.set_default("user", &t.id).await.unwrap();

    let loaded = templates.get_template(&t.id).await.unwrap().unwrap();
    assert!(loaded.is_default);
    assert_eq!(loaded.conditions[0].model_id, "user");
    assert_eq!(templates.templates_for_model("user").await.unwrap().len(), 1);

    assert!(templates.delete_template(&t.id).await.unwrap());
    assert!(templates.get_default_template("user").await.unwrap().is_none());
}

#[tokio::test]
async fn engine_runs_on_table_backed_metadata() {
    let engine = Engine::new(Arc::new(sys_store().await), Settings::default());
    let data = memory_pool().await;
    sqlx::query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER)")
        .execute(&data)
        .await
        .unwrap();
    engine.registry().inject("main", data).await;

    let crud = engine.crud();
    crud.create("user", &row(json!({"id": 7, "name": "gus", "age": 61})))
        .await
        .unwrap();
    let got = crud.get("user", 7).await.unwrap().unwrap();
    assert_eq!(got.get("name"), Some(&Value::from("gus")));
    assert_eq!(crud.count("user", &ListParams::default()).await.unwrap(), 1);
}
