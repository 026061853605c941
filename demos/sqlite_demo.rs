//! Example: describes a `user` model as metadata, registers an in-memory SQLite pool,
//! then creates, reads and lists rows through the engine.

use metadata_engine::response::success_one;
use metadata_engine::{Engine, ListParams, MemoryStore, MetadataSet, Record, Settings};
use serde_json::json;
use sqlx::any::AnyPoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("metadata_engine=info".parse()?))
        .init();

    let set: MetadataSet = serde_json::from_value(json!({
        "connections": [{"id": "main", "kind": "sqlite"}],
        "models": [{"id": "user", "code": "user", "name": "Users", "conn_id": "main"}],
        "tables": [{"id": "t1", "model_id": "user", "table_name": "users", "is_main": true}],
        "fields": [
            {"id": "f1", "model_id": "user", "table_name": "users", "column_name": "id", "field_type": "integer", "is_primary_key": true},
            {"id": "f2", "model_id": "user", "table_name": "users", "column_name": "name", "field_type": "string", "nullable": false, "max_length": 50},
            {"id": "f3", "model_id": "user", "table_name": "users", "column_name": "age", "field_type": "integer", "max": 150}
        ],
        "orders": [{"model_id": "user", "table_name": "users", "column_name": "id", "order_type": "ASC"}]
    }))?;

    let engine = Engine::new(Arc::new(MemoryStore::new(set)?), Settings::from_env());

    sqlx::any::install_default_drivers();
    let pool = AnyPoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER)")
        .execute(&pool)
        .await?;
    engine.registry().inject("main", pool).await;

    let crud = engine.crud();
    for (id, name, age) in [(1, "alice", 30), (2, "bob", 17), (3, "carol", 52)] {
        let row = Record::from_json(&json!({"id": id, "name": name, "age": age}))?;
        crud.create("user", &row).await?;
    }

    let alice = crud.get("user", 1).await?;
    println!("{}", serde_json::to_string_pretty(&success_one(alice))?);

    let params = ListParams::from_json(&json!({
        "page": 1,
        "page_size": 2,
        "filters": [{"column_name": "age", "operator": ">=", "value": 18}]
    }))?;
    let page = crud.list("user", &params).await?;
    println!("{}", serde_json::to_string_pretty(&success_one(page))?);
    Ok(())
}
