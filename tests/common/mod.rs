#![allow(dead_code)]

use metadata_engine::config::{
    ConnectionConfig, ModelConfig, ModelFieldConfig, ModelKind, ModelOrderConfig, ModelSqlConfig, ModelTableConfig,
    RelationConfig,
};
use metadata_engine::{Engine, MemoryStore, MetadataSet, Record, Settings};
use sqlx::any::AnyPoolOptions;
use std::sync::Arc;

const DDL: &[&str] = &[
    "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER)",
    "CREATE TABLE depts (id INTEGER PRIMARY KEY, parent_id INTEGER, name TEXT, level INTEGER, path TEXT)",
    "CREATE TABLE orders (id TEXT PRIMARY KEY, customer TEXT NOT NULL)",
    "CREATE TABLE items (id TEXT PRIMARY KEY, order_id TEXT NOT NULL, sku TEXT NOT NULL, qty INTEGER)",
];

fn model(id: &str) -> ModelConfig {
    ModelConfig {
        id: id.into(),
        code: id.into(),
        name: id.into(),
        conn_id: "main".into(),
        ..Default::default()
    }
}

fn table(model_id: &str, name: &str) -> ModelTableConfig {
    ModelTableConfig {
        id: format!("{}_t", model_id),
        model_id: model_id.into(),
        table_name: name.into(),
        is_main: true,
        ..Default::default()
    }
}

fn field(model_id: &str, table: &str, column: &str, field_type: &str) -> ModelFieldConfig {
    ModelFieldConfig {
        id: format!("{}_{}", model_id, column),
        model_id: model_id.into(),
        table_name: table.into(),
        column_name: column.into(),
        field_type: field_type.into(),
        ..Default::default()
    }
}

fn pk(mut f: ModelFieldConfig) -> ModelFieldConfig {
    f.is_primary_key = true;
    f
}

fn required(mut f: ModelFieldConfig) -> ModelFieldConfig {
    f.nullable = false;
    f
}

fn order_by(model_id: &str, table: &str, column: &str) -> ModelOrderConfig {
    ModelOrderConfig {
        model_id: model_id.into(),
        table_name: table.into(),
        column_name: column.into(),
        order_type: "ASC".into(),
        ..Default::default()
    }
}

/// users, depts (a tree), orders/items (master-detail) and a raw SQL model over users.
pub fn metadata() -> MetadataSet {
    let mut name = required(field("user", "users", "name", "string"));
    name.max_length = 50;
    let mut age = field("user", "users", "age", "integer");
    age.max = 150.0;

    let dept = ModelConfig {
        is_tree: true,
        tree_parent_field: "parent_id".into(),
        tree_level_field: "level".into(),
        tree_path_field: "path".into(),
        ..model("dept")
    };
    let adults = ModelConfig {
        kind: ModelKind::Sql,
        ..model("adults")
    };

    MetadataSet {
        connections: vec![ConnectionConfig {
            id: "main".into(),
            kind: "sqlite".into(),
            ..Default::default()
        }],
        models: vec![model("user"), dept, model("order"), model("item"), adults],
        tables: vec![
            table("user", "users"),
            table("dept", "depts"),
            table("order", "orders"),
            table("item", "items"),
        ],
        fields: vec![
            pk(field("user", "users", "id", "integer")),
            name,
            age,
            pk(field("dept", "depts", "id", "integer")),
            field("dept", "depts", "parent_id", "integer"),
            field("dept", "depts", "name", "string"),
            field("dept", "depts", "level", "integer"),
            field("dept", "depts", "path", "string"),
            pk(field("order", "orders", "id", "string")),
            required(field("order", "orders", "customer", "string")),
            pk(field("item", "items", "id", "string")),
            field("item", "items", "order_id", "string"),
            required(field("item", "items", "sku", "string")),
            field("item", "items", "qty", "integer"),
        ],
        orders: vec![order_by("user", "users", "id"), order_by("dept", "depts", "id")],
        sqls: vec![ModelSqlConfig {
            model_id: "adults".into(),
            content: "SELECT id, name FROM users WHERE age >= :min_age ORDER BY id".into(),
        }],
        relations: vec![RelationConfig {
            id: "order_items".into(),
            master_model_id: "order".into(),
            detail_model_id: "item".into(),
            foreign_key: "order_id".into(),
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Engine over one in-memory SQLite database registered as `main`.
///
/// The pool holds a single connection that never expires, so every statement
/// sees the same database.
pub async fn engine() -> Engine {
    sqlx::any::install_default_drivers();
    let pool = AnyPoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    for ddl in DDL {
        sqlx::query(ddl).execute(&pool).await.unwrap();
    }

    let store = MemoryStore::new(metadata()).unwrap();
    let engine = Engine::new(Arc::new(store), Settings::default());
    engine.registry().inject("main", pool).await;
    engine
}

pub fn row(v: serde_json::Value) -> Record {
    Record::from_json(&v).unwrap()
}
