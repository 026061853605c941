mod common;

use common::{engine, row};
use metadata_engine::{EngineError, Filter, ListParams, MasterDetailPayload, Value};
use serde_json::json;

fn payload(v: serde_json::Value) -> MasterDetailPayload {
    serde_json::from_value(v).unwrap()
}

#[tokio::test]
async fn master_and_details_commit_together() {
    let engine = engine().await;
    let created = engine
        .master_detail()
        .create_master_detail(
            "order",
            "item",
            payload(json!({
                "master": {"id": "o1", "customer": "acme"},
                "details": [
                    {"id": "i1", "sku": "bolt", "qty": 10},
                    {"id": "i2", "sku": "nut"}
                ]
            })),
        )
        .await
        .unwrap();
    assert_eq!(created.get("id"), Some(&Value::from("o1")));

    let items = engine
        .crud()
        .list("item", &ListParams::default().filter(Filter::eq("order_id", "o1")))
        .await
        .unwrap();
    assert_eq!(items.total, 2);
    assert_eq!(items.data[1].get("qty"), Some(&Value::Null));
}

#[tokio::test]
async fn invalid_detail_rolls_back_the_master() {
    let engine = engine().await;
    let err = engine
        .master_detail()
        .create_master_detail(
            "order",
            "item",
            payload(json!({
                "master": {"id": "o2", "customer": "acme"},
                "details": [{"id": "i1", "sku": "bolt"}, {"id": "i2", "sku": ""}]
            })),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { ref field, .. } if field == "sku"));

    assert!(engine.crud().get("order", "o2").await.unwrap().is_none());
    assert_eq!(engine.crud().count("item", &ListParams::default()).await.unwrap(), 0);
}

#[tokio::test]
async fn master_without_key_is_a_transaction_error() {
    let engine = engine().await;
    let err = engine
        .master_detail()
        .create_master_detail(
            "order",
            "item",
            payload(json!({"master": {"customer": "acme"}, "details": []})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Transaction(_)));
    assert_eq!(engine.crud().count("order", &ListParams::default()).await.unwrap(), 0);
}

#[tokio::test]
async fn unrelated_models_have_no_relation() {
    let engine = engine().await;
    let err = engine
        .master_detail()
        .create_master_detail("user", "item", payload(json!({"master": {"id": 1, "name": "x"}})))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "config_error");
    assert!(engine.crud().get("user", 1).await.unwrap().is_none());

    let detail = row(json!({"id": "i9", "order_id": "none", "sku": "x"}));
    engine.crud().create("item", &detail).await.unwrap();
}
