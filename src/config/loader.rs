//! Assemble a fresh `ModelData` from the metadata store for one operation.

use crate::config::resolved::ModelData;
use crate::config::types::ModelConfig;
use crate::error::EngineError;
use crate::sql::{DbKind, Dialect};
use crate::store::MetadataStore;

/// Load everything one build pass needs. `NotFound` when the model does not exist.
pub async fn load_model_data(store: &dyn MetadataStore, model_id: &str) -> Result<ModelData, EngineError> {
    let model = store
        .model_by_id(model_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("model {}", model_id)))?;
    assemble(store, model).await
}

pub async fn load_model_data_by_code(store: &dyn MetadataStore, code: &str) -> Result<ModelData, EngineError> {
    let model = store
        .model_by_code(code)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("model code {}", code)))?;
    assemble(store, model).await
}

async fn assemble(store: &dyn MetadataStore, model: ModelConfig) -> Result<ModelData, EngineError> {
    let id = model.id.clone();
    let tables = store.tables(&id).await?;
    let fields = store.fields(&id).await?;

    let conn_id = if model.conn_id.is_empty() {
        tables
            .iter()
            .find(|t| t.is_main)
            .or_else(|| tables.first())
            .map(|t| t.conn_id.clone())
            .unwrap_or_default()
    } else {
        model.conn_id.clone()
    };
    let dialect = dialect_for(store, &conn_id).await?;

    let mut data = ModelData::new(model, tables, fields, dialect);
    data.wheres = store.wheres(&id).await?;
    data.joins = store.joins(&id).await?;
    data.orders = store.orders(&id).await?;
    data.groups = store.groups(&id).await?;
    data.havings = store.havings(&id).await?;
    data.limit = store.limit(&id).await?;
    data.raw_sql = store.raw_sql(&id).await?;
    Ok(data)
}

/// Dialect of the owning connection; MySQL conventions when no descriptor is registered.
async fn dialect_for(store: &dyn MetadataStore, conn_id: &str) -> Result<Dialect, EngineError> {
    if conn_id.is_empty() {
        return Ok(Dialect::default());
    }
    match store.connection(conn_id).await? {
        Some(conn) => Ok(conn.kind.parse::<DbKind>()?.dialect()),
        None => Ok(Dialect::default()),
    }
}
