//! Metadata store: where models, tables, fields, filters, templates,
//! relations and connection descriptors are read from.

mod memory;
mod sys;

pub use memory::MemoryStore;
pub use sys::SysTableStore;

use crate::config::types::*;
use crate::error::EngineError;
use async_trait::async_trait;

/// Read-mostly metadata lookups. Absent single records are `Ok(None)`;
/// `Err` is reserved for store I/O.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn model_by_id(&self, id: &str) -> Result<Option<ModelConfig>, EngineError>;
    async fn model_by_code(&self, code: &str) -> Result<Option<ModelConfig>, EngineError>;
    async fn tables(&self, model_id: &str) -> Result<Vec<ModelTableConfig>, EngineError>;
    async fn fields(&self, model_id: &str) -> Result<Vec<ModelFieldConfig>, EngineError>;
    async fn wheres(&self, model_id: &str) -> Result<Vec<ModelWhereConfig>, EngineError>;
    async fn joins(&self, model_id: &str) -> Result<Vec<ModelJoinConfig>, EngineError>;
    async fn orders(&self, model_id: &str) -> Result<Vec<ModelOrderConfig>, EngineError>;
    async fn groups(&self, model_id: &str) -> Result<Vec<ModelGroupConfig>, EngineError>;
    async fn havings(&self, model_id: &str) -> Result<Vec<ModelWhereConfig>, EngineError>;
    async fn limit(&self, model_id: &str) -> Result<Option<ModelLimitConfig>, EngineError>;
    async fn raw_sql(&self, model_id: &str) -> Result<Option<ModelSqlConfig>, EngineError>;

    async fn templates_for_model(&self, model_id: &str) -> Result<Vec<QueryTemplate>, EngineError>;
    async fn template_by_id(&self, id: &str) -> Result<Option<QueryTemplate>, EngineError>;
    /// Insert or replace by id.
    async fn save_template(&self, template: &QueryTemplate) -> Result<(), EngineError>;
    /// Returns whether a template was removed.
    async fn delete_template(&self, id: &str) -> Result<bool, EngineError>;

    async fn relation(
        &self,
        master_model_id: &str,
        detail_model_id: &str,
    ) -> Result<Option<RelationConfig>, EngineError>;
    async fn connection(&self, conn_id: &str) -> Result<Option<ConnectionConfig>, EngineError>;
}
