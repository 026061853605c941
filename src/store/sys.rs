//! Metadata persisted in `<prefix>_<kind>` tables, one JSON payload per row.

use crate::config::types::*;
use crate::config::validate;
use crate::error::{ConfigError, EngineError};
use crate::settings::Settings;
use crate::sql::{DbKind, Dialect};
use crate::store::MetadataStore;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::AnyPool;

/// Record kinds, one table each.
const KINDS: &[&str] = &[
    "connections",
    "models",
    "tables",
    "fields",
    "wheres",
    "joins",
    "orders",
    "groups",
    "havings",
    "limits",
    "sqls",
    "templates",
    "relations",
];

pub struct SysTableStore {
    pool: AnyPool,
    dialect: Dialect,
    prefix: String,
}

impl SysTableStore {
    pub fn new(pool: AnyPool, kind: DbKind, settings: &Settings) -> Self {
        SysTableStore {
            pool,
            dialect: kind.dialect(),
            prefix: settings.sys_prefix.clone(),
        }
    }

    fn table(&self, kind: &str) -> String {
        self.dialect.quote(&format!("{}_{}", self.prefix, kind))
    }

    fn ph(&self, n: usize) -> String {
        self.dialect.placeholder(n)
    }

    /// Create every metadata table if missing.
    pub async fn ensure_sys_tables(&self) -> Result<(), EngineError> {
        for kind in KINDS {
            let ddl = format!(
                "CREATE TABLE IF NOT EXISTS {} (id VARCHAR(191) NOT NULL PRIMARY KEY, model_id VARCHAR(191) NOT NULL, position INTEGER NOT NULL, payload TEXT NOT NULL)",
                self.table(kind)
            );
            tracing::debug!(sql = %ddl, "ddl");
            sqlx::query(&ddl).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Replace all rows of one kind in a single transaction. Returns the number written.
    pub async fn replace_rows(&self, kind: &str, records: &[serde_json::Value]) -> Result<u64, EngineError> {
        if !KINDS.contains(&kind) {
            return Err(ConfigError::Load(format!("unknown metadata kind: {}", kind)).into());
        }
        let table = self.table(kind);
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&mut *tx)
            .await?;
        let insert = format!(
            "INSERT INTO {} (id, model_id, position, payload) VALUES ({}, {}, {}, {})",
            table,
            self.ph(1),
            self.ph(2),
            self.ph(3),
            self.ph(4)
        );
        let mut count = 0u64;
        for (pos, rec) in records.iter().enumerate() {
            let model_id = str_field(rec, "model_id");
            let id = match str_field(rec, "id") {
                id if id.is_empty() => format!("{}#{}", model_id, pos),
                id => id,
            };
            sqlx::query(&insert)
                .bind(id)
                .bind(model_id)
                .bind(pos as i64)
                .bind(rec.to_string())
                .execute(&mut *tx)
                .await?;
            count += 1;
        }
        tx.commit().await?;
        Ok(count)
    }

    /// Validate and persist a whole metadata set, kind by kind.
    pub async fn import(&self, set: &MetadataSet) -> Result<(), EngineError> {
        validate(set)?;
        self.replace_kind("connections", &set.connections).await?;
        self.replace_kind("models", &set.models).await?;
        self.replace_kind("tables", &set.tables).await?;
        self.replace_kind("fields", &set.fields).await?;
        self.replace_kind("wheres", &set.wheres).await?;
        self.replace_kind("joins", &set.joins).await?;
        self.replace_kind("orders", &set.orders).await?;
        self.replace_kind("groups", &set.groups).await?;
        self.replace_kind("havings", &set.havings).await?;
        self.replace_kind("limits", &set.limits).await?;
        self.replace_kind("sqls", &set.sqls).await?;
        self.replace_kind("templates", &set.templates).await?;
        self.replace_kind("relations", &set.relations).await?;
        Ok(())
    }

    async fn replace_kind<T: Serialize>(&self, kind: &str, records: &[T]) -> Result<u64, EngineError> {
        let values = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        self.replace_rows(kind, &values).await
    }

    /// Everything currently stored.
    pub async fn load_set(&self) -> Result<MetadataSet, EngineError> {
        Ok(MetadataSet {
            connections: self.load_all("connections").await?,
            models: self.load_all("models").await?,
            tables: self.load_all("tables").await?,
            fields: self.load_all("fields").await?,
            wheres: self.load_all("wheres").await?,
            joins: self.load_all("joins").await?,
            orders: self.load_all("orders").await?,
            groups: self.load_all("groups").await?,
            havings: self.load_all("havings").await?,
            limits: self.load_all("limits").await?,
            sqls: self.load_all("sqls").await?,
            templates: self.load_all("templates").await?,
            relations: self.load_all("relations").await?,
        })
    }

    async fn load_all<T: DeserializeOwned>(&self, kind: &str) -> Result<Vec<T>, EngineError> {
        let sql = format!("SELECT payload FROM {} ORDER BY position", self.table(kind));
        tracing::debug!(sql = %sql, "query");
        let rows: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        decode_rows(rows)
    }

    async fn load_where<T: DeserializeOwned>(
        &self,
        kind: &str,
        column: &str,
        value: &str,
    ) -> Result<Vec<T>, EngineError> {
        let sql = format!(
            "SELECT payload FROM {} WHERE {} = {} ORDER BY position",
            self.table(kind),
            column,
            self.ph(1)
        );
        tracing::debug!(sql = %sql, param = %value, "query");
        let rows: Vec<String> = sqlx::query_scalar(&sql)
            .bind(value.to_string())
            .fetch_all(&self.pool)
            .await?;
        decode_rows(rows)
    }

    async fn load_one<T: DeserializeOwned>(&self, kind: &str, column: &str, value: &str) -> Result<Option<T>, EngineError> {
        Ok(self.load_where(kind, column, value).await?.into_iter().next())
    }
}

fn str_field(rec: &serde_json::Value, key: &str) -> String {
    rec.get(key)
        .and_then(serde_json::Value::as_str)
        .unwrap_or("")
        .to_string()
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<String>) -> Result<Vec<T>, EngineError> {
    rows.iter()
        .map(|raw| serde_json::from_str(raw).map_err(|e| EngineError::from(ConfigError::Load(e.to_string()))))
        .collect()
}

#[async_trait]
impl MetadataStore for SysTableStore {
    async fn model_by_id(&self, id: &str) -> Result<Option<ModelConfig>, EngineError> {
        self.load_one("models", "id", id).await
    }

    async fn model_by_code(&self, code: &str) -> Result<Option<ModelConfig>, EngineError> {
        let models: Vec<ModelConfig> = self.load_all("models").await?;
        Ok(models.into_iter().find(|m| m.code == code))
    }

    async fn tables(&self, model_id: &str) -> Result<Vec<ModelTableConfig>, EngineError> {
        self.load_where("tables", "model_id", model_id).await
    }

    async fn fields(&self, model_id: &str) -> Result<Vec<ModelFieldConfig>, EngineError> {
        self.load_where("fields", "model_id", model_id).await
    }

    async fn wheres(&self, model_id: &str) -> Result<Vec<ModelWhereConfig>, EngineError> {
        self.load_where("wheres", "model_id", model_id).await
    }

    async fn joins(&self, model_id: &str) -> Result<Vec<ModelJoinConfig>, EngineError> {
        self.load_where("joins", "model_id", model_id).await
    }

    async fn orders(&self, model_id: &str) -> Result<Vec<ModelOrderConfig>, EngineError> {
        self.load_where("orders", "model_id", model_id).await
    }

    async fn groups(&self, model_id: &str) -> Result<Vec<ModelGroupConfig>, EngineError> {
        self.load_where("groups", "model_id", model_id).await
    }

    async fn havings(&self, model_id: &str) -> Result<Vec<ModelWhereConfig>, EngineError> {
        self.load_where("havings", "model_id", model_id).await
    }

    async fn limit(&self, model_id: &str) -> Result<Option<ModelLimitConfig>, EngineError> {
        self.load_one("limits", "model_id", model_id).await
    }

    async fn raw_sql(&self, model_id: &str) -> Result<Option<ModelSqlConfig>, EngineError> {
        self.load_one("sqls", "model_id", model_id).await
    }

    async fn templates_for_model(&self, model_id: &str) -> Result<Vec<QueryTemplate>, EngineError> {
        self.load_where("templates", "model_id", model_id).await
    }

    async fn template_by_id(&self, id: &str) -> Result<Option<QueryTemplate>, EngineError> {
        self.load_one("templates", "id", id).await
    }

    async fn save_template(&self, template: &QueryTemplate) -> Result<(), EngineError> {
        let table = self.table("templates");
        let payload = serde_json::to_string(template).map_err(|e| ConfigError::Load(e.to_string()))?;
        let mut tx = self.pool.begin().await?;
        let position: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT position FROM {} WHERE id = {}",
            table,
            self.ph(1)
        ))
        .bind(template.id.clone())
        .fetch_optional(&mut *tx)
        .await?;
        let position = match position {
            Some(p) => p,
            None => {
                let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                    .fetch_one(&mut *tx)
                    .await?;
                count
            }
        };
        sqlx::query(&format!("DELETE FROM {} WHERE id = {}", table, self.ph(1)))
            .bind(template.id.clone())
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!(
            "INSERT INTO {} (id, model_id, position, payload) VALUES ({}, {}, {}, {})",
            table,
            self.ph(1),
            self.ph(2),
            self.ph(3),
            self.ph(4)
        ))
        .bind(template.id.clone())
        .bind(template.model_id.clone())
        .bind(position)
        .bind(payload)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_template(&self, id: &str) -> Result<bool, EngineError> {
        let sql = format!("DELETE FROM {} WHERE id = {}", self.table("templates"), self.ph(1));
        let done = sqlx::query(&sql).bind(id.to_string()).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn relation(
        &self,
        master_model_id: &str,
        detail_model_id: &str,
    ) -> Result<Option<RelationConfig>, EngineError> {
        let relations: Vec<RelationConfig> = self.load_all("relations").await?;
        Ok(relations
            .into_iter()
            .find(|r| r.master_model_id == master_model_id && r.detail_model_id == detail_model_id))
    }

    async fn connection(&self, conn_id: &str) -> Result<Option<ConnectionConfig>, EngineError> {
        self.load_one("connections", "id", conn_id).await
    }
}
