//! Master row plus detail rows, inserted in one transaction.

use crate::error::{ConfigError, EngineError};
use crate::service::crud::CrudService;
use crate::sql::Record;
use crate::store::MetadataStore;
use serde::Deserialize;
use sqlx::AnyConnection;
use std::sync::Arc;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct MasterDetailPayload {
    pub master: Record,
    #[serde(default)]
    pub details: Vec<Record>,
}

pub struct MasterDetailService {
    store: Arc<dyn MetadataStore>,
    crud: Arc<CrudService>,
}

impl MasterDetailService {
    pub fn new(store: Arc<dyn MetadataStore>, crud: Arc<CrudService>) -> Self {
        MasterDetailService { store, crud }
    }

    /// Insert the master, stamp its key into every detail's foreign key column, insert the details.
    /// The master's primary key must be supplied by the caller; generated keys are not read back.
    pub async fn create_master_detail(
        &self,
        master_model_id: &str,
        detail_model_id: &str,
        payload: MasterDetailPayload,
    ) -> Result<Record, EngineError> {
        let relation = self
            .store
            .relation(master_model_id, detail_model_id)
            .await?
            .ok_or_else(|| ConfigError::MissingRelation {
                master: master_model_id.to_string(),
                detail: detail_model_id.to_string(),
            })?;
        if relation.foreign_key.is_empty() {
            return Err(ConfigError::Validation(format!("relation {} has no foreign key", relation.id)).into());
        }

        let master = self.crud.load(master_model_id).await?;
        let detail = self.crud.load(detail_model_id).await?;
        if detail.conn_id() != master.conn_id() {
            tracing::warn!(
                master = %master_model_id,
                detail = %detail_model_id,
                "detail model uses another connection; inserting on the master's"
            );
        }

        let executor = self.crud.executor();
        let mut tx = executor.begin(master.conn_id()).await?;
        let result = self
            .insert_both(
                &mut tx,
                master_model_id,
                detail_model_id,
                master.primary_key(),
                &relation.foreign_key,
                payload,
            )
            .await;

        match result {
            Ok(created) => {
                tx.commit()
                    .await
                    .map_err(|e| EngineError::Transaction(format!("commit: {}", e)))?;
                Ok(created)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::warn!(master = %master_model_id, "rollback failed: {}", rb);
                }
                Err(e)
            }
        }
    }

    async fn insert_both(
        &self,
        conn: &mut AnyConnection,
        master_model_id: &str,
        detail_model_id: &str,
        pk: &str,
        foreign_key: &str,
        payload: MasterDetailPayload,
    ) -> Result<Record, EngineError> {
        let created = self.crud.create_in(conn, master_model_id, &payload.master).await?;
        let key = created
            .get(pk)
            .filter(|v| !v.is_blank())
            .cloned()
            .ok_or_else(|| {
                EngineError::Transaction(format!(
                    "master row carries no {} value; generated keys are not supported here",
                    pk
                ))
            })?;
        let details: Vec<Record> = payload
            .details
            .into_iter()
            .map(|mut d| {
                d.set(foreign_key, key.clone());
                d
            })
            .collect();
        self.crud.batch_create_in(conn, detail_model_id, &details).await?;
        tracing::debug!(
            master = %master_model_id,
            detail = %detail_model_id,
            details = details.len(),
            "master-detail inserted"
        );
        Ok(created)
    }
}
