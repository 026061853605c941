use crate::config::types::*;
use crate::config::validate;
use crate::error::{ConfigError, EngineError};
use crate::store::MetadataStore;
use async_trait::async_trait;
use std::sync::RwLock;

/// Metadata held in process, built from a validated `MetadataSet`.
#[derive(Default)]
pub struct MemoryStore {
    set: RwLock<MetadataSet>,
}

impl MemoryStore {
    pub fn new(set: MetadataSet) -> Result<Self, EngineError> {
        validate(&set)?;
        Ok(MemoryStore {
            set: RwLock::new(set),
        })
    }

    /// Copy of everything currently held.
    pub fn snapshot(&self) -> Result<MetadataSet, EngineError> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MetadataSet>, EngineError> {
        self.set
            .read()
            .map_err(|_| EngineError::from(ConfigError::Load("metadata store lock poisoned".into())))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MetadataSet>, EngineError> {
        self.set
            .write()
            .map_err(|_| EngineError::from(ConfigError::Load("metadata store lock poisoned".into())))
    }

    fn by_model<T: Clone>(
        &self,
        pick: impl Fn(&MetadataSet) -> &Vec<T>,
        model_of: impl Fn(&T) -> &str,
        model_id: &str,
    ) -> Result<Vec<T>, EngineError> {
        let set = self.read()?;
        Ok(pick(&set)
            .iter()
            .filter(|r| model_of(r) == model_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn model_by_id(&self, id: &str) -> Result<Option<ModelConfig>, EngineError> {
        Ok(self.read()?.models.iter().find(|m| m.id == id).cloned())
    }

    async fn model_by_code(&self, code: &str) -> Result<Option<ModelConfig>, EngineError> {
        Ok(self.read()?.models.iter().find(|m| m.code == code).cloned())
    }

    async fn tables(&self, model_id: &str) -> Result<Vec<ModelTableConfig>, EngineError> {
        self.by_model(|s| &s.tables, |t| t.model_id.as_str(), model_id)
    }

    async fn fields(&self, model_id: &str) -> Result<Vec<ModelFieldConfig>, EngineError> {
        self.by_model(|s| &s.fields, |f| f.model_id.as_str(), model_id)
    }

    async fn wheres(&self, model_id: &str) -> Result<Vec<ModelWhereConfig>, EngineError> {
        self.by_model(|s| &s.wheres, |w| w.model_id.as_str(), model_id)
    }

    async fn joins(&self, model_id: &str) -> Result<Vec<ModelJoinConfig>, EngineError> {
        self.by_model(|s| &s.joins, |j| j.model_id.as_str(), model_id)
    }

    async fn orders(&self, model_id: &str) -> Result<Vec<ModelOrderConfig>, EngineError> {
        self.by_model(|s| &s.orders, |o| o.model_id.as_str(), model_id)
    }

    async fn groups(&self, model_id: &str) -> Result<Vec<ModelGroupConfig>, EngineError> {
        self.by_model(|s| &s.groups, |g| g.model_id.as_str(), model_id)
    }

    async fn havings(&self, model_id: &str) -> Result<Vec<ModelWhereConfig>, EngineError> {
        self.by_model(|s| &s.havings, |h| h.model_id.as_str(), model_id)
    }

    async fn limit(&self, model_id: &str) -> Result<Option<ModelLimitConfig>, EngineError> {
        Ok(self.read()?.limits.iter().find(|l| l.model_id == model_id).cloned())
    }

    async fn raw_sql(&self, model_id: &str) -> Result<Option<ModelSqlConfig>, EngineError> {
        Ok(self.read()?.sqls.iter().find(|s| s.model_id == model_id).cloned())
    }

    async fn templates_for_model(&self, model_id: &str) -> Result<Vec<QueryTemplate>, EngineError> {
        self.by_model(|s| &s.templates, |t| t.model_id.as_str(), model_id)
    }

    async fn template_by_id(&self, id: &str) -> Result<Option<QueryTemplate>, EngineError> {
        Ok(self.read()?.templates.iter().find(|t| t.id == id).cloned())
    }

    async fn save_template(&self, template: &QueryTemplate) -> Result<(), EngineError> {
        let mut set = self.write()?;
        match set.templates.iter_mut().find(|t| t.id == template.id) {
            Some(slot) => *slot = template.clone(),
            None => set.templates.push(template.clone()),
        }
        Ok(())
    }

    async fn delete_template(&self, id: &str) -> Result<bool, EngineError> {
        let mut set = self.write()?;
        let before = set.templates.len();
        set.templates.retain(|t| t.id != id);
        Ok(set.templates.len() != before)
    }

    async fn relation(
        &self,
        master_model_id: &str,
        detail_model_id: &str,
    ) -> Result<Option<RelationConfig>, EngineError> {
        Ok(self
            .read()?
            .relations
            .iter()
            .find(|r| r.master_model_id == master_model_id && r.detail_model_id == detail_model_id)
            .cloned())
    }

    async fn connection(&self, conn_id: &str) -> Result<Option<ConnectionConfig>, EngineError> {
        Ok(self.read()?.connections.iter().find(|c| c.id == conn_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> MetadataSet {
        MetadataSet {
            models: vec![ModelConfig {
                id: "m1".into(),
                code: "user".into(),
                ..Default::default()
            }],
            tables: vec![ModelTableConfig {
                id: "t1".into(),
                model_id: "m1".into(),
                table_name: "user".into(),
                is_main: true,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn lookups_filter_by_model() {
        let store = MemoryStore::new(set()).unwrap();
        assert_eq!(store.model_by_code("user").await.unwrap().unwrap().id, "m1");
        assert!(store.model_by_id("nope").await.unwrap().is_none());
        assert_eq!(store.tables("m1").await.unwrap().len(), 1);
        assert!(store.tables("m2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn templates_are_saved_and_deleted() {
        let store = MemoryStore::new(set()).unwrap();
        let mut t = QueryTemplate {
            id: "q1".into(),
            model_id: "m1".into(),
            name: "adults".into(),
            ..Default::default()
        };
        store.save_template(&t).await.unwrap();
        t.name = "grown-ups".into();
        store.save_template(&t).await.unwrap();
        let all = store.templates_for_model("m1").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "grown-ups");
        assert!(store.delete_template("q1").await.unwrap());
        assert!(!store.delete_template("q1").await.unwrap());
    }
}
