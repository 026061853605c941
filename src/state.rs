//! Composition root: every engine service wired over one metadata store.

use crate::executor::SqlExecutor;
use crate::registry::ConnectionRegistry;
use crate::service::{CrudService, MasterDetailService, TemplateService, TreeService};
use crate::settings::Settings;
use crate::sql::SqlBuilder;
use crate::store::MetadataStore;
use std::sync::Arc;

/// Cheap to clone; clones share pools and services.
#[derive(Clone)]
pub struct Engine {
    pub store: Arc<dyn MetadataStore>,
    pub settings: Settings,
    registry: Arc<ConnectionRegistry>,
    executor: Arc<SqlExecutor>,
    builder: Arc<SqlBuilder>,
    templates: Arc<TemplateService>,
    crud: Arc<CrudService>,
    tree: Arc<TreeService>,
    master_detail: Arc<MasterDetailService>,
}

impl Engine {
    pub fn new(store: Arc<dyn MetadataStore>, settings: Settings) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(store.clone(), &settings));
        let executor = Arc::new(SqlExecutor::new(registry.clone(), settings.slow_query));
        let builder = Arc::new(SqlBuilder::new(store.clone()));
        let templates = Arc::new(TemplateService::new(store.clone()));
        let crud = Arc::new(CrudService::new(
            builder.clone(),
            executor.clone(),
            templates.clone(),
            settings.clone(),
        ));
        let tree = Arc::new(TreeService::new(crud.clone(), settings.clone()));
        let master_detail = Arc::new(MasterDetailService::new(store.clone(), crud.clone()));
        Engine {
            store,
            settings,
            registry,
            executor,
            builder,
            templates,
            crud,
            tree,
            master_detail,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn executor(&self) -> &SqlExecutor {
        &self.executor
    }

    pub fn builder(&self) -> &SqlBuilder {
        &self.builder
    }

    pub fn templates(&self) -> &TemplateService {
        &self.templates
    }

    pub fn crud(&self) -> &CrudService {
        &self.crud
    }

    pub fn tree(&self) -> &TreeService {
        &self.tree
    }

    pub fn master_detail(&self) -> &MasterDetailService {
        &self.master_detail
    }
}
