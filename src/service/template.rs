//! Query templates: named, ordered condition sets appended to a model's filter chain.

use crate::config::{ModelData, QueryTemplate};
use crate::error::EngineError;
use crate::store::MetadataStore;
use std::sync::Arc;
use uuid::Uuid;

pub struct TemplateService {
    store: Arc<dyn MetadataStore>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl TemplateService {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        TemplateService { store }
    }

    /// Append the template's conditions, in order, to `data.wheres`.
    ///
    /// An unknown id is `NotFound`; a List naming a template that does not
    /// exist fails instead of silently returning unfiltered rows.
    pub async fn apply_template(&self, template_id: &str, data: &mut ModelData) -> Result<(), EngineError> {
        let template = self
            .store
            .template_by_id(template_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("query template {}", template_id)))?;
        if template.model_id != data.id() {
            tracing::warn!(
                template = %template_id,
                model = %data.id(),
                "template belongs to model {}",
                template.model_id
            );
        }
        data.wheres.extend(template.conditions);
        Ok(())
    }

    /// First template of the model flagged default.
    pub async fn get_default_template(&self, model_id: &str) -> Result<Option<QueryTemplate>, EngineError> {
        let templates = self.store.templates_for_model(model_id).await?;
        let mut defaults = templates.into_iter().filter(|t| t.is_default);
        let first = defaults.next();
        if first.is_some() && defaults.next().is_some() {
            tracing::warn!(model = %model_id, "more than one default query template, using the first");
        }
        Ok(first)
    }

    pub async fn get_template(&self, id: &str) -> Result<Option<QueryTemplate>, EngineError> {
        self.store.template_by_id(id).await
    }

    pub async fn templates_for_model(&self, model_id: &str) -> Result<Vec<QueryTemplate>, EngineError> {
        self.store.templates_for_model(model_id).await
    }

    /// Store a new template under fresh ids.
    pub async fn create_template(&self, mut template: QueryTemplate) -> Result<QueryTemplate, EngineError> {
        if template.model_id.is_empty() {
            return Err(EngineError::validation("model_id", "is required"));
        }
        template.id = new_id();
        for c in &mut template.conditions {
            c.id = new_id();
            c.model_id = template.model_id.clone();
        }
        self.store.save_template(&template).await?;
        tracing::debug!(template = %template.id, model = %template.model_id, "query template created");
        Ok(template)
    }

    /// Replace name, flags and the whole condition list of an existing template.
    pub async fn update_template(&self, mut template: QueryTemplate) -> Result<QueryTemplate, EngineError> {
        if self.store.template_by_id(&template.id).await?.is_none() {
            return Err(EngineError::NotFound(format!("query template {}", template.id)));
        }
        for c in &mut template.conditions {
            if c.id.is_empty() {
                c.id = new_id();
            }
            c.model_id = template.model_id.clone();
        }
        self.store.save_template(&template).await?;
        Ok(template)
    }

    pub async fn delete_template(&self, id: &str) -> Result<bool, EngineError> {
        self.store.delete_template(id).await
    }

    /// Flag one template as the model's default and clear the flag on the others.
    pub async fn set_default(&self, model_id: &str, template_id: &str) -> Result<(), EngineError> {
        let templates = self.store.templates_for_model(model_id).await?;
        if !templates.iter().any(|t| t.id == template_id) {
            return Err(EngineError::NotFound(format!(
                "query template {} for model {}",
                template_id, model_id
            )));
        }
        for mut t in templates {
            let is_default = t.id == template_id;
            if t.is_default != is_default {
                t.is_default = is_default;
                self.store.save_template(&t).await?;
            }
        }
        Ok(())
    }

    /// Copy a template and its conditions; the copy is never the default.
    pub async fn duplicate_template(&self, id: &str) -> Result<QueryTemplate, EngineError> {
        let original = self
            .store
            .template_by_id(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("query template {}", id)))?;
        let copy = QueryTemplate {
            id: String::new(),
            name: format!("{} - Copy", original.name),
            code: format!("{}_copy_{}", original.code, new_id()),
            is_default: false,
            ..original
        };
        self.create_template(copy).await
    }
}
