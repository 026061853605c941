//! Generic CRUD over metadata models.

use crate::config::{ModelData, ModelWhereConfig};
use crate::error::EngineError;
use crate::executor::SqlExecutor;
use crate::response::Page;
use crate::service::template::TemplateService;
use crate::service::validation::DataValidator;
use crate::settings::Settings;
use crate::sql::{self, MissingColumnPolicy, Params, Record, SelectQuery, SqlBuilder, Value};
use serde::Deserialize;
use sqlx::AnyConnection;
use std::sync::Arc;

const FILTER_OPERATORS: &[&str] = &[
    "=", "!=", "<>", ">", ">=", "<", "<=", "LIKE", "NOT LIKE", "IN", "NOT IN", "BETWEEN", "NOT BETWEEN", "IS NULL",
    "IS NOT NULL",
];

/// One ad-hoc List filter.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub table_name: String,
    pub column_name: String,
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub value2: serde_json::Value,
    /// AND (default) or OR.
    #[serde(default)]
    pub connector: String,
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<serde_json::Value>) -> Self {
        Filter {
            column_name: column.to_string(),
            operator: "=".into(),
            value: value.into(),
            ..Default::default()
        }
    }

    fn to_where(&self) -> Result<ModelWhereConfig, EngineError> {
        if self.column_name.trim().is_empty() {
            return Err(EngineError::validation("filters", "column_name is required"));
        }
        let operator = match self.operator.trim().to_uppercase() {
            op if op.is_empty() => "=".to_string(),
            op if FILTER_OPERATORS.contains(&op.as_str()) => op,
            op => return Err(EngineError::validation("filters", format!("unsupported operator {}", op))),
        };
        let connector = match self.connector.trim().to_uppercase() {
            c if c.is_empty() => "AND".to_string(),
            c if c == "AND" || c == "OR" => c,
            c => return Err(EngineError::validation("filters", format!("unsupported connector {}", c))),
        };
        let (value1, value2) = match (&self.value, operator.ends_with("BETWEEN")) {
            (serde_json::Value::Array(pair), true) if pair.len() >= 2 => (json_text(&pair[0]), json_text(&pair[1])),
            (v, _) => (json_text(v), json_text(&self.value2)),
        };
        Ok(ModelWhereConfig {
            operator1: connector,
            table_name: self.table_name.clone(),
            column_name: self.column_name.clone(),
            operator2: operator,
            value1,
            value2,
            ..Default::default()
        })
    }
}

/// Operand text; arrays become comma lists.
fn json_text(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items.iter().map(json_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// List/Count request: paging, template choice, filters, and the remaining keys as `param_key` bindings.
#[derive(Clone, Debug, Default)]
pub struct ListParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub query_template_id: Option<String>,
    pub filters: Vec<Filter>,
    pub params: Params,
}

impl ListParams {
    pub fn from_json(v: &serde_json::Value) -> Result<Self, EngineError> {
        let obj = match v {
            serde_json::Value::Null => return Ok(ListParams::default()),
            serde_json::Value::Object(obj) => obj,
            _ => return Err(EngineError::validation("params", "must be an object")),
        };
        let mut out = ListParams::default();
        for (key, value) in obj {
            match key.as_str() {
                "page" => out.page = positive(key, value)?,
                "page_size" | "limit" => out.page_size = out.page_size.or(positive(key, value)?),
                "query_template_id" => {
                    out.query_template_id = value.as_str().filter(|s| !s.is_empty()).map(str::to_string)
                }
                "filters" => {
                    out.filters = serde_json::from_value(value.clone())
                        .map_err(|e| EngineError::validation("filters", e.to_string()))?
                }
                _ => {
                    out.params.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(out)
    }

    pub fn filter(mut self, f: Filter) -> Self {
        self.filters.push(f);
        self
    }
}

fn positive(key: &str, v: &serde_json::Value) -> Result<Option<u64>, EngineError> {
    let n = match v {
        serde_json::Value::Null => return Ok(None),
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    match n {
        Some(n) if n > 0 => Ok(Some(n)),
        _ => Err(EngineError::validation(key, "must be a positive integer")),
    }
}

pub struct CrudService {
    builder: Arc<SqlBuilder>,
    executor: Arc<SqlExecutor>,
    templates: Arc<TemplateService>,
    settings: Settings,
}

impl CrudService {
    pub fn new(
        builder: Arc<SqlBuilder>,
        executor: Arc<SqlExecutor>,
        templates: Arc<TemplateService>,
        settings: Settings,
    ) -> Self {
        CrudService {
            builder,
            executor,
            templates,
            settings,
        }
    }

    pub(crate) fn executor(&self) -> &Arc<SqlExecutor> {
        &self.executor
    }

    pub(crate) async fn load(&self, model_id: &str) -> Result<ModelData, EngineError> {
        self.builder.load_model_data(model_id).await
    }

    /// Insert one row; returns the input (generated keys are not read back).
    pub async fn create(&self, model_id: &str, row: &Record) -> Result<Record, EngineError> {
        let data = self.load(model_id).await?;
        DataValidator::validate(model_id, data.fields(), row)?;
        let q = sql::insert(&data, row)?;
        self.executor.execute(data.conn_id(), &q.sql, &q.params).await?;
        Ok(row.clone())
    }

    /// Same as [`create`](Self::create) on a caller-held connection.
    pub async fn create_in(&self, conn: &mut AnyConnection, model_id: &str, row: &Record) -> Result<Record, EngineError> {
        let data = self.load(model_id).await?;
        DataValidator::validate(model_id, data.fields(), row)?;
        let q = sql::insert(&data, row)?;
        self.executor.execute_in(conn, &q.sql, &q.params).await?;
        Ok(row.clone())
    }

    pub async fn get(&self, model_id: &str, id: impl Into<Value>) -> Result<Option<Record>, EngineError> {
        let data = self.load(model_id).await?;
        let mut query = SqlBuilder::build(&data, &Params::new())?;
        query.and_where(sql::pk_predicate(&data, id.into())?);
        query.limit = None;
        let rows = self.executor.execute_query(data.conn_id(), &query).await?;
        Ok(rows.into_iter().next())
    }

    /// Validate `row` as a whole record, then update its columns (primary key excluded).
    /// Nothing left to set is a no-op.
    pub async fn update(&self, model_id: &str, id: impl Into<Value>, row: &Record) -> Result<(), EngineError> {
        let data = self.load(model_id).await?;
        DataValidator::validate(model_id, data.fields(), row)?;
        self.write_update(&data, id.into(), row).await
    }

    /// Update checking only the columns present, for engine-driven single column changes.
    pub(crate) async fn patch(&self, model_id: &str, id: impl Into<Value>, row: &Record) -> Result<(), EngineError> {
        let data = self.load(model_id).await?;
        DataValidator::validate_partial(model_id, data.fields(), row)?;
        self.write_update(&data, id.into(), row).await
    }

    async fn write_update(&self, data: &ModelData, id: Value, row: &Record) -> Result<(), EngineError> {
        let model_id = data.id();
        match sql::update(data, id, row)? {
            Some(q) => {
                self.executor.execute(data.conn_id(), &q.sql, &q.params).await?;
            }
            None => tracing::debug!(model = %model_id, "update with no columns to set"),
        }
        Ok(())
    }

    pub async fn delete(&self, model_id: &str, id: impl Into<Value>) -> Result<(), EngineError> {
        let data = self.load(model_id).await?;
        let q = sql::delete_by_pk(&data, id.into())?;
        self.executor.execute(data.conn_id(), &q.sql, &q.params).await?;
        Ok(())
    }

    /// One page of rows and the total, as two separate round trips.
    pub async fn list(&self, model_id: &str, params: &ListParams) -> Result<Page, EngineError> {
        let (data, query) = self.prepare_list(model_id, params).await?;
        let total = self.executor.execute_count(data.conn_id(), &query).await?;
        let rows = self.executor.execute_query(data.conn_id(), &query).await?;
        Ok(Page::new(rows, total, query.limit))
    }

    pub async fn count(&self, model_id: &str, params: &ListParams) -> Result<i64, EngineError> {
        let (data, query) = self.prepare_list(model_id, params).await?;
        self.executor.execute_count(data.conn_id(), &query).await
    }

    /// One multi-row INSERT; a column missing from a row binds NULL.
    pub async fn batch_create(&self, model_id: &str, rows: &[Record]) -> Result<Vec<Record>, EngineError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let data = self.load(model_id).await?;
        for row in rows {
            DataValidator::validate(model_id, data.fields(), row)?;
        }
        let q = sql::insert_many(&data, rows, MissingColumnPolicy::BindNull)?;
        self.executor.execute(data.conn_id(), &q.sql, &q.params).await?;
        Ok(rows.to_vec())
    }

    pub async fn batch_create_in(
        &self,
        conn: &mut AnyConnection,
        model_id: &str,
        rows: &[Record],
    ) -> Result<Vec<Record>, EngineError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let data = self.load(model_id).await?;
        for row in rows {
            DataValidator::validate(model_id, data.fields(), row)?;
        }
        let q = sql::insert_many(&data, rows, MissingColumnPolicy::BindNull)?;
        self.executor.execute_in(conn, &q.sql, &q.params).await?;
        Ok(rows.to_vec())
    }

    /// `DELETE ... WHERE pk IN (...)`; an empty id list does nothing.
    pub async fn batch_delete(&self, model_id: &str, ids: &[Value]) -> Result<(), EngineError> {
        if ids.is_empty() {
            return Ok(());
        }
        let data = self.load(model_id).await?;
        if let Some(q) = sql::delete_in(&data, ids)? {
            self.executor.execute(data.conn_id(), &q.sql, &q.params).await?;
        }
        Ok(())
    }

    /// Template (explicit, else the model default), then ad-hoc filters, then the build.
    async fn prepare_list(&self, model_id: &str, params: &ListParams) -> Result<(ModelData, SelectQuery), EngineError> {
        let mut data = self.load(model_id).await?;
        match &params.query_template_id {
            Some(id) => self.templates.apply_template(id, &mut data).await?,
            None => {
                if let Some(t) = self.templates.get_default_template(model_id).await? {
                    data.wheres.extend(t.conditions);
                }
            }
        }
        if !params.filters.is_empty() {
            group_chain(&mut data.wheres);
            for f in &params.filters {
                data.wheres.push(f.to_where()?);
            }
        }
        let query = SqlBuilder::build(&data, &self.build_params(&data, params))?;
        Ok((data, query))
    }

    fn build_params(&self, data: &ModelData, params: &ListParams) -> Params {
        let mut out = params.params.clone();
        let page_size = match (params.page_size, params.page) {
            (Some(size), _) => Some(size.min(self.settings.max_page_size)),
            (None, Some(_)) if data.limit.is_none() => Some(self.settings.default_page_size),
            _ => None,
        };
        if let Some(size) = page_size {
            out.insert("page_size".into(), size.into());
        }
        if let Some(page) = params.page {
            out.insert("page".into(), page.into());
        }
        out
    }
}

/// Bracket an existing condition chain so appended AND filters apply to all of it.
fn group_chain(wheres: &mut [ModelWhereConfig]) {
    if wheres.len() < 2 {
        return;
    }
    if let Some(first) = wheres.first_mut() {
        first.brackets1.insert(0, '(');
    }
    if let Some(last) = wheres.last_mut() {
        last.brackets2.push(')');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_params_split_known_keys_from_bindings() {
        let p = ListParams::from_json(&json!({
            "page": 2,
            "limit": "15",
            "query_template_id": "q1",
            "filters": [{"column_name": "age", "operator": ">", "value": 18}],
            "min_age": 3
        }))
        .unwrap();
        assert_eq!(p.page, Some(2));
        assert_eq!(p.page_size, Some(15));
        assert_eq!(p.query_template_id.as_deref(), Some("q1"));
        assert_eq!(p.filters.len(), 1);
        assert_eq!(p.params.get("min_age"), Some(&json!(3)));
        assert!(ListParams::from_json(&json!({"page": 0})).is_err());
        assert!(ListParams::from_json(&json!([1])).is_err());
    }

    #[test]
    fn filters_are_checked_against_the_operator_list() {
        let w = Filter::eq("name", "bob").to_where().unwrap();
        assert_eq!((w.operator1.as_str(), w.operator2.as_str()), ("AND", "="));

        let between = Filter {
            column_name: "age".into(),
            operator: "between".into(),
            value: json!([1, 9]),
            ..Default::default()
        };
        let w = between.to_where().unwrap();
        assert_eq!((w.value1.as_str(), w.value2.as_str()), ("1", "9"));

        let bad = Filter {
            column_name: "age".into(),
            operator: "= 1 OR 1 =".into(),
            ..Default::default()
        };
        assert!(matches!(bad.to_where(), Err(EngineError::Validation { .. })));
        let bad = Filter {
            connector: "XOR".into(),
            ..Filter::eq("age", 1)
        };
        assert!(bad.to_where().is_err());
    }

    #[test]
    fn in_filter_values_become_a_comma_list() {
        let f = Filter {
            column_name: "id".into(),
            operator: "in".into(),
            value: json!([1, "2", 3]),
            ..Default::default()
        };
        assert_eq!(f.to_where().unwrap().value1, "1,2,3");
    }

    #[test]
    fn chain_is_bracketed_before_filters() {
        let mut wheres = vec![ModelWhereConfig::default(), ModelWhereConfig::default()];
        group_chain(&mut wheres);
        assert_eq!(wheres[0].brackets1, "(");
        assert_eq!(wheres[1].brackets2, ")");
    }
}
