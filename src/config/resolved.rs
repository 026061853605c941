//! ModelData: the per-operation aggregate of one model's metadata, with its
//! main table and primary key resolved once at construction.

use crate::config::types::*;
use crate::error::ConfigError;
use crate::sql::Dialect;

#[derive(Clone, Debug)]
pub struct ModelData {
    pub model: ModelConfig,
    tables: Vec<ModelTableConfig>,
    fields: Vec<ModelFieldConfig>,
    /// Filter chain; query templates and ad-hoc filters are appended here.
    pub wheres: Vec<ModelWhereConfig>,
    pub joins: Vec<ModelJoinConfig>,
    pub orders: Vec<ModelOrderConfig>,
    pub groups: Vec<ModelGroupConfig>,
    pub havings: Vec<ModelWhereConfig>,
    pub limit: Option<ModelLimitConfig>,
    pub raw_sql: Option<ModelSqlConfig>,
    pub dialect: Dialect,
    main_table: Option<usize>,
    primary_key: String,
}

impl ModelData {
    pub fn new(
        model: ModelConfig,
        tables: Vec<ModelTableConfig>,
        fields: Vec<ModelFieldConfig>,
        dialect: Dialect,
    ) -> Self {
        let main_table = resolve_main_table(&model.id, &tables);
        let primary_key = resolve_primary_key(&model.id, &fields);
        ModelData {
            model,
            tables,
            fields,
            wheres: Vec::new(),
            joins: Vec::new(),
            orders: Vec::new(),
            groups: Vec::new(),
            havings: Vec::new(),
            limit: None,
            raw_sql: None,
            dialect,
            main_table,
            primary_key,
        }
    }

    pub fn id(&self) -> &str {
        &self.model.id
    }

    pub fn tables(&self) -> &[ModelTableConfig] {
        &self.tables
    }

    pub fn fields(&self) -> &[ModelFieldConfig] {
        &self.fields
    }

    pub fn field(&self, column: &str) -> Option<&ModelFieldConfig> {
        self.fields.iter().find(|f| f.column_name == column)
    }

    /// Field for a possibly table-qualified column reference.
    pub fn field_for(&self, table: &str, column: &str) -> Option<&ModelFieldConfig> {
        self.fields.iter().find(|f| {
            f.column_name == column
                && (table.is_empty() || f.table_name.is_empty() || f.table_name == table)
        })
    }

    /// INSERT/UPDATE/DELETE target.
    pub fn main_table(&self) -> Result<&ModelTableConfig, ConfigError> {
        self.main_table
            .and_then(|i| self.tables.get(i))
            .ok_or_else(|| ConfigError::NoTable(self.model.id.clone()))
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Model connection, falling back to the main table's.
    pub fn conn_id(&self) -> &str {
        if !self.model.conn_id.is_empty() {
            return &self.model.conn_id;
        }
        self.main_table()
            .map(|t| t.conn_id.as_str())
            .unwrap_or("")
    }

    pub fn is_raw_sql(&self) -> bool {
        self.model.kind == ModelKind::Sql
    }
}

fn resolve_main_table(model_id: &str, tables: &[ModelTableConfig]) -> Option<usize> {
    let flagged: Vec<usize> = tables
        .iter()
        .enumerate()
        .filter(|(_, t)| t.is_main)
        .map(|(i, _)| i)
        .collect();
    match flagged.as_slice() {
        [] if tables.is_empty() => None,
        [] => {
            tracing::warn!(model = %model_id, "no main table flagged, using {}", tables[0].table_name);
            Some(0)
        }
        [one] => Some(*one),
        [first, ..] => {
            tracing::warn!(model = %model_id, "{} main tables flagged, using the first", flagged.len());
            Some(*first)
        }
    }
}

fn resolve_primary_key(model_id: &str, fields: &[ModelFieldConfig]) -> String {
    match fields.iter().find(|f| f.is_primary_key) {
        Some(f) => f.column_name.clone(),
        None => {
            if !fields.is_empty() {
                tracing::debug!(model = %model_id, "no primary key flagged, assuming id");
            }
            "id".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, is_main: bool) -> ModelTableConfig {
        ModelTableConfig {
            id: name.into(),
            model_id: "m".into(),
            table_name: name.into(),
            is_main,
            ..Default::default()
        }
    }

    fn model() -> ModelConfig {
        ModelConfig {
            id: "m".into(),
            code: "m".into(),
            ..Default::default()
        }
    }

    #[test]
    fn flagged_main_table_wins() {
        let data = ModelData::new(
            model(),
            vec![table("a", false), table("b", true)],
            vec![],
            Dialect::MySql,
        );
        assert_eq!(data.main_table().unwrap().table_name, "b");
    }

    #[test]
    fn first_table_is_the_fallback() {
        let data = ModelData::new(
            model(),
            vec![table("a", false), table("b", false)],
            vec![],
            Dialect::MySql,
        );
        assert_eq!(data.main_table().unwrap().table_name, "a");
    }

    #[test]
    fn no_tables_is_a_config_error() {
        let data = ModelData::new(model(), vec![], vec![], Dialect::MySql);
        assert!(matches!(data.main_table(), Err(ConfigError::NoTable(_))));
    }

    #[test]
    fn primary_key_falls_back_to_id() {
        let code = ModelFieldConfig {
            column_name: "code".into(),
            ..Default::default()
        };
        let data = ModelData::new(model(), vec![table("a", true)], vec![code.clone()], Dialect::MySql);
        assert_eq!(data.primary_key(), "id");

        let pk = ModelFieldConfig {
            is_primary_key: true,
            ..code
        };
        let data = ModelData::new(model(), vec![table("a", true)], vec![pk], Dialect::MySql);
        assert_eq!(data.primary_key(), "code");
    }
}
