//! Raw metadata records as persisted by the metadata store (one JSON payload per record).

use serde::{Deserialize, Serialize};

/// How a model produces its rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Table,
    View,
    /// Hand written SQL stored in a `ModelSqlConfig`.
    Sql,
    Procedure,
    Join,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub conn_id: String,
    #[serde(default)]
    pub kind: ModelKind,
    #[serde(default)]
    pub is_tree: bool,
    #[serde(default)]
    pub tree_parent_field: String,
    #[serde(default)]
    pub tree_path_field: String,
    #[serde(default)]
    pub tree_level_field: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelTableConfig {
    pub id: String,
    pub model_id: String,
    #[serde(default)]
    pub conn_id: String,
    #[serde(default)]
    pub schema: String,
    pub table_name: String,
    #[serde(default)]
    pub is_main: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelFieldConfig {
    pub id: String,
    pub model_id: String,
    /// Owning table; empty means the column is referenced unqualified.
    #[serde(default)]
    pub table_name: String,
    pub column_name: String,
    #[serde(default)]
    pub title: String,
    /// Display alias used in the projection.
    #[serde(default)]
    pub alias: String,
    /// Column function: either a `%s` template (`DATE_FORMAT(%s, '%Y')`) or a bare name (`UPPER`).
    #[serde(default)]
    pub func: String,
    #[serde(default)]
    pub agg_func: String,
    /// Logical type: string, integer, long, decimal, float, boolean, date...
    #[serde(default)]
    pub field_type: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_auto_increment: bool,
    #[serde(default)]
    pub max_length: usize,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
    /// Regular expression the textual value must match.
    #[serde(default)]
    pub validation_rule: String,
}

impl Default for ModelFieldConfig {
    fn default() -> Self {
        ModelFieldConfig {
            id: String::new(),
            model_id: String::new(),
            table_name: String::new(),
            column_name: String::new(),
            title: String::new(),
            alias: String::new(),
            func: String::new(),
            agg_func: String::new(),
            field_type: String::new(),
            nullable: true,
            is_primary_key: false,
            is_auto_increment: false,
            max_length: 0,
            min: 0.0,
            max: 0.0,
            validation_rule: String::new(),
        }
    }
}

impl ModelFieldConfig {
    /// Not nullable and not filled in by the database.
    pub fn is_required(&self) -> bool {
        !self.nullable && !self.is_auto_increment
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self.field_type.to_lowercase().as_str(),
            "integer" | "int" | "long" | "bigint" | "smallint"
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer()
            || matches!(
                self.field_type.to_lowercase().as_str(),
                "decimal" | "float" | "double" | "numeric"
            )
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.field_type.to_lowercase().as_str(), "boolean" | "bool")
    }

    pub fn is_textual(&self) -> bool {
        matches!(
            self.field_type.to_lowercase().as_str(),
            "string" | "text" | "varchar" | "char"
        )
    }

    /// Label used in validation messages.
    pub fn label(&self) -> &str {
        if self.title.is_empty() {
            &self.column_name
        } else {
            &self.title
        }
    }
}

/// One filter predicate. Shared by model wheres and query template conditions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelWhereConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model_id: String,
    /// Boolean connector to the previous predicate (AND/OR). Empty means AND.
    #[serde(default)]
    pub operator1: String,
    #[serde(default)]
    pub brackets1: String,
    #[serde(default)]
    pub table_name: String,
    pub column_name: String,
    #[serde(default)]
    pub func: String,
    /// Comparison operator. Empty means `=`.
    #[serde(default)]
    pub operator2: String,
    #[serde(default)]
    pub value1: String,
    #[serde(default)]
    pub value2: String,
    /// When set and present in the request params, the param value replaces `value1`.
    #[serde(default)]
    pub param_key: String,
    #[serde(default)]
    pub brackets2: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelJoinConfig {
    pub id: String,
    pub model_id: String,
    /// Parent join id; `"0"` or empty for joins against the main table.
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub join_type: String,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub join_schema: String,
    pub join_table_name: String,
    /// Literal ON condition used when the join has no field conditions.
    #[serde(default)]
    pub on_clause: String,
    #[serde(default)]
    pub fields: Vec<JoinFieldConfig>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JoinFieldConfig {
    #[serde(default)]
    pub operator1: String,
    #[serde(default)]
    pub brackets1: String,
    pub column_name: String,
    #[serde(default)]
    pub func: String,
    #[serde(default)]
    pub operator2: String,
    pub join_column_name: String,
    #[serde(default)]
    pub join_func: String,
    #[serde(default)]
    pub brackets2: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelOrderConfig {
    pub model_id: String,
    #[serde(default)]
    pub table_name: String,
    pub column_name: String,
    #[serde(default)]
    pub func: String,
    #[serde(default)]
    pub order_type: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelGroupConfig {
    pub model_id: String,
    #[serde(default)]
    pub table_name: String,
    pub column_name: String,
    #[serde(default)]
    pub func: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelLimitConfig {
    pub model_id: String,
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub limit: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelSqlConfig {
    pub model_id: String,
    pub content: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueryTemplate {
    #[serde(default)]
    pub id: String,
    pub model_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub conditions: Vec<ModelWhereConfig>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RelationConfig {
    #[serde(default)]
    pub id: String,
    pub master_model_id: String,
    pub detail_model_id: String,
    /// Column in the detail model holding the master's primary key.
    pub foreign_key: String,
    #[serde(default)]
    pub relation_type: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: String,
    /// Full DSN; wins over the individual parts when set.
    #[serde(default)]
    pub url: String,
}

/// All metadata records in one struct for in-memory loading.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MetadataSet {
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    #[serde(default)]
    pub tables: Vec<ModelTableConfig>,
    #[serde(default)]
    pub fields: Vec<ModelFieldConfig>,
    #[serde(default)]
    pub wheres: Vec<ModelWhereConfig>,
    #[serde(default)]
    pub joins: Vec<ModelJoinConfig>,
    #[serde(default)]
    pub orders: Vec<ModelOrderConfig>,
    #[serde(default)]
    pub groups: Vec<ModelGroupConfig>,
    #[serde(default)]
    pub havings: Vec<ModelWhereConfig>,
    #[serde(default)]
    pub limits: Vec<ModelLimitConfig>,
    #[serde(default)]
    pub sqls: Vec<ModelSqlConfig>,
    #[serde(default)]
    pub templates: Vec<QueryTemplate>,
    #[serde(default)]
    pub relations: Vec<RelationConfig>,
}
