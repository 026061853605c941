//! Compiles ModelData into a structured SELECT, and builds INSERT/UPDATE/DELETE
//! against the model's main table. Identifiers come from metadata only;
//! every value is a bound argument.

use crate::config::{load_model_data, ModelData, ModelFieldConfig, ModelJoinConfig, ModelWhereConfig};
use crate::error::{ConfigError, EngineError};
use crate::sql::dialect::Dialect;
use crate::sql::params::{Record, Value};
use crate::sql::query::{Fragment, QueryBuf, SelectQuery};
use crate::sql::raw::{substitute_params, validate_sql};
use crate::store::MetadataStore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Request parameters: `page`, `page_size`/`limit`, and anything a `param_key` refers to.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Alias of the derived table wrapping a raw SQL model.
const RAW_ALIAS: &str = "raw_model";

pub struct SqlBuilder {
    store: Arc<dyn MetadataStore>,
}

impl SqlBuilder {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        SqlBuilder { store }
    }

    pub async fn load_model_data(&self, model_id: &str) -> Result<ModelData, EngineError> {
        load_model_data(self.store.as_ref(), model_id).await
    }

    /// Load the model and compile it.
    pub async fn build_sql(&self, model_id: &str, params: &Params) -> Result<SelectQuery, EngineError> {
        let data = self.load_model_data(model_id).await?;
        Self::build(&data, params)
    }

    /// Compile already loaded (and possibly template-extended) metadata, then safety-check the text.
    pub fn build(data: &ModelData, params: &Params) -> Result<SelectQuery, EngineError> {
        let query = if data.is_raw_sql() {
            build_from_sql(data, params)?
        } else {
            build_from_metadata(data, params)?
        };
        validate_sql(&query.to_sql().sql)?;
        Ok(query)
    }
}

pub fn build_from_metadata(data: &ModelData, params: &Params) -> Result<SelectQuery, EngineError> {
    let d = data.dialect;
    let main = data.main_table()?;
    let mut q = SelectQuery::new(d, Fragment::text(d.qualified_table(&main.schema, &main.table_name)));
    q.columns = data.fields().iter().map(|f| projection(d, f)).collect();
    q.joins = joins(data);
    q.filter = conditions(data, &data.wheres, params);
    q.group_by = data
        .groups
        .iter()
        .map(|g| wrap(&g.func, d.column(&g.table_name, &g.column_name)))
        .collect();
    q.having = conditions(data, &data.havings, params);
    q.order_by = data
        .orders
        .iter()
        .map(|o| {
            let dir = match o.order_type.trim().to_uppercase().as_str() {
                "DESC" => "DESC",
                _ => "ASC",
            };
            format!("{} {}", wrap(&o.func, d.column(&o.table_name, &o.column_name)), dir)
        })
        .collect();
    q.limit = pagination(data, params)?;
    Ok(q)
}

/// Raw SQL model: the stored text becomes a derived table.
pub fn build_from_sql(data: &ModelData, params: &Params) -> Result<SelectQuery, EngineError> {
    let content = data
        .raw_sql
        .as_ref()
        .map(|s| s.content.trim().trim_end_matches(';').trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::Validation(format!("raw SQL content is empty for model {}", data.id())))?;
    let mut from = Fragment::text("(");
    from.append(substitute_params(content, params, data.dialect));
    from.push_sql(format!(") AS {}", RAW_ALIAS));
    let mut q = SelectQuery::new(data.dialect, from);
    q.limit = pagination(data, params)?;
    Ok(q)
}

/// `FUNC(expr)`, or the function text with `%s` replaced by `expr`.
fn wrap(func: &str, expr: String) -> String {
    let func = func.trim();
    if func.is_empty() {
        expr
    } else if func.contains("%s") {
        func.replace("%s", &expr)
    } else {
        format!("{}({})", func, expr)
    }
}

fn projection(d: Dialect, f: &ModelFieldConfig) -> String {
    let mut expr = wrap(&f.func, d.column(&f.table_name, &f.column_name));
    let agg = f.agg_func.trim();
    if !agg.is_empty() {
        expr = format!("{}({})", agg.to_uppercase(), expr);
    }
    let alias = if f.alias.is_empty() { &f.column_name } else { &f.alias };
    if !f.func.trim().is_empty() || !agg.is_empty() || *alias != f.column_name {
        format!("{} AS {}", expr, d.quote(alias))
    } else {
        expr
    }
}

fn joins(data: &ModelData) -> Vec<String> {
    let mut by_parent: HashMap<&str, Vec<&ModelJoinConfig>> = HashMap::new();
    for j in &data.joins {
        let parent = if j.parent_id.is_empty() { "0" } else { j.parent_id.as_str() };
        by_parent.entry(parent).or_default().push(j);
    }
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    emit_joins(data.dialect, "0", &by_parent, &mut seen, &mut out);
    out
}

fn emit_joins<'a>(
    d: Dialect,
    parent: &str,
    by_parent: &HashMap<&'a str, Vec<&'a ModelJoinConfig>>,
    seen: &mut HashSet<&'a str>,
    out: &mut Vec<String>,
) {
    let Some(children) = by_parent.get(parent) else {
        return;
    };
    for &j in children {
        if !seen.insert(j.id.as_str()) {
            continue;
        }
        out.push(render_join(d, j));
        emit_joins(d, &j.id, by_parent, seen, out);
    }
}

fn render_join(d: Dialect, j: &ModelJoinConfig) -> String {
    let kind = j.join_type.trim().to_uppercase();
    let kind = if kind.is_empty() {
        "JOIN".to_string()
    } else if kind.ends_with("JOIN") {
        kind
    } else {
        format!("{} JOIN", kind)
    };
    let mut sql = format!("{} {}", kind, d.qualified_table(&j.join_schema, &j.join_table_name));

    let mut on = String::new();
    for (i, jf) in j.fields.iter().enumerate() {
        if i > 0 {
            on.push_str(&format!(" {} ", connector(&jf.operator1)));
        }
        let left = wrap(&jf.func, d.column(&j.table_name, &jf.column_name));
        let right = wrap(&jf.join_func, d.column(&j.join_table_name, &jf.join_column_name));
        let op = if jf.operator2.trim().is_empty() { "=" } else { jf.operator2.trim() };
        on.push_str(&format!("{}{} {} {}{}", jf.brackets1, left, op, right, jf.brackets2));
    }
    if j.fields.is_empty() {
        on = j.on_clause.trim().to_string();
    }
    if !on.is_empty() {
        sql.push_str(" ON ");
        sql.push_str(&on);
    }
    sql
}

fn connector(op: &str) -> String {
    let op = op.trim().to_uppercase();
    if op.is_empty() {
        "AND".to_string()
    } else {
        op
    }
}

/// Connector chain over `conds`; the first connector is ignored.
fn conditions(data: &ModelData, conds: &[ModelWhereConfig], params: &Params) -> Fragment {
    let mut out = Fragment::new();
    for (i, w) in conds.iter().enumerate() {
        if i > 0 {
            out.push_sql(format!(" {} ", connector(&w.operator1)));
        }
        out.push_sql(w.brackets1.as_str());
        out.append(condition(data, w, params));
        out.push_sql(w.brackets2.as_str());
    }
    out
}

fn condition(data: &ModelData, w: &ModelWhereConfig, params: &Params) -> Fragment {
    use serde_json::Value as Json;

    let d = data.dialect;
    let left = wrap(&w.func, d.column(&w.table_name, &w.column_name));
    let op = match w.operator2.trim().to_uppercase() {
        o if o.is_empty() => "=".to_string(),
        o => o,
    };
    let field = data.field_for(&w.table_name, &w.column_name);
    let bound = if w.param_key.is_empty() {
        None
    } else {
        params.get(&w.param_key)
    };
    let text = |raw: &str| coerce(Value::String(raw.to_string()), field);
    let json = |v: &Json| coerce(Value::from_json(v), field);

    let mut f = Fragment::text(format!("{} {}", left, op));
    match op.as_str() {
        "IS NULL" | "IS NOT NULL" => {}
        "IN" | "NOT IN" => {
            let items: Vec<Value> = match bound {
                Some(Json::Array(items)) => items.iter().map(json).collect(),
                Some(v) => split_list(&Value::from_json(v).to_string()).map(text).collect(),
                None => split_list(&w.value1).map(text).collect(),
            };
            if items.is_empty() {
                // Nothing can be IN an empty list, everything is NOT IN it.
                let constant = if op == "IN" { "1 = 0" } else { "1 = 1" };
                return Fragment::text(constant);
            }
            f.push_sql(" (");
            for (i, v) in items.into_iter().enumerate() {
                if i > 0 {
                    f.push_sql(", ");
                }
                f.push_arg(v);
            }
            f.push_sql(")");
        }
        "BETWEEN" | "NOT BETWEEN" => {
            let (lo, hi) = match bound {
                Some(Json::Array(pair)) if pair.len() >= 2 => (json(&pair[0]), json(&pair[1])),
                Some(Json::Object(range)) => (
                    range.get("min").map(json).unwrap_or_else(|| text(&w.value1)),
                    range.get("max").map(json).unwrap_or_else(|| text(&w.value2)),
                ),
                Some(Json::Array(_)) | None => (text(&w.value1), text(&w.value2)),
                Some(v) => (json(v), text(&w.value2)),
            };
            f.push_sql(" ");
            f.push_arg(lo);
            f.push_sql(" AND ");
            f.push_arg(hi);
        }
        "LIKE" | "NOT LIKE" => {
            let v = bound
                .map(|v| Value::from_json(v).to_string())
                .unwrap_or_else(|| w.value1.clone());
            f.push_sql(" ");
            f.push_arg(Value::String(format!("%{}%", v)));
        }
        _ => {
            f.push_sql(" ");
            f.push_arg(bound.map(json).unwrap_or_else(|| text(&w.value1)));
        }
    }
    f
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Convert an operand to the scalar kind of the field it is compared with.
/// Values that do not parse are left as they are.
pub fn coerce(v: Value, field: Option<&ModelFieldConfig>) -> Value {
    let Some(field) = field else {
        return v;
    };
    match v {
        Value::String(s) if field.is_integer() => match s.trim().parse::<i64>() {
            Ok(i) => Value::Int(i),
            Err(_) => Value::String(s),
        },
        Value::String(s) if field.is_numeric() => match s.trim().parse::<f64>() {
            Ok(x) => Value::Float(x),
            Err(_) => Value::String(s),
        },
        Value::String(s) if field.is_boolean() => match s.trim().to_lowercase().as_str() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => Value::String(s),
        },
        Value::Int(i) if field.is_boolean() => Value::Bool(i != 0),
        v @ (Value::Int(_) | Value::Float(_) | Value::Bool(_)) if field.is_textual() => Value::String(v.to_string()),
        other => other,
    }
}

fn param_u64(params: &Params, key: &str) -> Option<u64> {
    let n = match params.get(key)? {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 1.0).map(|f| f as u64)),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    n.filter(|n| *n > 0)
}

/// (limit, offset) from the model's limit record, overridden by `page_size`/`limit` and `page`.
/// An offset past `i64::MAX` is a validation error on `page`.
fn pagination(data: &ModelData, params: &Params) -> Result<Option<(u64, u64)>, EngineError> {
    let (mut page, mut limit) = data.limit.as_ref().map(|l| (l.page, l.limit)).unwrap_or((0, 0));
    if let Some(n) = param_u64(params, "page_size").or_else(|| param_u64(params, "limit")) {
        limit = n;
    }
    if let Some(n) = param_u64(params, "page") {
        page = n;
    }
    if limit == 0 {
        return Ok(None);
    }
    let offset = match page {
        0 | 1 => Some(0),
        p => (p - 1).checked_mul(limit),
    };
    match offset.filter(|o| i64::try_from(*o).is_ok() && i64::try_from(limit).is_ok()) {
        Some(offset) => Ok(Some((limit, offset))),
        None => Err(EngineError::validation("page", format!("page {} is out of range", page))),
    }
}

/// Primary key equality predicate for an already built SELECT.
pub fn pk_predicate(data: &ModelData, id: Value) -> Result<Fragment, ConfigError> {
    let d = data.dialect;
    let column = if data.is_raw_sql() {
        d.column(RAW_ALIAS, data.primary_key())
    } else {
        d.column(&data.main_table()?.table_name, data.primary_key())
    };
    let mut f = Fragment::text(format!("{} = ", column));
    f.push_arg(coerce(id, data.field(data.primary_key())));
    Ok(f)
}

/// `SELECT pk FROM main WHERE parent_field = ?`, bypassing the model's own filters.
pub fn select_children(data: &ModelData, parent_field: &str, parent: Value) -> Result<SelectQuery, ConfigError> {
    let d = data.dialect;
    let mut q = SelectQuery::new(d, Fragment::text(target(data)?));
    q.columns = vec![d.quote(data.primary_key())];
    let mut filter = Fragment::text(format!("{} = ", d.quote(parent_field)));
    filter.push_arg(coerce(parent, data.field(parent_field)));
    q.filter = filter;
    Ok(q)
}

/// What a multi-row INSERT binds for a column a row does not carry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingColumnPolicy {
    /// Bind NULL.
    #[default]
    BindNull,
    /// Emit `DEFAULT` so the column default applies (not supported by SQLite).
    UseDefault,
}

fn target(data: &ModelData) -> Result<String, ConfigError> {
    let main = data.main_table()?;
    Ok(data.dialect.qualified_table(&main.schema, &main.table_name))
}

pub fn insert(data: &ModelData, row: &Record) -> Result<QueryBuf, EngineError> {
    insert_many(data, std::slice::from_ref(row), MissingColumnPolicy::BindNull)
}

/// One INSERT for all rows over the union of their columns, in first-seen order.
pub fn insert_many(data: &ModelData, rows: &[Record], policy: MissingColumnPolicy) -> Result<QueryBuf, EngineError> {
    let d = data.dialect;
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(&key) {
                columns.push(key);
            }
        }
    }
    if columns.is_empty() {
        return Err(EngineError::validation("data", "no columns to insert"));
    }
    let mut q = QueryBuf::new(d);
    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let mut slots = Vec::with_capacity(columns.len());
        for col in &columns {
            let slot = match (row.get(col), policy) {
                (Some(v), _) => q.bind(coerce(v.clone(), data.field(col))),
                (None, MissingColumnPolicy::BindNull) => q.bind(Value::Null),
                (None, MissingColumnPolicy::UseDefault) => "DEFAULT".to_string(),
            };
            slots.push(slot);
        }
        tuples.push(format!("({})", slots.join(", ")));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        target(data)?,
        columns.iter().map(|c| d.quote(c)).collect::<Vec<_>>().join(", "),
        tuples.join(", ")
    );
    Ok(q)
}

/// UPDATE of every supplied column except the primary key. `None` when nothing is left to set.
pub fn update(data: &ModelData, id: Value, row: &Record) -> Result<Option<QueryBuf>, EngineError> {
    let d = data.dialect;
    let pk = data.primary_key();
    let mut q = QueryBuf::new(d);
    let mut sets = Vec::new();
    for (col, v) in row.iter().filter(|(c, _)| *c != pk) {
        let ph = q.bind(coerce(v.clone(), data.field(col)));
        sets.push(format!("{} = {}", d.quote(col), ph));
    }
    if sets.is_empty() {
        return Ok(None);
    }
    let ph = q.bind(coerce(id, data.field(pk)));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        target(data)?,
        sets.join(", "),
        d.quote(pk),
        ph
    );
    Ok(Some(q))
}

pub fn delete_by_pk(data: &ModelData, id: Value) -> Result<QueryBuf, EngineError> {
    let d = data.dialect;
    let pk = data.primary_key();
    let mut q = QueryBuf::new(d);
    let ph = q.bind(coerce(id, data.field(pk)));
    q.sql = format!("DELETE FROM {} WHERE {} = {}", target(data)?, d.quote(pk), ph);
    Ok(q)
}

/// `DELETE ... WHERE pk IN (...)`; `None` for an empty id list.
pub fn delete_in(data: &ModelData, ids: &[Value]) -> Result<Option<QueryBuf>, EngineError> {
    if ids.is_empty() {
        return Ok(None);
    }
    let d = data.dialect;
    let pk = data.primary_key();
    let mut q = QueryBuf::new(d);
    let phs: Vec<String> = ids
        .iter()
        .map(|id| q.bind(coerce(id.clone(), data.field(pk))))
        .collect();
    q.sql = format!(
        "DELETE FROM {} WHERE {} IN ({})",
        target(data)?,
        d.quote(pk),
        phs.join(", ")
    );
    Ok(Some(q))
}
