//! Metadata validation: referential integrity and per-model consistency.

use crate::config::MetadataSet;
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

pub fn validate(set: &MetadataSet) -> Result<(), ConfigError> {
    let model_ids: HashSet<&str> = set.models.iter().map(|m| m.id.as_str()).collect();
    let conn_ids: HashSet<&str> = set.connections.iter().map(|c| c.id.as_str()).collect();

    let mut codes = HashSet::new();
    for m in &set.models {
        if !codes.insert(m.code.as_str()) {
            return Err(ConfigError::Validation(format!("duplicate model code '{}'", m.code)));
        }
        if !m.conn_id.is_empty() && !conn_ids.is_empty() && !conn_ids.contains(m.conn_id.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "connection",
                id: m.conn_id.clone(),
            });
        }
    }

    let check_model = |id: &str| -> Result<(), ConfigError> {
        if model_ids.contains(id) {
            Ok(())
        } else {
            Err(ConfigError::MissingReference {
                kind: "model",
                id: id.to_string(),
            })
        }
    };

    let mut mains: HashMap<&str, usize> = HashMap::new();
    for t in &set.tables {
        check_model(&t.model_id)?;
        if t.is_main {
            *mains.entry(t.model_id.as_str()).or_default() += 1;
        }
    }
    for (model, count) in mains {
        if count > 1 {
            tracing::warn!(model = %model, "{} tables flagged as main", count);
        }
    }

    let mut columns: HashSet<(&str, &str)> = HashSet::new();
    for f in &set.fields {
        check_model(&f.model_id)?;
        if !columns.insert((f.model_id.as_str(), f.column_name.as_str())) {
            return Err(ConfigError::DuplicateColumn {
                model: f.model_id.clone(),
                column: f.column_name.clone(),
            });
        }
    }

    for w in set.wheres.iter().chain(set.havings.iter()) {
        check_model(&w.model_id)?;
    }
    for j in &set.joins {
        check_model(&j.model_id)?;
    }
    for o in &set.orders {
        check_model(&o.model_id)?;
    }
    for g in &set.groups {
        check_model(&g.model_id)?;
    }
    for l in &set.limits {
        check_model(&l.model_id)?;
    }
    for s in &set.sqls {
        check_model(&s.model_id)?;
    }

    let mut defaults: HashMap<&str, usize> = HashMap::new();
    for t in &set.templates {
        check_model(&t.model_id)?;
        if t.is_default {
            *defaults.entry(t.model_id.as_str()).or_default() += 1;
        }
    }
    for (model, count) in defaults {
        if count > 1 {
            tracing::warn!(model = %model, "{} default query templates; the first one applies", count);
        }
    }

    for r in &set.relations {
        check_model(&r.master_model_id)?;
        check_model(&r.detail_model_id)?;
        if r.foreign_key.is_empty() {
            return Err(ConfigError::Validation(format!(
                "relation {} -> {} has no foreign key",
                r.master_model_id, r.detail_model_id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::*;

    fn base() -> MetadataSet {
        MetadataSet {
            models: vec![ModelConfig {
                id: "m1".into(),
                code: "user".into(),
                ..Default::default()
            }],
            fields: vec![ModelFieldConfig {
                id: "f1".into(),
                model_id: "m1".into(),
                column_name: "name".into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn accepts_consistent_metadata() {
        assert!(validate(&base()).is_ok());
    }

    #[test]
    fn rejects_duplicate_columns() {
        let mut set = base();
        let mut dup = set.fields[0].clone();
        dup.id = "f2".into();
        set.fields.push(dup);
        assert!(matches!(validate(&set), Err(ConfigError::DuplicateColumn { .. })));
    }

    #[test]
    fn rejects_dangling_model_reference() {
        let mut set = base();
        set.tables.push(ModelTableConfig {
            id: "t1".into(),
            model_id: "ghost".into(),
            table_name: "x".into(),
            ..Default::default()
        });
        match validate(&set) {
            Err(ConfigError::MissingReference { kind, id }) => {
                assert_eq!(kind, "model");
                assert_eq!(id, "ghost");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn relation_needs_a_foreign_key() {
        let mut set = base();
        set.relations.push(RelationConfig {
            master_model_id: "m1".into(),
            detail_model_id: "m1".into(),
            ..Default::default()
        });
        assert!(matches!(validate(&set), Err(ConfigError::Validation(_))));
    }
}
