//! Hierarchical models: a parent-key column, with optional path and level columns.

use crate::config::ModelData;
use crate::error::{ConfigError, EngineError};
use crate::service::crud::{CrudService, Filter, ListParams};
use crate::settings::Settings;
use crate::sql::{self, Record, Value};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Parent key of root nodes.
const ROOT: &str = "0";

#[derive(Clone, Debug, Serialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub record: Record,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

pub struct TreeService {
    crud: Arc<CrudService>,
    settings: Settings,
}

/// Key text of a cell; NULL is empty.
fn key_text(v: Option<&Value>) -> String {
    v.map(Value::to_string).unwrap_or_default()
}

fn parent_key(v: Option<&Value>) -> String {
    let key = key_text(v);
    if key.is_empty() {
        ROOT.to_string()
    } else {
        key
    }
}

fn is_root(key: &str) -> bool {
    key.is_empty() || key == ROOT
}

impl TreeService {
    pub fn new(crud: Arc<CrudService>, settings: Settings) -> Self {
        TreeService { crud, settings }
    }

    async fn tree_model(&self, model_id: &str) -> Result<ModelData, EngineError> {
        let data = self.crud.load(model_id).await?;
        if !data.model.is_tree || data.model.tree_parent_field.is_empty() {
            return Err(ConfigError::Validation(format!("model {} is not configured as a tree", model_id)).into());
        }
        Ok(data)
    }

    fn ceiling(&self) -> ListParams {
        ListParams {
            page_size: Some(self.settings.tree_page_size),
            ..Default::default()
        }
    }

    /// Whole forest, up to the configured row ceiling.
    pub async fn get_tree(&self, model_id: &str) -> Result<Vec<TreeNode>, EngineError> {
        let data = self.tree_model(model_id).await?;
        let page = self.crud.list(model_id, &self.ceiling()).await?;
        if page.total > page.data.len() as i64 {
            tracing::warn!(
                model = %model_id,
                total = page.total,
                loaded = page.data.len(),
                "tree truncated at the row ceiling"
            );
        }
        Ok(build_tree(page.data, data.primary_key(), &data.model.tree_parent_field))
    }

    /// Direct children; a root key (`0` or empty) returns the roots.
    pub async fn get_children(&self, model_id: &str, parent_id: &str) -> Result<Vec<Record>, EngineError> {
        let data = self.tree_model(model_id).await?;
        let parent_field = &data.model.tree_parent_field;
        if is_root(parent_id) {
            // Roots may carry NULL, empty or 0 as parent.
            let page = self.crud.list(model_id, &self.ceiling()).await?;
            return Ok(page
                .data
                .into_iter()
                .filter(|r| parent_key(r.get(parent_field)) == ROOT)
                .collect());
        }
        let params = ListParams::default().filter(Filter::eq(parent_field, parent_id));
        Ok(self.crud.list(model_id, &params).await?.data)
    }

    /// Nodes from the root down to `id`, one Get per level. Stops at a missing node or a cycle.
    pub async fn get_path(&self, model_id: &str, id: &str) -> Result<Vec<Record>, EngineError> {
        let data = self.tree_model(model_id).await?;
        let parent_field = &data.model.tree_parent_field;
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = id.to_string();
        while !is_root(&current) && seen.insert(current.clone()) {
            let Some(node) = self.crud.get(model_id, current.as_str()).await? else {
                break;
            };
            current = key_text(node.get(parent_field));
            path.push(node);
        }
        path.reverse();
        Ok(path)
    }

    /// Create a node, filling the level and path columns when they are configured and not supplied.
    pub async fn add_node(&self, model_id: &str, row: Record) -> Result<Record, EngineError> {
        let data = self.tree_model(model_id).await?;
        let model = &data.model;
        let mut row = row;
        if model.tree_level_field.is_empty() && model.tree_path_field.is_empty() {
            return self.crud.create(model_id, &row).await;
        }

        let parent = parent_key(row.get(&model.tree_parent_field));
        let parent_row = if is_root(&parent) {
            None
        } else {
            Some(
                self.crud
                    .get(model_id, parent.as_str())
                    .await?
                    .ok_or_else(|| EngineError::NotFound(format!("parent node {}", parent)))?,
            )
        };

        let level_field = &model.tree_level_field;
        if !level_field.is_empty() && !row.contains_key(level_field) {
            let level = match &parent_row {
                Some(p) => p.get(level_field).and_then(Value::as_f64).map_or(1, |l| l as i64) + 1,
                None => 1,
            };
            row.set(level_field.as_str(), level);
        }

        let path_field = &model.tree_path_field;
        let own_id = row.get(data.primary_key()).filter(|v| !v.is_blank()).map(Value::to_string);
        if let (false, false, Some(own_id)) = (path_field.is_empty(), row.contains_key(path_field), own_id) {
            let prefix = parent_row
                .as_ref()
                .map(|p| key_text(p.get(path_field)))
                .unwrap_or_default();
            row.set(path_field.as_str(), format!("{}/{}", prefix.trim_end_matches('/'), own_id));
        }

        self.crud.create(model_id, &row).await
    }

    /// Re-parent a node. Moving under itself or under one of its descendants is rejected.
    pub async fn move_node(&self, model_id: &str, id: &str, target_parent_id: &str) -> Result<(), EngineError> {
        let data = self.tree_model(model_id).await?;
        let parent_field = data.model.tree_parent_field.clone();
        if id == target_parent_id {
            return Err(EngineError::validation(parent_field, "cannot move a node under itself"));
        }
        if !is_root(target_parent_id) {
            let ancestors = self.get_path(model_id, target_parent_id).await?;
            if ancestors.iter().any(|n| key_text(n.get(data.primary_key())) == id) {
                return Err(EngineError::validation(parent_field, "cannot move a node under its own descendant"));
            }
        }
        let target = if is_root(target_parent_id) { ROOT } else { target_parent_id };
        let mut row = Record::new();
        row.set(parent_field, target);
        self.crud.patch(model_id, id, &row).await
    }

    /// Delete a node and its whole subtree, children first, in one transaction.
    pub async fn delete_node(&self, model_id: &str, id: &str) -> Result<(), EngineError> {
        let data = self.tree_model(model_id).await?;
        let executor = self.crud.executor();
        let mut tx = executor.begin(data.conn_id()).await?;

        let result = async {
            let parent_field = &data.model.tree_parent_field;
            let pk = data.primary_key();
            let mut order = vec![Value::String(id.to_string())];
            let mut seen: HashSet<String> = HashSet::from([id.to_string()]);
            let mut next = 0;
            while next < order.len() {
                let q = sql::select_children(&data, parent_field, order[next].clone())?;
                next += 1;
                for child in executor.execute_query_in(&mut tx, &q).await? {
                    if let Some(child_id) = child.get(pk) {
                        if seen.insert(child_id.to_string()) {
                            order.push(child_id.clone());
                        }
                    }
                }
            }
            for node in order.iter().rev() {
                let q = sql::delete_by_pk(&data, node.clone())?;
                executor.execute_in(&mut tx, &q.sql, &q.params).await?;
            }
            Ok::<usize, EngineError>(order.len())
        }
        .await;

        match result {
            Ok(count) => {
                tx.commit()
                    .await
                    .map_err(|e| EngineError::Transaction(format!("commit: {}", e)))?;
                tracing::info!(model = %model_id, node = %id, count, "subtree deleted");
                Ok(())
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::warn!(model = %model_id, "rollback failed: {}", rb);
                }
                Err(e)
            }
        }
    }
}

/// Nest flat rows under their parents. Rows unreachable from a root (cycles, orphans) are dropped.
pub fn build_tree(rows: Vec<Record>, pk: &str, parent_field: &str) -> Vec<TreeNode> {
    let mut by_parent: HashMap<String, Vec<Record>> = HashMap::new();
    for row in rows {
        by_parent.entry(parent_key(row.get(parent_field))).or_default().push(row);
    }
    let roots = by_parent.remove(ROOT).unwrap_or_default();
    roots
        .into_iter()
        .map(|r| attach(r, pk, &mut by_parent))
        .collect()
}

fn attach(record: Record, pk: &str, by_parent: &mut HashMap<String, Vec<Record>>) -> TreeNode {
    let id = key_text(record.get(pk));
    let children = by_parent
        .remove(&id)
        .unwrap_or_default()
        .into_iter()
        .map(|c| attach(c, pk, by_parent))
        .collect();
    TreeNode { record, children }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(v: serde_json::Value) -> Vec<Record> {
        v.as_array()
            .unwrap()
            .iter()
            .map(|r| Record::from_json(r).unwrap())
            .collect()
    }

    #[test]
    fn nests_by_parent_and_treats_null_as_root() {
        let flat = rows(json!([
            {"id": 1, "parent_id": 0, "name": "a"},
            {"id": 2, "parent_id": 1, "name": "b"},
            {"id": 3, "parent_id": null, "name": "c"},
            {"id": 4, "parent_id": 2, "name": "d"}
        ]));
        let tree = build_tree(flat, "id", "parent_id");
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].children[0].record.get("name"), Some(&Value::from("d")));
        let body = serde_json::to_value(&tree).unwrap();
        assert_eq!(body[1]["name"], "c");
        assert!(body[1].get("children").is_none());
    }

    #[test]
    fn cycles_are_dropped() {
        let flat = rows(json!([
            {"id": 1, "parent_id": 2},
            {"id": 2, "parent_id": 1},
            {"id": 3, "parent_id": ""}
        ]));
        let tree = build_tree(flat, "id", "parent_id");
        assert_eq!(tree.len(), 1);
        assert!(tree[0].children.is_empty());
    }
}
