//! One-level relation loading with one batched query per relation.

use crate::config::{Relation, RelationKind, Schema};
use crate::dialect::{Record, RowShape};
use crate::error::AppError;
use crate::model::User;
use crate::query::M2mMode;
use crate::service::assemble::strip_sensitive;
use crate::service::read::run_query;
use crate::sql::{select_by_column_in, select_links, SqlValue};
use crate::state::AppState;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Key used to match scanned values across tables (an int column and a bigint column compare equal).
fn match_key(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Distinct non-null values of `field`, in first-seen order.
fn distinct_keys<'r>(records: impl IntoIterator<Item = &'r Record>, field: &str) -> Vec<SqlValue> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for record in records {
        let Some(v) = record.get(field) else { continue };
        if let Some(k) = match_key(v) {
            if seen.insert(k) {
                keys.push(SqlValue::from_json(v));
            }
        }
    }
    keys
}

fn target_schema<'s>(state: &'s AppState, relation: &Relation) -> Result<&'s Schema, AppError> {
    state.registry.schema(&relation.target).ok_or_else(|| {
        AppError::Config(crate::error::ConfigError::MissingReference {
            kind: "relation target",
            id: relation.target.clone(),
        })
    })
}

/// Fetch target records whose `column` is in `keys`, with the target's list modifier and sensitive fields applied.
async fn fetch_targets(
    state: &AppState,
    target: &Schema,
    column: &str,
    keys: &[SqlValue],
    user: Option<&User>,
) -> Result<Vec<Record>, AppError> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    let stmt = select_by_column_in(target, column, keys, user)?;
    let fetched = run_query(state, &stmt, RowShape::Typed(target)).await?;
    let mut rows = fetched.result.into_rows();
    for row in &mut rows {
        strip_sensitive(target, row);
    }
    Ok(rows)
}

/// Populate one-to-one relations with an object (or null) and one-to-many relations with an array.
pub async fn preload(
    state: &AppState,
    schema: &Schema,
    records: &mut [Record],
    user: Option<&User>,
) -> Result<(), AppError> {
    if records.is_empty() {
        return Ok(());
    }
    for relation in &schema.relations {
        if relation.kind == RelationKind::ManyToMany {
            continue;
        }
        let target = target_schema(state, relation)?;
        let keys = distinct_keys(records.iter(), &relation.local_field);
        let related = fetch_targets(state, target, &relation.remote_column, &keys, user).await?;

        let mut by_key: HashMap<String, Vec<Record>> = HashMap::new();
        for row in related {
            if let Some(k) = row.get(&relation.remote_field).and_then(match_key) {
                by_key.entry(k).or_default().push(row);
            }
        }
        for record in records.iter_mut() {
            let matches = record
                .get(&relation.local_field)
                .and_then(match_key)
                .and_then(|k| by_key.get(&k))
                .cloned()
                .unwrap_or_default();
            let value = match relation.kind {
                RelationKind::OneToOne => matches.into_iter().next().map(Value::Object).unwrap_or(Value::Null),
                _ => Value::Array(matches.into_iter().map(Value::Object).collect()),
            };
            record.insert(relation.name.clone(), value);
        }
    }
    Ok(())
}

/// Attach many-to-many relations as arrays of target ids (`Ids`) or target records (`Fill`).
pub async fn expand_m2m(
    state: &AppState,
    schema: &Schema,
    records: &mut [Record],
    mode: M2mMode,
    user: Option<&User>,
) -> Result<(), AppError> {
    if mode == M2mMode::None || records.is_empty() {
        return Ok(());
    }
    for relation in &schema.relations {
        let (RelationKind::ManyToMany, Some(link)) = (relation.kind, &relation.link) else {
            continue;
        };
        let sources = distinct_keys(records.iter(), &relation.local_field);
        let links = if sources.is_empty() {
            Vec::new()
        } else {
            let stmt = select_links(link, &sources);
            run_query(state, &stmt, RowShape::Dynamic).await?.result.into_rows()
        };

        let mut targets_by_source: HashMap<String, Vec<Value>> = HashMap::new();
        for row in &links {
            let (Some(source), Some(target)) = (row.get("source_id"), row.get("target_id")) else {
                continue;
            };
            if let Some(k) = match_key(source) {
                targets_by_source.entry(k).or_default().push(target.clone());
            }
        }

        let filled: Option<HashMap<String, Record>> = if mode == M2mMode::Fill {
            let target = target_schema(state, relation)?;
            let target_ids: Vec<SqlValue> = {
                let mut seen = HashSet::new();
                targets_by_source
                    .values()
                    .flatten()
                    .filter(|v| match_key(v).is_some_and(|k| seen.insert(k)))
                    .map(SqlValue::from_json)
                    .collect()
            };
            let rows = fetch_targets(state, target, &relation.remote_column, &target_ids, user).await?;
            Some(
                rows.into_iter()
                    .filter_map(|r| r.get(&relation.remote_field).and_then(match_key).map(|k| (k, r)))
                    .collect(),
            )
        } else {
            None
        };

        for record in records.iter_mut() {
            let ids = record
                .get(&relation.local_field)
                .and_then(match_key)
                .and_then(|k| targets_by_source.get(&k))
                .cloned()
                .unwrap_or_default();
            let value = match &filled {
                // Targets hidden by the list modifier are left out.
                Some(by_id) => Value::Array(
                    ids.iter()
                        .filter_map(|id| match_key(id).and_then(|k| by_id.get(&k)))
                        .cloned()
                        .map(Value::Object)
                        .collect(),
                ),
                None => Value::Array(ids),
            };
            record.insert(relation.name.clone(), value);
        }
    }
    Ok(())
}
