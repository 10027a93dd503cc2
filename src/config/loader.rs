//! Load model definitions from JSON files and resolve them into schemas.

use crate::case::to_snake_case;
use crate::config::resolved::{Field, LinkTable, PkType, Relation, RelationKind, Schema};
use crate::config::types::*;
use crate::config::{table_name, validate};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};
use std::path::Path;

fn column_name(f: &FieldConfig) -> String {
    f.column.clone().unwrap_or_else(|| to_snake_case(&f.name))
}

fn scalar(f: &FieldConfig) -> Field {
    Field {
        name: f.name.clone(),
        column: column_name(f),
        field_type: f.type_,
        nullable: f.nullable,
    }
}

/// Build schemas from model configs (validates first). List modifiers are attached at registration.
pub fn resolve(models: &[ModelConfig]) -> Result<Vec<Schema>, ConfigError> {
    validate(models)?;
    let by_name: HashMap<String, &ModelConfig> = models.iter().map(|m| (m.name.to_lowercase(), m)).collect();
    let lookup = |name: &str| {
        by_name
            .get(&name.to_lowercase())
            .copied()
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "model",
                id: name.to_string(),
            })
    };

    let mut schemas = Vec::with_capacity(models.len());
    for m in models {
        let table = table_name(m);
        let fields: Vec<Field> = m.fields.iter().filter(|f| f.relation.is_none()).map(scalar).collect();
        let primary_key = fields
            .iter()
            .find(|f| f.name == m.primary_key)
            .cloned()
            .ok_or_else(|| ConfigError::InvalidPrimaryKey {
                model: m.name.clone(),
                field: m.primary_key.clone(),
            })?;

        let mut relations = Vec::new();
        for f in &m.fields {
            let Some(rel) = &f.relation else { continue };
            let target = lookup(rel.target())?;
            let target_pk = target.field(&target.primary_key).map(scalar).ok_or_else(|| {
                ConfigError::InvalidPrimaryKey {
                    model: target.name.clone(),
                    field: target.primary_key.clone(),
                }
            })?;
            let target_table = table_name(target);
            let alias = to_snake_case(&f.name);
            let relation = match rel {
                RelationConfig::OneToOne { foreign_key, .. } => {
                    let fk = m.field(foreign_key).map(scalar).ok_or_else(|| missing_fk(m, foreign_key))?;
                    Relation {
                        name: f.name.clone(),
                        alias,
                        kind: RelationKind::OneToOne,
                        target: target.name.clone(),
                        target_table,
                        local_field: fk.name,
                        local_column: fk.column,
                        remote_field: target_pk.name,
                        remote_column: target_pk.column,
                        link: None,
                    }
                }
                RelationConfig::OneToMany { foreign_key, .. } => {
                    let fk = target
                        .field(foreign_key)
                        .map(scalar)
                        .ok_or_else(|| missing_fk(target, foreign_key))?;
                    Relation {
                        name: f.name.clone(),
                        alias,
                        kind: RelationKind::OneToMany,
                        target: target.name.clone(),
                        target_table,
                        local_field: primary_key.name.clone(),
                        local_column: primary_key.column.clone(),
                        remote_field: fk.name,
                        remote_column: fk.column,
                        link: None,
                    }
                }
                RelationConfig::ManyToMany {
                    link_table,
                    source_column,
                    target_column,
                    ..
                } => {
                    let link = LinkTable {
                        table: link_table.clone().unwrap_or_else(|| format!("{}_{}", table, target_table)),
                        source_column: source_column.clone().unwrap_or_else(|| format!("{}_id", table)),
                        target_column: target_column.clone().unwrap_or_else(|| format!("{}_id", target_table)),
                    };
                    Relation {
                        name: f.name.clone(),
                        alias,
                        kind: RelationKind::ManyToMany,
                        target: target.name.clone(),
                        target_table,
                        local_field: primary_key.name.clone(),
                        local_column: primary_key.column.clone(),
                        remote_field: target_pk.name,
                        remote_column: target_pk.column,
                        link: Some(link),
                    }
                }
            };
            relations.push(relation);
        }

        let sensitive_fields: HashSet<String> = m.sensitive_fields.iter().cloned().collect();
        schemas.push(Schema {
            model: m.name.clone(),
            table,
            pk_type: PkType::from_field_type(primary_key.field_type),
            primary_key,
            fields,
            relations,
            sensitive_fields,
            list_modifier: None,
        });
    }
    Ok(schemas)
}

fn missing_fk(model: &ModelConfig, name: &str) -> ConfigError {
    ConfigError::MissingReference {
        kind: "foreign key",
        id: format!("{}.{}", model.name, name),
    }
}

/// Load model configs from a JSON file or from every `*.json` file in a directory (sorted by name).
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<Vec<ModelConfig>, ConfigError> {
    let path = path.as_ref();
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let mut files = Vec::new();
    if meta.is_dir() {
        let mut dir = tokio::fs::read_dir(path)
            .await
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        while let Some(entry) = dir.next_entry().await.map_err(|e| ConfigError::Load(e.to_string()))? {
            let p = entry.path();
            if p.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(p);
            }
        }
        files.sort();
    } else {
        files.push(path.to_path_buf());
    }

    let mut models = Vec::new();
    for file in files {
        let text = tokio::fs::read_to_string(&file)
            .await
            .map_err(|e| ConfigError::Load(format!("{}: {}", file.display(), e)))?;
        let parsed: ModelFile =
            serde_json::from_str(&text).map_err(|e| ConfigError::Load(format!("{}: {}", file.display(), e)))?;
        models.extend(parsed.into_models());
    }
    tracing::debug!(count = models.len(), path = %path.display(), "loaded model configs");
    Ok(models)
}
