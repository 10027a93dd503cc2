//! Model validation: identifier grammar, referential integrity, unique names.

use crate::case::to_snake_case;
use crate::config::{ModelConfig, RelationConfig};
use crate::error::ConfigError;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

fn ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static identifier pattern"))
}

/// SQL identifiers are concatenated into statements, so only plain identifiers are accepted.
pub fn is_identifier(s: &str) -> bool {
    ident_re().is_match(s)
}

fn check_ident(kind: &str, s: &str) -> Result<(), ConfigError> {
    if is_identifier(s) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier(format!("{} '{}'", kind, s)))
    }
}

pub fn table_name(model: &ModelConfig) -> String {
    model.table.clone().unwrap_or_else(|| to_snake_case(&model.name))
}

pub fn validate(models: &[ModelConfig]) -> Result<(), ConfigError> {
    let mut by_name: HashMap<String, &ModelConfig> = HashMap::new();
    for m in models {
        check_ident("model", &m.name)?;
        if by_name.insert(m.name.to_lowercase(), m).is_some() {
            return Err(ConfigError::DuplicateModel(m.name.clone()));
        }
    }

    for m in models {
        let table = table_name(m);
        check_ident("table", &table)?;

        let mut names = HashSet::new();
        for f in &m.fields {
            check_ident("field", &f.name)?;
            if !names.insert(f.name.as_str()) {
                return Err(ConfigError::Validation(format!("{}: duplicate field {}", m.name, f.name)));
            }
            if let Some(col) = &f.column {
                check_ident("column", col)?;
            }
        }

        if m.field(&m.primary_key).filter(|f| f.relation.is_none()).is_none() {
            return Err(ConfigError::InvalidPrimaryKey {
                model: m.name.clone(),
                field: m.primary_key.clone(),
            });
        }

        for s in &m.sensitive_fields {
            if m.field(s).is_none() {
                return Err(ConfigError::MissingReference {
                    kind: "sensitive field",
                    id: format!("{}.{}", m.name, s),
                });
            }
        }

        for f in &m.fields {
            let Some(rel) = &f.relation else { continue };
            let target = by_name
                .get(&rel.target().to_lowercase())
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "relation target",
                    id: rel.target().to_string(),
                })?;
            if to_snake_case(&f.name) == table {
                return Err(ConfigError::Validation(format!(
                    "{}: relation {} would alias the model's own table",
                    m.name, f.name
                )));
            }
            match rel {
                RelationConfig::OneToOne { foreign_key, .. } => scalar_field(m, foreign_key)?,
                RelationConfig::OneToMany { foreign_key, .. } => scalar_field(target, foreign_key)?,
                RelationConfig::ManyToMany {
                    link_table,
                    source_column,
                    target_column,
                    ..
                } => {
                    for ident in [link_table, source_column, target_column].into_iter().flatten() {
                        check_ident("link", ident)?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn scalar_field(model: &ModelConfig, name: &str) -> Result<(), ConfigError> {
    match model.field(name) {
        Some(f) if f.relation.is_none() => Ok(()),
        _ => Err(ConfigError::MissingReference {
            kind: "foreign key",
            id: format!("{}.{}", model.name, name),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldConfig, FieldType};

    fn field(name: &str) -> FieldConfig {
        FieldConfig {
            name: name.into(),
            column: None,
            type_: FieldType::Int,
            nullable: true,
            relation: None,
        }
    }

    fn model(name: &str, fields: Vec<FieldConfig>) -> ModelConfig {
        ModelConfig {
            name: name.into(),
            table: None,
            primary_key: "id".into(),
            fields,
            sensitive_fields: vec![],
        }
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("author_id"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("id; DROP TABLE x"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("a.b"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn rejects_bad_column_identifier() {
        let mut f = field("title");
        f.column = Some("title--".into());
        let err = validate(&[model("Book", vec![field("id"), f])]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidIdentifier(_)));
    }

    #[test]
    fn rejects_missing_primary_key() {
        let err = validate(&[model("Book", vec![field("title")])]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPrimaryKey { .. }));
    }

    #[test]
    fn rejects_duplicate_model_names_case_insensitively() {
        let err = validate(&[model("Book", vec![field("id")]), model("book", vec![field("id")])]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateModel(_)));
    }

    #[test]
    fn rejects_unknown_relation_target_and_foreign_key() {
        let mut rel = field("author");
        rel.relation = Some(RelationConfig::OneToOne {
            target: "Author".into(),
            foreign_key: "authorId".into(),
        });
        let err = validate(&[model("Book", vec![field("id"), rel.clone()])]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingReference { kind: "relation target", .. }));

        let err = validate(&[model("Book", vec![field("id"), rel]), model("Author", vec![field("id")])]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingReference { kind: "foreign key", .. }));
    }
}
