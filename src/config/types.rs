//! Raw model definitions as written in JSON model files.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Int,
    Float,
    Bool,
    Text,
    Datetime,
    Json,
    Uuid,
}

impl FieldType {
    /// Pattern operators (`contains`, `startswith`, ...) only apply to text.
    pub fn is_textual(self) -> bool {
        matches!(self, FieldType::Text)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationConfig {
    /// `foreign_key` is a field of this model holding the target's primary key.
    OneToOne { target: String, foreign_key: String },
    /// `foreign_key` is a field of the target model referencing this model's primary key.
    OneToMany { target: String, foreign_key: String },
    /// Linked through a join table; names default to `{source}_{target}`, `{source}_id`, `{target}_id`.
    ManyToMany {
        target: String,
        #[serde(default)]
        link_table: Option<String>,
        #[serde(default)]
        source_column: Option<String>,
        #[serde(default)]
        target_column: Option<String>,
    },
}

impl RelationConfig {
    pub fn target(&self) -> &str {
        match self {
            RelationConfig::OneToOne { target, .. }
            | RelationConfig::OneToMany { target, .. }
            | RelationConfig::ManyToMany { target, .. } => target,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    /// Column name; defaults to the snake_case form of `name`.
    #[serde(default)]
    pub column: Option<String>,
    /// Ignored for relation fields.
    #[serde(rename = "type", default = "default_field_type")]
    pub type_: FieldType,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub relation: Option<RelationConfig>,
}

fn default_field_type() -> FieldType {
    FieldType::Text
}

fn default_true() -> bool {
    true
}

fn default_primary_key() -> String {
    "id".into()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    /// Table name; defaults to the snake_case form of `name`.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    pub fields: Vec<FieldConfig>,
    /// Field names that must never be exposed in API responses (e.g. password hashes, secrets).
    #[serde(default)]
    pub sensitive_fields: Vec<String>,
}

impl ModelConfig {
    pub fn field(&self, name: &str) -> Option<&FieldConfig> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A model file holds either one model or a list of them.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ModelFile {
    One(ModelConfig),
    Many(Vec<ModelConfig>),
}

impl ModelFile {
    pub fn into_models(self) -> Vec<ModelConfig> {
        match self {
            ModelFile::One(m) => vec![m],
            ModelFile::Many(v) => v,
        }
    }
}
