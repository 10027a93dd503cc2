//! Resolved schema: model config validated and flattened for runtime use.

use crate::config::FieldType;
use crate::model::ListModifier;
use crate::sql::SqlValue;
use std::collections::HashSet;

/// Primary key type for parsing path ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkType {
    Int,
    Uuid,
    Text,
}

impl PkType {
    pub fn from_field_type(ty: FieldType) -> Self {
        match ty {
            FieldType::Int => PkType::Int,
            FieldType::Uuid => PkType::Uuid,
            _ => PkType::Text,
        }
    }

    /// Parse an id from the URL path. `None` means no row can have this id.
    pub fn parse_id(self, raw: &str) -> Option<SqlValue> {
        match self {
            PkType::Int => raw.parse::<i64>().ok().map(SqlValue::Int),
            PkType::Uuid => uuid::Uuid::parse_str(raw).ok().map(SqlValue::Uuid),
            PkType::Text => Some(SqlValue::Text(raw.to_string())),
        }
    }
}

/// A scalar field backed by a column.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub column: String,
    pub field_type: FieldType,
    pub nullable: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    ManyToMany,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinkTable {
    pub table: String,
    /// Column referencing the source model's primary key.
    pub source_column: String,
    /// Column referencing the target model's primary key.
    pub target_column: String,
}

/// A relation field. `local_*` names the key on this model, `remote_*` the key it matches on the target.
///
/// - one_to_one: local = our foreign key, remote = target primary key
/// - one_to_many: local = our primary key, remote = target's foreign key
/// - many_to_many: local = our primary key, remote = target primary key, matched through `link`
#[derive(Clone, Debug, PartialEq)]
pub struct Relation {
    pub name: String,
    /// Table alias used when the relation is joined.
    pub alias: String,
    pub kind: RelationKind,
    pub target: String,
    pub target_table: String,
    pub local_field: String,
    pub local_column: String,
    pub remote_field: String,
    pub remote_column: String,
    pub link: Option<LinkTable>,
}

/// One rendered `LEFT JOIN`. Identifiers come from the schema only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Join {
    pub table: String,
    pub alias: String,
    pub on: String,
}

impl Join {
    pub fn render(&self) -> String {
        format!("LEFT JOIN {} AS {} ON {}", self.table, self.alias, self.on)
    }
}

impl Relation {
    /// Joins needed to reach the target table from `main_table`, in order.
    pub fn joins(&self, main_table: &str) -> Vec<Join> {
        match (&self.kind, &self.link) {
            (RelationKind::ManyToMany, Some(link)) => {
                let link_alias = format!("{}_link", self.alias);
                vec![
                    Join {
                        table: link.table.clone(),
                        on: format!("{}.{} = {}.{}", link_alias, link.source_column, main_table, self.local_column),
                        alias: link_alias.clone(),
                    },
                    Join {
                        table: self.target_table.clone(),
                        alias: self.alias.clone(),
                        on: format!("{}.{} = {}.{}", self.alias, self.remote_column, link_alias, link.target_column),
                    },
                ]
            }
            _ => vec![Join {
                table: self.target_table.clone(),
                alias: self.alias.clone(),
                on: format!("{}.{} = {}.{}", self.alias, self.remote_column, main_table, self.local_column),
            }],
        }
    }
}

#[derive(Clone, Debug)]
pub struct Schema {
    pub model: String,
    pub table: String,
    pub primary_key: Field,
    pub pk_type: PkType,
    /// Scalar fields in declaration order.
    pub fields: Vec<Field>,
    pub relations: Vec<Relation>,
    pub sensitive_fields: HashSet<String>,
    pub list_modifier: Option<ListModifier>,
}

impl Schema {
    /// Scalar field by field name, falling back to column name.
    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| f.name == key)
            .or_else(|| self.fields.iter().find(|f| f.column == key))
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn pk_column(&self) -> &str {
        &self.primary_key.column
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relation(kind: RelationKind, link: Option<LinkTable>) -> Relation {
        Relation {
            name: "author".into(),
            alias: "author".into(),
            kind,
            target: "Author".into(),
            target_table: "author".into(),
            local_field: "authorId".into(),
            local_column: "author_id".into(),
            remote_field: "id".into(),
            remote_column: "id".into(),
            link,
        }
    }

    #[test]
    fn one_to_one_joins_on_foreign_key() {
        let joins = relation(RelationKind::OneToOne, None).joins("book");
        assert_eq!(joins.len(), 1);
        assert_eq!(joins[0].render(), "LEFT JOIN author AS author ON author.id = book.author_id");
    }

    #[test]
    fn many_to_many_joins_through_link_table() {
        let mut r = relation(
            RelationKind::ManyToMany,
            Some(LinkTable {
                table: "book_tag".into(),
                source_column: "book_id".into(),
                target_column: "tag_id".into(),
            }),
        );
        r.alias = "tags".into();
        r.target_table = "tag".into();
        r.local_column = "id".into();
        let rendered: Vec<String> = r.joins("book").iter().map(Join::render).collect();
        assert_eq!(
            rendered,
            vec![
                "LEFT JOIN book_tag AS tags_link ON tags_link.book_id = book.id".to_string(),
                "LEFT JOIN tag AS tags ON tags.id = tags_link.tag_id".to_string(),
            ]
        );
    }

    #[test]
    fn pk_type_parses_ids() {
        assert_eq!(PkType::Int.parse_id("42"), Some(SqlValue::Int(42)));
        assert_eq!(PkType::Int.parse_id("abc"), None);
        assert_eq!(PkType::Uuid.parse_id("nope"), None);
        assert_eq!(PkType::Text.parse_id("x"), Some(SqlValue::Text("x".into())));
    }
}
