//! Query-string parser. Keys starting with `$` are directives, every other key is a filter.
//!
//! Every field or relation name is looked up in the schema; anything unknown is a
//! `BadRequest` naming the parameter, so client text never reaches SQL as an identifier.

use crate::config::{FieldType, Schema, Settings};
use crate::error::AppError;
use crate::model::SchemaRegistry;
use crate::query::{Aggregate, ColumnRef, Direction, Filter, FilterOp, M2mMode, Projection, QuerySpec, Selection};
use crate::sql::SqlValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

struct Parser<'a> {
    registry: &'a SchemaRegistry,
    schema: &'a Schema,
    spec: QuerySpec,
}

pub fn parse_params(
    registry: &SchemaRegistry,
    schema: &Schema,
    pairs: &[(String, String)],
    settings: &Settings,
) -> Result<QuerySpec, AppError> {
    let mut p = Parser {
        registry,
        schema,
        spec: QuerySpec::default(),
    };
    for (key, value) in pairs {
        match key.as_str() {
            "$f" => p.projection(key, value)?,
            "$distinct" => p.spec.distinct = flag(key, value)?,
            "$order" => p.order(key, value)?,
            "$groupby" => p.group_by(key, value)?,
            "$limit" => {
                let n = non_negative(key, value)?;
                if let Some(max) = settings.max_page_size {
                    if n > max {
                        return Err(AppError::bad_request(key, format!("must not exceed {}", max)));
                    }
                }
                p.spec.limit = Some(n);
            }
            "$offset" => p.spec.offset = Some(non_negative(key, value)?),
            "$preload" => p.spec.preload = flag(key, value)?,
            "$m2m" => p.spec.m2m = m2m_mode(key, value)?,
            k if k.starts_with('$') => return Err(AppError::bad_request(key, "unknown directive")),
            _ => p.filter(key, value)?,
        }
    }
    p.check_row_shape()?;
    Ok(p.spec)
}

/// Sensitive fields cannot be selected, filtered, ordered or grouped on, directly or through a relation.
fn hidden(param: &str, schema: &Schema, field: &str) -> Result<(), AppError> {
    if schema.sensitive_fields.contains(field) {
        return Err(AppError::bad_request(param, format!("field '{}' is not accessible", field)));
    }
    Ok(())
}

impl<'a> Parser<'a> {
    /// Resolve `field` or `relation.field` to a column, joining the relation when needed.
    fn column(&mut self, param: &str, name: &str) -> Result<(ColumnRef, FieldType), AppError> {
        let (schema, registry) = (self.schema, self.registry);
        if let Some((rel_name, field_name)) = name.split_once('.') {
            let relation = schema
                .relation(rel_name)
                .ok_or_else(|| AppError::bad_request(param, format!("unknown relation '{}'", rel_name)))?;
            let target = registry
                .schema(&relation.target)
                .ok_or_else(|| AppError::bad_request(param, format!("unknown relation '{}'", rel_name)))?;
            let field = target
                .field(field_name)
                .ok_or_else(|| AppError::bad_request(param, format!("unknown field '{}'", name)))?;
            hidden(param, target, &field.name)?;
            let (column, ty) = (field.column.clone(), field.field_type);
            self.spec.join_relation(relation, &schema.table);
            return Ok((
                ColumnRef::Joined {
                    alias: relation.alias.clone(),
                    column,
                },
                ty,
            ));
        }
        let field = schema
            .field(name)
            .ok_or_else(|| AppError::bad_request(param, format!("unknown field '{}'", name)))?;
        hidden(param, schema, &field.name)?;
        Ok((ColumnRef::Main(field.column.clone()), field.field_type))
    }

    fn projection(&mut self, param: &str, value: &str) -> Result<(), AppError> {
        let mut selections = Vec::new();
        for entry in list(param, value)? {
            let aggregate = entry
                .split_once("__")
                .and_then(|(agg, field)| Aggregate::parse(agg).map(|func| (agg, func, field)))
                .filter(|(_, _, field)| self.is_known(field));
            let selection = match aggregate {
                Some((agg, func, field)) => Selection::Aggregate {
                    func,
                    column: self.column(param, field)?.0,
                    alias: format!("{}__{}", agg, field.replace('.', "__")),
                },
                None => Selection::Column(self.column(param, entry)?.0),
            };
            selections.push(selection);
        }
        self.spec.projection = Projection::Columns(selections);
        Ok(())
    }

    /// Model rows (no `$f`) cannot be grouped, nor ordered by a column that repeats per row.
    fn check_row_shape(&self) -> Result<(), AppError> {
        if self.spec.custom_projection() {
            return Ok(());
        }
        if !self.spec.group_by.is_empty() {
            return Err(AppError::bad_request("$groupby", "requires $f"));
        }
        let to_many = self.spec.order_by.iter().any(|(c, _)| match c {
            ColumnRef::Joined { alias, .. } => self.spec.is_to_many(alias),
            ColumnRef::Main(_) => false,
        });
        if to_many {
            return Err(AppError::bad_request("$order", "cannot order model rows by a to-many relation"));
        }
        Ok(())
    }

    fn is_known(&self, name: &str) -> bool {
        match name.split_once('.') {
            Some((rel, field)) => self
                .schema
                .relation(rel)
                .and_then(|r| self.registry.schema(&r.target))
                .and_then(|s| s.field(field))
                .is_some(),
            None => self.schema.field(name).is_some(),
        }
    }

    fn order(&mut self, param: &str, value: &str) -> Result<(), AppError> {
        let mut order = Vec::new();
        for entry in list(param, value)? {
            let (name, dir) = match entry.strip_prefix('-') {
                Some(rest) => (rest, Direction::Desc),
                None => (entry, Direction::Asc),
            };
            order.push((self.column(param, name)?.0, dir));
        }
        self.spec.order_by = order;
        Ok(())
    }

    fn group_by(&mut self, param: &str, value: &str) -> Result<(), AppError> {
        let mut cols = Vec::new();
        for entry in list(param, value)? {
            cols.push(self.column(param, entry)?.0);
        }
        self.spec.group_by = cols;
        Ok(())
    }

    fn filter(&mut self, key: &str, value: &str) -> Result<(), AppError> {
        // A field whose own name contains `__` wins over the operator suffix.
        let (name, op) = if self.is_known(key) {
            (key, FilterOp::Eq)
        } else {
            match key.rsplit_once("__") {
                Some((name, op)) => {
                    let op = FilterOp::parse(op)
                        .ok_or_else(|| AppError::bad_request(key, format!("unknown operator '{}'", op)))?;
                    (name, op)
                }
                None => (key, FilterOp::Eq),
            }
        };
        let (target, ty) = self.column(key, name)?;

        let (op, args) = match op {
            FilterOp::IsNull => {
                if flag(key, value)? {
                    (FilterOp::IsNull, vec![])
                } else {
                    (FilterOp::NotNull, vec![])
                }
            }
            FilterOp::In => {
                let args = list(key, value)?
                    .into_iter()
                    .map(|v| coerce(key, ty, v))
                    .collect::<Result<Vec<_>, _>>()?;
                (op, args)
            }
            FilterOp::Between => {
                let parts = list(key, value)?;
                if parts.len() != 2 {
                    return Err(AppError::bad_request(key, "between takes exactly two values"));
                }
                (op, vec![coerce(key, ty, parts[0])?, coerce(key, ty, parts[1])?])
            }
            op if op.is_pattern() => {
                if !ty.is_textual() {
                    return Err(AppError::bad_request(key, "pattern operators apply to text fields only"));
                }
                let escaped = escape_like(value);
                let pattern = match op {
                    FilterOp::StartsWith => format!("{}%", escaped),
                    FilterOp::EndsWith => format!("%{}", escaped),
                    _ => format!("%{}%", escaped),
                };
                (op, vec![SqlValue::Text(pattern)])
            }
            op => (op, vec![coerce(key, ty, value)?]),
        };
        self.spec.filters.push(Filter { target, op, args });
        Ok(())
    }
}

/// Comma-separated list with no empty entries.
fn list<'v>(param: &str, value: &'v str) -> Result<Vec<&'v str>, AppError> {
    let items: Vec<&str> = value.split(',').map(str::trim).collect();
    if items.iter().any(|s| s.is_empty()) {
        return Err(AppError::bad_request(param, "empty list entry"));
    }
    Ok(items)
}

fn flag(param: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(AppError::bad_request(param, "expected 1 or 0")),
    }
}

fn m2m_mode(param: &str, value: &str) -> Result<M2mMode, AppError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "ids" => Ok(M2mMode::Ids),
        "fill" => Ok(M2mMode::Fill),
        "0" | "false" => Ok(M2mMode::None),
        _ => Err(AppError::bad_request(param, "expected 1, fill or 0")),
    }
}

/// LIMIT/OFFSET are emitted as integer literals, so they must fit a signed 64-bit column.
fn non_negative(param: &str, value: &str) -> Result<u64, AppError> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|n| *n <= i64::MAX as u64)
        .ok_or_else(|| AppError::bad_request(param, "must be a non-negative integer"))
}

/// Escapes `%`, `_` and `!` for `LIKE ... ESCAPE '!'`.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '!') {
            out.push('!');
        }
        out.push(c);
    }
    out
}

pub fn coerce(param: &str, ty: FieldType, raw: &str) -> Result<SqlValue, AppError> {
    let bad = |what: &str| AppError::bad_request(param, format!("expected {}, got '{}'", what, raw));
    match ty {
        FieldType::Int => raw.trim().parse::<i64>().map(SqlValue::Int).map_err(|_| bad("an integer")),
        FieldType::Float => raw.trim().parse::<f64>().map(SqlValue::Float).map_err(|_| bad("a number")),
        FieldType::Bool => match raw.trim().to_lowercase().as_str() {
            "1" | "true" => Ok(SqlValue::Bool(true)),
            "0" | "false" => Ok(SqlValue::Bool(false)),
            _ => Err(bad("a boolean")),
        },
        FieldType::Uuid => uuid::Uuid::parse_str(raw.trim()).map(SqlValue::Uuid).map_err(|_| bad("a uuid")),
        FieldType::Datetime => parse_datetime(raw.trim()).map(SqlValue::Timestamp).ok_or_else(|| bad("a datetime")),
        FieldType::Text | FieldType::Json => Ok(SqlValue::Text(raw.to_string())),
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::model::RegistryBuilder;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        let models: Vec<ModelConfig> = serde_json::from_value(json!([
            {"name": "Author", "sensitive_fields": ["email"], "fields": [
                {"name": "id", "type": "int"}, {"name": "name"}, {"name": "email"},
                {"name": "books", "relation": {"kind": "one_to_many", "target": "Book", "foreign_key": "authorId"}}
            ]},
            {"name": "Book", "sensitive_fields": ["secret"], "fields": [
                {"name": "id", "type": "int"},
                {"name": "title"},
                {"name": "authorId", "type": "int"},
                {"name": "price", "type": "float"},
                {"name": "published", "type": "datetime"},
                {"name": "secret"},
                {"name": "author", "relation": {"kind": "one_to_one", "target": "Author", "foreign_key": "authorId"}}
            ]}
        ]))
        .unwrap();
        RegistryBuilder::new().register_all(models).build().unwrap()
    }

    fn parse(query: &[(&str, &str)]) -> Result<QuerySpec, AppError> {
        let reg = registry();
        let schema = reg.schema("Book").unwrap().clone();
        let pairs: Vec<(String, String)> = query.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        parse_params(&reg, &schema, &pairs, &Settings::default())
    }

    fn bad_param(err: AppError) -> String {
        match err {
            AppError::BadRequest { param, .. } => param,
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[test]
    fn plain_filter_and_coercion() {
        let spec = parse(&[("title", "Dune"), ("authorId__gte", "3")]).unwrap();
        assert_eq!(spec.filters.len(), 2);
        assert_eq!(spec.filters[0].args, vec![SqlValue::Text("Dune".into())]);
        assert_eq!(spec.filters[1].op, FilterOp::Gte);
        assert_eq!(spec.filters[1].target, ColumnRef::Main("author_id".into()));
        assert_eq!(spec.filters[1].args, vec![SqlValue::Int(3)]);
        assert!(!spec.custom_projection());
    }

    #[test]
    fn injection_through_key_is_rejected() {
        let err = parse(&[("id; DROP TABLE x", "1")]).unwrap_err();
        assert_eq!(bad_param(err), "id; DROP TABLE x");
        assert!(parse(&[("title__like; --", "x")]).is_err());
        assert!(parse(&[("$order", "title; DROP TABLE x")]).is_err());
        assert!(parse(&[("$f", "author.name) FROM x --")]).is_err());
    }

    #[test]
    fn pagination_rules() {
        let spec = parse(&[("$limit", "10"), ("$offset", "0")]).unwrap();
        assert_eq!((spec.limit, spec.offset), (Some(10), Some(0)));
        assert_eq!(bad_param(parse(&[("$limit", "-1")]).unwrap_err()), "$limit");
        assert_eq!(bad_param(parse(&[("$offset", "ten")]).unwrap_err()), "$offset");

        let reg = registry();
        let schema = reg.schema("Book").unwrap().clone();
        let settings = Settings {
            max_page_size: Some(50),
            ..Settings::default()
        };
        let pairs = vec![("$limit".to_string(), "51".to_string())];
        assert!(parse_params(&reg, &schema, &pairs, &settings).is_err());
    }

    #[test]
    fn relation_filter_and_projection_join_once() {
        let spec = parse(&[("author.name", "Herbert"), ("$f", "title,author.name")]).unwrap();
        assert_eq!(spec.joins.len(), 1);
        assert_eq!(spec.joins[0].alias, "author");
        assert!(spec.custom_projection());
        assert_eq!(
            spec.filters[0].target,
            ColumnRef::Joined {
                alias: "author".into(),
                column: "name".into()
            }
        );
    }

    #[test]
    fn directives() {
        let spec = parse(&[
            ("$order", "-title,id"),
            ("$groupby", "authorId"),
            ("$f", "authorId,count__id"),
            ("$distinct", "1"),
            ("$preload", "1"),
            ("$m2m", "fill"),
        ])
        .unwrap();
        assert_eq!(spec.order_by[0], (ColumnRef::Main("title".into()), Direction::Desc));
        assert_eq!(spec.order_by[1].1, Direction::Asc);
        assert_eq!(spec.group_by, vec![ColumnRef::Main("author_id".into())]);
        assert!(spec.distinct && spec.preload);
        assert_eq!(spec.m2m, M2mMode::Fill);
        match &spec.projection {
            Projection::Columns(sel) => assert!(matches!(
                &sel[1],
                Selection::Aggregate { func: Aggregate::Count, alias, .. } if alias == "count__id"
            )),
            Projection::All => panic!("expected columns"),
        }
        assert!(parse(&[("$distinct", "yes")]).is_err());
        assert_eq!(bad_param(parse(&[("$f", "title,secret")]).unwrap_err()), "$f");
        assert!(parse(&[("$f", "count__secret")]).is_err());
        assert_eq!(bad_param(parse(&[("$bogus", "1")]).unwrap_err()), "$bogus");
    }

    #[test]
    fn sensitive_fields_cannot_be_referenced_anywhere() {
        for (key, value) in [
            ("secret", "x"),
            ("secret__startswith", "a"),
            ("$order", "-secret"),
            ("$groupby", "secret"),
            ("author.email__startswith", "frank"),
            ("$order", "author.email"),
            ("$f", "author.email"),
        ] {
            assert_eq!(bad_param(parse(&[(key, value)]).unwrap_err()), key, "{key}={value}");
        }
    }

    #[test]
    fn model_rows_cannot_be_grouped_or_ordered_through_to_many() {
        assert_eq!(bad_param(parse(&[("$groupby", "authorId")]).unwrap_err()), "$groupby");

        let reg = registry();
        let author = reg.schema("Author").unwrap().clone();
        let pairs = |q: &[(&str, &str)]| -> Vec<(String, String)> {
            q.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
        };
        let spec = parse_params(&reg, &author, &pairs(&[("books.title", "Dune")]), &Settings::default()).unwrap();
        assert!(spec.is_to_many("books"));
        let err = parse_params(&reg, &author, &pairs(&[("$order", "books.title")]), &Settings::default()).unwrap_err();
        assert_eq!(bad_param(err), "$order");
        assert!(parse_params(&reg, &author, &pairs(&[("$f", "name,books.title"), ("$order", "books.title")]), &Settings::default()).is_ok());
    }

    #[test]
    fn operators_and_values() {
        let spec = parse(&[
            ("title__contains", "50%"),
            ("id__in", "1,2,3"),
            ("price__between", "1.5,9"),
            ("authorId__isnull", "0"),
            ("published__lt", "2020-01-01"),
        ])
        .unwrap();
        assert_eq!(spec.filters[0].args, vec![SqlValue::Text("%50!%%".into())]);
        assert_eq!(spec.filters[1].args.len(), 3);
        assert_eq!(spec.filters[2].args, vec![SqlValue::Float(1.5), SqlValue::Float(9.0)]);
        assert_eq!(spec.filters[3].op, FilterOp::NotNull);
        assert!(spec.filters[3].args.is_empty());
        assert!(matches!(spec.filters[4].args[0], SqlValue::Timestamp(_)));

        assert_eq!(bad_param(parse(&[("id", "abc")]).unwrap_err()), "id");
        assert!(parse(&[("id__contains", "1")]).is_err());
        assert!(parse(&[("title__regex", "x")]).is_err());
        assert!(parse(&[("id__between", "1")]).is_err());
    }
}
