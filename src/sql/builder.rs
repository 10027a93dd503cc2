//! Builds parameterized SELECT statements from a schema and a parsed query.
//!
//! Identifiers come from the schema only; values are always bound as `?` args.

use crate::config::{LinkTable, Schema};
use crate::error::{AppError, ConfigError};
use crate::model::User;
use crate::query::{Projection, QuerySpec};
use crate::sql::{count_placeholders, needs_grouping, SqlValue};

/// Stand-in for "no limit" when only an offset is given; MySQL and SQLite reject a bare OFFSET.
pub const NO_LIMIT: i64 = i64::MAX;

/// SQL text with `?` placeholders and its args, in bind order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

impl Statement {
    fn new(sql: String) -> Self {
        Statement { sql, args: Vec::new() }
    }

    fn push_arg(&mut self, v: SqlValue) {
        self.args.push(v);
    }

    fn where_clause(&mut self, conditions: &[String]) {
        if !conditions.is_empty() {
            self.sql.push_str(" WHERE ");
            self.sql.push_str(&conditions.join(" AND "));
        }
    }
}

/// Appends the model's list-modifier condition. Its args always come after every other arg.
fn apply_list_modifier(
    schema: &Schema,
    user: Option<&User>,
    conditions: &mut Vec<String>,
    args: &mut Vec<SqlValue>,
) -> Result<(), ConfigError> {
    let Some(modifier) = &schema.list_modifier else {
        return Ok(());
    };
    let filter = modifier.apply(schema, user);
    let placeholders = count_placeholders(&filter.fragment);
    if placeholders != filter.args.len() {
        return Err(ConfigError::ListModifier {
            model: schema.model.clone(),
            placeholders,
            args: filter.args.len(),
        });
    }
    if filter.is_empty() {
        return Ok(());
    }
    let fragment = filter.fragment.trim();
    if needs_grouping(fragment) {
        conditions.push(format!("({})", fragment));
    } else {
        conditions.push(fragment.to_string());
    }
    args.extend(filter.args);
    Ok(())
}

/// List query: `SELECT [DISTINCT] fields FROM table [joins] [WHERE] [GROUP BY] [ORDER BY] [LIMIT] [OFFSET]`.
pub fn build_select(schema: &Schema, spec: &QuerySpec, user: Option<&User>) -> Result<Statement, AppError> {
    let table = schema.table.as_str();
    let qualify = spec.has_joins();

    let fields = match &spec.projection {
        Projection::All if qualify => format!("{}.*", table),
        Projection::All => "*".to_string(),
        Projection::Columns(selections) => selections
            .iter()
            .map(|s| s.render(table, qualify))
            .collect::<Vec<_>>()
            .join(", "),
    };
    let distinct = if spec.distinct { "DISTINCT " } else { "" };
    let mut q = Statement::new(format!("SELECT {}{} FROM {}", distinct, fields, table));

    // Model rows filtered through a to-many relation: the to-many joins move into a
    // primary-key subquery so each row comes back once.
    let semi_join = !spec.custom_projection() && !spec.to_many.is_empty();
    for join in spec.joins.iter().filter(|j| !(semi_join && spec.is_to_many(&j.alias))) {
        q.sql.push(' ');
        q.sql.push_str(&join.render());
    }

    let mut conditions = Vec::with_capacity(spec.filters.len() + 1);
    let filters: Vec<String> = spec.filters.iter().map(|f| f.render(table, qualify)).collect();
    if semi_join {
        let pk = format!("{}.{}", table, schema.pk_column());
        let mut sub = format!("SELECT {} FROM {}", pk, table);
        for join in &spec.joins {
            sub.push(' ');
            sub.push_str(&join.render());
        }
        if !filters.is_empty() {
            sub.push_str(" WHERE ");
            sub.push_str(&filters.join(" AND "));
        }
        conditions.push(format!("{} IN ({})", pk, sub));
    } else {
        conditions.extend(filters);
    }
    for filter in &spec.filters {
        for arg in &filter.args {
            q.push_arg(arg.clone());
        }
    }
    apply_list_modifier(schema, user, &mut conditions, &mut q.args)?;
    q.where_clause(&conditions);

    if !spec.group_by.is_empty() {
        let cols: Vec<String> = spec.group_by.iter().map(|c| c.render(table, qualify)).collect();
        q.sql.push_str(" GROUP BY ");
        q.sql.push_str(&cols.join(", "));
    }
    if !spec.order_by.is_empty() {
        let cols: Vec<String> = spec
            .order_by
            .iter()
            .map(|(c, dir)| format!("{} {}", c.render(table, qualify), dir.sql()))
            .collect();
        q.sql.push_str(" ORDER BY ");
        q.sql.push_str(&cols.join(", "));
    }
    match (spec.limit, spec.offset) {
        (Some(limit), Some(offset)) => q.sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
        (Some(limit), None) => q.sql.push_str(&format!(" LIMIT {}", limit)),
        (None, Some(offset)) => q.sql.push_str(&format!(" LIMIT {} OFFSET {}", NO_LIMIT, offset)),
        (None, None) => {}
    }
    Ok(q)
}

/// Single fetch by primary key. The list modifier still applies.
pub fn select_by_pk(schema: &Schema, id: SqlValue, user: Option<&User>) -> Result<Statement, AppError> {
    let mut q = Statement::new(format!("SELECT * FROM {}", schema.table));
    let mut conditions = vec![format!("{} = ?", schema.pk_column())];
    q.push_arg(id);
    apply_list_modifier(schema, user, &mut conditions, &mut q.args)?;
    q.where_clause(&conditions);
    Ok(q)
}

/// Batch fetch for preload: `SELECT * FROM t WHERE column IN (...) ORDER BY pk`.
pub fn select_by_column_in(
    schema: &Schema,
    column: &str,
    values: &[SqlValue],
    user: Option<&User>,
) -> Result<Statement, AppError> {
    let mut q = Statement::new(format!("SELECT * FROM {}", schema.table));
    if values.is_empty() {
        q.sql.push_str(" WHERE 1 = 0");
        return Ok(q);
    }
    let marks = vec!["?"; values.len()].join(", ");
    let mut conditions = vec![format!("{} IN ({})", column, marks)];
    q.args.extend(values.iter().cloned());
    apply_list_modifier(schema, user, &mut conditions, &mut q.args)?;
    q.where_clause(&conditions);
    q.sql.push_str(&format!(" ORDER BY {}", schema.pk_column()));
    Ok(q)
}

/// Link rows for many-to-many expansion: `(source, target)` pairs for the given source keys.
pub fn select_links(link: &LinkTable, values: &[SqlValue]) -> Statement {
    let mut q = Statement::new(format!(
        "SELECT {} AS source_id, {} AS target_id FROM {}",
        link.source_column, link.target_column, link.table
    ));
    if values.is_empty() {
        q.sql.push_str(" WHERE 1 = 0");
        return q;
    }
    let marks = vec!["?"; values.len()].join(", ");
    q.sql.push_str(&format!(
        " WHERE {} IN ({}) ORDER BY {}, {}",
        link.source_column, marks, link.source_column, link.target_column
    ));
    q.args.extend(values.iter().cloned());
    q
}
