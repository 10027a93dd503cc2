//! Parsed, validated request query. Every identifier here came from a schema.

use crate::config::{Join, Relation, RelationKind};
use crate::sql::SqlValue;

/// A column on the main table or on a joined relation alias.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnRef {
    Main(String),
    Joined { alias: String, column: String },
}

impl ColumnRef {
    /// Main-table columns are qualified only when the statement has joins.
    pub fn render(&self, table: &str, qualify: bool) -> String {
        match self {
            ColumnRef::Main(column) if qualify => format!("{}.{}", table, column),
            ColumnRef::Main(column) => column.clone(),
            ColumnRef::Joined { alias, column } => format!("{}.{}", alias, column),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "count" => Some(Aggregate::Count),
            "sum" => Some(Aggregate::Sum),
            "avg" => Some(Aggregate::Avg),
            "min" => Some(Aggregate::Min),
            "max" => Some(Aggregate::Max),
            _ => None,
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            Aggregate::Count => "COUNT",
            Aggregate::Sum => "SUM",
            Aggregate::Avg => "AVG",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        }
    }
}

/// One entry of a custom projection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    Column(ColumnRef),
    Aggregate {
        func: Aggregate,
        column: ColumnRef,
        /// Output name, e.g. `count__id`.
        alias: String,
    },
}

impl Selection {
    pub fn render(&self, table: &str, qualify: bool) -> String {
        match self {
            Selection::Column(c @ ColumnRef::Main(_)) => c.render(table, qualify),
            Selection::Column(c @ ColumnRef::Joined { alias, column }) => {
                format!("{} AS {}__{}", c.render(table, qualify), alias, column)
            }
            Selection::Aggregate { func, column, alias } => {
                format!("{}({}) AS {}", func.sql(), column.render(table, qualify), alias)
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Projection {
    #[default]
    All,
    Columns(Vec<Selection>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    IContains,
    StartsWith,
    EndsWith,
    In,
    Between,
    IsNull,
    NotNull,
}

impl FilterOp {
    /// Operator suffix as written in filter keys (`title__contains`).
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "eq" => FilterOp::Eq,
            "ne" => FilterOp::Ne,
            "gt" => FilterOp::Gt,
            "gte" => FilterOp::Gte,
            "lt" => FilterOp::Lt,
            "lte" => FilterOp::Lte,
            "contains" => FilterOp::Contains,
            "icontains" => FilterOp::IContains,
            "startswith" => FilterOp::StartsWith,
            "endswith" => FilterOp::EndsWith,
            "in" => FilterOp::In,
            "between" => FilterOp::Between,
            "isnull" => FilterOp::IsNull,
            _ => return None,
        })
    }

    pub fn is_pattern(self) -> bool {
        matches!(
            self,
            FilterOp::Contains | FilterOp::IContains | FilterOp::StartsWith | FilterOp::EndsWith
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub target: ColumnRef,
    pub op: FilterOp,
    /// Already coerced; pattern args already carry their `%` wildcards.
    pub args: Vec<SqlValue>,
}

impl Filter {
    /// SQL fragment for this condition. The number of `?` always equals `args.len()`.
    pub fn render(&self, table: &str, qualify: bool) -> String {
        let col = self.target.render(table, qualify);
        match self.op {
            FilterOp::Eq => format!("{} = ?", col),
            FilterOp::Ne => format!("{} <> ?", col),
            FilterOp::Gt => format!("{} > ?", col),
            FilterOp::Gte => format!("{} >= ?", col),
            FilterOp::Lt => format!("{} < ?", col),
            FilterOp::Lte => format!("{} <= ?", col),
            FilterOp::Contains | FilterOp::StartsWith | FilterOp::EndsWith => {
                format!("{} LIKE ? ESCAPE '!'", col)
            }
            FilterOp::IContains => format!("LOWER({}) LIKE LOWER(?) ESCAPE '!'", col),
            FilterOp::In => {
                let marks = vec!["?"; self.args.len()].join(", ");
                format!("{} IN ({})", col, marks)
            }
            FilterOp::Between => format!("{} BETWEEN ? AND ?", col),
            FilterOp::IsNull => format!("{} IS NULL", col),
            FilterOp::NotNull => format!("{} IS NOT NULL", col),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Many-to-many expansion mode (`$m2m`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum M2mMode {
    #[default]
    None,
    Ids,
    Fill,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuerySpec {
    pub projection: Projection,
    pub distinct: bool,
    pub filters: Vec<Filter>,
    /// In discovery order, at most once per relation.
    pub joins: Vec<Join>,
    /// Aliases of joins that can match several rows per model row.
    pub to_many: Vec<String>,
    pub group_by: Vec<ColumnRef>,
    pub order_by: Vec<(ColumnRef, Direction)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub preload: bool,
    pub m2m: M2mMode,
}

impl QuerySpec {
    /// True when the client asked for specific columns, which yields dynamic rows.
    pub fn custom_projection(&self) -> bool {
        matches!(self.projection, Projection::Columns(_))
    }

    /// Add the joins for `relation` unless it is already joined.
    pub fn join_relation(&mut self, relation: &Relation, main_table: &str) {
        if self.joins.iter().any(|j| j.alias == relation.alias) {
            return;
        }
        let joins = relation.joins(main_table);
        if relation.kind != RelationKind::OneToOne {
            self.to_many.extend(joins.iter().map(|j| j.alias.clone()));
        }
        self.joins.extend(joins);
    }

    pub fn is_to_many(&self, alias: &str) -> bool {
        self.to_many.iter().any(|a| a == alias)
    }

    pub fn has_joins(&self) -> bool {
        !self.joins.is_empty()
    }
}
