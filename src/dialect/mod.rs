//! Database engines behind one driver trait. Statements are built with `?` placeholders
//! and translated here; rows come back as ordered JSON maps.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySqlDriver;
pub use postgres::PgDriver;
pub use sqlite::SqliteDriver;

use crate::config::{FieldType, Schema, Settings};
use crate::error::{AppError, ConfigError};
use crate::sql::{number_placeholders, SqlValue, Statement};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// One row as returned by the engine, in column order.
pub type Row = Map<String, Value>;

/// One row of a known model, keyed by field name and coerced per field type.
pub type Record = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    Postgres,
    MySql,
    Sqlite,
}

impl DialectKind {
    /// `?` → `$n` for PostgreSQL; MySQL and SQLite take `?` as is.
    pub fn translate_placeholders(self, sql: &str) -> String {
        match self {
            DialectKind::Postgres => number_placeholders(sql),
            DialectKind::MySql | DialectKind::Sqlite => sql.to_string(),
        }
    }
}

impl FromStr for DialectKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(DialectKind::Postgres),
            "mysql" | "mariadb" => Ok(DialectKind::MySql),
            "sqlite" | "sqlite3" => Ok(DialectKind::Sqlite),
            other => Err(ConfigError::UnsupportedDialect(other.to_string())),
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DialectKind::Postgres => "postgres",
            DialectKind::MySql => "mysql",
            DialectKind::Sqlite => "sqlite",
        })
    }
}

/// How fetched rows are shaped.
#[derive(Clone, Copy, Debug)]
pub enum RowShape<'a> {
    /// Rows of a known model.
    Typed(&'a Schema),
    /// Custom projection: keep columns as returned.
    Dynamic,
}

#[derive(Clone, Debug, PartialEq)]
pub enum QueryResult {
    Typed(Vec<Record>),
    Dynamic(Vec<Row>),
}

impl QueryResult {
    pub fn len(&self) -> usize {
        match self {
            QueryResult::Typed(rows) => rows.len(),
            QueryResult::Dynamic(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_rows(self) -> Vec<Map<String, Value>> {
        match self {
            QueryResult::Typed(rows) | QueryResult::Dynamic(rows) => rows,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Fetched {
    /// Rows actually fetched (after LIMIT/OFFSET).
    pub row_count: usize,
    pub result: QueryResult,
}

#[async_trait]
pub trait Driver: Send + Sync {
    fn kind(&self) -> DialectKind;

    /// Run a query whose SQL already uses this engine's placeholders.
    async fn fetch_rows(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<Row>, sqlx::Error>;

    /// Run a statement and return rows affected.
    async fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<u64, sqlx::Error>;

    async fn ping(&self) -> Result<(), sqlx::Error>;

    /// Translate, fetch and shape. Failures keep the engine SQL and args.
    async fn query(&self, stmt: &Statement, shape: RowShape<'_>) -> Result<Fetched, AppError> {
        let sql = self.kind().translate_placeholders(&stmt.sql);
        let rows = self
            .fetch_rows(&sql, &stmt.args)
            .await
            .map_err(|e| AppError::execution(e, &sql, &stmt.args))?;
        let row_count = rows.len();
        let result = match shape {
            RowShape::Typed(schema) => QueryResult::Typed(rows.into_iter().map(|r| to_record(schema, r)).collect()),
            RowShape::Dynamic => QueryResult::Dynamic(rows),
        };
        Ok(Fetched { row_count, result })
    }

    async fn run(&self, stmt: &Statement) -> Result<u64, AppError> {
        let sql = self.kind().translate_placeholders(&stmt.sql);
        self.execute(&sql, &stmt.args)
            .await
            .map_err(|e| AppError::execution(e, &sql, &stmt.args))
    }
}

/// Key a raw row by field name, in field order. Columns with no field are dropped.
pub fn to_record(schema: &Schema, mut row: Row) -> Record {
    let mut record = Record::new();
    for field in &schema.fields {
        let cell = row.remove(&field.column).unwrap_or(Value::Null);
        record.insert(field.name.clone(), coerce_cell(field.field_type, cell));
    }
    record
}

/// Normalize engine-specific encodings (SQLite/MySQL booleans as integers, JSON as text).
pub fn coerce_cell(ty: FieldType, cell: Value) -> Value {
    match (ty, cell) {
        (FieldType::Bool, Value::Number(n)) => Value::Bool(n.as_i64().map(|i| i != 0).unwrap_or(false)),
        (FieldType::Bool, Value::String(s)) => match s.as_str() {
            "1" | "t" | "true" | "TRUE" => Value::Bool(true),
            "0" | "f" | "false" | "FALSE" => Value::Bool(false),
            _ => Value::String(s),
        },
        (FieldType::Json, Value::String(s)) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        (FieldType::Float, Value::Number(n)) if !n.is_f64() => n
            .as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Number(n)),
        (FieldType::Int, Value::String(s)) => s.parse::<i64>().map(Value::from).unwrap_or(Value::String(s)),
        (_, other) => other,
    }
}

pub(crate) fn float_value(f: f64) -> Value {
    serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// Build the pool for the configured engine.
pub async fn connect(settings: &Settings) -> Result<Arc<dyn Driver>, ConfigError> {
    let url = settings.database_url.as_str();
    let max = settings.max_connections;
    let driver: Arc<dyn Driver> = match settings.database_type {
        DialectKind::Postgres => Arc::new(PgDriver::connect(url, max).await?),
        DialectKind::MySql => Arc::new(MySqlDriver::connect(url, max).await?),
        DialectKind::Sqlite => Arc::new(SqliteDriver::connect(url, max).await?),
    };
    tracing::info!(dialect = %settings.database_type, "database pool ready");
    Ok(driver)
}
