//! SQLite driver. Values are dynamically typed, so only the storage classes are scanned.

use super::{float_value, DialectKind, Driver, Row};
use crate::error::ConfigError;
use crate::sql::SqlValue;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Sqlite;
use std::str::FromStr;

pub struct SqliteDriver {
    pool: SqlitePool,
}

impl SqliteDriver {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteDriver { pool }
    }

    /// An in-memory database lives in a single connection that is never recycled.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, ConfigError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| ConfigError::Connection(e.to_string()))?
            .create_if_missing(true);
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };
        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| ConfigError::Connection(e.to_string()))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn bind<'q>(q: Query<'q, Sqlite, SqliteArguments<'q>>, v: &SqlValue) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match v {
        SqlValue::Null => q.bind(None::<String>),
        SqlValue::Bool(b) => q.bind(*b),
        SqlValue::Int(n) => q.bind(*n),
        SqlValue::Float(f) => q.bind(*f),
        SqlValue::Text(s) => q.bind(s.clone()),
        SqlValue::Uuid(u) => q.bind(u.to_string()),
        SqlValue::Timestamp(t) => q.bind(*t),
    }
}

fn row_to_json(row: &SqliteRow) -> Row {
    use sqlx::{Column, Row as _};
    let mut map = Row::new();
    for (i, col) in row.columns().iter().enumerate() {
        map.insert(col.name().to_string(), cell_to_value(row, i));
    }
    map
}

fn cell_to_value(row: &SqliteRow, i: usize) -> Value {
    use sqlx::Row as _;
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(i) {
        return Value::from(n);
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(i) {
        return float_value(n);
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(i) {
        return Value::Bool(b);
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(i) {
        return Value::String(s);
    }
    Value::Null
}

#[async_trait]
impl Driver for SqliteDriver {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    async fn fetch_rows(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<Row>, sqlx::Error> {
        let q = args.iter().fold(sqlx::query(sql), bind);
        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<u64, sqlx::Error> {
        let q = args.iter().fold(sqlx::query(sql), bind);
        Ok(q.execute(&self.pool).await?.rows_affected())
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map(|_| ())
    }
}
