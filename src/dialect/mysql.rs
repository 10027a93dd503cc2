//! MySQL / MariaDB driver.

use super::{float_value, DialectKind, Driver, Row};
use crate::error::ConfigError;
use crate::sql::SqlValue;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySqlArguments, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::MySql;

pub struct MySqlDriver {
    pool: MySqlPool,
}

impl MySqlDriver {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlDriver { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, ConfigError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| ConfigError::Connection(e.to_string()))?;
        Ok(Self::new(pool))
    }
}

/// UUIDs are stored as text on MySQL.
fn bind<'q>(q: Query<'q, MySql, MySqlArguments>, v: &SqlValue) -> Query<'q, MySql, MySqlArguments> {
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

fn row_to_json(row: &MySqlRow) -> Row {
    use sqlx::{Column, Row as _};
    let mut map = Row::new();
    for (i, col) in row.columns().iter().enumerate() {
        map.insert(col.name().to_string(), cell_to_value(row, i));
    }
    map
}

fn cell_to_value(row: &MySqlRow, i: usize) -> Value {
    use sqlx::Row as _;
    if let Ok(Some(n)) = row.try_get::<Option<i8>, _>(i) {
        return Value::from(n);
    }
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(i) {
        return Value::from(n);
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(i) {
        return Value::from(n);
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(i) {
        return Value::from(n);
    }
    if let Ok(Some(n)) = row.try_get::<Option<u64>, _>(i) {
        return Value::from(n);
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(i) {
        return float_value(n as f64);
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(i) {
        return float_value(n);
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(i) {
        return Value::Bool(b);
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(i) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(i) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(v)) = row.try_get::<Option<Value>, _>(i) {
        return v;
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(i) {
        return Value::String(s);
    }
    Value::Null
}

#[async_trait]
impl Driver for MySqlDriver {
    fn kind(&self) -> DialectKind {
        DialectKind::MySql
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
