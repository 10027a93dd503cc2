use super::AuditEntry;
use crate::dialect::{DialectKind, Driver};
use crate::error::AppError;
use crate::sql::{SqlValue, Statement};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

pub const AUDIT_TABLE: &str = "audit_log";

/// Append-only sink for audit entries. Must tolerate concurrent appends.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AppError>;
}

/// Writes entries into `audit_log` through the shared driver.
pub struct SqlAuditStore {
    driver: Arc<dyn Driver>,
}

impl SqlAuditStore {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        SqlAuditStore { driver }
    }

    /// Create `audit_log` if missing.
    pub async fn ensure_audit_table(&self) -> Result<(), AppError> {
        let id = match self.driver.kind() {
            DialectKind::Postgres => "id BIGSERIAL PRIMARY KEY",
            DialectKind::MySql => "id BIGINT AUTO_INCREMENT PRIMARY KEY",
            DialectKind::Sqlite => "id INTEGER PRIMARY KEY AUTOINCREMENT",
        };
        let created_at = match self.driver.kind() {
            DialectKind::MySql => "DATETIME(6)",
            DialectKind::Postgres | DialectKind::Sqlite => "TIMESTAMP",
        };
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} ({}, username VARCHAR(255) NOT NULL, action VARCHAR(32) NOT NULL, \
             table_name VARCHAR(255) NOT NULL, table_id BIGINT NOT NULL, activity TEXT NOT NULL, created_at {} NOT NULL)",
            AUDIT_TABLE, id, created_at
        );
        self.driver
            .run(&Statement {
                sql: ddl,
                args: vec![],
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AuditStore for SqlAuditStore {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AppError> {
        let stmt = Statement {
            sql: format!(
                "INSERT INTO {} (username, action, table_name, table_id, activity, created_at) VALUES (?, ?, ?, ?, ?, ?)",
                AUDIT_TABLE
            ),
            args: vec![
                SqlValue::from(entry.username.as_str()),
                SqlValue::from(entry.action.as_str()),
                SqlValue::from(entry.table_name.as_str()),
                SqlValue::Int(entry.table_id),
                SqlValue::from(entry.activity.as_str()),
                SqlValue::Timestamp(entry.created_at.naive_utc()),
            ],
        };
        self.driver.run(&stmt).await?;
        Ok(())
    }
}

/// Keeps entries in memory. Used by tests and embedders without a database log.
#[derive(Default)]
pub struct MemoryAuditStore {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AppError> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry.clone());
        }
        Ok(())
    }
}
