//! Audit log: entries, stores, and the fire-and-forget queue feeding them.

mod queue;
mod store;

pub use queue::AuditQueue;
pub use store::{AuditStore, MemoryAuditStore, SqlAuditStore, AUDIT_TABLE};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Read,
    Added,
    Modified,
    Deleted,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Read => "read",
            AuditAction::Added => "added",
            AuditAction::Modified => "modified",
            AuditAction::Deleted => "deleted",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub username: String,
    pub action: AuditAction,
    pub table_name: String,
    /// Target row id, 0 for bulk operations.
    pub table_id: i64,
    /// JSON text: `{"params": {...}, "rows_count": n, "_IP": "..."}`.
    pub activity: String,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn read(
        username: impl Into<String>,
        table_name: impl Into<String>,
        table_id: i64,
        params: Map<String, Value>,
        rows_count: usize,
        client_addr: &str,
    ) -> Self {
        AuditEntry {
            username: username.into(),
            action: AuditAction::Read,
            table_name: table_name.into(),
            table_id,
            activity: activity(params, rows_count, client_addr),
            created_at: Utc::now(),
        }
    }
}

pub fn activity(params: Map<String, Value>, rows_count: usize, client_addr: &str) -> String {
    json!({
        "params": params,
        "rows_count": rows_count,
        "_IP": client_addr,
    })
    .to_string()
}
