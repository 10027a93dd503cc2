//! Process settings read from the environment (`.env` is loaded by the binary).

use crate::dialect::DialectKind;
use crate::error::ConfigError;
use crate::trail::Level;
use std::fmt;

pub const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

#[derive(Clone)]
pub struct Settings {
    pub database_type: DialectKind,
    pub database_url: String,
    pub max_connections: u32,
    pub reporting_level: Level,
    /// Trail every built statement and its args at DEBUG before execution.
    pub debug_db: bool,
    /// Default audit policy for reads when a model has no log hook.
    pub log_read: bool,
    pub audit_queue_capacity: usize,
    pub max_page_size: Option<u64>,
    pub models_path: Option<String>,
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_type: DialectKind::Sqlite,
            database_url: DEFAULT_DATABASE_URL.into(),
            max_connections: 5,
            reporting_level: Level::Info,
            debug_db: false,
            log_read: true,
            audit_queue_capacity: 1024,
            max_page_size: None,
            models_path: None,
            bind_addr: DEFAULT_BIND_ADDR.into(),
        }
    }
}

/// Connection URLs may carry credentials.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("database_type", &self.database_type)
            .field("database_url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("reporting_level", &self.reporting_level)
            .field("debug_db", &self.debug_db)
            .field("log_read", &self.log_read)
            .field("audit_queue_capacity", &self.audit_queue_capacity)
            .field("max_page_size", &self.max_page_size)
            .field("models_path", &self.models_path)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

fn parse_bool(key: &str, v: &str) -> Result<bool, ConfigError> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Validation(format!("{}: expected a boolean, got '{}'", key, v))),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, v: &str) -> Result<T, ConfigError> {
    v.trim()
        .parse()
        .map_err(|_| ConfigError::Validation(format!("{}: expected a number, got '{}'", key, v)))
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Missing keys keep their defaults; malformed ones are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut s = Settings::default();
        if let Some(v) = get("DATABASE_TYPE") {
            s.database_type = v.parse()?;
        }
        if let Some(v) = get("DATABASE_URL") {
            s.database_url = v;
        }
        if let Some(v) = get("DATABASE_MAX_CONNECTIONS") {
            s.max_connections = parse_num("DATABASE_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = get("REPORTING_LEVEL") {
            s.reporting_level = v.parse()?;
        }
        if let Some(v) = get("DEBUG_DB") {
            s.debug_db = parse_bool("DEBUG_DB", &v)?;
        }
        if let Some(v) = get("API_LOG_READ") {
            s.log_read = parse_bool("API_LOG_READ", &v)?;
        }
        if let Some(v) = get("AUDIT_QUEUE_CAPACITY") {
            s.audit_queue_capacity = parse_num("AUDIT_QUEUE_CAPACITY", &v)?;
            if s.audit_queue_capacity == 0 {
                return Err(ConfigError::Validation("AUDIT_QUEUE_CAPACITY must be positive".into()));
            }
        }
        if let Some(v) = get("MAX_PAGE_SIZE") {
            s.max_page_size = Some(parse_num("MAX_PAGE_SIZE", &v)?);
        }
        s.models_path = get("MODELS_PATH");
        if let Some(v) = get("BIND_ADDR") {
            s.bind_addr = v;
        }
        Ok(s)
    }
}
