//! Trail: leveled log sink with a reporting threshold, injected into components.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use crate::error::ConfigError;

/// Reporting levels, ordered by severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Level {
    Debug = 0,
    Working = 1,
    Info = 2,
    Ok = 3,
    Warning = 4,
    Error = 5,
    Critical = 6,
    Alert = 7,
    Emergency = 8,
}

impl Level {
    pub const ALL: [Level; 9] = [
        Level::Debug,
        Level::Working,
        Level::Info,
        Level::Ok,
        Level::Warning,
        Level::Error,
        Level::Critical,
        Level::Alert,
        Level::Emergency,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn tag(self) -> &'static str {
        match self {
            Level::Debug => "[  DEBUG ]",
            Level::Working => "[ WORKING]",
            Level::Info => "[  INFO  ]",
            Level::Ok => "[   OK   ]",
            Level::Warning => "[ WARNING]",
            Level::Error => "[  ERROR ]",
            Level::Critical => "[CRITICAL]",
            Level::Alert => "[  ALERT ]",
            Level::Emergency => "[  EMERG ]",
        }
    }
}

impl FromStr for Level {
    type Err = ConfigError;

    /// Accepts a level name (`debug`, `warning`, `emerg`, ...) or its number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<u8>() {
            return Level::ALL
                .get(n as usize)
                .copied()
                .ok_or_else(|| ConfigError::Validation(format!("reporting level out of range: {}", n)));
        }
        match s.to_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "working" => Ok(Level::Working),
            "info" => Ok(Level::Info),
            "ok" => Ok(Level::Ok),
            "warning" | "warn" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "critical" => Ok(Level::Critical),
            "alert" => Ok(Level::Alert),
            "emergency" | "emerg" => Ok(Level::Emergency),
            other => Err(ConfigError::Validation(format!("unknown reporting level: {}", other))),
        }
    }
}

/// Destination for trail messages.
pub trait TrailSink: Send + Sync {
    fn emit(&self, level: Level, message: &str);
}

/// Forwards to `tracing`. Levels without a tracing counterpart fold onto the nearest one.
pub struct TracingSink;

impl TrailSink for TracingSink {
    fn emit(&self, level: Level, message: &str) {
        match level {
            Level::Debug | Level::Working => tracing::debug!(trail = level.tag(), "{}", message),
            Level::Info | Level::Ok => tracing::info!(trail = level.tag(), "{}", message),
            Level::Warning | Level::Alert => tracing::warn!(trail = level.tag(), "{}", message),
            Level::Error | Level::Critical | Level::Emergency => {
                tracing::error!(trail = level.tag(), "{}", message)
            }
        }
    }
}

/// Keeps every message in memory. Used by tests.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl TrailSink for MemorySink {
    fn emit(&self, level: Level, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, message.to_string()));
        }
    }
}

#[derive(Clone)]
pub struct Trail {
    threshold: Level,
    sink: Arc<dyn TrailSink>,
}

impl Trail {
    pub fn new(threshold: Level, sink: Arc<dyn TrailSink>) -> Self {
        Trail { threshold, sink }
    }

    pub fn tracing(threshold: Level) -> Self {
        Trail::new(threshold, Arc::new(TracingSink))
    }

    pub fn threshold(&self) -> Level {
        self.threshold
    }

    pub fn enabled(&self, level: Level) -> bool {
        level >= self.threshold
    }

    /// Formats only when the level passes the threshold.
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        if self.enabled(level) {
            self.sink.emit(level, &args.to_string());
        }
    }
}

impl fmt::Debug for Trail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trail").field("threshold", &self.threshold).finish()
    }
}
