//! Data API: schema-driven REST reads over PostgreSQL, MySQL and SQLite.

pub mod audit;
pub mod case;
pub mod config;
pub mod dialect;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod model;
pub mod permission;
pub mod query;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod trail;

pub use audit::{AuditEntry, AuditQueue, AuditStore, MemoryAuditStore, SqlAuditStore};
pub use config::{load_from_path, resolve, ModelConfig, Schema, Settings};
pub use dialect::{connect, DialectKind, Driver, QueryResult};
pub use error::{AppError, ConfigError};
pub use extractors::RequestContext;
pub use model::{ListFilter, ModelRegistration, RegistryBuilder, SchemaRegistry, User};
pub use permission::{AccessProvider, PermissionGate, RoleAccess};
pub use response::{error_body, success};
pub use routes::{common_routes, common_routes_with_ready, data_routes};
pub use state::AppState;
pub use trail::{Level, Trail};

/// Common routes plus data routes. Static paths (`/health`, `/ready`, ...) win over `/{model}`.
pub fn app(state: AppState) -> axum::Router {
    common_routes_with_ready(state.clone()).merge(data_routes(state))
}
