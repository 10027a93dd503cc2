//! Shared application state for all routes. Everything here is read-only or internally synchronized.

use crate::audit::{AuditQueue, AuditStore};
use crate::config::Settings;
use crate::dialect::Driver;
use crate::model::SchemaRegistry;
use crate::permission::{AccessProvider, PermissionGate};
use crate::trail::Trail;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub driver: Arc<dyn Driver>,
    pub registry: Arc<SchemaRegistry>,
    pub gate: PermissionGate,
    pub trail: Trail,
    pub audit: AuditQueue,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Spawns the audit writer, so this must run inside a tokio runtime.
    pub fn new(
        driver: Arc<dyn Driver>,
        registry: SchemaRegistry,
        access: Arc<dyn AccessProvider>,
        audit_store: Arc<dyn AuditStore>,
        settings: Settings,
        trail: Trail,
    ) -> Self {
        let audit = AuditQueue::spawn(audit_store, settings.audit_queue_capacity, trail.clone());
        AppState {
            driver,
            registry: Arc::new(registry),
            gate: PermissionGate::new(access, settings.log_read),
            trail,
            audit,
            settings: Arc::new(settings),
        }
    }
}
