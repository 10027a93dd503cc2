//! Permission gate: per-model hooks first, then role-based access.

use crate::error::AppError;
use crate::extractors::RequestContext;
use crate::model::{Access, Model, Operation, User};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Role-based access lookup. Consulted on every request; implementations must not cache across requests.
#[async_trait]
pub trait AccessProvider: Send + Sync {
    async fn access(&self, user: &User, model: &str) -> Result<Access, AppError>;
}

/// In-memory grants. Admins get full access, a user grant overrides group grants,
/// group grants are OR-ed together. Grants can change at runtime.
#[derive(Default)]
pub struct RoleAccess {
    users: Grants,
    groups: Grants,
}

fn key(name: &str, model: &str) -> (String, String) {
    (name.to_string(), model.to_lowercase())
}

type Grants = RwLock<HashMap<(String, String), Access>>;

// Every write is a single insert or remove, so a poisoned map is still consistent.
fn read(grants: &Grants) -> RwLockReadGuard<'_, HashMap<(String, String), Access>> {
    grants.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(grants: &Grants) -> RwLockWriteGuard<'_, HashMap<(String, String), Access>> {
    grants.write().unwrap_or_else(PoisonError::into_inner)
}

impl RoleAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant_user(&self, username: &str, model: &str, access: Access) {
        write(&self.users).insert(key(username, model), access);
    }

    pub fn grant_group(&self, group: &str, model: &str, access: Access) {
        write(&self.groups).insert(key(group, model), access);
    }

    pub fn revoke_user(&self, username: &str, model: &str) {
        write(&self.users).remove(&key(username, model));
    }

    fn lookup(&self, user: &User, model: &str) -> Access {
        if user.admin {
            return Access::FULL;
        }
        if let Some(a) = read(&self.users).get(&key(&user.username, model)).copied() {
            return a;
        }
        let groups = read(&self.groups);
        user.groups
            .iter()
            .filter_map(|g| groups.get(&key(g, model)).copied())
            .fold(Access::NONE, Access::union)
    }
}

#[async_trait]
impl AccessProvider for RoleAccess {
    async fn access(&self, user: &User, model: &str) -> Result<Access, AppError> {
        Ok(self.lookup(user, model))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub should_log: bool,
}

#[derive(Clone)]
pub struct PermissionGate {
    access: Arc<dyn AccessProvider>,
    log_read: bool,
}

impl PermissionGate {
    /// `log_read` is the audit default for reads without a log hook. Writes default to logged.
    pub fn new(access: Arc<dyn AccessProvider>, log_read: bool) -> Self {
        PermissionGate { access, log_read }
    }

    pub async fn resolve(
        &self,
        model: &Model,
        op: Operation,
        ctx: &RequestContext,
        user: Option<&User>,
    ) -> Result<Decision, AppError> {
        let should_log = match model.hooks.log(op) {
            Some(hook) => hook(ctx),
            None => match op {
                Operation::Read => self.log_read,
                Operation::Write => true,
            },
        };

        if let Some(disabled) = model.hooks.disabled(op) {
            if disabled(ctx) {
                return Ok(Decision {
                    allowed: false,
                    should_log,
                });
            }
        }

        let mut allowed = match model.hooks.public(op) {
            Some(public) => public(ctx),
            None => false,
        };
        if !allowed {
            if let Some(user) = user {
                allowed = self.access.access(user, &model.schema.model).await?.allows(op);
            }
        }
        Ok(Decision { allowed, should_log })
    }
}
