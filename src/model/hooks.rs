//! Optional per-model hooks. Absence is `None`, never a runtime type check.

use crate::config::Schema;
use crate::extractors::RequestContext;
use crate::model::{Operation, User};
use crate::sql::SqlValue;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Row restriction returned by a list modifier. An empty fragment means no restriction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListFilter {
    /// Boolean SQL expression using `?` placeholders only.
    pub fragment: String,
    pub args: Vec<SqlValue>,
}

impl ListFilter {
    pub fn new(fragment: impl Into<String>, args: Vec<SqlValue>) -> Self {
        ListFilter {
            fragment: fragment.into(),
            args,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fragment.trim().is_empty()
    }
}

type ListModifierFn = dyn Fn(&Schema, Option<&User>) -> ListFilter + Send + Sync;

/// Per-user predicate restricting visible rows (e.g. tenant scoping).
#[derive(Clone)]
pub struct ListModifier(Arc<ListModifierFn>);

impl ListModifier {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Schema, Option<&User>) -> ListFilter + Send + Sync + 'static,
    {
        ListModifier(Arc::new(f))
    }

    pub fn apply(&self, schema: &Schema, user: Option<&User>) -> ListFilter {
        (self.0)(schema, user)
    }
}

impl fmt::Debug for ListModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ListModifier(..)")
    }
}

pub type RequestHook = Arc<dyn Fn(&RequestContext) -> bool + Send + Sync>;

/// What a response filter knows about the request it is shaping.
#[derive(Clone, Debug)]
pub struct ResponseContext<'a> {
    pub model: &'a str,
    pub user: Option<&'a User>,
    pub operation: Operation,
    pub params: &'a [(String, String)],
}

pub type ResponseFilter = Arc<dyn Fn(&mut Value, &ResponseContext<'_>) + Send + Sync>;

#[derive(Clone, Default)]
pub struct ModelHooks {
    pub disabled_read: Option<RequestHook>,
    pub disabled_write: Option<RequestHook>,
    pub public_read: Option<RequestHook>,
    pub public_write: Option<RequestHook>,
    pub log_read: Option<RequestHook>,
    pub log_write: Option<RequestHook>,
    /// Runs on the `result` payload after sensitive fields are stripped.
    pub response_filter: Option<ResponseFilter>,
}

impl ModelHooks {
    pub fn disabled(&self, op: Operation) -> Option<&RequestHook> {
        match op {
            Operation::Read => self.disabled_read.as_ref(),
            Operation::Write => self.disabled_write.as_ref(),
        }
    }

    pub fn public(&self, op: Operation) -> Option<&RequestHook> {
        match op {
            Operation::Read => self.public_read.as_ref(),
            Operation::Write => self.public_write.as_ref(),
        }
    }

    pub fn log(&self, op: Operation) -> Option<&RequestHook> {
        match op {
            Operation::Read => self.log_read.as_ref(),
            Operation::Write => self.log_write.as_ref(),
        }
    }
}

impl fmt::Debug for ModelHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHooks")
            .field("disabled_read", &self.disabled_read.is_some())
            .field("disabled_write", &self.disabled_write.is_some())
            .field("public_read", &self.public_read.is_some())
            .field("public_write", &self.public_write.is_some())
            .field("log_read", &self.log_read.is_some())
            .field("log_write", &self.log_write.is_some())
            .field("response_filter", &self.response_filter.is_some())
            .finish()
    }
}
