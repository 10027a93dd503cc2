//! Model registration and the immutable schema registry built from it.

use crate::config::{resolve, ModelConfig, Schema};
use crate::error::ConfigError;
use crate::extractors::RequestContext;
use crate::model::{ListFilter, ListModifier, ModelHooks, ResponseContext, User};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// One model plus the code-only capabilities attached to it.
#[derive(Clone, Debug)]
pub struct ModelRegistration {
    pub config: ModelConfig,
    pub hooks: ModelHooks,
    pub list_modifier: Option<ListModifier>,
}

impl ModelRegistration {
    pub fn new(config: ModelConfig) -> Self {
        ModelRegistration {
            config,
            hooks: ModelHooks::default(),
            list_modifier: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn disabled_read(mut self, f: impl Fn(&RequestContext) -> bool + Send + Sync + 'static) -> Self {
        self.hooks.disabled_read = Some(Arc::new(f));
        self
    }

    pub fn disabled_write(mut self, f: impl Fn(&RequestContext) -> bool + Send + Sync + 'static) -> Self {
        self.hooks.disabled_write = Some(Arc::new(f));
        self
    }

    pub fn public_read(mut self, f: impl Fn(&RequestContext) -> bool + Send + Sync + 'static) -> Self {
        self.hooks.public_read = Some(Arc::new(f));
        self
    }

    pub fn public_write(mut self, f: impl Fn(&RequestContext) -> bool + Send + Sync + 'static) -> Self {
        self.hooks.public_write = Some(Arc::new(f));
        self
    }

    pub fn log_read(mut self, f: impl Fn(&RequestContext) -> bool + Send + Sync + 'static) -> Self {
        self.hooks.log_read = Some(Arc::new(f));
        self
    }

    pub fn log_write(mut self, f: impl Fn(&RequestContext) -> bool + Send + Sync + 'static) -> Self {
        self.hooks.log_write = Some(Arc::new(f));
        self
    }

    pub fn list_modifier(
        mut self,
        f: impl Fn(&Schema, Option<&User>) -> ListFilter + Send + Sync + 'static,
    ) -> Self {
        self.list_modifier = Some(ListModifier::new(f));
        self
    }

    pub fn response_filter(
        mut self,
        f: impl Fn(&mut Value, &ResponseContext<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.response_filter = Some(Arc::new(f));
        self
    }
}

/// A registered model: resolved schema and hooks.
#[derive(Debug)]
pub struct Model {
    pub schema: Schema,
    pub hooks: ModelHooks,
}

/// Read-only after build; shared through `Arc` without locking.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    models: HashMap<String, Arc<Model>>,
}

impl SchemaRegistry {
    /// Case-insensitive lookup by model name.
    pub fn get(&self, name: &str) -> Option<Arc<Model>> {
        self.models.get(&name.to_lowercase()).cloned()
    }

    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.models.get(&name.to_lowercase()).map(|m| &m.schema)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.values().map(|m| m.schema.model.as_str()).collect();
        names.sort_unstable();
        names
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    registrations: Vec<ModelRegistration>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, registration: ModelRegistration) -> Self {
        self.registrations.push(registration);
        self
    }

    /// Register loaded configs without hooks.
    pub fn register_all(mut self, configs: impl IntoIterator<Item = ModelConfig>) -> Self {
        self.registrations.extend(configs.into_iter().map(ModelRegistration::new));
        self
    }

    /// Attach hooks to an already registered model, by name (case-insensitive).
    pub fn configure(
        mut self,
        name: &str,
        f: impl FnOnce(ModelRegistration) -> ModelRegistration,
    ) -> Result<Self, ConfigError> {
        let idx = self
            .registrations
            .iter()
            .position(|r| r.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "model",
                id: name.to_string(),
            })?;
        let reg = self.registrations.remove(idx);
        self.registrations.insert(idx, f(reg));
        Ok(self)
    }

    pub fn build(self) -> Result<SchemaRegistry, ConfigError> {
        let configs: Vec<ModelConfig> = self.registrations.iter().map(|r| r.config.clone()).collect();
        let schemas = resolve(&configs)?;
        let mut models = HashMap::with_capacity(schemas.len());
        for (mut schema, reg) in schemas.into_iter().zip(self.registrations) {
            schema.list_modifier = reg.list_modifier;
            tracing::debug!(model = %schema.model, table = %schema.table, "registered model");
            models.insert(
                schema.model.to_lowercase(),
                Arc::new(Model {
                    schema,
                    hooks: reg.hooks,
                }),
            );
        }
        Ok(SchemaRegistry { models })
    }
}
