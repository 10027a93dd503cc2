//! Response shaping: sensitive-field stripping and the model's response hook.

use crate::config::Schema;
use crate::extractors::RequestContext;
use crate::model::{Model, Operation, ResponseContext};
use serde_json::{Map, Value};

/// Remove sensitive fields from a record keyed by field name.
pub fn strip_sensitive(schema: &Schema, record: &mut Map<String, Value>) {
    for name in &schema.sensitive_fields {
        record.remove(name);
    }
}

/// Rows as a JSON array.
pub fn rows_value(rows: Vec<Map<String, Value>>) -> Value {
    Value::Array(rows.into_iter().map(Value::Object).collect())
}

/// Run the model's response filter, if any, on the `result` payload.
pub fn apply_response_filter(model: &Model, mut result: Value, ctx: &RequestContext, operation: Operation) -> Value {
    if let Some(filter) = &model.hooks.response_filter {
        let rctx = ResponseContext {
            model: &model.schema.model,
            user: ctx.user.as_ref(),
            operation,
            params: &ctx.params,
        };
        filter(&mut result, &rctx);
    }
    result
}

/// Audit params: repeated keys collect into an array, in request order.
pub fn audit_params(pairs: &[(String, String)]) -> Map<String, Value> {
    let mut params = Map::new();
    for (k, v) in pairs {
        match params.get_mut(k) {
            Some(Value::Array(items)) => items.push(Value::String(v.clone())),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(v.clone())]);
            }
            None => {
                params.insert(k.clone(), Value::String(v.clone()));
            }
        }
    }
    params
}
