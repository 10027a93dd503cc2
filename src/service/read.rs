//! Read pipeline: permission gate, parse, build, execute, assemble, audit.

use crate::audit::AuditEntry;
use crate::dialect::{Fetched, QueryResult, RowShape};
use crate::error::AppError;
use crate::extractors::RequestContext;
use crate::model::{Model, Operation};
use crate::query::parse_params;
use crate::service::assemble::{apply_response_filter, audit_params, rows_value, strip_sensitive};
use crate::service::preload::{expand_m2m, preload};
use crate::sql::{build_select, select_by_pk, SqlValue, Statement};
use crate::state::AppState;
use crate::trail::Level;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Execute with the trail around it: statement at DEBUG when `debug_db` is on, failures at ERROR.
pub(crate) async fn run_query(state: &AppState, stmt: &Statement, shape: RowShape<'_>) -> Result<Fetched, AppError> {
    if state.settings.debug_db {
        state
            .trail
            .log(Level::Debug, format_args!("SQL: {}\nARGS: {}", stmt.sql, args_text(&stmt.args)));
    }
    state.driver.query(stmt, shape).await.map_err(|e| {
        if let AppError::Execution { message, sql, args } = &e {
            state.trail.log(
                Level::Error,
                format_args!("{}\nSQL: {}\nARGS: {}", message, sql, args_text(args)),
            );
        }
        e
    })
}

fn args_text(args: &[SqlValue]) -> String {
    serde_json::to_string(args).unwrap_or_default()
}

fn model(state: &AppState, name: &str) -> Result<Arc<Model>, AppError> {
    state
        .registry
        .get(name)
        .ok_or_else(|| AppError::NotFound(format!("model {}", name)))
}

/// Gate the request. Returns whether the read should be audited.
async fn authorize(state: &AppState, model: &Model, ctx: &RequestContext) -> Result<bool, AppError> {
    let decision = state.gate.resolve(model, Operation::Read, ctx, ctx.user.as_ref()).await?;
    if !decision.allowed {
        return Err(AppError::PermissionDenied);
    }
    Ok(decision.should_log)
}

fn audit(state: &AppState, model: &Model, ctx: &RequestContext, table_id: i64, params: Map<String, Value>, rows: usize) {
    let username = ctx.user.as_ref().map(|u| u.username.as_str()).unwrap_or_default();
    state.audit.enqueue(AuditEntry::read(
        username,
        model.schema.table.clone(),
        table_id,
        params,
        rows,
        &ctx.client_addr,
    ));
}

/// `GET /{model}`: the `result` payload of a list with filters, projection, ordering, pagination and expansion.
pub async fn list(state: &AppState, model_name: &str, ctx: &RequestContext) -> Result<Value, AppError> {
    let model = model(state, model_name)?;
    let should_log = authorize(state, &model, ctx).await?;
    let schema = &model.schema;
    let user = ctx.user.as_ref();

    let spec = parse_params(&state.registry, schema, &ctx.params, &state.settings)?;
    let stmt = build_select(schema, &spec, user)?;
    let shape = if spec.custom_projection() {
        RowShape::Dynamic
    } else {
        RowShape::Typed(schema)
    };
    let fetched = run_query(state, &stmt, shape).await?;
    let row_count = fetched.row_count;

    let result = match fetched.result {
        QueryResult::Typed(mut records) => {
            if spec.preload {
                preload(state, schema, &mut records, user).await?;
            }
            expand_m2m(state, schema, &mut records, spec.m2m, user).await?;
            for record in &mut records {
                strip_sensitive(schema, record);
            }
            rows_value(records)
        }
        QueryResult::Dynamic(rows) => rows_value(rows),
    };
    let result = apply_response_filter(&model, result, ctx, Operation::Read);

    if should_log {
        audit(state, &model, ctx, 0, audit_params(&ctx.params), row_count);
    }
    Ok(result)
}

/// `GET /{model}/{id}`. An id that cannot exist or matches nothing yields a `null` result.
/// Only `$preload` and `$m2m` affect a single fetch; other parameters are validated and ignored.
pub async fn fetch_one(
    state: &AppState,
    model_name: &str,
    raw_id: &str,
    ctx: &RequestContext,
) -> Result<Value, AppError> {
    let model = model(state, model_name)?;
    let should_log = authorize(state, &model, ctx).await?;
    let schema = &model.schema;
    let user = ctx.user.as_ref();
    let spec = parse_params(&state.registry, schema, &ctx.params, &state.settings)?;

    let id = schema.pk_type.parse_id(raw_id);
    let table_id = match &id {
        Some(SqlValue::Int(n)) => *n,
        _ => 0,
    };
    let mut records = match id {
        Some(id) => {
            let stmt = select_by_pk(schema, id, user)?;
            run_query(state, &stmt, RowShape::Typed(schema)).await?.result.into_rows()
        }
        None => Vec::new(),
    };
    records.truncate(1);
    let row_count = records.len();

    if spec.preload {
        preload(state, schema, &mut records, user).await?;
    }
    expand_m2m(state, schema, &mut records, spec.m2m, user).await?;
    let result = match records.pop() {
        Some(mut record) => {
            strip_sensitive(schema, &mut record);
            Value::Object(record)
        }
        None => Value::Null,
    };
    let result = apply_response_filter(&model, result, ctx, Operation::Read);

    if should_log {
        let mut params = Map::new();
        params.insert("id".into(), Value::String(raw_id.to_string()));
        let logged_id = if row_count == 0 { 0 } else { table_id };
        audit(state, &model, ctx, logged_id, params, row_count);
    }
    Ok(result)
}
