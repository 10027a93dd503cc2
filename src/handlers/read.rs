//! Read handlers: list and single fetch.

use crate::error::AppError;
use crate::extractors::RequestContext;
use crate::response::success_ok;
use crate::service;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::Uri,
    response::IntoResponse,
};

pub async fn list(
    State(state): State<AppState>,
    Path(model): Path<String>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, AppError> {
    let result = service::list(&state, &model, &ctx).await?;
    Ok(success_ok(result))
}

pub async fn read(
    State(state): State<AppState>,
    Path((model, id)): Path<(String, String)>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, AppError> {
    let result = service::fetch_one(&state, &model, &id, &ctx).await?;
    Ok(success_ok(result))
}

/// Any path that is not `/{model}` or `/{model}/{id}`.
pub async fn invalid_path(uri: Uri) -> AppError {
    AppError::InvalidPath(uri.path().to_string())
}
