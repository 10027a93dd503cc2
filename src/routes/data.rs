//! Data routes: `/{model}` and `/{model}/{id}`. Every other shape is an invalid path.

use crate::handlers::{invalid_path, list, read};
use crate::state::AppState;
use axum::{routing::get, Router};
use tower_http::limit::RequestBodyLimitLayer;

/// Reads carry no body; anything larger than this is refused before routing.
pub const DATA_BODY_LIMIT: usize = 64 * 1024;

pub fn data_routes(state: AppState) -> Router {
    Router::new()
        .route("/:model", get(list))
        .route("/:model/:id", get(read))
        .fallback(invalid_path)
        .layer(RequestBodyLimitLayer::new(DATA_BODY_LIMIT))
        .with_state(state)
}
