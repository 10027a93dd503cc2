//! Standard response envelope helpers.

use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct Success<T> {
    pub status: &'static str,
    pub result: T,
}

#[derive(Serialize)]
pub struct Failure {
    pub status: &'static str,
    pub err_msg: String,
}

/// `{"status":"ok","result":...}`. `result` is always present, `null` included.
pub fn success<T: Serialize>(result: T) -> Success<T> {
    Success { status: "ok", result }
}

pub fn success_ok<T: Serialize>(result: T) -> (StatusCode, Json<Success<T>>) {
    (StatusCode::OK, Json(success(result)))
}

pub fn error_body(message: String) -> Failure {
    Failure {
        status: "error",
        err_msg: message,
    }
}
