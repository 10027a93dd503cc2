//! Typed errors and HTTP mapping.

use crate::response::error_body;
use crate::sql::SqlValue;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Registration and deployment problems. Never caused by client input.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: model {model} field {field}")]
    InvalidPrimaryKey { model: String, field: String },
    #[error("duplicate model: {0}")]
    DuplicateModel(String),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("database '{0}' not supported")]
    UnsupportedDialect(String),
    #[error("list modifier for {model}: fragment has {placeholders} placeholders but {args} args")]
    ListModifier {
        model: String,
        placeholders: usize,
        args: usize,
    },
    #[error("database connection: {0}")]
    Connection(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Permission denied")]
    PermissionDenied,
    #[error("invalid format ({0})")]
    InvalidPath(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid parameter '{param}': {message}")]
    BadRequest { param: String, message: String },
    /// SQL or driver failure. SQL text and args are kept for the error trail.
    #[error("Unable to execute SQL. {message}")]
    Execution {
        message: String,
        sql: String,
        args: Vec<SqlValue>,
    },
}

impl AppError {
    pub fn bad_request(param: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::BadRequest {
            param: param.into(),
            message: message.into(),
        }
    }

    pub fn execution(err: impl std::fmt::Display, sql: &str, args: &[SqlValue]) -> Self {
        AppError::Execution {
            message: err.to_string(),
            sql: sql.to_string(),
            args: args.to_vec(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::PermissionDenied => StatusCode::UNAUTHORIZED,
            AppError::InvalidPath(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Execution { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(error_body(self.to_string()))).into_response()
    }
}
