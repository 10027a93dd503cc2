//! Per-request context handed to model hooks and the audit log.

use crate::error::AppError;
use crate::model::User;
use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, FromRequestParts, Query},
    http::{request::Parts, HeaderMap, Method, Uri},
};
use std::char::REPLACEMENT_CHARACTER;
use std::net::SocketAddr;

pub const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";

#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    /// Empty when unknown.
    pub client_addr: String,
    /// Session user, if the session layer put one in the request extensions.
    pub user: Option<User>,
    /// Query pairs in the order they appear.
    pub params: Vec<(String, String)>,
}

/// `ConnectInfo` peer address, else the first `X-Forwarded-For` hop, else empty.
pub fn client_addr(parts: &Parts) -> String {
    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    parts
        .headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Ordered query pairs. Percent-escapes that are not UTF-8 decode to U+FFFD, which would
/// change a filter value, so they are rejected along with undecodable query strings.
pub fn query_params(uri: &Uri) -> Result<Vec<(String, String)>, AppError> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri)
        .map_err(|e| AppError::bad_request("query", e.body_text()))?;
    if let Some((key, _)) = pairs
        .iter()
        .find(|(k, v)| k.contains(REPLACEMENT_CHARACTER) || v.contains(REPLACEMENT_CHARACTER))
    {
        return Err(AppError::bad_request(key.as_str(), "not valid UTF-8"));
    }
    Ok(pairs)
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let params = query_params(&parts.uri)?;
        Ok(RequestContext {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            headers: parts.headers.clone(),
            client_addr: client_addr(parts),
            user: parts.extensions.get::<User>().cloned(),
            params,
        })
    }
}
