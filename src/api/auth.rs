//! Shared-token guard for mutating endpoints.
//!
//! The dashboard token is generated (or supplied) when the server starts
//! and embedded in the dashboard page. Requests that change state must
//! present it in `X-Agent-Vault-Token` or as `Authorization: Bearer <token>`.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use super::routes::AppState;
use super::types::ErrorResponse;
use crate::util::constant_time_eq;

pub const TOKEN_HEADER: &str = "X-Agent-Vault-Token";

fn presented_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers.get(TOKEN_HEADER).and_then(|h| h.to_str().ok()) {
        return Some(token.trim());
    }

    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
}

pub async fn require_write_token(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let authorized = presented_token(req.headers())
        .is_some_and(|token| !token.is_empty() && constant_time_eq(token, &state.auth_token));

    if !authorized {
        tracing::warn!(
            method = %req.method(),
            path = %req.uri().path(),
            "Rejected write request without a valid token"
        );
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                detail: "Unauthorized".to_string(),
            }),
        )
            .into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn custom_header_takes_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("from-header"));
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-bearer"),
        );
        assert_eq!(presented_token(&headers), Some("from-header"));
    }

    #[test]
    fn bearer_token_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc123"),
        );
        assert_eq!(presented_token(&headers), Some("abc123"));

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic abc123"),
        );
        assert_eq!(presented_token(&headers), None);
        assert_eq!(presented_token(&HeaderMap::new()), None);
    }
}
