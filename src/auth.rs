use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::RequestContext;

/// Actor recorded on mutations made through the admin token.
pub const ADMIN_ACTOR: &str = "admin";

/// Rejects requests without a valid `Authorization: Bearer <token>` header.
///
/// With no token configured every admin request is rejected. Accepted
/// requests carry a `RequestContext` extension naming the admin actor.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(ref expected) = state.config.admin_api_token else {
        tracing::warn!("Admin request rejected: ADMIN_API_TOKEN is not configured");
        return Err(AppError::Unauthorized(
            "Admin access is not configured".to_string(),
        ));
    };

    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    if !constant_time_compare(token, expected) {
        tracing::warn!("Invalid admin token received");
        return Err(AppError::Unauthorized("Invalid admin token".to_string()));
    }

    request.extensions_mut().insert(RequestContext {
        user_id: Some(ADMIN_ACTOR.to_string()),
    });
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
