//! Bearer JWT 认证中间件
//! 验证 Authorization 头并把账户 ID 注入 request extensions

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{app_state::AppState, error::AppError};

/// 已认证的账户（JWT `sub`）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountId(pub String);

fn bearer_token(req: &Request) -> Option<&str> {
    let header = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();

    let Some(token) = bearer_token(&req) else {
        tracing::warn!(path = %path, "Missing or malformed Authorization header");
        return AppError::unauthorized("Missing bearer token").into_response();
    };

    let claims = match state.jwt.verify_token(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Rejected bearer token");
            return AppError::unauthorized("Invalid or expired token").into_response();
        }
    };

    req.extensions_mut().insert(AccountId(claims.sub));
    next.run(req).await
}
