use std::sync::Arc;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    api::{
        keystore_api::{fetch_keystore, store_keystore},
        middleware::{auth_middleware, trace_id_middleware},
    },
    app_state::AppState,
};

pub mod keystore_api;
pub mod middleware;

/// 密钥库服务端路由
pub fn routes(state: Arc<AppState>) -> Router {
    let keystore = Router::new()
        .route("/api/keystore", get(fetch_keystore).post(store_keystore))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .merge(keystore)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn(trace_id_middleware)),
        )
        .with_state(state)
}

/// 仅允许配置的前端来源跨域调用
pub fn cors_layer(allowed_origin: &str) -> anyhow::Result<CorsLayer> {
    let origin = HeaderValue::from_str(allowed_origin)
        .with_context(|| format!("Invalid allowed origin: {allowed_origin}"))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}
