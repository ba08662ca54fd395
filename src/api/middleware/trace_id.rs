//! Trace ID 中间件
//! 为每个请求生成或沿用 `X-Trace-Id`，写入请求扩展和响应头

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use uuid::Uuid;

pub const TRACE_ID_HEADER: &str = "X-Trace-Id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(pub String);

impl TraceId {
    /// 优先沿用请求头中的 trace_id
    pub fn from_request(req: &Request) -> Self {
        req.headers()
            .get(TRACE_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .filter(|s| !s.is_empty() && s.len() <= 128)
            .map(|s| Self(s.to_string()))
            .unwrap_or_else(|| Self(Uuid::new_v4().to_string()))
    }
}

pub async fn trace_id_middleware(mut req: Request, next: Next) -> Response {
    let trace_id = TraceId::from_request(&req);
    req.extensions_mut().insert(trace_id.clone());

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&trace_id.0) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}
