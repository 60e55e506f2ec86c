//! Middleware chain (outermost to innermost): panic recovery, request
//! logging, agent-id extraction. See [`crate::server::build_router`] for
//! the order they're layered in.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::time::Instant;
use tower_http::catch_panic::ResponseForPanic;

pub const AGENT_HEADER: &str = "X-Airyra-Agent";
pub const DEFAULT_AGENT: &str = "anonymous";

/// The calling agent, extracted from the [`AGENT_HEADER`] header and
/// defaulted to [`DEFAULT_AGENT`] when absent. Inserted into the request
/// extensions by [`agent_id_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentId(pub String);

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn extract_agent_id(headers: &HeaderMap) -> AgentId {
    let agent = headers
        .get(AGENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_AGENT);
    AgentId(agent.to_string())
}

pub async fn agent_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let agent = extract_agent_id(request.headers());
    request.extensions_mut().insert(agent);
    next.run(request).await
}

/// Single-line structured request log: method, path, agent, status,
/// duration.
pub async fn request_logging_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let agent = request
        .extensions()
        .get::<AgentId>()
        .cloned()
        .unwrap_or_else(|| AgentId(DEFAULT_AGENT.to_string()));

    let response = next.run(request).await;

    let status = response.status();
    let elapsed = start.elapsed();
    tracing::info!(
        method = %method,
        path = %path,
        agent = %agent,
        status = status.as_u16(),
        duration_ms = elapsed.as_millis() as u64,
        "request"
    );
    response
}

/// Maps a caught handler panic to the `INTERNAL_ERROR` envelope instead
/// of tearing down the connection, per spec.md §7.
#[derive(Clone, Copy, Default)]
pub struct PanicResponder;

impl ResponseForPanic for PanicResponder {
    type ResponseBody = Body;

    fn response_for_panic(
        &mut self,
        err: Box<dyn std::any::Any + Send + 'static>,
    ) -> http::Response<Self::ResponseBody> {
        let detail = if let Some(s) = err.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = err.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_string()
        };
        tracing::error!(panic = %detail, "request handler panicked");
        let body = Json(json!({
            "error": {
                "code": "INTERNAL_ERROR",
                "message": "internal error",
                "context": {},
            }
        }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_header_defaults_to_anonymous() {
        let headers = HeaderMap::new();
        assert_eq!(extract_agent_id(&headers).0, DEFAULT_AGENT);
    }

    #[test]
    fn blank_header_also_defaults() {
        let mut headers = HeaderMap::new();
        headers.insert(AGENT_HEADER, "   ".parse().unwrap());
        assert_eq!(extract_agent_id(&headers).0, DEFAULT_AGENT);
    }

    #[test]
    fn present_header_is_used_verbatim() {
        let mut headers = HeaderMap::new();
        headers.insert(AGENT_HEADER, "agent-a".parse().unwrap());
        assert_eq!(extract_agent_id(&headers).0, "agent-a");
    }
}
