//! Router assembly and the HTTP listener.
//!
//! Middleware is layered outermost to innermost as panic recovery,
//! request logging, then agent-id extraction — `Router::layer` wraps
//! from the last call inward, so the calls below read bottom-up against
//! that order.

use crate::middleware::{agent_id_middleware, request_logging_middleware, PanicResponder};
use crate::routes;
use crate::state::AppState;
use airyra_core::repository::StoreManager;
use axum::Router;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::info;

pub fn build_router(store: Arc<dyn StoreManager>) -> Router {
    let state = AppState::new(store);
    routes::router()
        .layer(axum::middleware::from_fn(agent_id_middleware))
        .layer(axum::middleware::from_fn(request_logging_middleware))
        .layer(CatchPanicLayer::custom(PanicResponder))
        .with_state(state)
}

/// Serves the router until `shutdown` resolves, then returns once the
/// listener has stopped accepting new connections. Draining in-flight
/// requests is the caller's responsibility (see the `server` crate's
/// shutdown sequence).
pub async fn serve(
    addr: std::net::SocketAddr,
    store: Arc<dyn StoreManager>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = build_router(store);
    info!(%addr, "starting airyra coordination server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use airyra_mocks::MockStoreManager;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_check_reaches_the_fully_assembled_router() {
        let router = build_router(Arc::new(MockStoreManager::new()));
        let response = router
            .oneshot(Request::builder().uri("/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let router = build_router(Arc::new(MockStoreManager::new()));
        let response = router
            .oneshot(Request::builder().uri("/v1/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
