mod access;
mod admin;
mod ebics;
mod error;
mod metrics;
mod middleware;

pub use error::*;
pub use metrics::*;
pub use middleware::*;

use axum::extract::State;
use axum::{
    Router,
    routing::{get, post},
};
use ebicsbank_exec::Executor;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tower_http::cors::CorsLayer;

/// Registry of per-`(host, account label)` notifiers, backing the
/// access-api's long-polling transaction and withdrawal endpoints.
pub type NotifyRegistry = Mutex<HashMap<(String, String), Arc<Notify>>>;

/// Shared state handed to every axum handler: the transactional executor
/// guarding the embedded store, an optional Prometheus collector, and the
/// long-poll wakeup registry.
#[derive(Clone)]
pub struct RpcState {
    pub executor: Arc<Executor>,
    pub metrics: Option<Arc<Metrics>>,
    pub notify_registry: Arc<NotifyRegistry>,
}

impl RpcState {
    pub fn new(executor: Executor) -> Self {
        Self {
            executor: Arc::new(executor),
            metrics: None,
            notify_registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn new_with_metrics(executor: Executor, metrics: Metrics) -> Self {
        Self {
            executor: Arc::new(executor),
            metrics: Some(Arc::new(metrics)),
            notify_registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

async fn metrics_handler(State(state): State<RpcState>) -> String {
    state.metrics.as_ref().and_then(|m| m.export().ok()).unwrap_or_else(|| "# Metrics not enabled\n".to_string())
}

/// Wires the EBICS transport, the access/integration/taler-wire-gateway
/// routes, the admin surface, and the observability endpoints into one
/// router, with rate limiting and circuit breaking in front of everything
/// that touches the store.
pub fn create_router(state: RpcState) -> Router {
    let rate_limiter = RateLimitLayer::new(50);
    let breaker = Arc::new(CircuitBreaker::new(5, 2, std::time::Duration::from_secs(30)));

    let demobank_routes = Router::new()
        .route("/access-api/accounts/{name}", get(access::get_account))
        .route("/access-api/accounts/{name}/transactions", get(access::list_transactions).post(access::create_transaction))
        .route("/access-api/accounts/{name}/withdrawals", post(access::create_withdrawal))
        .route("/access-api/accounts/{name}/withdrawals/{wid}", get(access::get_withdrawal))
        .route("/access-api/accounts/{name}/withdrawals/{wid}/confirm", post(access::confirm_withdrawal))
        .route("/access-api/accounts/{name}/withdrawals/{wid}/abort", post(access::abort_withdrawal))
        .route("/integration-api/withdrawal-operation/{wopid}", get(access::get_withdrawal_operation).post(access::select_withdrawal_operation))
        .route("/taler-wire-gateway/accounts/{user}/transactions", post(access::add_incoming))
        .route("/admin/customers", post(admin::create_customer))
        .route("/admin/accounts/{account}/statement-tick", post(admin::tick_statement))
        .route("/admin/host", post(admin::ensure_host));

    Router::new()
        .route("/health", get(access::health))
        .route("/metrics", get(metrics_handler))
        .route("/ebicsweb", post(ebics::ebicsweb))
        .nest("/demobanks/{demobankid}", demobank_routes)
        .layer(axum::middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.limiter.clone();
            crate::middleware::rate_limit_middleware(limiter, req, next)
        }))
        .layer(axum::middleware::from_fn(move |req, next| {
            let breaker = breaker.clone();
            crate::middleware::circuit_breaker_middleware(breaker, req, next)
        }))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Starts the sandbox's single HTTP listener serving every surface above.
pub async fn start_server(state: RpcState, addr: &str) -> Result<(), RpcError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| RpcError::InternalServerError(e.to_string()))?;

    tracing::info!("EBICS bank sandbox listening on {}", addr);

    axum::serve(listener, router).await.map_err(|e| RpcError::InternalServerError(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebicsbank_store::Store;

    #[test]
    fn builds_router_from_fresh_executor() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let executor = Executor::new(store);
        let state = RpcState::new(executor);
        assert!(state.metrics.is_none());
        let _router = create_router(state);
    }
}
