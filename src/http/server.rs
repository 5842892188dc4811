//! HTTP server and router assembly.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use super::state::AppState;
use super::{admission, auth, cors, handlers, security};
use crate::error::{PingyError, Result};
use crate::ratelimit::LimiterClass;

/// Build the full application router.
///
/// Layers, outermost first: security headers, panic catcher, tracing, CORS,
/// authentication, then per-route authorization and admission control.
pub fn router(state: Arc<AppState>) -> Result<Router> {
    // Authorization runs before admission so anonymous callers spend no permits.
    let mut api = Router::new()
        .route("/api/webhooks", post(handlers::receive_webhook))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admission::enforce_admission,
        ))
        .route_layer(middleware::from_fn(auth::require_auth));

    if state.config.development.enabled {
        let dev = Router::new()
            .route("/dev/generate-token", get(handlers::generate_token))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                admission::enforce_admission,
            ));
        api = api.merge(dev);
    }

    let probes = Router::new()
        .route("/healthz", get(handlers::health))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admission::enforce_global,
        ));

    let cors = cors::layer(&state.config.cors)?;

    Ok(Router::new()
        .merge(api)
        .merge(probes)
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), auth::authenticate))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handlers::handle_panic))
        .layer(middleware::from_fn(security::apply_security_headers))
        .with_state(state))
}

/// HTTP server for the PingyThingy API.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Shared application state
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, state: Arc<AppState>) -> Self {
        Self { addr, state }
    }

    /// Start the server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = router(self.state.clone())?;
        let listener = TcpListener::bind(self.addr).await?;

        info!(addr = %self.addr, "Starting HTTP server with graceful shutdown");

        let sweeper = spawn_partition_sweeper(self.state.clone());
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await;
        sweeper.abort();

        result.map_err(|e| {
            error!(error = %e, "HTTP server failed");
            PingyError::Io(e)
        })
    }
}

/// Periodically drop idle per-identity partitions.
fn spawn_partition_sweeper(state: Arc<AppState>) -> JoinHandle<()> {
    let limits = &state.config.rate_limiting;
    let period = limits.cleanup_interval().max(Duration::from_secs(1));
    let idle_after = limits.idle_eviction();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let evicted = state.admission.evict_idle(Instant::now(), idle_after);
            if evicted > 0 {
                debug!(
                    evicted,
                    remaining = state.admission.partition_count(LimiterClass::Identity),
                    "Evicted idle rate limit partitions"
                );
            }
        }
    })
}
