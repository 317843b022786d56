//! # Xanthippe Intake API
//!
//! A small axum server sharing the coverage store with the exploration
//! loop. While `explore` holds the store's file lock, this server is how
//! other processes reach it.
//!
//! ## Endpoints
//!
//! - `POST /` - Comma-separated sequences to mark as requested (empty reply)
//! - `GET /status` - Coverage store counts
//! - `POST /forget` - Count or clear the rows under a prefix
//! - `GET /health` - Health check
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `XANTHIPPE_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `XANTHIPPE_INTAKE_RATE_LIMIT`: Intake posts per second (default: 20, 0 to disable)
//! - `XANTHIPPE_INTAKE_KEY`: If set, `POST /` requires this Bearer token
//! - `XANTHIPPE_API_KEY`: If set, `/status` and `/forget` require this Bearer token

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{API_KEY_ENV, INTAKE_KEY_ENV, Scope};
pub use handlers::{forget_handler, health_handler, intake_handler, parse_intake, status_handler};
pub use middleware::{
    DEFAULT_INTAKE_RATE_LIMIT, INTAKE_RATE_LIMIT_ENV, create_intake_limiter, intake_rate_from_env,
};
pub use types::{ForgetRequest, ForgetResponse, HealthResponse, StatusResponse};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use xanthippe_core::{ButtonTable, CoverageStore, XanthippeError};

/// Environment variable listing allowed CORS origins.
pub const CORS_ORIGINS_ENV: &str = "XANTHIPPE_CORS_ORIGINS";

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    /// The store the exploration loop writes to.
    pub store: Arc<CoverageStore>,
    /// Symbols accepted by the intake endpoint.
    pub buttons: Arc<ButtonTable>,
    /// Largest intake payload in bytes.
    pub max_body: usize,
}

impl AppState {
    /// Create app state over a shared store.
    #[must_use]
    pub fn new(store: Arc<CoverageStore>, buttons: Arc<ButtonTable>, max_body: usize) -> Self {
        Self {
            store,
            buttons,
            max_body,
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// CORS layer from `XANTHIPPE_CORS_ORIGINS`.
///
/// `*` allows every origin, a comma-separated list allows those origins,
/// and an unset or unusable value allows localhost only.
fn build_cors_layer() -> CorsLayer {
    match std::env::var(CORS_ORIGINS_ENV).ok().as_deref() {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins ({}=*)", CORS_ORIGINS_ENV);
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                        None
                    }
                })
                .collect();
            if allowed.is_empty() {
                tracing::warn!("CORS: No valid origins in {}, using localhost", CORS_ORIGINS_ENV);
                cors_for(localhost_origins())
            } else {
                tracing::info!(origins = allowed.len(), "CORS: Allowing configured origins");
                cors_for(allowed)
            }
        }
        None => cors_for(localhost_origins()),
    }
}

fn localhost_origins() -> Vec<HeaderValue> {
    [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse().ok())
    .collect()
}

fn cors_for(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Build the router with every endpoint and middleware.
///
/// Middleware stack (outer to inner): tracing, CORS, then per scope the key
/// check and, for the intake, the rate limit.
pub fn create_router(state: AppState) -> Router {
    let rate = intake_rate_from_env();
    let mut intake = Router::new().route("/", post(handlers::intake_handler));
    if let Some(limiter) = create_intake_limiter(rate) {
        tracing::info!("Intake rate limit: {} posts/second", rate);
        intake = intake.route_layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::intake_rate_limit,
        ));
    } else {
        tracing::info!("Intake rate limiting disabled");
    }

    let mut maintenance = Router::new()
        .route("/status", get(handlers::status_handler))
        .route("/forget", post(handlers::forget_handler));

    for scope in [Scope::Intake, Scope::Maintenance] {
        let Some(guard) = auth::ScopeKey::from_env(scope) else {
            if scope == Scope::Maintenance {
                tracing::warn!(
                    "Maintenance routes are OPEN - set {} to require a key",
                    API_KEY_ENV
                );
            }
            continue;
        };
        tracing::info!(?scope, "API key authentication enabled");
        let layer = axum_middleware::from_fn_with_state(guard, auth::require_key);
        match scope {
            Scope::Intake => intake = intake.route_layer(layer),
            Scope::Maintenance => maintenance = maintenance.route_layer(layer),
        }
    }

    Router::new()
        .route("/health", get(handlers::health_handler))
        .merge(intake)
        .merge(maintenance)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer()),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Bind the listening socket.
///
/// Separate from [`serve`] so callers can fail fast on a taken address
/// before starting anything long-running.
pub async fn bind(addr: &str) -> Result<tokio::net::TcpListener, XanthippeError> {
    tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| XanthippeError::IoError(format!("Bind failed on {}: {}", addr, e)))
}

/// Serve the intake API on a bound listener until `shutdown` resolves.
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: F,
) -> Result<(), XanthippeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);

    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Xanthippe intake server listening on {}", addr);
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| XanthippeError::IoError(format!("Server error: {}", e)))
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn run_server<F>(addr: &str, state: AppState, shutdown: F) -> Result<(), XanthippeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = bind(addr).await?;
    serve(listener, state, shutdown).await
}
