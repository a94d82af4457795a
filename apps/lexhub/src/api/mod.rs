//! # LexHub HTTP API Module
//!
//! REST surface over the Data Hub, the Context Provider and the module
//! adapters, built with axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check (never authenticated)
//! - `GET /metrics` - Hub performance counters
//! - `POST /query` - Run a `DataQuery`
//! - `POST /mutate` - Apply a mutation
//! - `POST /analytics` - Run an `AnalyticsQuery`
//! - `POST /relationships` - Record a relationship hint
//! - `POST /cache/clear` - Drop cache keys by pattern
//! - `POST /modules/{module}/data|mutate|search|analytics` - Module adapters
//!
//! ## Security Configuration
//!
//! From `[server]` in `lexhub.toml`, overridable by environment:
//!
//! - `cors_origins` / `LEXHUB_CORS_ORIGINS`: comma-separated origins, or `*` (default: localhost only)
//! - `rate_limit` / `LEXHUB_RATE_LIMIT`: requests per second (default: 100, 0 to disable)
//! - `api_key` / `LEXHUB_API_KEY`: if set, requires Bearer token authentication

mod auth;
mod error;
mod handlers;
mod middleware;
mod types;

pub use auth::{ApiKey, keys_match};
pub use error::{ApiError, status_for};
pub use middleware::{GlobalRateLimiter, create_rate_limiter};
pub use types::{
    ClearCacheRequest, ClearCacheResponse, ErrorResponse, HealthResponse, MetricsResponse,
    ModuleAnalyticsRequest, ModuleMutateRequest, ModuleSearchRequest, MutateRequest,
    SuccessResponse,
};

use crate::adapters::{AdapterFactory, UserDirectory};
use crate::config::{LexhubConfig, ServerSettings};
use crate::context::ContextProvider;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use lexhub_core::{
    AccessPolicy, DataHub, EntityRegistry, EventSink, HubError, ModuleRegistry, RecordStore,
    RequirementsAssembler,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Request bodies above this size are rejected.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the hub and everything layered on it.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<DataHub>,
    pub provider: Arc<ContextProvider>,
    pub adapters: Arc<AdapterFactory>,
    pub server: ServerSettings,
}

impl AppState {
    /// Wire hub, provider and adapters over `store`.
    ///
    /// Fails when a module declares an entity or relation the schema does
    /// not know.
    pub fn build(
        config: &LexhubConfig,
        store: Arc<dyn RecordStore>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, HubError> {
        let registry = EntityRegistry::legal_defaults();
        let modules = Arc::new(ModuleRegistry::standard());
        modules.validate(&registry)?;

        let hub = Arc::new(
            DataHub::new(config.hub.clone(), registry, store)
                .with_events(events)
                .with_assembler(Arc::new(RequirementsAssembler::new(Arc::clone(&modules)))),
        );
        let provider = Arc::new(ContextProvider::new(
            Arc::clone(&hub),
            modules,
            Arc::new(AccessPolicy::standard()),
            &config.context,
        ));
        let users = Arc::new(UserDirectory::new(
            config.users.clone(),
            config.default_role.as_str(),
        ));
        let adapters = Arc::new(AdapterFactory::new(Arc::clone(&provider), users));

        Ok(Self {
            hub,
            provider,
            adapters,
            server: config.server.clone(),
        })
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer.
///
/// - `*`: all origins (development only)
/// - unset: localhost only
/// - otherwise: the comma-separated origin list
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => build_localhost_cors(),
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the router with all endpoints and middleware.
///
/// Middleware stack (outer to inner): tracing, CORS, body limit, rate
/// limiting (if enabled), authentication (if configured).
pub fn create_router(state: AppState) -> Router {
    let settings = state.server.clone();

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/query", post(handlers::query_handler))
        .route("/mutate", post(handlers::mutate_handler))
        .route("/analytics", post(handlers::analytics_handler))
        .route("/relationships", post(handlers::relationship_handler))
        .route("/cache/clear", post(handlers::clear_cache_handler))
        .route("/modules/{module}/data", post(handlers::module_data_handler))
        .route(
            "/modules/{module}/mutate",
            post(handlers::module_mutate_handler),
        )
        .route(
            "/modules/{module}/search",
            post(handlers::module_search_handler),
        )
        .route(
            "/modules/{module}/analytics",
            post(handlers::module_analytics_handler),
        );

    match settings.api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => {
            tracing::info!("API key authentication enabled");
            router = router.layer(axum_middleware::from_fn_with_state(
                ApiKey(Arc::from(key)),
                auth::api_key_auth_middleware,
            ));
        }
        None => {
            tracing::warn!(
                "API key authentication DISABLED - all endpoints are publicly accessible! \
                 Set [server] api_key or LEXHUB_API_KEY to enable authentication."
            );
        }
    }

    if settings.rate_limit > 0 {
        tracing::info!(
            "Rate limiting enabled: {} requests/second",
            settings.rate_limit
        );
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(settings.rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer(settings.cors_origins.as_deref()))
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve `state` on `addr` until the process is stopped.
pub async fn run_server(addr: &str, state: AppState) -> std::io::Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("LexHub HTTP server listening on {}", addr);
    axum::serve(listener, router).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_origins_fall_back_to_localhost() {
        // Only checks construction; CorsLayer exposes no accessors.
        let _ = build_cors_layer(Some("\u{7f}bad, "));
        let _ = build_cors_layer(Some("*"));
        let _ = build_cors_layer(None);
    }
}
