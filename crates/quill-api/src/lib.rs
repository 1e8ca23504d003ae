//! Quill API - REST server for the blogging backend
//!
//! Provides HTTP endpoints for registration, JWT sessions, admin user
//! management and per-owner posts.

pub mod audit;
pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use state::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Build the application router over shared state
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api-docs/openapi.json", get(routes::openapi_json))
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for the configured origins, with credentials so the refresh cookie
/// crosses origins
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            // AllowOrigin::list panics on a wildcard
            Ok(_) if origin.trim() == "*" => {
                tracing::warn!("ignoring wildcard CORS origin, credentials are enabled");
                None
            }
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

/// Fixed signing secret used by [`create_test_app`]
#[cfg(feature = "test-utils")]
pub const TEST_JWT_SECRET: &str = "quill-test-secret";

/// Cheap Argon2 parameters so tests do not spend seconds hashing
#[cfg(feature = "test-utils")]
pub fn test_password_config() -> auth::PasswordConfig {
    auth::PasswordConfig {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
        output_len: Some(32),
    }
}

/// Router and state over an in-memory store
///
/// The state is returned so tests can seed the store directly.
#[cfg(feature = "test-utils")]
pub fn create_test_app(mut config: quill_core::AppConfig) -> (Router, Arc<AppState>) {
    config.auth.jwt_secret = TEST_JWT_SECRET.to_string();

    let store = Arc::new(quill_core::MemoryStore::new());
    let state =
        Arc::new(AppState::new(config, store).with_password_config(test_password_config()));

    (create_router(state.clone()), state)
}

/// Create router for testing without a database
#[cfg(feature = "test-utils")]
pub fn create_router_for_testing() -> Router {
    create_test_app(quill_core::AppConfig::default()).0
}
