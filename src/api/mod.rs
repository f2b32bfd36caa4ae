//! Roster REST API
//!
//! HTTP API layer for Roster, built with Axum.
//!
//! # Endpoints
//!
//! ## Users
//! - `GET /api/users` - List users (`first_name`, `last_name`, `nickname`,
//!   `country`, `email`, `limit`, `offset`)
//! - `POST /api/user` - Create a user
//! - `GET /api/user/:id` - Get a user
//! - `PUT /api/user/:id` - Update a user
//! - `DELETE /api/user/:id` - Delete a user
//!
//! ## Watch
//! - `GET /api/users/watch` - WebSocket stream of change events
//!
//! ## Health
//! - `GET /api/health/live` - Liveness probe
//! - `GET /api/health` - Database and notifier status
//!
//! # Example
//!
//! ```rust,ignore
//! use roster::api::{serve, AppState};
//! use roster::config::ApiConfig;
//! use roster::notifier::SubscriptionRegistry;
//! use roster::users::SqliteUserRepository;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repository = Arc::new(SqliteUserRepository::open("users.db")?);
//!     let notifier = Arc::new(SubscriptionRegistry::default());
//!     let config = ApiConfig::default();
//!
//!     let state = AppState::new(repository, notifier, config.clone());
//!     serve(state, &config).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ApiConfig;
use crate::websocket::websocket_handler;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs.max(1));
    let cors = cors_layer(&state.config.cors_origins);

    let rest_routes = Router::new()
        // User routes
        .route("/users", get(routes::users::list_users))
        .route("/user", post(routes::users::create_user))
        .route(
            "/user/:id",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        // Health routes
        .route("/health", get(routes::health::full_health))
        .route("/health/live", get(routes::health::liveness))
        .layer(TimeoutLayer::new(timeout));

    // Watch connections are long-lived, keep them out of the timeout layer
    let api_routes = rest_routes.route("/users/watch", get(websocket_handler));

    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(allowed)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server and run until SIGINT/SIGTERM
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Roster API listening on {}", addr);

    serve_with_shutdown(listener, state, shutdown_signal()).await
}

/// Serve on `listener` until `signal` resolves
///
/// Once the signal fires every watcher is stopped and the notifier is shut
/// down before in-flight requests are drained.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    state: AppState,
    signal: F,
) -> Result<(), ApiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = build_router(state.clone());

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            signal.await;
            state.begin_shutdown();
        })
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Roster API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
