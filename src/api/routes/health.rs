//! Health Routes
//!
//! - GET /api/health/live - Liveness probe (process is alive)
//! - GET /api/health - Database ping plus notifier counters

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /api/health/live
///
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /api/health
///
/// 200 when the user store answers a ping, 503 otherwise.
pub async fn full_health(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let database_ok = match state.users.repository().ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Database ping failed");
            false
        }
    };

    let stats = state.notifier.stats();
    let (status, overall) = if database_ok {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    let body = HealthResponse {
        status: overall.to_string(),
        database: if database_ok { "ok" } else { "error" }.to_string(),
        subscribers: stats.subscribers,
        events_broadcast: stats.events_broadcast,
        deliveries_dropped: stats.deliveries_dropped,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }
}
