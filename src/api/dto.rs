//! Data Transfer Objects
//!
//! Request and response types for the API endpoints that are not
//! user records themselves.

use serde::{Deserialize, Serialize};

use crate::users::UserFilter;

/// Query string of `GET /api/users`
///
/// Pagination values are kept as text so malformed numbers fall back to
/// defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub nickname: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl ListUsersQuery {
    pub fn into_filter(self) -> UserFilter {
        UserFilter::builder()
            .first_name(self.first_name)
            .last_name(self.last_name)
            .nickname(self.nickname)
            .country(self.country)
            .email(self.email)
            .limit(self.limit.and_then(|l| l.parse().ok()))
            .offset(self.offset.and_then(|o| o.parse().ok()))
            .build()
    }
}

/// Query string of the watch endpoint
#[derive(Debug, Default, Deserialize)]
pub struct WatchQuery {
    /// Caller-chosen subscriber id; a UUID is generated when absent
    pub subscriber_id: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy or unhealthy
    pub status: String,
    /// Database status: ok or error
    pub database: String,
    /// Connected watchers
    pub subscribers: usize,
    /// Change events broadcast since start
    pub events_broadcast: u64,
    /// Deliveries dropped on full watcher queues
    pub deliveries_dropped: u64,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Server version
    pub version: String,
}
