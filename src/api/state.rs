//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::ApiConfig;
use crate::notifier::SubscriptionRegistry;
use crate::users::{UserRepository, UserService};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// User CRUD; announces mutations to `notifier`
    pub users: Arc<UserService>,
    /// Change notifier that watch connections subscribe to
    pub notifier: Arc<SubscriptionRegistry>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
    /// Cancelled when the server shuts down; every watcher runs on a child token
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wire the service and notifier around `repository`
    pub fn new(
        repository: Arc<dyn UserRepository>,
        notifier: Arc<SubscriptionRegistry>,
        config: ApiConfig,
    ) -> Self {
        let users = Arc::new(UserService::new(repository, Arc::clone(&notifier)));

        Self {
            users,
            notifier,
            config: Arc::new(config),
            start_time: Instant::now(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Stop every watcher and refuse new ones
    pub fn begin_shutdown(&self) {
        self.shutdown.cancel();
        self.notifier.shutdown();
    }
}
