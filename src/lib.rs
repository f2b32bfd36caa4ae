//! # Roster
//!
//! User-record service with real-time change notifications.
//!
//! ## Features
//!
//! - **User CRUD**: create, read, update, delete and filtered listing over HTTP
//! - **Change feed**: every successful mutation is announced to watchers
//! - **Lossy fan-out**: slow watchers miss events instead of blocking writers
//! - **WebSocket streaming**: one JSON frame per change at `/api/users/watch`
//!
//! ## Modules
//!
//! - [`notifier`]: subscription registry and delivery loop
//! - [`users`]: user model, SQLite repository and service
//! - [`api`]: REST API server with Axum
//! - [`websocket`]: watch endpoint
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roster::notifier::SubscriptionRegistry;
//! use roster::users::{NewUser, SqliteUserRepository, UserService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repository = Arc::new(SqliteUserRepository::in_memory()?);
//!     let notifier = Arc::new(SubscriptionRegistry::default());
//!     let users = UserService::new(repository, Arc::clone(&notifier));
//!
//!     let mut watcher = notifier.subscribe("example")?;
//!
//!     let user = users
//!         .new_user(NewUser {
//!             email: "ada@example.com".to_string(),
//!             password: "correct-horse".to_string(),
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     let event = watcher.recv().await;
//!     println!("{} -> {:?}", user.id, event);
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod notifier;
pub mod users;
pub mod websocket;

// Re-export top-level types for convenience
pub use notifier::{
    ChangeEvent, ChangeKind, NotifierError, NotifierStats, Subscription, SubscriptionRegistry,
};

pub use users::{
    NewUser, ServiceError, SqliteUserRepository, UpdateUser, User, UserFilter, UserRepository,
    UserService,
};

pub use api::{build_router, serve, ApiError, AppState};

pub use websocket::{websocket_handler, ServerMessage};

pub use config::{ApiConfig, Config, ConfigError, DatabaseConfig, LoggingConfig, NotifierConfig};
