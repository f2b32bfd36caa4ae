//! User Records
//!
//! - [`model`]: request payloads and the returned record
//! - [`filter`]: listing filter and pagination
//! - [`password`]: Argon2 password hashing
//! - [`repository`]: SQLite document store
//! - [`service`]: CRUD that announces mutations to the notifier

pub mod filter;
pub mod model;
pub mod password;
pub mod repository;
pub mod service;

pub use filter::{UserFilter, UserFilterBuilder, DEFAULT_LIMIT};
pub use model::{NewUser, UpdateUser, User};
pub use password::hash_password;
pub use repository::{
    RepositoryError, RepositoryResult, SqliteUserRepository, UserChanges, UserDocument,
    UserRepository,
};
pub use service::{ServiceError, ServiceResult, UserService};
