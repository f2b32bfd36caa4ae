//! User Service
//!
//! Validates requests, talks to the repository and announces every
//! committed mutation to the change notifier, exactly once. Failed
//! mutations are never announced.

use std::sync::Arc;
use thiserror::Error;

use super::filter::UserFilter;
use super::model::{NewUser, UpdateUser, User};
use super::password::hash_password;
use super::repository::{RepositoryError, UserChanges, UserDocument, UserRepository};
use crate::notifier::{ChangeKind, SubscriptionRegistry};

/// Errors returned by user operations
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("User already exists: {0}")]
    AlreadyExists(String),

    #[error("Failed to hash password: {0}")]
    PasswordHash(String),

    #[error("Repository error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => ServiceError::NotFound(id),
            RepositoryError::AlreadyExists(email) => ServiceError::AlreadyExists(email),
            other => ServiceError::Repository(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// User CRUD with change notifications
pub struct UserService {
    repository: Arc<dyn UserRepository>,
    notifier: Arc<SubscriptionRegistry>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>, notifier: Arc<SubscriptionRegistry>) -> Self {
        Self {
            repository,
            notifier,
        }
    }

    /// Registry that watchers subscribe to
    pub fn notifier(&self) -> &Arc<SubscriptionRegistry> {
        &self.notifier
    }

    pub fn repository(&self) -> &Arc<dyn UserRepository> {
        &self.repository
    }

    /// Create a user and announce the insert
    pub async fn new_user(&self, new_user: NewUser) -> ServiceResult<User> {
        tracing::info!(user = %new_user, "Adding a new user");

        new_user.validate().map_err(ServiceError::Validation)?;
        let password_hash = hash_off_runtime(new_user.password).await?;

        let added = self
            .repository
            .add_user(UserDocument {
                first_name: new_user.first_name,
                last_name: new_user.last_name,
                nickname: new_user.nickname,
                email: new_user.email,
                password_hash,
                country: new_user.country,
            })
            .await?;

        self.notifier.notify_change(ChangeKind::Insert, added.id.as_str());
        Ok(added)
    }

    /// Apply the present fields of `update` to user `id` and announce it
    pub async fn update_user(&self, id: &str, update: UpdateUser) -> ServiceResult<User> {
        tracing::info!(user_id = %id, "Updating user");

        if id.trim().is_empty() {
            return Err(ServiceError::Validation("user id is required".to_string()));
        }
        if update.is_empty() {
            return Err(ServiceError::Validation("no fields to update".to_string()));
        }
        update.validate().map_err(ServiceError::Validation)?;

        let password_hash = match update.password {
            Some(password) => Some(hash_off_runtime(password).await?),
            None => None,
        };

        let changes = UserChanges {
            first_name: update.first_name,
            last_name: update.last_name,
            nickname: update.nickname,
            email: update.email,
            password_hash,
            country: update.country,
        };

        let updated = self.repository.update_user(id, changes).await?;

        self.notifier.notify_change(ChangeKind::Update, updated.id.as_str());
        Ok(updated)
    }

    /// Delete user `id` and announce it
    pub async fn remove_user(&self, id: &str) -> ServiceResult<()> {
        tracing::info!(user_id = %id, "Removing user");

        if id.trim().is_empty() {
            return Err(ServiceError::Validation("user id is required".to_string()));
        }

        self.repository.remove_user(id).await?;

        self.notifier.notify_change(ChangeKind::Delete, id);
        Ok(())
    }

    pub async fn get_user(&self, id: &str) -> ServiceResult<User> {
        Ok(self.repository.get_user(id).await?)
    }

    pub async fn get_users(&self, filter: &UserFilter) -> ServiceResult<Vec<User>> {
        tracing::debug!(filter = %filter, "Getting users");
        Ok(self.repository.get_users(filter).await?)
    }
}

/// Hash on the blocking pool; Argon2 is CPU-bound
async fn hash_off_runtime(password: String) -> ServiceResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::PasswordHash(e.to_string()))?
        .map_err(ServiceError::PasswordHash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::{ChangeEvent, Subscription};
    use crate::users::repository::SqliteUserRepository;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc::error::TryRecvError;

    fn service() -> (UserService, Subscription) {
        let repository = Arc::new(SqliteUserRepository::in_memory().unwrap());
        let notifier = Arc::new(SubscriptionRegistry::default());
        let watcher = notifier.subscribe("test-watcher").unwrap();
        (UserService::new(repository, notifier), watcher)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            first_name: "TestFirstName".to_string(),
            last_name: "TestLastName".to_string(),
            nickname: "Test".to_string(),
            email: email.to_string(),
            password: "testPassword".to_string(),
            country: "UK".to_string(),
        }
    }

    #[tokio::test]
    async fn test_new_user_broadcasts_insert() {
        let (service, mut watcher) = service();

        let added = service.new_user(new_user("emailTest@test.com")).await.unwrap();

        assert_eq!(added.first_name, "TestFirstName");
        assert_eq!(added.email, "emailTest@test.com");
        assert_eq!(watcher.try_recv().unwrap(), ChangeEvent::insert(added.id.as_str()));
        assert!(matches!(watcher.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_password_is_hashed() {
        let repository = Arc::new(SqliteUserRepository::in_memory().unwrap());
        let service = UserService::new(repository.clone(), Arc::new(SubscriptionRegistry::default()));

        service.new_user(new_user("hash@test.com")).await.unwrap();

        let stored = repository.password_hash("hash@test.com").unwrap().unwrap();
        assert_ne!(stored, "testPassword");
        assert!(crate::users::password::verify_password("testPassword", &stored));
    }

    #[tokio::test]
    async fn test_hashing_leaves_runtime_free() {
        let (service, _watcher) = service();
        let ticks = Arc::new(AtomicUsize::new(0));

        let ticker = {
            let ticks = Arc::clone(&ticks);
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, Ordering::Relaxed);
                    tokio::task::yield_now().await;
                }
            })
        };

        service.new_user(new_user("busy@test.com")).await.unwrap();

        // Single-threaded runtime: the ticker only ran if new_user yielded while hashing
        assert!(ticks.load(Ordering::Relaxed) > 0);
        ticker.abort();
    }

    #[tokio::test]
    async fn test_invalid_user_not_broadcast() {
        let (service, mut watcher) = service();

        let mut invalid = new_user("bad-email");
        invalid.password = "short".to_string();
        let result = service.new_user(invalid).await;

        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert!(matches!(watcher.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_duplicate_user_not_broadcast() {
        let (service, mut watcher) = service();
        service.new_user(new_user("dup@test.com")).await.unwrap();
        watcher.try_recv().unwrap();

        let result = service.new_user(new_user("dup@test.com")).await;
        assert!(matches!(result, Err(ServiceError::AlreadyExists(_))));
        assert!(matches!(watcher.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_update_user_broadcasts_update() {
        let (service, mut watcher) = service();
        let added = service.new_user(new_user("upd@test.com")).await.unwrap();
        watcher.try_recv().unwrap();

        let updated = service
            .update_user(
                &added.id,
                UpdateUser {
                    country: Some("IT".to_string()),
                    password: Some("anotherPassword".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.country, "IT");
        assert_eq!(updated.first_name, "TestFirstName");
        assert_eq!(watcher.try_recv().unwrap(), ChangeEvent::update(added.id.as_str()));
    }

    #[tokio::test]
    async fn test_update_errors_not_broadcast() {
        let (service, mut watcher) = service();

        let missing = service
            .update_user(
                "does-not-exist",
                UpdateUser {
                    nickname: Some("x".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));

        let empty = service.update_user("any", UpdateUser::default()).await;
        assert!(matches!(empty, Err(ServiceError::Validation(_))));

        assert!(matches!(watcher.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_remove_user_broadcasts_delete() {
        let (service, mut watcher) = service();
        let added = service.new_user(new_user("rm@test.com")).await.unwrap();
        watcher.try_recv().unwrap();

        service.remove_user(&added.id).await.unwrap();
        assert_eq!(watcher.try_recv().unwrap(), ChangeEvent::delete(added.id.as_str()));

        let again = service.remove_user(&added.id).await;
        assert!(matches!(again, Err(ServiceError::NotFound(_))));
        assert!(matches!(watcher.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_get_users_filtered_by_country() {
        let (service, mut watcher) = service();
        service.new_user(new_user("a@test.com")).await.unwrap();
        service.new_user(new_user("b@test.com")).await.unwrap();
        let mut other = new_user("c@test.com");
        other.country = "FR".to_string();
        service.new_user(other).await.unwrap();

        let users = service
            .get_users(&UserFilter::builder().country(Some("UK".to_string())).build())
            .await
            .unwrap();
        assert_eq!(users.len(), 2);

        // Three inserts, three events; reads announce nothing
        for _ in 0..3 {
            assert_eq!(watcher.try_recv().unwrap().kind, ChangeKind::Insert);
        }
        assert!(matches!(watcher.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_mutations_succeed_with_full_watcher_queue() {
        let (service, _stalled) = service();

        for i in 0..20 {
            service
                .new_user(new_user(&format!("user{}@test.com", i)))
                .await
                .unwrap();
        }

        let stats = service.notifier().stats();
        assert_eq!(stats.events_broadcast, 20);
        assert_eq!(stats.deliveries_dropped, 10);
    }
}
