//! User Repository - SQLite-backed document store for user records
//!
//! One row per user. Email is unique across the collection; ids are
//! UUID v4 strings assigned on insert.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OpenFlags, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

use super::filter::UserFilter;
use super::model::{format_timestamp, User};

/// Errors from the user store
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("User already exists: {0}")]
    AlreadyExists(String),

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// A user ready to be inserted; the password is already hashed
#[derive(Debug, Clone)]
pub struct UserDocument {
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
    pub email: String,
    pub password_hash: String,
    pub country: String,
}

/// Fields to overwrite on an existing user
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub country: Option<String>,
}

impl UserChanges {
    fn columns(&self) -> Vec<(&'static str, &str)> {
        [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("nickname", &self.nickname),
            ("email", &self.email),
            ("password", &self.password_hash),
            ("country", &self.country),
        ]
        .into_iter()
        .filter_map(|(column, value)| value.as_deref().map(|v| (column, v)))
        .collect()
    }
}

/// Storage operations the user service depends on
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn add_user(&self, user: UserDocument) -> RepositoryResult<User>;

    async fn update_user(&self, id: &str, changes: UserChanges) -> RepositoryResult<User>;

    async fn remove_user(&self, id: &str) -> RepositoryResult<()>;

    async fn get_user(&self, id: &str) -> RepositoryResult<User>;

    async fn get_users(&self, filter: &UserFilter) -> RepositoryResult<Vec<User>>;

    /// Cheap liveness check of the underlying store
    async fn ping(&self) -> RepositoryResult<()>;
}

const USER_COLUMNS: &str =
    "id, first_name, last_name, nickname, email, country, created_at, updated_at";

/// SQLite implementation of [`UserRepository`]
pub struct SqliteUserRepository {
    /// std::sync::Mutex because SQLite connections are !Sync
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteUserRepository {
    /// Open (or create) the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> RepositoryResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Self::from_connection(conn, Some(path))
    }

    /// Volatile database, used by tests and `--in-memory` runs
    pub fn in_memory() -> RepositoryResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> RepositoryResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                nickname TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                country TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_users_country ON users(country);
            CREATE INDEX IF NOT EXISTS idx_users_created ON users(created_at, id);
            ",
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::Lock(e.to_string()))
    }

    /// Stored password hash for `email`, if such a user exists
    #[cfg(test)]
    pub(crate) fn password_hash(&self, email: &str) -> RepositoryResult<Option<String>> {
        let conn = self.lock()?;
        let hash = conn
            .query_row(
                "SELECT password FROM users WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hash)
    }
}

fn select_by_id(conn: &Connection, id: &str) -> RepositoryResult<User> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    conn.query_row(&sql, params![id], row_to_user)
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<RepositoryResult<User>> {
    let created_ms: i64 = row.get(6)?;
    let updated_ms: i64 = row.get(7)?;
    let id: String = row.get(0)?;

    let (Some(created), Some(updated)) = (millis_to_utc(created_ms), millis_to_utc(updated_ms))
    else {
        return Ok(Err(RepositoryError::Corrupt(format!(
            "invalid timestamps on user {}",
            id
        ))));
    };

    Ok(Ok(User {
        id,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        nickname: row.get(3)?,
        email: row.get(4)?,
        country: row.get(5)?,
        created_at: format_timestamp(created),
        updated_at: format_timestamp(updated),
    }))
}

fn millis_to_utc(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// Map a UNIQUE violation on email to `AlreadyExists`
fn map_write_error(err: rusqlite::Error, email: Option<&str>) -> RepositoryError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            RepositoryError::AlreadyExists(email.unwrap_or_default().to_string())
        }
        _ => RepositoryError::Database(err),
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn add_user(&self, user: UserDocument) -> RepositoryResult<User> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp_millis();

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (id, first_name, last_name, nickname, email, password, country, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                id,
                user.first_name,
                user.last_name,
                user.nickname,
                user.email,
                user.password_hash,
                user.country,
                now
            ],
        )
        .map_err(|e| map_write_error(e, Some(user.email.as_str())))?;

        select_by_id(&conn, &id)
    }

    async fn update_user(&self, id: &str, changes: UserChanges) -> RepositoryResult<User> {
        let columns = changes.columns();

        let mut assignments: Vec<String> = Vec::with_capacity(columns.len() + 1);
        let mut values: Vec<Value> = Vec::with_capacity(columns.len() + 2);
        for (column, value) in &columns {
            values.push(Value::Text(value.to_string()));
            assignments.push(format!("{} = ?{}", column, values.len()));
        }
        values.push(Value::Integer(Utc::now().timestamp_millis()));
        assignments.push(format!("updated_at = ?{}", values.len()));
        values.push(Value::Text(id.to_string()));

        let sql = format!(
            "UPDATE users SET {} WHERE id = ?{}",
            assignments.join(", "),
            values.len()
        );

        let conn = self.lock()?;
        let updated = conn
            .execute(&sql, params_from_iter(values))
            .map_err(|e| map_write_error(e, changes.email.as_deref()))?;

        if updated == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }

        select_by_id(&conn, id)
    }

    async fn remove_user(&self, id: &str) -> RepositoryResult<()> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn get_user(&self, id: &str) -> RepositoryResult<User> {
        let conn = self.lock()?;
        select_by_id(&conn, id)
    }

    async fn get_users(&self, filter: &UserFilter) -> RepositoryResult<Vec<User>> {
        let conditions = filter.conditions();

        let mut values: Vec<Value> = Vec::with_capacity(conditions.len() + 2);
        let mut clauses: Vec<String> = Vec::with_capacity(conditions.len());
        for (column, value) in &conditions {
            values.push(Value::Text(value.to_string()));
            clauses.push(format!("{} = ?{}", column, values.len()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        values.push(Value::Integer(filter.limit));
        let limit_idx = values.len();
        values.push(Value::Integer(filter.offset));
        let offset_idx = values.len();

        let sql = format!(
            "SELECT {} FROM users{} ORDER BY created_at, id LIMIT ?{} OFFSET ?{}",
            USER_COLUMNS, where_clause, limit_idx, offset_idx
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row??);
        }
        Ok(users)
    }

    async fn ping(&self) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn document(nickname: &str, email: &str, country: &str) -> UserDocument {
        UserDocument {
            first_name: "testName".to_string(),
            last_name: "testLastName".to_string(),
            nickname: nickname.to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$fake".to_string(),
            country: country.to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_and_get_user() {
        let repo = SqliteUserRepository::in_memory().unwrap();

        let added = repo
            .add_user(document("testNickname", "testEmail@email.com", "UK"))
            .await
            .unwrap();

        assert!(!added.id.is_empty());
        assert_eq!(added.nickname, "testNickname");
        assert_eq!(added.created_at, added.updated_at);

        let fetched = repo.get_user(&added.id).await.unwrap();
        assert_eq!(fetched, added);

        let hash = repo.password_hash("testEmail@email.com").unwrap();
        assert_eq!(hash.as_deref(), Some("$argon2id$fake"));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = SqliteUserRepository::in_memory().unwrap();
        repo.add_user(document("a", "same@email.com", "UK"))
            .await
            .unwrap();

        let result = repo.add_user(document("b", "same@email.com", "IT")).await;
        assert!(matches!(result, Err(RepositoryError::AlreadyExists(email)) if email == "same@email.com"));
    }

    #[tokio::test]
    async fn test_update_user() {
        let repo = SqliteUserRepository::in_memory().unwrap();
        let added = repo
            .add_user(document("before", "u@email.com", "UK"))
            .await
            .unwrap();

        let changes = UserChanges {
            nickname: Some("after".to_string()),
            country: Some("IT".to_string()),
            ..Default::default()
        };
        let updated = repo.update_user(&added.id, changes).await.unwrap();

        assert_eq!(updated.id, added.id);
        assert_eq!(updated.nickname, "after");
        assert_eq!(updated.country, "IT");
        assert_eq!(updated.email, "u@email.com");
        assert_eq!(updated.created_at, added.created_at);
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let repo = SqliteUserRepository::in_memory().unwrap();
        let result = repo
            .update_user("missing", UserChanges::default())
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_to_taken_email() {
        let repo = SqliteUserRepository::in_memory().unwrap();
        repo.add_user(document("a", "a@email.com", "UK")).await.unwrap();
        let b = repo.add_user(document("b", "b@email.com", "UK")).await.unwrap();

        let changes = UserChanges {
            email: Some("a@email.com".to_string()),
            ..Default::default()
        };
        let result = repo.update_user(&b.id, changes).await;
        assert!(matches!(result, Err(RepositoryError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_remove_user() {
        let repo = SqliteUserRepository::in_memory().unwrap();
        let added = repo
            .add_user(document("gone", "gone@email.com", "UK"))
            .await
            .unwrap();

        repo.remove_user(&added.id).await.unwrap();

        assert!(matches!(
            repo.get_user(&added.id).await,
            Err(RepositoryError::NotFound(_))
        ));
        assert!(matches!(
            repo.remove_user(&added.id).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_filter_and_paginate() {
        let repo = SqliteUserRepository::in_memory().unwrap();
        for i in 0..5 {
            repo.add_user(document(&format!("uk{}", i), &format!("uk{}@email.com", i), "UK"))
                .await
                .unwrap();
        }
        repo.add_user(document("it0", "it0@email.com", "IT"))
            .await
            .unwrap();

        let all_uk = repo
            .get_users(&UserFilter::builder().country(Some("UK".to_string())).build())
            .await
            .unwrap();
        assert_eq!(all_uk.len(), 5);
        assert!(all_uk.iter().all(|u| u.country == "UK"));

        let page = repo
            .get_users(
                &UserFilter::builder()
                    .country(Some("UK".to_string()))
                    .limit(Some(2))
                    .offset(Some(4))
                    .build(),
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 1);

        let by_email = repo
            .get_users(&UserFilter::builder().email(Some("it0@email.com".to_string())).build())
            .await
            .unwrap();
        assert_eq!(by_email.len(), 1);
        assert_eq!(by_email[0].nickname, "it0");
    }

    #[tokio::test]
    async fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("users.db");

        let id = {
            let repo = SqliteUserRepository::open(&path).unwrap();
            repo.ping().await.unwrap();
            repo.add_user(document("kept", "kept@email.com", "UK"))
                .await
                .unwrap()
                .id
        };

        let repo = SqliteUserRepository::open(&path).unwrap();
        assert_eq!(repo.path(), Some(path.as_path()));
        let user = repo.get_user(&id).await.unwrap();
        assert_eq!(user.nickname, "kept");
    }
}
