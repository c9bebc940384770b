/// Persistence layer
///
/// The session manager, task service and progress engine only talk to the
/// traits in this module. Two implementations exist:
///
/// - [`postgres::PgStore`]: production store on top of a sqlx `PgPool`
/// - [`memory::MemoryStore`]: in-process store for tests and local runs
///
/// Lookups that could match deactivated users take an explicit
/// `include_inactive` flag. There is no implicit "active only" filter.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskdeck_shared::store::{memory::MemoryStore, DynStore, UserStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store: DynStore = Arc::new(MemoryStore::new());
/// let user = store.find_user_by_email("ada@example.com", true).await?;
/// assert!(user.is_none());
/// # Ok(())
/// # }
/// ```

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{
    page::Page,
    task::{Task, TaskFilter, TaskStats},
    user::{NewUser, User, UserChanges, UserQuery},
};
use crate::progress::{ProgressRow, ProgressScope};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique field already holds this value
    #[error("Duplicate value: field '{field}' already exists")]
    Conflict { field: String, value: String },

    /// The backing store could not be reached or timed out
    ///
    /// Callers may retry; this is never reported as an empty result.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Any other failure
    #[error("Store error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            sqlx::Error::Database(ref db_err) => match db_err.code().as_deref() {
                // unique_violation
                Some("23505") => StoreError::Conflict {
                    field: conflict_field(db_err.constraint()),
                    value: String::new(),
                },
                // query_canceled (statement_timeout), admin_shutdown, cannot_connect_now
                Some("57014") | Some("57P01") | Some("57P03") => {
                    StoreError::Unavailable(err.to_string())
                }
                _ => StoreError::Internal(err.to_string()),
            },
            _ => StoreError::Internal(err.to_string()),
        }
    }
}

/// Maps a unique constraint name back to the field it guards
fn conflict_field(constraint: Option<&str>) -> String {
    match constraint {
        Some(name) if name.contains("email") => "email".to_string(),
        Some(name) => name.to_string(),
        None => "unknown".to_string(),
    }
}

/// Store result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// User persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user; `Conflict` if the email is taken
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User>;

    async fn find_user_by_id(&self, id: Uuid, include_inactive: bool) -> StoreResult<Option<User>>;

    /// Looks up a user by (already normalized) email
    async fn find_user_by_email(
        &self,
        email: &str,
        include_inactive: bool,
    ) -> StoreResult<Option<User>>;

    /// Applies profile changes and returns the updated user
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>>;

    async fn list_users(&self, query: &UserQuery) -> StoreResult<Page<User>>;

    /// Stores a fresh refresh token fingerprint and stamps `last_login_at`
    async fn record_login(&self, id: Uuid, refresh_token_hash: &str) -> StoreResult<Option<User>>;

    /// Compare-and-swap of the refresh token fingerprint
    ///
    /// Succeeds only if the user is active and the stored fingerprint equals
    /// `expected`. Returns whether the swap happened.
    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        replacement: &str,
    ) -> StoreResult<bool>;

    /// Clears the refresh token fingerprint; returns whether a user matched
    async fn clear_refresh_token(&self, id: Uuid) -> StoreResult<bool>;

    /// Replaces the password hash and starts a new session chain
    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        changed_at: DateTime<Utc>,
        refresh_token_hash: &str,
    ) -> StoreResult<Option<User>>;

    /// Marks the user inactive and drops their refresh token
    async fn deactivate_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Cheap round trip used by the health endpoint
    async fn ping(&self) -> StoreResult<()>;
}

/// Task persistence
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, task: Task) -> StoreResult<Task>;

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>>;

    async fn list_tasks(&self, filter: &TaskFilter) -> StoreResult<Page<Task>>;

    /// Overwrites every mutable column of the task (last write wins)
    async fn update_task(&self, task: &Task) -> StoreResult<Option<Task>>;

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool>;

    /// Counts tasks per status, for one owner or globally
    async fn task_stats(&self, owner_id: Option<Uuid>) -> StoreResult<TaskStats>;
}

/// Progress aggregation
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Per-user total and completed task counts in a single bulk query
    async fn progress_rows(&self, scope: ProgressScope) -> StoreResult<Vec<ProgressRow>>;
}

/// Everything the services need from persistence
pub trait Store: UserStore + TaskStore + ProgressStore {}

impl<T: UserStore + TaskStore + ProgressStore> Store for T {}

/// Shared handle to a store
pub type DynStore = Arc<dyn Store>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_unavailable() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_row_not_found_is_internal() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Internal(_)));
    }

    #[test]
    fn test_conflict_field() {
        assert_eq!(conflict_field(Some("users_email_key")), "email");
        assert_eq!(conflict_field(Some("tasks_pkey")), "tasks_pkey");
        assert_eq!(conflict_field(None), "unknown");
    }

    #[test]
    fn test_conflict_message() {
        let err = StoreError::Conflict {
            field: "email".to_string(),
            value: "ada@example.com".to_string(),
        };
        assert_eq!(err.to_string(), "Duplicate value: field 'email' already exists");
    }
}
