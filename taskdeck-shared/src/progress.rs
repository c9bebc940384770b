/// Progress aggregation engine
///
/// Computes task completion per user. The store returns raw counts for the
/// whole population in one bulk query ([`ProgressStore::progress_rows`]); this
/// module turns the counts into percentages and ranks them.
///
/// # Rules
///
/// - `progress = round_half_up(completed * 100 / total)`
/// - `progress = 0` when the user has no tasks
/// - ranking: highest progress first, ties by ascending name
///
/// # Example
///
/// ```
/// use taskdeck_shared::progress::progress_percent;
///
/// assert_eq!(progress_percent(3, 4), 75);
/// assert_eq!(progress_percent(1, 3), 33);
/// assert_eq!(progress_percent(1, 8), 13); // 12.5 rounds up
/// assert_eq!(progress_percent(0, 0), 0);
/// ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{ProgressStore, StoreResult};

/// Which users to aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressScope {
    /// Every user; deactivated accounts only when asked for
    AllUsers { include_inactive: bool },

    /// A single user, regardless of active flag
    SingleUser(Uuid),
}

/// Raw per-user counts produced by the store
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ProgressRow {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub total_tasks: i64,
    pub completed_tasks: i64,
}

/// Completion summary for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub total_tasks: i64,
    pub completed_tasks: i64,

    /// Whole-number percentage, 0-100
    pub progress: i64,
}

impl From<ProgressRow> for UserProgress {
    fn from(row: ProgressRow) -> Self {
        Self {
            progress: progress_percent(row.completed_tasks, row.total_tasks),
            user_id: row.user_id,
            name: row.name,
            email: row.email,
            total_tasks: row.total_tasks,
            completed_tasks: row.completed_tasks,
        }
    }
}

/// Completion percentage rounded half-up, in integer arithmetic
///
/// `round(100c / t) = floor((200c + t) / 2t)` for non-negative inputs.
pub fn progress_percent(completed: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    let completed = completed.clamp(0, total);
    (200 * completed + total) / (2 * total)
}

/// Converts raw rows into ranked progress records
pub fn rank(rows: Vec<ProgressRow>) -> Vec<UserProgress> {
    let mut ranked: Vec<UserProgress> = rows.into_iter().map(UserProgress::from).collect();
    ranked.sort_by(|a, b| {
        b.progress
            .cmp(&a.progress)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    ranked
}

/// Computes ranked progress for the given scope
///
/// An empty population yields an empty vector. Store failures propagate
/// unchanged so callers can tell "unavailable" from "nothing to report".
pub async fn compute_progress<S>(store: &S, scope: ProgressScope) -> StoreResult<Vec<UserProgress>>
where
    S: ProgressStore + ?Sized,
{
    let rows = store.progress_rows(scope).await?;
    tracing::debug!(?scope, users = rows.len(), "Aggregated task progress");
    Ok(rank(rows))
}
