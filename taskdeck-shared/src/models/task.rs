/// Task model
///
/// Tasks belong to exactly one owner and can optionally be assigned to another
/// user. `completed_at` is derived from `status` by [`derive_completed_at`]
/// before every write; it is never set independently.
///
/// # Status lifecycle
///
/// ```text
/// todo ⇄ in-progress ⇄ review ⇄ done
/// ```
///
/// Any status can move to any other. Entering `done` stamps `completed_at`,
/// leaving it clears the stamp.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('todo', 'in-progress', 'review', 'done');
/// CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high', 'critical');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY,
///     title VARCHAR(100) NOT NULL,
///     description VARCHAR(1000) NOT NULL DEFAULT '',
///     status task_status NOT NULL DEFAULT 'todo',
///     priority task_priority NOT NULL DEFAULT 'medium',
///     due_date TIMESTAMPTZ,
///     tags TEXT[] NOT NULL DEFAULT '{}',
///     owner_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     assigned_to UUID REFERENCES users(id) ON DELETE SET NULL,
///     completed_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Maximum title length in characters
pub const TITLE_MAX_LEN: usize = 100;

/// Minimum title length in characters
pub const TITLE_MIN_LEN: usize = 3;

/// Maximum description length in characters
pub const DESCRIPTION_MAX_LEN: usize = 1000;

/// Maximum number of tags per task
pub const MAX_TAGS: usize = 10;

/// Maximum length of a single tag
pub const TAG_MAX_LEN: usize = 50;

/// Task workflow status
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "task_status", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Review,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Review,
        TaskStatus::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown status: {}", s))
    }
}

/// Task priority
///
/// Declaration order is the sort order (`low` < `critical`), both here and in
/// the Postgres enum.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "critical" => Ok(TaskPriority::Critical),
            other => Err(format!("Unknown priority: {}", other)),
        }
    }
}

/// Task record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,

    /// Title (3-100 characters, trimmed)
    pub title: String,

    /// Free-form description, empty when not provided
    pub description: String,

    pub status: TaskStatus,

    pub priority: TaskPriority,

    pub due_date: Option<DateTime<Utc>>,

    /// Up to ten short labels
    pub tags: Vec<String>,

    /// Owning user
    pub owner_id: Uuid,

    /// Optional assignee
    pub assigned_to: Option<Uuid>,

    /// Set while `status == done`, `None` otherwise
    pub completed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Checks whether the task is past due and not done
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            Some(due) => due < now && self.status != TaskStatus::Done,
            None => false,
        }
    }

    /// Changes the status and recomputes `completed_at`
    pub fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        self.status = status;
        self.completed_at = derive_completed_at(status, self.completed_at, now);
    }
}

/// Serialized form of a task, including the derived `isOverdue` flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,

    pub is_overdue: bool,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        let is_overdue = task.is_overdue_at(Utc::now());
        Self { task, is_overdue }
    }
}

/// Computes `completed_at` for a status write
///
/// - `done` keeps an existing timestamp, or stamps `now` when there is none
/// - any other status clears it
///
/// Applying the same status twice yields the same result.
pub fn derive_completed_at(
    status: TaskStatus,
    existing: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match status {
        TaskStatus::Done => Some(existing.unwrap_or(now)),
        _ => None,
    }
}

/// Validated input for creating a task
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub assigned_to: Option<Uuid>,
}

/// Partial update of a task
///
/// `None` leaves a field untouched. For the nullable columns the inner
/// `Option` distinguishes "set" from "clear".
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub tags: Option<Vec<String>>,
    pub assigned_to: Option<Option<Uuid>>,
}

/// Sortable task columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    DueDate,
    Priority,
    Title,
    Status,
}

impl TaskSortField {
    /// Column name used in SQL `ORDER BY`
    pub fn column(&self) -> &'static str {
        match self {
            TaskSortField::CreatedAt => "created_at",
            TaskSortField::UpdatedAt => "updated_at",
            TaskSortField::DueDate => "due_date",
            TaskSortField::Priority => "priority",
            TaskSortField::Title => "title",
            TaskSortField::Status => "status",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Store-level task filter
#[derive(Debug, Clone)]
pub struct TaskFilter {
    /// Restrict to one owner; `None` means every owner
    pub owner_id: Option<Uuid>,

    pub status: Option<TaskStatus>,

    pub priority: Option<TaskPriority>,

    /// Case-insensitive substring match on title or description
    pub search: Option<String>,

    pub sort_by: TaskSortField,

    pub order: SortOrder,

    /// 1-based page number
    pub page: u32,

    pub limit: u32,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            owner_id: None,
            status: None,
            priority: None,
            search: None,
            sort_by: TaskSortField::default(),
            order: SortOrder::default(),
            page: 1,
            limit: 10,
        }
    }
}

impl TaskFilter {
    /// Checks whether a task passes the filter (ignores paging)
    pub fn matches(&self, task: &Task) -> bool {
        if self.owner_id.is_some_and(|owner| owner != task.owner_id) {
            return false;
        }
        if self.status.is_some_and(|status| status != task.status) {
            return false;
        }
        if self.priority.is_some_and(|priority| priority != task.priority) {
            return false;
        }
        match self.search.as_deref() {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                task.title.to_lowercase().contains(&term)
                    || task.description.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }
}

/// Per-status task counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub todo: i64,
    #[serde(rename = "in-progress")]
    pub in_progress: i64,
    pub review: i64,
    pub done: i64,
    pub total: i64,
}

impl TaskStats {
    /// Adds `count` tasks of `status`
    pub fn record(&mut self, status: TaskStatus, count: i64) {
        match status {
            TaskStatus::Todo => self.todo += count,
            TaskStatus::InProgress => self.in_progress += count,
            TaskStatus::Review => self.review += count,
            TaskStatus::Done => self.done += count,
        }
        self.total += count;
    }
}
