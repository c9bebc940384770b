/// Task service
///
/// Ownership-checked CRUD, listing and statistics over the task store. Every
/// operation takes the calling [`Principal`]; a task is visible and mutable
/// to its owner and to admins only.
///
/// Domain rules enforced here, independent of the HTTP layer:
///
/// - titles are trimmed and must be 3-100 characters
/// - descriptions are at most 1000 characters
/// - at most 10 tags of 1-50 characters each
/// - a new task's due date may not be more than 24 hours in the past
/// - an assignee must be an existing, active user
/// - `completed_at` is derived from the status on every write
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskdeck_shared::auth::principal::Principal;
/// use taskdeck_shared::models::task::{NewTask, TaskStatus};
/// use taskdeck_shared::models::user::Role;
/// use taskdeck_shared::store::memory::MemoryStore;
/// use taskdeck_shared::tasks::TaskService;
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let tasks = TaskService::new(Arc::new(MemoryStore::new()));
/// let me = Principal {
///     id: Uuid::new_v4(),
///     name: "Ada".to_string(),
///     email: "ada@example.com".to_string(),
///     role: Role::User,
/// };
///
/// let task = tasks
///     .create(&me, NewTask {
///         title: "Ship it".to_string(),
///         status: Some(TaskStatus::Done),
///         ..Default::default()
///     })
///     .await?;
/// assert!(task.completed_at.is_some());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::authorization::{authorize, require_task_access, AuthzError};
use crate::auth::principal::Principal;
use crate::models::{
    page::{clamp_paging, Page},
    task::{
        derive_completed_at, NewTask, SortOrder, Task, TaskChanges, TaskFilter, TaskPriority,
        TaskSortField, TaskStats, TaskStatus, DESCRIPTION_MAX_LEN, MAX_TAGS, TAG_MAX_LEN,
        TITLE_MAX_LEN, TITLE_MIN_LEN,
    },
    user::Role,
};
use crate::store::{DynStore, StoreError};

/// How far in the past a new task's due date may lie
pub const DUE_DATE_GRACE_HOURS: i64 = 24;

/// Error type for task operations
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task not found")]
    NotFound,

    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    /// A field failed a domain rule
    #[error("{message}")]
    Invalid { field: String, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TaskError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        TaskError::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Listing parameters as supplied by a caller
///
/// Paging is clamped, not rejected. `owner_id` is honored only by
/// [`TaskService::list_all`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    #[serde(alias = "owner")]
    pub owner_id: Option<Uuid>,
    pub search: Option<String>,
    pub sort_by: Option<TaskSortField>,
    pub order: Option<SortOrder>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl TaskQuery {
    fn into_filter(self, owner_id: Option<Uuid>) -> TaskFilter {
        let (page, limit) = clamp_paging(self.page, self.limit);
        TaskFilter {
            owner_id,
            status: self.status,
            priority: self.priority,
            search: self
                .search
                .map(|term| term.trim().to_string())
                .filter(|term| !term.is_empty()),
            sort_by: self.sort_by.unwrap_or_default(),
            order: self.order.unwrap_or_default(),
            page,
            limit,
        }
    }
}

fn normalize_title(title: &str) -> Result<String, TaskError> {
    let title = title.trim();
    let len = title.chars().count();
    if !(TITLE_MIN_LEN..=TITLE_MAX_LEN).contains(&len) {
        return Err(TaskError::invalid(
            "title",
            format!(
                "Title must be between {} and {} characters",
                TITLE_MIN_LEN, TITLE_MAX_LEN
            ),
        ));
    }
    Ok(title.to_string())
}

fn normalize_description(description: &str) -> Result<String, TaskError> {
    let description = description.trim();
    if description.chars().count() > DESCRIPTION_MAX_LEN {
        return Err(TaskError::invalid(
            "description",
            format!("Description cannot exceed {} characters", DESCRIPTION_MAX_LEN),
        ));
    }
    Ok(description.to_string())
}

fn normalize_tags(tags: Vec<String>) -> Result<Vec<String>, TaskError> {
    if tags.len() > MAX_TAGS {
        return Err(TaskError::invalid(
            "tags",
            format!("A task cannot have more than {} tags", MAX_TAGS),
        ));
    }

    tags.into_iter()
        .map(|tag| {
            let tag = tag.trim().to_string();
            let len = tag.chars().count();
            if len == 0 || len > TAG_MAX_LEN {
                Err(TaskError::invalid(
                    "tags",
                    format!("Each tag must be between 1 and {} characters", TAG_MAX_LEN),
                ))
            } else {
                Ok(tag)
            }
        })
        .collect()
}

fn check_due_date(due_date: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), TaskError> {
    if due_date < now - Duration::hours(DUE_DATE_GRACE_HOURS) {
        return Err(TaskError::invalid("dueDate", "Due date cannot be in the past"));
    }
    Ok(())
}

/// Task service
#[derive(Clone)]
pub struct TaskService {
    store: DynStore,
}

impl TaskService {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    async fn check_assignee(&self, assignee: Uuid) -> Result<(), TaskError> {
        match self.store.find_user_by_id(assignee, false).await? {
            Some(_) => Ok(()),
            None => Err(TaskError::invalid(
                "assignedTo",
                "assignedTo must reference an existing active user",
            )),
        }
    }

    /// Loads a task and checks the caller may touch it
    async fn load_for(&self, principal: &Principal, id: Uuid) -> Result<Task, TaskError> {
        let task = self.store.find_task(id).await?.ok_or(TaskError::NotFound)?;
        require_task_access(principal, task.owner_id)?;
        Ok(task)
    }

    /// Creates a task owned by the caller
    pub async fn create(&self, owner: &Principal, input: NewTask) -> Result<Task, TaskError> {
        let now = Utc::now();

        let title = normalize_title(&input.title)?;
        let description = normalize_description(input.description.as_deref().unwrap_or(""))?;
        let tags = normalize_tags(input.tags)?;
        if let Some(due_date) = input.due_date {
            check_due_date(due_date, now)?;
        }
        if let Some(assignee) = input.assigned_to {
            self.check_assignee(assignee).await?;
        }

        let status = input.status.unwrap_or_default();
        let task = Task {
            id: Uuid::new_v4(),
            title,
            description,
            status,
            priority: input.priority.unwrap_or_default(),
            due_date: input.due_date,
            tags,
            owner_id: owner.id,
            assigned_to: input.assigned_to,
            completed_at: derive_completed_at(status, None, now),
            created_at: now,
            updated_at: now,
        };

        let task = self.store.insert_task(task).await?;
        info!(task_id = %task.id, owner_id = %owner.id, "Task created");
        Ok(task)
    }

    /// Lists the caller's own tasks
    pub async fn list_own(
        &self,
        principal: &Principal,
        query: TaskQuery,
    ) -> Result<Page<Task>, TaskError> {
        let filter = query.into_filter(Some(principal.id));
        Ok(self.store.list_tasks(&filter).await?)
    }

    /// Lists every task, optionally filtered by owner (admin only)
    pub async fn list_all(
        &self,
        principal: &Principal,
        query: TaskQuery,
    ) -> Result<Page<Task>, TaskError> {
        authorize(principal, &[Role::Admin])?;
        let owner_id = query.owner_id;
        let filter = query.into_filter(owner_id);
        Ok(self.store.list_tasks(&filter).await?)
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> Result<Task, TaskError> {
        self.load_for(principal, id).await
    }

    /// Applies a partial update
    ///
    /// Fields absent from `changes` keep their value. The due date grace rule
    /// only applies at creation; an existing task may keep or receive a past
    /// due date so it can show as overdue.
    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Task, TaskError> {
        let mut task = self.load_for(principal, id).await?;
        let now = Utc::now();

        if let Some(title) = changes.title {
            task.title = normalize_title(&title)?;
        }
        if let Some(description) = changes.description {
            task.description = normalize_description(&description)?;
        }
        if let Some(priority) = changes.priority {
            task.priority = priority;
        }
        if let Some(due_date) = changes.due_date {
            task.due_date = due_date;
        }
        if let Some(tags) = changes.tags {
            task.tags = normalize_tags(tags)?;
        }
        if let Some(assigned_to) = changes.assigned_to {
            if let Some(assignee) = assigned_to {
                self.check_assignee(assignee).await?;
            }
            task.assigned_to = assigned_to;
        }
        if let Some(status) = changes.status {
            task.set_status(status, now);
        }
        task.updated_at = now;

        let task = self
            .store
            .update_task(&task)
            .await?
            .ok_or(TaskError::NotFound)?;

        debug!(task_id = %task.id, status = %task.status, "Task updated");
        Ok(task)
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> Result<(), TaskError> {
        self.load_for(principal, id).await?;

        if !self.store.delete_task(id).await? {
            return Err(TaskError::NotFound);
        }

        info!(task_id = %id, deleted_by = %principal.id, "Task deleted");
        Ok(())
    }

    /// Per-status counts: global for admins, own tasks for everyone else
    pub async fn stats(&self, principal: &Principal) -> Result<TaskStats, TaskError> {
        let owner_id = (!principal.is_admin()).then_some(principal.id);
        Ok(self.store.task_stats(owner_id).await?)
    }
}
