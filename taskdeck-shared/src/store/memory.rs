/// In-memory store
///
/// Keeps users and tasks in hash maps behind a single `tokio::sync::RwLock`.
/// Every write takes the lock once, so compare-and-swap operations such as
/// [`UserStore::rotate_refresh_token`] are atomic just like their SQL
/// counterparts.
///
/// Used by the test suites and by `STORAGE_BACKEND=memory` for local runs.
/// Nothing is persisted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{cmp::Ordering, collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ProgressStore, StoreError, StoreResult, TaskStore, UserStore};
use crate::models::{
    page::{offset, Page},
    task::{SortOrder, Task, TaskFilter, TaskSortField, TaskStats, TaskStatus},
    user::{NewUser, User, UserChanges, UserQuery},
};
use crate::progress::{ProgressRow, ProgressScope};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    tasks: HashMap<Uuid, Task>,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|user| user.email == email && Some(user.id) != except)
    }
}

/// In-memory [`Store`](super::Store) implementation
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T>(items: Vec<T>, page: u32, limit: u32) -> Page<T> {
    let total = items.len() as i64;
    let skip = usize::try_from(offset(page, limit)).unwrap_or(usize::MAX);
    Page {
        items: items.into_iter().skip(skip).take(limit as usize).collect(),
        total,
        page,
        limit,
    }
}

/// `None` sorts last regardless of direction, like `NULLS LAST`
fn compare_tasks(a: &Task, b: &Task, field: TaskSortField, order: SortOrder) -> Ordering {
    fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }

    let primary = match field {
        TaskSortField::CreatedAt => directed(a.created_at.cmp(&b.created_at), order),
        TaskSortField::UpdatedAt => directed(a.updated_at.cmp(&b.updated_at), order),
        TaskSortField::Priority => directed(a.priority.cmp(&b.priority), order),
        TaskSortField::Title => directed(a.title.cmp(&b.title), order),
        TaskSortField::Status => directed(
            status_rank(a.status).cmp(&status_rank(b.status)),
            order,
        ),
        TaskSortField::DueDate => match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => directed(x.cmp(&y), order),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

fn status_rank(status: TaskStatus) -> usize {
    TaskStatus::ALL
        .iter()
        .position(|candidate| *candidate == status)
        .unwrap_or(0)
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;

        if tables.email_taken(&new_user.email, None) {
            return Err(StoreError::Conflict {
                field: "email".to_string(),
                value: new_user.email,
            });
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            role: new_user.role,
            is_active: true,
            refresh_token_hash: None,
            last_login_at: None,
            password_changed_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid, include_inactive: bool) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .get(&id)
            .filter(|user| include_inactive || user.is_active)
            .cloned())
    }

    async fn find_user_by_email(
        &self,
        email: &str,
        include_inactive: bool,
    ) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|user| user.email == email && (include_inactive || user.is_active))
            .cloned())
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;

        if let Some(email) = changes.email.as_deref() {
            if tables.email_taken(email, Some(id)) {
                return Err(StoreError::Conflict {
                    field: "email".to_string(),
                    value: email.to_string(),
                });
            }
        }

        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn list_users(&self, query: &UserQuery) -> StoreResult<Page<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|user| query.include_inactive || user.is_active)
            .filter(|user| query.role.map_or(true, |role| user.role == role))
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(paginate(users, query.page, query.limit))
    }

    async fn record_login(&self, id: Uuid, refresh_token_hash: &str) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };

        let now = Utc::now();
        user.refresh_token_hash = Some(refresh_token_hash.to_string());
        user.last_login_at = Some(now);
        user.updated_at = now;

        Ok(Some(user.clone()))
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        replacement: &str,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&id) {
            Some(user)
                if user.is_active && user.refresh_token_hash.as_deref() == Some(expected) =>
            {
                user.refresh_token_hash = Some(replacement.to_string());
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear_refresh_token(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.refresh_token_hash = None;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        changed_at: DateTime<Utc>,
        refresh_token_hash: &str,
    ) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };

        user.password_hash = password_hash.to_string();
        user.password_changed_at = Some(changed_at);
        user.refresh_token_hash = Some(refresh_token_hash.to_string());
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn deactivate_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };

        user.is_active = false;
        user.refresh_token_hash = None;
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, task: Task) -> StoreResult<Task> {
        let mut tables = self.tables.write().await;
        if tables.tasks.contains_key(&task.id) {
            return Err(StoreError::Conflict {
                field: "id".to_string(),
                value: task.id.to_string(),
            });
        }
        tables.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        let tables = self.tables.read().await;
        Ok(tables.tasks.get(&id).cloned())
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> StoreResult<Page<Task>> {
        let tables = self.tables.read().await;
        let mut tasks: Vec<Task> = tables
            .tasks
            .values()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| compare_tasks(a, b, filter.sort_by, filter.order));

        Ok(paginate(tasks, filter.page, filter.limit))
    }

    async fn update_task(&self, task: &Task) -> StoreResult<Option<Task>> {
        let mut tables = self.tables.write().await;
        match tables.tasks.get_mut(&task.id) {
            Some(stored) => {
                *stored = task.clone();
                Ok(Some(stored.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.tasks.remove(&id).is_some())
    }

    async fn task_stats(&self, owner_id: Option<Uuid>) -> StoreResult<TaskStats> {
        let tables = self.tables.read().await;
        let mut stats = TaskStats::default();
        tables
            .tasks
            .values()
            .filter(|task| owner_id.map_or(true, |owner| task.owner_id == owner))
            .for_each(|task| stats.record(task.status, 1));
        Ok(stats)
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn progress_rows(&self, scope: ProgressScope) -> StoreResult<Vec<ProgressRow>> {
        let tables = self.tables.read().await;

        let mut counts: HashMap<Uuid, (i64, i64)> = HashMap::new();
        for task in tables.tasks.values() {
            let entry = counts.entry(task.owner_id).or_default();
            entry.0 += 1;
            if task.status == TaskStatus::Done {
                entry.1 += 1;
            }
        }

        let mut rows: Vec<ProgressRow> = tables
            .users
            .values()
            .filter(|user| match scope {
                ProgressScope::AllUsers { include_inactive } => include_inactive || user.is_active,
                ProgressScope::SingleUser(id) => user.id == id,
            })
            .map(|user| {
                let (total, completed) = counts.get(&user.id).copied().unwrap_or_default();
                ProgressRow {
                    user_id: user.id,
                    name: user.name.clone(),
                    email: user.email.clone(),
                    total_tasks: total,
                    completed_tasks: completed,
                }
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(rows)
    }
}
