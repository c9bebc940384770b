/// PostgreSQL store
///
/// All queries go through sqlx's runtime API (`query_as` + `bind`) so the
/// crate builds without a live database. Dynamic task filters are assembled
/// with [`sqlx::QueryBuilder`]; sort columns come from a closed enum and are
/// never interpolated from user input.
///
/// # Example
///
/// ```no_run
/// use taskdeck_shared::db::pool::{create_pool, DatabaseConfig};
/// use taskdeck_shared::store::{postgres::PgStore, UserStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// })
/// .await?;
///
/// let store = PgStore::new(pool);
/// store.ping().await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{ProgressStore, StoreError, StoreResult, TaskStore, UserStore};
use crate::models::{
    page::{offset, Page},
    task::{Task, TaskFilter, TaskStats, TaskStatus},
    user::{NewUser, User, UserChanges, UserQuery},
};
use crate::progress::{ProgressRow, ProgressScope};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, is_active, refresh_token_hash, \
     last_login_at, password_changed_at, created_at, updated_at";

const TASK_COLUMNS: &str = "id, title, description, status, priority, due_date, tags, owner_id, \
     assigned_to, completed_at, created_at, updated_at";

/// PostgreSQL-backed [`Store`](super::Store)
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Escapes `%`, `_` and `\` so the term matches literally inside `ILIKE`
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn push_task_conditions(builder: &mut QueryBuilder<'_, Postgres>, filter: &TaskFilter) {
    builder.push(" WHERE TRUE");

    if let Some(owner_id) = filter.owner_id {
        builder.push(" AND owner_id = ").push_bind(owner_id);
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(priority) = filter.priority {
        builder.push(" AND priority = ").push_bind(priority);
    }
    if let Some(term) = filter.search.as_deref().filter(|term| !term.is_empty()) {
        let pattern = like_pattern(term);
        builder
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn conflict_on_email(err: sqlx::Error, email: &str) -> StoreError {
    match StoreError::from(err) {
        StoreError::Conflict { field, .. } => StoreError::Conflict {
            field,
            value: email.to_string(),
        },
        other => other,
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_user.name)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(new_user.role)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_email(e, &new_user.email))
    }

    async fn find_user_by_id(&self, id: Uuid, include_inactive: bool) -> StoreResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND (is_active OR $2)"
        );

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(include_inactive)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_user_by_email(
        &self,
        email: &str,
        include_inactive: bool,
    ) -> StoreResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND (is_active OR $2)"
        );

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .bind(include_inactive)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>> {
        let sql = format!(
            "UPDATE users \
             SET name = COALESCE($2, name), email = COALESCE($3, email), updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let email = changes.email.clone().unwrap_or_default();

        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| conflict_on_email(e, &email))
    }

    async fn list_users(&self, query: &UserQuery) -> StoreResult<Page<User>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE TRUE");
        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users WHERE TRUE"));

        for builder in [&mut count, &mut select] {
            if !query.include_inactive {
                builder.push(" AND is_active");
            }
            if let Some(role) = query.role {
                builder.push(" AND role = ").push_bind(role);
            }
        }

        select
            .push(" ORDER BY created_at DESC, id ASC LIMIT ")
            .push_bind(i64::from(query.limit))
            .push(" OFFSET ")
            .push_bind(offset(query.page, query.limit));

        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        let items = select
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items,
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    async fn record_login(&self, id: Uuid, refresh_token_hash: &str) -> StoreResult<Option<User>> {
        let sql = format!(
            "UPDATE users \
             SET refresh_token_hash = $2, last_login_at = NOW(), updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(refresh_token_hash)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        replacement: &str,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token_hash = $3, updated_at = NOW()
            WHERE id = $1 AND is_active AND refresh_token_hash = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(replacement)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn clear_refresh_token(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token_hash = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        changed_at: DateTime<Utc>,
        refresh_token_hash: &str,
    ) -> StoreResult<Option<User>> {
        let sql = format!(
            "UPDATE users \
             SET password_hash = $2, password_changed_at = $3, refresh_token_hash = $4, \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(password_hash)
            .bind(changed_at)
            .bind(refresh_token_hash)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn deactivate_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!(
            "UPDATE users \
             SET is_active = FALSE, refresh_token_hash = NULL, updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn ping(&self) -> StoreResult<()> {
        crate::db::pool::health_check(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn insert_task(&self, task: Task) -> StoreResult<Task> {
        let sql = format!(
            "INSERT INTO tasks ({TASK_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {TASK_COLUMNS}"
        );

        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(task.id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.status)
            .bind(task.priority)
            .bind(task.due_date)
            .bind(&task.tags)
            .bind(task.owner_id)
            .bind(task.assigned_to)
            .bind(task.completed_at)
            .bind(task.created_at)
            .bind(task.updated_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(task)
    }

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1");

        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(task)
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> StoreResult<Page<Task>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tasks");
        push_task_conditions(&mut count, filter);

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {TASK_COLUMNS} FROM tasks"));
        push_task_conditions(&mut select, filter);
        select
            .push(format!(
                " ORDER BY {} {} NULLS LAST, id ASC LIMIT ",
                filter.sort_by.column(),
                filter.order.keyword()
            ))
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(offset(filter.page, filter.limit));

        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        let items = select
            .build_query_as::<Task>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items,
            total,
            page: filter.page,
            limit: filter.limit,
        })
    }

    async fn update_task(&self, task: &Task) -> StoreResult<Option<Task>> {
        let sql = format!(
            "UPDATE tasks \
             SET title = $2, description = $3, status = $4, priority = $5, due_date = $6, \
                 tags = $7, assigned_to = $8, completed_at = $9, updated_at = $10 \
             WHERE id = $1 RETURNING {TASK_COLUMNS}"
        );

        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(task.id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.status)
            .bind(task.priority)
            .bind(task.due_date)
            .bind(&task.tags)
            .bind(task.assigned_to)
            .bind(task.completed_at)
            .bind(task.updated_at)
            .fetch_optional(&self.pool)
            .await?;

        Ok(task)
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn task_stats(&self, owner_id: Option<Uuid>) -> StoreResult<TaskStats> {
        let rows: Vec<(TaskStatus, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*)
            FROM tasks
            WHERE ($1::uuid IS NULL OR owner_id = $1)
            GROUP BY status
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = TaskStats::default();
        for (status, count) in rows {
            stats.record(status, count);
        }
        Ok(stats)
    }
}

#[async_trait]
impl ProgressStore for PgStore {
    async fn progress_rows(&self, scope: ProgressScope) -> StoreResult<Vec<ProgressRow>> {
        let mut builder = QueryBuilder::<Postgres>::new(
            r#"
            SELECT u.id AS user_id,
                   u.name,
                   u.email,
                   COUNT(t.id) AS total_tasks,
                   COUNT(t.id) FILTER (WHERE t.status = 'done') AS completed_tasks
            FROM users u
            LEFT JOIN tasks t ON t.owner_id = u.id
            "#,
        );

        match scope {
            ProgressScope::AllUsers { include_inactive: true } => {}
            ProgressScope::AllUsers { include_inactive: false } => {
                builder.push(" WHERE u.is_active");
            }
            ProgressScope::SingleUser(id) => {
                builder.push(" WHERE u.id = ").push_bind(id);
            }
        }
        builder.push(" GROUP BY u.id, u.name, u.email ORDER BY u.name ASC");

        let rows = builder
            .build_query_as::<ProgressRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}
