/// Task endpoints
///
/// # Endpoints
///
/// - `GET /api/v1/tasks` - Caller's tasks, filtered and paginated
/// - `POST /api/v1/tasks` - Create a task owned by the caller
/// - `GET /api/v1/tasks/stats` - Counts per status (global for admins)
/// - `GET /api/v1/tasks/admin/all` - Every task (admin only)
/// - `GET|PATCH|DELETE /api/v1/tasks/:id` - Owner or admin only
///
/// # Query Parameters (list endpoints)
///
/// `status`, `priority`, `search`, `sortBy`, `order`, `page`, `limit`, and
/// `owner` (admin listing only).

use axum::{
    extract::{Path, State},
    Extension,
};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    extract::{parse_id, ApiQuery, ValidatedJson},
    response::ApiResponse,
    routes::parse_due_date,
};
use taskdeck_shared::auth::principal::Principal;
use taskdeck_shared::models::task::{NewTask, TaskChanges, TaskPriority, TaskStats, TaskStatus, TaskView};
use taskdeck_shared::tasks::TaskQuery;

const INVALID_TASK_ID: &str = "Invalid task ID format";
const STATUS_RULE: &str = "Status must be one of: todo, in-progress, review, done";
const PRIORITY_RULE: &str = "Priority must be one of: low, medium, high, critical";
const DUE_DATE_RULE: &str = "Due date must be a valid ISO 8601 date";

fn validate_status(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<TaskStatus>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("status").with_message(STATUS_RULE.into()))
}

fn validate_priority(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<TaskPriority>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("priority").with_message(PRIORITY_RULE.into()))
}

fn validate_due_date(value: &str) -> Result<(), ValidationError> {
    match parse_due_date(value) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("dueDate").with_message(DUE_DATE_RULE.into())),
    }
}

/// Distinguishes an absent field from an explicit `null`
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Create task request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[validate(length(min = 3, max = 100, message = "Title must be between 3 and 100 characters"))]
    pub title: String,

    #[validate(length(max = 1000, message = "Description cannot exceed 1000 characters"))]
    pub description: Option<String>,

    #[validate(custom(function = "validate_status"))]
    pub status: Option<String>,

    #[validate(custom(function = "validate_priority"))]
    pub priority: Option<String>,

    #[validate(custom(function = "validate_due_date"))]
    pub due_date: Option<String>,

    #[validate(length(max = 10, message = "Tags must be an array of max 10 items"))]
    pub tags: Option<Vec<String>>,

    pub assigned_to: Option<Uuid>,
}

/// Partial task update
///
/// `dueDate` and `assignedTo` accept `null` to clear the value.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[validate(length(min = 3, max = 100, message = "Title must be between 3 and 100 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 1000, message = "Description cannot exceed 1000 characters"))]
    pub description: Option<String>,

    #[validate(custom(function = "validate_status"))]
    pub status: Option<String>,

    #[validate(custom(function = "validate_priority"))]
    pub priority: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<String>>,

    #[validate(length(max = 10, message = "Tags must be an array of max 10 items"))]
    pub tags: Option<Vec<String>>,

    #[serde(default, deserialize_with = "nullable")]
    pub assigned_to: Option<Option<Uuid>>,
}

fn parse_status(raw: Option<&str>) -> ApiResult<Option<TaskStatus>> {
    raw.map(|value| value.parse().map_err(|_| ApiError::invalid("status", STATUS_RULE)))
        .transpose()
}

fn parse_priority(raw: Option<&str>) -> ApiResult<Option<TaskPriority>> {
    raw.map(|value| value.parse().map_err(|_| ApiError::invalid("priority", PRIORITY_RULE)))
        .transpose()
}

impl CreateTaskRequest {
    fn into_new_task(self) -> ApiResult<NewTask> {
        let due_date = match self.due_date.as_deref() {
            Some(raw) => Some(parse_due_date(raw).ok_or_else(|| ApiError::invalid("dueDate", DUE_DATE_RULE))?),
            None => None,
        };

        Ok(NewTask {
            status: parse_status(self.status.as_deref())?,
            priority: parse_priority(self.priority.as_deref())?,
            title: self.title,
            description: self.description,
            due_date,
            tags: self.tags.unwrap_or_default(),
            assigned_to: self.assigned_to,
        })
    }
}

impl UpdateTaskRequest {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.tags.is_none()
            && self.assigned_to.is_none()
    }

    fn into_changes(self) -> ApiResult<TaskChanges> {
        let due_date = match self.due_date {
            Some(Some(raw)) => Some(Some(
                parse_due_date(&raw).ok_or_else(|| ApiError::invalid("dueDate", DUE_DATE_RULE))?,
            )),
            Some(None) => Some(None),
            None => None,
        };

        Ok(TaskChanges {
            status: parse_status(self.status.as_deref())?,
            priority: parse_priority(self.priority.as_deref())?,
            title: self.title,
            description: self.description,
            due_date,
            tags: self.tags,
            assigned_to: self.assigned_to,
        })
    }
}

/// `data` payload for single-task responses
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskData {
    pub task: TaskView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsData {
    pub stats: TaskStats,
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiQuery(query): ApiQuery<TaskQuery>,
) -> ApiResult<ApiResponse<Vec<TaskView>>> {
    let page = state.tasks.list_own(&principal, query).await?;
    Ok(ApiResponse::paginated(
        "Tasks fetched successfully",
        page.map(TaskView::from),
    ))
}

/// Admin listing across all owners, optionally narrowed with `owner`
pub async fn list_all_tasks(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiQuery(query): ApiQuery<TaskQuery>,
) -> ApiResult<ApiResponse<Vec<TaskView>>> {
    let page = state.tasks.list_all(&principal, query).await?;
    Ok(ApiResponse::paginated(
        "All tasks fetched successfully",
        page.map(TaskView::from),
    ))
}

/// Create a task owned by the caller
///
/// `status` defaults to `todo` and `priority` to `medium`. A task created
/// as `done` gets `completedAt` immediately.
pub async fn create_task(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidatedJson(req): ValidatedJson<CreateTaskRequest>,
) -> ApiResult<ApiResponse<TaskData>> {
    let task = state.tasks.create(&principal, req.into_new_task()?).await?;
    Ok(ApiResponse::created(
        "Task created successfully",
        TaskData { task: task.into() },
    ))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<TaskData>> {
    let id = parse_id(&id, INVALID_TASK_ID)?;
    let task = state.tasks.get(&principal, id).await?;
    Ok(ApiResponse::ok("Success", TaskData { task: task.into() }))
}

/// Partially update a task
///
/// Moving into `done` stamps `completedAt` once; leaving `done` clears it.
pub async fn update_task(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateTaskRequest>,
) -> ApiResult<ApiResponse<TaskData>> {
    let id = parse_id(&id, INVALID_TASK_ID)?;
    if req.is_empty() {
        return Err(ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "body".to_string(),
            message: "At least one field must be provided".to_string(),
        }]));
    }

    let task = state
        .tasks
        .update(&principal, id, req.into_changes()?)
        .await?;
    Ok(ApiResponse::ok(
        "Task updated successfully",
        TaskData { task: task.into() },
    ))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    let id = parse_id(&id, INVALID_TASK_ID)?;
    state.tasks.delete(&principal, id).await?;
    Ok(ApiResponse::message("Task deleted successfully"))
}

pub async fn task_stats(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<ApiResponse<StatsData>> {
    let stats = state.tasks.stats(&principal).await?;
    Ok(ApiResponse::ok("Success", StatsData { stats }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let clear: UpdateTaskRequest =
            serde_json::from_str(r#"{"dueDate": null, "assignedTo": null}"#).unwrap();
        assert_eq!(clear.due_date, Some(None));
        assert_eq!(clear.assigned_to, Some(None));
        assert!(!clear.is_empty());

        let absent: UpdateTaskRequest = serde_json::from_str(r#"{"title": "New title"}"#).unwrap();
        assert_eq!(absent.due_date, None);

        let changes = clear.into_changes().unwrap();
        assert_eq!(changes.due_date, Some(None));
    }

    #[test]
    fn test_create_request_rules() {
        let req: CreateTaskRequest = serde_json::from_str(
            r#"{"title": "Ok", "status": "blocked", "priority": "urgent", "dueDate": "soon"}"#,
        )
        .unwrap();

        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert_eq!(fields.len(), 4);
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("status"));
    }

    #[test]
    fn test_create_request_conversion() {
        let req: CreateTaskRequest = serde_json::from_str(
            r#"{"title": "Write report", "status": "in-progress", "dueDate": "2030-01-01", "tags": ["work"]}"#,
        )
        .unwrap();
        assert!(req.validate().is_ok());

        let task = req.into_new_task().unwrap();
        assert_eq!(task.status, Some(TaskStatus::InProgress));
        assert_eq!(task.priority, None);
        assert!(task.due_date.is_some());
        assert_eq!(task.tags, vec!["work".to_string()]);
    }
}
