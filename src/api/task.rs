use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::task::{Task, TaskPriority, TaskStatus},
    service::Services,
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, MySqlPool};
use utoipa::ToSchema;

const TASK_VIEW_SELECT: &str = r#"
    SELECT
        t.id, t.title, t.description, t.assigned_by_id, t.assigned_to_id, t.due_date,
        t.status, t.priority, t.notes, t.completion_notes, t.completed_at, t.created_at,
        b.name AS assigned_by_name, b.nip AS assigned_by_nip,
        a.name AS assigned_to_name, a.nip AS assigned_to_nip
    FROM tasks t
    LEFT JOIN users b ON b.id = t.assigned_by_id
    LEFT JOIN users a ON a.id = t.assigned_to_id
"#;

#[derive(Deserialize, ToSchema)]
pub struct CreateTask {
    #[schema(example = "Prepare monthly report")]
    pub title: String,
    pub description: Option<String>,
    #[schema(example = 42)]
    pub assigned_to_id: u64,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: TaskPriority,
    pub notes: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateTaskStatus {
    #[schema(example = "completed")]
    pub status: TaskStatus,
    pub completion_notes: Option<String>,
}

/// A task with both parties' names.
#[derive(Serialize, FromRow, ToSchema)]
pub struct TaskView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub task: Task,
    pub assigned_by_name: Option<String>,
    pub assigned_by_nip: Option<String>,
    pub assigned_to_name: Option<String>,
    pub assigned_to_nip: Option<String>,
}

fn validate_new_task(payload: &CreateTask, now: DateTime<Utc>) -> Result<(), AppError> {
    if payload.title.trim().is_empty() {
        return Err(AppError::BadRequest("Title must not be empty".to_string()));
    }
    if payload.due_date.is_some_and(|due| due < now) {
        return Err(AppError::BadRequest("Due date is in the past".to_string()));
    }
    Ok(())
}

fn db_error(e: sqlx::Error, what: &'static str) -> actix_web::Error {
    tracing::error!(error = %e, "{what}");
    actix_web::error::ErrorInternalServerError("Internal Server Error")
}

async fn fetch_view(pool: &MySqlPool, id: u64) -> actix_web::Result<TaskView> {
    let sql = format!("{TASK_VIEW_SELECT} WHERE t.id = ?");
    sqlx::query_as::<_, TaskView>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| db_error(e, "Failed to fetch task"))?
        .ok_or_else(|| AppError::NotFound("Task").into())
}

#[utoipa::path(
    post,
    path = "/api/task/submit",
    request_body = CreateTask,
    responses(
        (status = 200, description = "Task assigned", body = Object, example = json!({
            "message": "Task submitted successfully",
            "task_id": 7
        })),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Assignee not found"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Task"
)]
pub async fn submit_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    services: web::Data<Services>,
    payload: web::Json<CreateTask>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    validate_new_task(&payload, Utc::now())?;

    let assignee_active = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ? AND is_active = TRUE)",
    )
    .bind(payload.assigned_to_id)
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "Failed to look up assignee"))?;
    if !assignee_active {
        return Err(AppError::NotFound("User").into());
    }

    let result = sqlx::query(
        r#"
        INSERT INTO tasks
            (title, description, assigned_by_id, assigned_to_id, due_date, status, priority, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(auth.user_id)
    .bind(payload.assigned_to_id)
    .bind(payload.due_date)
    .bind(TaskStatus::Pending.as_ref())
    .bind(payload.priority.as_ref())
    .bind(&payload.notes)
    .execute(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "Failed to create task"))?;

    let task_id = result.last_insert_id();
    let view = fetch_view(pool.get_ref(), task_id).await?;
    services.notifier.task_assigned(&view.task);

    Ok(HttpResponse::Ok().json(json!({
        "message": "Task submitted successfully",
        "task_id": task_id,
    })))
}

#[utoipa::path(
    get,
    path = "/api/task/assigned-to-me",
    responses(
        (status = 200, description = "Tasks assigned to the caller, newest first", body = [TaskView]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Task"
)]
pub async fn assigned_to_me(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let sql = format!("{TASK_VIEW_SELECT} WHERE t.assigned_to_id = ? ORDER BY t.created_at DESC");
    let tasks = sqlx::query_as::<_, TaskView>(&sql)
        .bind(auth.user_id)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to list assigned tasks"))?;

    Ok(HttpResponse::Ok().json(json!({ "tasks": tasks })))
}

#[utoipa::path(
    get,
    path = "/api/task/assigned-by-me",
    responses(
        (status = 200, description = "Tasks the caller handed out, newest first", body = [TaskView]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Task"
)]
pub async fn assigned_by_me(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let sql = format!("{TASK_VIEW_SELECT} WHERE t.assigned_by_id = ? ORDER BY t.created_at DESC");
    let tasks = sqlx::query_as::<_, TaskView>(&sql)
        .bind(auth.user_id)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to list handed out tasks"))?;

    Ok(HttpResponse::Ok().json(json!({ "tasks": tasks })))
}

/// Only the assignee can move a task; `completed` stamps `completed_at`
#[utoipa::path(
    post,
    path = "/api/task/{task_id}/update-status",
    params(
        ("task_id" = u64, Path, description = "ID of the task")
    ),
    request_body = UpdateTaskStatus,
    responses(
        (status = 200, description = "Status updated", body = TaskView),
        (status = 403, description = "Not the assignee"),
        (status = 404, description = "Task not found"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Task"
)]
pub async fn update_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    services: web::Data<Services>,
    path: web::Path<u64>,
    payload: web::Json<UpdateTaskStatus>,
) -> actix_web::Result<impl Responder> {
    let task_id = path.into_inner();
    let current = fetch_view(pool.get_ref(), task_id).await?;
    if current.task.assigned_to_id != auth.user_id {
        return Err(
            AppError::Forbidden("You can only update tasks assigned to you".to_string()).into(),
        );
    }

    let completed_at = (payload.status == TaskStatus::Completed).then(Utc::now);

    sqlx::query(
        r#"
        UPDATE tasks
        SET status = ?,
            completion_notes = ?,
            completed_at = COALESCE(?, completed_at),
            updated_at = NOW()
        WHERE id = ?
        "#,
    )
    .bind(payload.status.as_ref())
    .bind(&payload.completion_notes)
    .bind(completed_at)
    .bind(task_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "Failed to update task status"))?;

    let updated = fetch_view(pool.get_ref(), task_id).await?;
    if updated.task.status == TaskStatus::Completed {
        services.notifier.task_completed(&updated.task);
    }

    Ok(HttpResponse::Ok().json(updated))
}

#[utoipa::path(
    get,
    path = "/api/task/{task_id}",
    params(
        ("task_id" = u64, Path, description = "ID of the task")
    ),
    responses(
        (status = 200, description = "Task detail", body = TaskView),
        (status = 403, description = "Neither assignee nor assigner"),
        (status = 404, description = "Task not found"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Task"
)]
pub async fn task_detail(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let view = fetch_view(pool.get_ref(), path.into_inner()).await?;
    if view.task.assigned_to_id != auth.user_id && view.task.assigned_by_id != auth.user_id {
        return Err(AppError::Forbidden("You don't have access to this task".to_string()).into());
    }
    Ok(HttpResponse::Ok().json(view))
}
