use actix_web::{web, HttpResponse, Responder};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::guard::CurrentUser;
use crate::error::ApiError;
use crate::models::{FolderStore, NewTask, TaskChanges, TaskPriority, TaskStatus, TaskStore};
use crate::routes::Schemas;
use crate::validation::{Schema, SchemaError, Validator};

const TASK_NOT_FOUND: &str = "Task not found or you do not have access.";
const FOLDER_NOT_FOUND: &str = "Folder not found or you do not have access.";
const INVALID_FOLDER: &str = "Invalid folder_id: Folder not found or you do not have access.";

pub(super) fn create_schema() -> Result<Schema, SchemaError> {
    Schema::build(&[
        ("title", &["required", "min:1", "max:255"]),
        ("description", &["nullable", "max:1000"]),
        ("folder_id", &["nullable", "numeric"]),
        ("status", &["required", "in:todo,in_progress,done"]),
        ("priority", &["required", "in:low,medium,high"]),
        ("due_date", &["nullable", "date_format:Y-m-d"]),
    ])
}

/// Same rules as creation; partial runs pick out the fields present in the
/// body.
pub(super) fn update_schema() -> Result<Schema, SchemaError> {
    create_schema()
}

/// Filters accepted by `GET /tasks`. `folder_id` arrives as a string so that
/// `""` and `"0"` can keep their meaning of "no folder filter".
#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    pub folder_id: Option<String>,
    pub status: Option<String>,
}

/// Creates a new task for the authenticated user.
///
/// `status` defaults to `todo` and `priority` to `medium` when absent or
/// null. A non-zero `folder_id` must name a folder the user owns; `0` and
/// `null` both mean "no folder".
///
/// ## Responses:
/// - `201 Created`: the stored task, including its joined `folder_name`.
/// - `400 Bad Request`: `folder_id` points at a folder the user cannot use.
/// - `422 Unprocessable Entity`: field validation failed.
pub async fn create_task(
    validator: web::Data<Validator>,
    schemas: web::Data<Schemas>,
    folders: web::Data<dyn FolderStore>,
    tasks: web::Data<dyn TaskStore>,
    user: CurrentUser,
    body: web::Json<Value>,
) -> Result<impl Responder, ApiError> {
    let mut payload = body.into_inner();
    apply_creation_defaults(&mut payload);
    let data = validator.validate(&schemas.task_create, &payload).await?;

    let folder_id =
        resolve_folder_id(data.opt_int("folder_id"), user.0.id, folders.get_ref()).await?;

    let task = NewTask {
        user_id: user.0.id,
        title: data.str("title").to_string(),
        description: data.opt_str("description").map(str::to_string),
        folder_id,
        status: parse_status(data.str("status"))?,
        priority: parse_priority(data.str("priority"))?,
        due_date: parse_due_date(data.opt_str("due_date"))?,
    };
    let task = tasks.create(task).await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Task created successfully",
        "task": task,
    })))
}

/// Retrieves the authenticated user's tasks, newest first.
///
/// ## Query Parameters:
/// - `folder_id` (optional): restrict to one folder. `""` and `"0"` mean no
///   restriction; anything else must be numeric and name a folder the user
///   owns.
/// - `status` (optional): restrict to one status. Unknown values simply
///   match nothing.
pub async fn get_tasks(
    folders: web::Data<dyn FolderStore>,
    tasks: web::Data<dyn TaskStore>,
    user: CurrentUser,
    query: web::Query<TaskListQuery>,
) -> Result<impl Responder, ApiError> {
    let folder_filter = match query.folder_id.as_deref() {
        None | Some("") | Some("0") => None,
        Some(raw) => match raw.parse::<i64>() {
            Ok(folder_id) => Some(folder_id),
            Err(_) => {
                return Err(ApiError::BadRequest(
                    "Invalid folder_id parameter. Must be numeric or null.".into(),
                ))
            }
        },
    };

    if let Some(folder_id) = folder_filter {
        if !folders.exists(folder_id, user.0.id).await? {
            return Err(ApiError::NotFound(FOLDER_NOT_FOUND.into()));
        }
    }

    let tasks = tasks
        .list(user.0.id, folder_filter, query.status.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Operation successful.",
        "tasks": tasks,
    })))
}

/// Fetch one task; foreign tasks look exactly like missing ones.
pub async fn get_task(
    tasks: web::Data<dyn TaskStore>,
    user: CurrentUser,
    task_id: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let task = tasks
        .find(task_id.into_inner(), user.0.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(TASK_NOT_FOUND.into()))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Operation successful.",
        "task": task,
    })))
}

/// Applies a partial update to a task the user owns.
///
/// Only fields present in the body are touched. `folder_id: 0` or `null`
/// moves the task out of its folder; a concrete id is checked for ownership
/// before the task itself is looked at, so a bad folder reports 400 even when
/// the task would have been a 404.
pub async fn update_task(
    validator: web::Data<Validator>,
    schemas: web::Data<Schemas>,
    folders: web::Data<dyn FolderStore>,
    tasks: web::Data<dyn TaskStore>,
    user: CurrentUser,
    task_id: web::Path<i64>,
    body: web::Json<Value>,
) -> Result<impl Responder, ApiError> {
    let data = validator.validate_partial(&schemas.task_update, &body).await?;
    let task_id = task_id.into_inner();

    let folder_move = if data.has("folder_id") {
        Some(resolve_folder_id(data.opt_int("folder_id"), user.0.id, folders.get_ref()).await?)
    } else {
        None
    };

    if !tasks.exists(task_id, user.0.id).await? {
        return Err(ApiError::NotFound(TASK_NOT_FOUND.into()));
    }

    let mut changes = TaskChanges {
        folder_id: folder_move,
        ..Default::default()
    };
    if data.has("title") {
        changes.title = Some(data.str("title").to_string());
    }
    if data.has("description") {
        changes.description = Some(data.opt_str("description").map(str::to_string));
    }
    if data.has("status") {
        changes.status = Some(parse_status(data.str("status"))?);
    }
    if data.has("priority") {
        changes.priority = Some(parse_priority(data.str("priority"))?);
    }
    if data.has("due_date") {
        changes.due_date = Some(parse_due_date(data.opt_str("due_date"))?);
    }

    if !tasks.update(task_id, user.0.id, changes).await? {
        return Err(ApiError::ServerError("Failed to update task.".into()));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Task updated successfully.",
    })))
}

/// Delete a task
pub async fn delete_task(
    tasks: web::Data<dyn TaskStore>,
    user: CurrentUser,
    task_id: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    if !tasks.delete(task_id.into_inner(), user.0.id).await? {
        return Err(ApiError::NotFound(TASK_NOT_FOUND.into()));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Task deleted successfully.",
    })))
}

/// Absent or null `status`/`priority` take their documented defaults before
/// validation sees the payload.
fn apply_creation_defaults(payload: &mut Value) {
    let Some(object) = payload.as_object_mut() else {
        return;
    };
    if object.get("status").map_or(true, Value::is_null) {
        object.insert("status".to_string(), json!("todo"));
    }
    if object.get("priority").map_or(true, Value::is_null) {
        object.insert("priority".to_string(), json!("medium"));
    }
}

/// `None` and `0` both mean "no folder"; anything else must be a folder the
/// user owns.
async fn resolve_folder_id(
    requested: Option<i64>,
    user_id: i64,
    folders: &dyn FolderStore,
) -> Result<Option<i64>, ApiError> {
    match requested {
        None | Some(0) => Ok(None),
        Some(folder_id) => {
            if folders.exists(folder_id, user_id).await? {
                Ok(Some(folder_id))
            } else {
                Err(ApiError::BadRequest(INVALID_FOLDER.into()))
            }
        }
    }
}

// The in/date_format rules run before these, so the error arms are
// unreachable through the public routes.
fn parse_status(text: &str) -> Result<TaskStatus, ApiError> {
    TaskStatus::parse(text)
        .ok_or_else(|| ApiError::ServerError(format!("Unsupported task status `{}`", text)))
}

fn parse_priority(text: &str) -> Result<TaskPriority, ApiError> {
    TaskPriority::parse(text)
        .ok_or_else(|| ApiError::ServerError(format!("Unsupported task priority `{}`", text)))
}

fn parse_due_date(text: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    text.map(|t| {
        NaiveDate::parse_from_str(t, "%Y-%m-%d")
            .map_err(|_| ApiError::BadRequest("Due date must be in Y-m-d format.".into()))
    })
    .transpose()
}
