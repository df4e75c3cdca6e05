/// Task pages
///
/// # Endpoints
///
/// - `GET    /task` - List tasks (all, or own with owner scope)
/// - `GET    /task/create` - Create form
/// - `POST   /task/store` - Create from a multipart form, optional `file`
/// - `GET    /task/:id/edit` - Edit form with attachments
/// - `PUT    /task/:id/update` - Overwrite name, due date, status
/// - `GET    /task/:id/delete` - Delete confirmation
/// - `DELETE /task/:id/destroy` - Delete task, its file rows and stored files
/// - `GET    /task/progress` - Tasks grouped by status
/// - `PATCH  /task/move/:id?status=` - Change status only
///
/// Every handler receives the [`Grant`] issued by the policy stage and
/// passes `grant.owner_scope()` to the model, so an owner-only caller never
/// reads or writes someone else's task. The helpers at the bottom are shared
/// with the JSON API and the attachment routes.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    middleware::auth::CurrentUser,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};
use bytes::Bytes;
use minijinja::{context, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tasktrack_shared::{
    auth::policy::Grant,
    models::{
        task::{parse_due_date, Task, TaskInput, TaskListing, TaskStatus},
        task_file::TaskFile,
    },
    progress::group_by_status,
    storage::FileStore,
};
use tracing::{error, info, warn};
use validator::Validate;

/// Task fields as submitted, before parsing
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TaskForm {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,

    /// `YYYY-MM-DD` or RFC 3339
    pub due_date: String,

    /// Defaults to `NOT_STARTED`
    #[serde(default)]
    pub status: Option<String>,
}

impl TaskForm {
    /// Validates and converts into model input
    ///
    /// # Errors
    ///
    /// `ValidationError` listing every bad field.
    pub fn parse(&self) -> ApiResult<TaskInput> {
        let trimmed = TaskForm {
            name: self.name.trim().to_string(),
            ..self.clone()
        };

        let mut details = match trimmed.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => match ApiError::from(errors) {
                ApiError::ValidationError(details) => details,
                other => return Err(other),
            },
        };

        let due_date = match parse_due_date(&self.due_date) {
            Ok(date) => Some(date),
            Err(_) => {
                details.push(ValidationErrorDetail::new(
                    "due_date",
                    "Due date must be YYYY-MM-DD or an RFC 3339 timestamp",
                ));
                None
            }
        };

        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => Some(TaskStatus::default()),
            Some(raw) => match raw.parse::<TaskStatus>() {
                Ok(status) => Some(status),
                Err(message) => {
                    details.push(ValidationErrorDetail::new("status", message));
                    None
                }
            },
        };

        match (due_date, status) {
            (Some(due_date), Some(status)) if details.is_empty() => Ok(TaskInput {
                name: trimmed.name,
                due_date,
                status,
            }),
            _ => Err(ApiError::ValidationError(details)),
        }
    }
}

/// A file part taken from a multipart body
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub data: Bytes,
}

/// Text fields and the optional `file` part of a multipart body
///
/// A file input left empty by the browser arrives as a part with no name and
/// no bytes; it counts as no upload.
pub async fn read_multipart(
    mut multipart: Multipart,
) -> ApiResult<(HashMap<String, String>, Option<Upload>)> {
    let mut fields = HashMap::new();
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "file" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await?;
            if !file_name.is_empty() && !data.is_empty() {
                upload = Some(Upload { file_name, data });
            }
        } else {
            fields.insert(name, field.text().await?);
        }
    }

    Ok((fields, upload))
}

impl TaskForm {
    pub fn from_fields(fields: &mut HashMap<String, String>) -> Self {
        TaskForm {
            name: fields.remove("name").unwrap_or_default(),
            due_date: fields.remove("due_date").unwrap_or_default(),
            status: fields.remove("status"),
        }
    }
}

/// Stores the upload, then inserts the task and its file row together
///
/// If the insert fails the stored file is removed again before the error is
/// returned.
pub async fn store_task(
    state: &AppState,
    owner_id: i32,
    input: TaskInput,
    upload: Option<Upload>,
) -> ApiResult<(Task, Option<TaskFile>)> {
    let stored = match &upload {
        Some(upload) => Some(state.store.put(&upload.file_name, &upload.data).await?),
        None => None,
    };

    let stored_path = stored.as_ref().map(|s| s.path.clone());

    match Task::create(&state.db, owner_id, input, stored.map(Into::into)).await {
        Ok(created) => {
            info!(task_id = created.0.id, owner_id, "Task stored");
            Ok(created)
        }
        Err(e) => {
            error!(error = %e, owner_id, "Task insert failed");
            if let Some(path) = stored_path {
                discard_file(state.store.as_ref(), &path).await;
            }
            Err(e.into())
        }
    }
}

/// Best-effort removal of a stored file; failures are logged
pub async fn discard_file(store: &dyn FileStore, path: &str) {
    if let Err(e) = store.remove(path).await {
        warn!(path, error = %e, "Could not remove stored file");
    }
}

/// Turns a scoped miss into 404 (no such task) or 403 (not the caller's)
pub async fn scoped_miss(state: &AppState, grant: &Grant, task_id: i32) -> ApiError {
    match Task::owner_of(&state.db, task_id).await {
        Ok(None) => ApiError::NotFound(format!("Task {} not found", task_id)),
        Ok(Some(owner)) => match grant.ensure_covers(owner) {
            Err(e) => e.into(),
            // Changed between the scoped statement and this lookup
            Ok(()) => ApiError::Conflict(format!("Task {} changed concurrently", task_id)),
        },
        Err(e) => e.into(),
    }
}

/// Deletes a task and its file rows, then unlinks the stored files
///
/// Unlink failures are logged and do not undo the committed delete.
pub async fn destroy_task(state: &AppState, grant: &Grant, task_id: i32) -> ApiResult<()> {
    let Some(paths) = Task::delete_with_files(&state.db, task_id, grant.owner_scope()).await? else {
        return Err(scoped_miss(state, grant, task_id).await);
    };

    for path in &paths {
        discard_file(state.store.as_ref(), path).await;
    }

    info!(task_id, files = paths.len(), "Task destroyed");
    Ok(())
}

/// Loads a task for a file operation, enforcing the grant's owner scope
pub async fn task_in_scope(state: &AppState, grant: &Grant, task_id: i32) -> ApiResult<Task> {
    let task = Task::find_by_id(&state.db, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Task {} not found", task_id)))?;

    grant.ensure_covers(task.user_id)?;
    Ok(task)
}

/// `[{value, label}]` for status pickers
pub fn status_options() -> Vec<Value> {
    TaskStatus::ALL
        .into_iter()
        .map(|s| context! { value => s.as_str(), label => s.label() })
        .collect()
}

fn user_context(user: &CurrentUser) -> Value {
    context! { id => user.id, name => user.name }
}

fn create_page(
    state: &AppState,
    user: &CurrentUser,
    status: StatusCode,
    form: &TaskForm,
    errors: &[ValidationErrorDetail],
) -> ApiResult<Response> {
    let page = state.views.render(
        "task/create.html",
        context! {
            user => user_context(user),
            form => form,
            statuses => status_options(),
            errors => errors,
        },
    )?;
    Ok((status, page).into_response())
}

async fn edit_page(
    state: &AppState,
    user: &CurrentUser,
    status: StatusCode,
    task: &TaskListing,
    form: &TaskForm,
    errors: &[ValidationErrorDetail],
) -> ApiResult<Response> {
    let files = TaskFile::list_by_task(&state.db, task.id).await?;

    let page = state.views.render(
        "task/edit.html",
        context! {
            user => user_context(user),
            task => task,
            files => files,
            form => form,
            statuses => status_options(),
            errors => errors,
        },
    )?;
    Ok((status, page).into_response())
}

fn form_from(task: &TaskListing) -> TaskForm {
    TaskForm {
        name: task.name.clone(),
        due_date: task.due_date.format("%Y-%m-%d").to_string(),
        status: Some(task.status.as_str().to_string()),
    }
}

async fn listing_in_scope(state: &AppState, grant: &Grant, id: i32) -> ApiResult<TaskListing> {
    match Task::find_listing(&state.db, id, grant.owner_scope()).await? {
        Some(task) => Ok(task),
        None => Err(scoped_miss(state, grant, id).await),
    }
}

pub async fn index(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Extension(grant): Extension<Grant>,
) -> ApiResult<Html<String>> {
    let tasks = Task::list(&state.db, grant.owner_scope()).await?;

    state.views.render(
        "task/index.html",
        context! {
            user => user_context(&user),
            tasks => tasks,
            own_only => grant.owner_scope().is_some(),
        },
    )
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Response> {
    create_page(&state, &user, StatusCode::OK, &TaskForm::default(), &[])
}

pub async fn store(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let (mut fields, upload) = read_multipart(multipart).await?;
    let form = TaskForm::from_fields(&mut fields);

    let input = match form.parse() {
        Ok(input) => input,
        Err(ApiError::ValidationError(errors)) => {
            return create_page(&state, &user, StatusCode::UNPROCESSABLE_ENTITY, &form, &errors);
        }
        Err(e) => return Err(e),
    };

    store_task(&state, user.id, input, upload).await?;
    Ok(Redirect::to("/task").into_response())
}

pub async fn edit(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Extension(grant): Extension<Grant>,
    Path(id): Path<i32>,
) -> ApiResult<Response> {
    let task = listing_in_scope(&state, &grant, id).await?;
    edit_page(&state, &user, StatusCode::OK, &task, &form_from(&task), &[]).await
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Extension(grant): Extension<Grant>,
    Path(id): Path<i32>,
    Form(form): Form<TaskForm>,
) -> ApiResult<Response> {
    let input = match form.parse() {
        Ok(input) => input,
        Err(ApiError::ValidationError(errors)) => {
            let task = listing_in_scope(&state, &grant, id).await?;
            return edit_page(
                &state,
                &user,
                StatusCode::UNPROCESSABLE_ENTITY,
                &task,
                &form,
                &errors,
            )
            .await;
        }
        Err(e) => return Err(e),
    };

    if Task::update(&state.db, id, grant.owner_scope(), input).await?.is_none() {
        return Err(scoped_miss(&state, &grant, id).await);
    }

    info!(task_id = id, user_id = user.id, "Task updated");
    Ok(Redirect::to("/task").into_response())
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Extension(grant): Extension<Grant>,
    Path(id): Path<i32>,
) -> ApiResult<Html<String>> {
    let task = listing_in_scope(&state, &grant, id).await?;
    let files = TaskFile::list_by_task(&state.db, id).await?;

    state.views.render(
        "task/delete.html",
        context! { user => user_context(&user), task => task, files => files },
    )
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(grant): Extension<Grant>,
    Path(id): Path<i32>,
) -> ApiResult<Redirect> {
    destroy_task(&state, &grant, id).await?;
    Ok(Redirect::to("/task"))
}

pub async fn progress(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Extension(grant): Extension<Grant>,
) -> ApiResult<Html<String>> {
    let tasks = Task::list(&state.db, grant.owner_scope()).await?;

    let columns: Vec<Value> = group_by_status(tasks, |t| t.status)
        .into_iter()
        .map(|(status, tasks)| {
            context! {
                status => status.as_str(),
                label => status.label(),
                tasks => tasks,
            }
        })
        .collect();

    state.views.render(
        "task/progress.html",
        context! {
            user => user_context(&user),
            columns => columns,
            statuses => status_options(),
        },
    )
}

#[derive(Debug, Deserialize)]
pub struct MoveQuery {
    pub status: String,
}

/// Status-only update
///
/// # Errors
///
/// - `422`: unknown status
/// - `403`: owner-only caller, task belongs to someone else
/// - `404`: no such task
pub async fn move_task(
    State(state): State<AppState>,
    Extension(grant): Extension<Grant>,
    Path(id): Path<i32>,
    Query(query): Query<MoveQuery>,
) -> ApiResult<Redirect> {
    let status = query
        .status
        .trim()
        .parse::<TaskStatus>()
        .map_err(|message| ApiError::invalid_field("status", message))?;

    let Some(task) = Task::update_status(&state.db, id, grant.owner_scope(), status).await? else {
        return Err(scoped_miss(&state, &grant, id).await);
    };

    info!(task_id = task.id, status = %task.status, "Task moved");
    Ok(Redirect::to("/task/progress"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn form(name: &str, due: &str, status: Option<&str>) -> TaskForm {
        TaskForm {
            name: name.to_string(),
            due_date: due.to_string(),
            status: status.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_defaults_status() {
        let input = form("  Write report ", "2025-01-31", None).parse().unwrap();
        assert_eq!(input.name, "Write report");
        assert_eq!(input.due_date, NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
        assert_eq!(input.status, TaskStatus::NotStarted);

        let input = form("x", "2025-01-31", Some("")).parse().unwrap();
        assert_eq!(input.status, TaskStatus::NotStarted);
    }

    #[test]
    fn test_parse_accepts_rfc3339_and_status() {
        let input = form("x", "2025-01-31T10:00:00Z", Some("IN_PROGRESS"))
            .parse()
            .unwrap();
        assert_eq!(input.status, TaskStatus::InProgress);
        assert_eq!(input.due_date, NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
    }

    #[test]
    fn test_parse_collects_every_bad_field() {
        match form("", "someday", Some("DONE")).parse() {
            Err(ApiError::ValidationError(details)) => {
                let fields: Vec<&str> = details.iter().map(|d| d.field.as_str()).collect();
                assert_eq!(fields, vec!["name", "due_date", "status"]);
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_blank_name() {
        assert!(form("   ", "2025-01-31", None).parse().is_err());
    }

    #[test]
    fn test_parse_rejects_long_name() {
        let name = "x".repeat(256);
        assert!(form(&name, "2025-01-31", None).parse().is_err());
        let name = "x".repeat(255);
        assert!(form(&name, "2025-01-31", None).parse().is_ok());
    }

    #[test]
    fn test_from_fields() {
        let mut fields = HashMap::from([
            ("name".to_string(), "A".to_string()),
            ("due_date".to_string(), "2025-02-01".to_string()),
        ]);
        let form = TaskForm::from_fields(&mut fields);
        assert_eq!(form.name, "A");
        assert_eq!(form.status, None);
        assert!(fields.is_empty());
    }

    #[test]
    fn test_status_options_in_order() {
        let options = status_options();
        assert_eq!(options.len(), 3);
        assert_eq!(options[0].get_attr("value").unwrap().as_str(), Some("NOT_STARTED"));
        assert_eq!(options[2].get_attr("label").unwrap().as_str(), Some("Completed"));
    }
}
