/// JSON task API
///
/// # Endpoints
///
/// - `GET    /api/v1/task` - List tasks
/// - `POST   /api/v1/task/store` - Create (multipart: `name`, `due_date`, `status`, optional `file`)
/// - `GET    /api/v1/task/:id` - One task with its files
/// - `PUT    /api/v1/task/:id` - Overwrite (JSON body)
/// - `DELETE /api/v1/task/:id` - Delete with files
///
/// Authenticated by Bearer token or session cookie; the same policy table
/// as the HTML pages applies.
///
/// # Response
///
/// ```json
/// {
///   "message": "Task created",
///   "data": { "id": 1, "name": "Write report", "status": "NOT_STARTED", ... },
///   "code": 201
/// }
/// ```
///
/// Errors use the standard error body, which also carries `message` and
/// `code`.

use crate::{
    app::AppState,
    error::ApiResult,
    middleware::auth::CurrentUser,
    routes::tasks::{destroy_task, read_multipart, scoped_miss, store_task, TaskForm},
};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use tasktrack_shared::{
    auth::policy::Grant,
    models::{
        task::{Task, TaskListing},
        task_file::TaskFile,
    },
};

/// Success envelope
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub message: String,
    pub data: T,
    pub code: u16,
}

fn respond<T: Serialize>(status: StatusCode, message: &str, data: T) -> Response {
    (
        status,
        Json(Envelope {
            message: message.to_string(),
            data,
            code: status.as_u16(),
        }),
    )
        .into_response()
}

/// Task with its attachments
#[derive(Debug, Serialize)]
pub struct TaskDetail<T> {
    #[serde(flatten)]
    pub task: T,
    pub files: Vec<TaskFile>,
}

pub async fn index(
    State(state): State<AppState>,
    Extension(grant): Extension<Grant>,
) -> ApiResult<Response> {
    let tasks = Task::list(&state.db, grant.owner_scope()).await?;
    Ok(respond(StatusCode::OK, "Tasks retrieved", tasks))
}

pub async fn store(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let (mut fields, upload) = read_multipart(multipart).await?;
    let input = TaskForm::from_fields(&mut fields).parse()?;

    let (task, file) = store_task(&state, user.id, input, upload).await?;

    Ok(respond(
        StatusCode::CREATED,
        "Task created",
        TaskDetail {
            task,
            files: file.into_iter().collect(),
        },
    ))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(grant): Extension<Grant>,
    Path(id): Path<i32>,
) -> ApiResult<Response> {
    let task: TaskListing = match Task::find_listing(&state.db, id, grant.owner_scope()).await? {
        Some(task) => task,
        None => return Err(scoped_miss(&state, &grant, id).await),
    };
    let files = TaskFile::list_by_task(&state.db, id).await?;

    Ok(respond(StatusCode::OK, "Task retrieved", TaskDetail { task, files }))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(grant): Extension<Grant>,
    Path(id): Path<i32>,
    Json(form): Json<TaskForm>,
) -> ApiResult<Response> {
    let input = form.parse()?;

    let Some(task) = Task::update(&state.db, id, grant.owner_scope(), input).await? else {
        return Err(scoped_miss(&state, &grant, id).await);
    };

    Ok(respond(StatusCode::OK, "Task updated", task))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(grant): Extension<Grant>,
    Path(id): Path<i32>,
) -> ApiResult<Response> {
    destroy_task(&state, &grant, id).await?;
    Ok(respond(StatusCode::OK, "Task deleted", serde_json::Value::Null))
}
