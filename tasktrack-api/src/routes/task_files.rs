/// Task attachments
///
/// # Endpoints
///
/// - `POST   /task/:taskId/file/store` - Attach the multipart `file` part
/// - `DELETE /task/:taskId/file/:fileId` - Detach and remove a file
///
/// Both redirect back to the task's edit page.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::tasks::{discard_file, read_multipart, task_in_scope},
};
use axum::{
    extract::{Multipart, Path, State},
    response::Redirect,
    Extension,
};
use tasktrack_shared::{
    auth::policy::Grant,
    models::task_file::{NewTaskFile, TaskFile},
    storage::StorageError,
};
use tracing::{error, info, warn};

fn edit_page(task_id: i32) -> Redirect {
    Redirect::to(&format!("/task/{}/edit", task_id))
}

/// Stores an upload and records it against the task
///
/// # Errors
///
/// - `404`: no such task
/// - `403`: owner-only caller, task belongs to someone else
/// - `422`: no file in the body
pub async fn store(
    State(state): State<AppState>,
    Extension(grant): Extension<Grant>,
    Path(task_id): Path<i32>,
    multipart: Multipart,
) -> ApiResult<Redirect> {
    let task = task_in_scope(&state, &grant, task_id).await?;

    let (_, upload) = read_multipart(multipart).await?;
    let upload = upload.ok_or_else(|| ApiError::invalid_field("file", "A file is required"))?;

    let stored = state.store.put(&upload.file_name, &upload.data).await?;
    let path = stored.path.clone();

    match TaskFile::insert(&state.db, task.id, &NewTaskFile::from(stored)).await {
        Ok(file) => {
            info!(task_id = task.id, file_id = file.id, "File attached");
            Ok(edit_page(task.id))
        }
        Err(e) => {
            error!(task_id = task.id, error = %e, "Could not record attachment");
            discard_file(state.store.as_ref(), &path).await;
            Err(e.into())
        }
    }
}

/// Removes the stored file, then the row
///
/// A stored file that is already gone is logged and the row is still
/// deleted; any other storage failure aborts with the row intact.
///
/// # Errors
///
/// - `404`: no such task, or the file does not belong to it
/// - `403`: owner-only caller, task belongs to someone else
pub async fn destroy(
    State(state): State<AppState>,
    Extension(grant): Extension<Grant>,
    Path((task_id, file_id)): Path<(i32, i32)>,
) -> ApiResult<Redirect> {
    let task = task_in_scope(&state, &grant, task_id).await?;

    let file = TaskFile::find_for_task(&state.db, task.id, file_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("File {} not found on task {}", file_id, task.id))
        })?;

    match state.store.remove(&file.path).await {
        Ok(()) => {}
        Err(StorageError::NotFound(path)) => {
            warn!(file_id = file.id, path = %path, "Stored file already missing");
        }
        Err(e) => {
            error!(file_id = file.id, error = %e, "Could not remove stored file");
            return Err(e.into());
        }
    }

    if !TaskFile::delete(&state.db, file.id).await? {
        return Err(ApiError::NotFound(format!("File {} not found", file.id)));
    }

    info!(task_id = task.id, file_id = file.id, "File detached");
    Ok(edit_page(task.id))
}
