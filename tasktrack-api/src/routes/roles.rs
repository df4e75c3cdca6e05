/// Role management pages
///
/// # Endpoints
///
/// - `GET    /role` - Roles with their permissions
/// - `GET    /role/create` - Create form
/// - `POST   /role/store` - Create role and grants
/// - `GET    /role/:id/edit` - Edit form
/// - `PUT    /role/:id/update` - Rename and replace grants
/// - `GET    /role/:id/delete` - Delete confirmation
/// - `DELETE /role/:id/destroy` - Delete grants and role
///
/// Writes redirect to `/role` on success. On failure they redirect back to
/// the originating page with `?error=<code>`, which the page renders as a
/// message; see [`RoleFormError`].

use crate::{app::AppState, error::ApiError, error::ApiResult, middleware::auth::CurrentUser};
use axum::{
    extract::{Path, Query, State},
    response::{Html, Redirect},
    Extension,
};
use axum_extra::extract::Form;
use minijinja::context;
use serde::Deserialize;
use tasktrack_shared::models::{
    permission::Permission,
    role::{Role, RoleInput},
};
use tracing::{error, info, warn};

/// Why a role write was refused, carried in the `error` query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleFormError {
    InvalidName,
    DuplicateName,
    InvalidPermission,
    NotFound,
    SaveFailed,
}

impl RoleFormError {
    const ALL: [RoleFormError; 5] = [
        RoleFormError::InvalidName,
        RoleFormError::DuplicateName,
        RoleFormError::InvalidPermission,
        RoleFormError::NotFound,
        RoleFormError::SaveFailed,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            RoleFormError::InvalidName => "invalid_name",
            RoleFormError::DuplicateName => "duplicate_name",
            RoleFormError::InvalidPermission => "invalid_permission",
            RoleFormError::NotFound => "not_found",
            RoleFormError::SaveFailed => "save_failed",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            RoleFormError::InvalidName => "Role name must be 1 to 100 characters.",
            RoleFormError::DuplicateName => "A role with this name already exists.",
            RoleFormError::InvalidPermission => "One of the selected permissions does not exist.",
            RoleFormError::NotFound => "That role no longer exists.",
            RoleFormError::SaveFailed => "The role could not be saved. Please try again.",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.code() == code)
    }

    /// Classifies a failed role transaction
    pub fn from_db(err: &sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => RoleFormError::DuplicateName,
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                RoleFormError::InvalidPermission
            }
            _ => RoleFormError::SaveFailed,
        }
    }
}

/// Create and edit form body; `permissions` repeats once per checked box
#[derive(Debug, Deserialize)]
pub struct RoleForm {
    pub name: String,

    /// Permission ids as submitted; parsed in [`RoleForm::into_input`]
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl RoleForm {
    fn into_input(self) -> Result<RoleInput, RoleFormError> {
        let name = self.name.trim().to_string();
        if name.is_empty() || name.chars().count() > 100 {
            return Err(RoleFormError::InvalidName);
        }

        let permission_ids = self
            .permissions
            .iter()
            .map(|raw| raw.trim().parse::<i32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| RoleFormError::InvalidPermission)?;

        Ok(RoleInput {
            name,
            permission_ids,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FormErrorQuery {
    pub error: Option<String>,
}

impl FormErrorQuery {
    fn message(&self) -> Option<&'static str> {
        self.error
            .as_deref()
            .and_then(RoleFormError::from_code)
            .map(|e| e.message())
    }
}

fn back_to(path: &str, err: RoleFormError) -> Redirect {
    Redirect::to(&format!("{}?error={}", path, err.code()))
}

fn role_not_found(id: i32) -> ApiError {
    ApiError::NotFound(format!("Role {} not found", id))
}

pub async fn index(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<FormErrorQuery>,
) -> ApiResult<Html<String>> {
    let roles = Role::list_with_permissions(&state.db).await?;

    state.views.render(
        "role/index.html",
        context! {
            user => context! { id => user.id, name => user.name },
            roles => roles,
            error => query.message(),
        },
    )
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<FormErrorQuery>,
) -> ApiResult<Html<String>> {
    let permissions = Permission::list(&state.db).await?;

    state.views.render(
        "role/create.html",
        context! {
            user => context! { id => user.id, name => user.name },
            permissions => permissions,
            error => query.message(),
        },
    )
}

pub async fn store(State(state): State<AppState>, Form(form): Form<RoleForm>) -> Redirect {
    let input = match form.into_input() {
        Ok(input) => input,
        Err(e) => return back_to("/role/create", e),
    };

    match Role::create_with_permissions(&state.db, input).await {
        Ok(role) => {
            info!(role_id = role.id, name = %role.name, "Role created");
            Redirect::to("/role")
        }
        Err(e) => {
            let reason = RoleFormError::from_db(&e);
            error!(error = %e, code = reason.code(), "Role create failed");
            back_to("/role/create", reason)
        }
    }
}

pub async fn edit(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Query(query): Query<FormErrorQuery>,
) -> ApiResult<Html<String>> {
    let role = Role::find_with_permissions(&state.db, id)
        .await?
        .ok_or_else(|| role_not_found(id))?;
    let permissions = Permission::list(&state.db).await?;

    state.views.render(
        "role/edit.html",
        context! {
            user => context! { id => user.id, name => user.name },
            selected => role.permission_ids(),
            role => role,
            permissions => permissions,
            error => query.message(),
        },
    )
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Form(form): Form<RoleForm>,
) -> Redirect {
    let origin = format!("/role/{}/edit", id);

    let input = match form.into_input() {
        Ok(input) => input,
        Err(e) => return back_to(&origin, e),
    };

    match Role::update_with_permissions(&state.db, id, input).await {
        Ok(Some(role)) => {
            info!(role_id = role.id, "Role updated");
            Redirect::to("/role")
        }
        Ok(None) => {
            warn!(role_id = id, "Role update for missing role");
            back_to(&origin, RoleFormError::NotFound)
        }
        Err(e) => {
            let reason = RoleFormError::from_db(&e);
            error!(role_id = id, error = %e, code = reason.code(), "Role update failed");
            back_to(&origin, reason)
        }
    }
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Query(query): Query<FormErrorQuery>,
) -> ApiResult<Html<String>> {
    let role = Role::find_with_permissions(&state.db, id)
        .await?
        .ok_or_else(|| role_not_found(id))?;

    state.views.render(
        "role/delete.html",
        context! {
            user => context! { id => user.id, name => user.name },
            role => role,
            error => query.message(),
        },
    )
}

pub async fn destroy(State(state): State<AppState>, Path(id): Path<i32>) -> Redirect {
    match Role::delete(&state.db, id).await {
        Ok(true) => {
            info!(role_id = id, "Role deleted");
            Redirect::to("/role")
        }
        Ok(false) => {
            warn!(role_id = id, "Role delete for missing role");
            back_to("/role", RoleFormError::NotFound)
        }
        Err(e) => {
            error!(role_id = id, error = %e, "Role delete failed");
            back_to(&format!("/role/{}/delete", id), RoleFormError::SaveFailed)
        }
    }
}
