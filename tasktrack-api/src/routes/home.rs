/// Home page: greeting and the caller's own task tally
use crate::{app::AppState, error::ApiResult, middleware::auth::CurrentUser};
use axum::{extract::State, response::Html, Extension};
use minijinja::context;
use tasktrack_shared::models::task::Task;

pub async fn index(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Html<String>> {
    let counts = Task::counts_for_owner(&state.db, user.id).await?;

    state.views.render(
        "home.html",
        context! {
            user => context! { name => user.name, email => user.email },
            completed => counts.completed,
            remaining => counts.remaining,
        },
    )
}
