/// Per-route policy enforcement
///
/// Attached to each protected route with the [`Action`] it performs. It
/// evaluates the caller's permission set against the action table and
/// either answers 403 or passes a [`Grant`] to the handler through request
/// extensions. Handlers apply `grant.owner_scope()` to their queries.
///
/// ```ignore
/// get(routes::tasks::index).route_layer(from_fn_with_state(Action::ListTasks, enforce))
/// ```

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tasktrack_shared::auth::policy::{Action, Grant};
use tracing::{debug, warn};

use crate::{error::ApiError, middleware::auth::CurrentUser};

pub async fn enforce(
    State(action): State<Action>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = req
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    let grant = Grant::issue(action, user.id, &user.permissions).map_err(|e| {
        warn!(user_id = user.id, action = %action, "Policy denied request");
        ApiError::from(e)
    })?;

    debug!(user_id = user.id, action = %action, access = ?grant.access, "Policy granted");

    req.extensions_mut().insert(grant);
    Ok(next.run(req).await)
}
