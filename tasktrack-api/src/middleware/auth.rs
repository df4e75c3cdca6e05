/// Session authentication
///
/// A session token is read from `Authorization: Bearer <token>` first and
/// from the `jwt` cookie second. A valid token loads the user and the
/// permission set granted by their role, stored in request extensions as
/// [`CurrentUser`].
///
/// Two guards share that lookup:
/// - [`require_session`] for HTML pages: unauthenticated requests are
///   redirected to `/auth/login`
/// - [`require_token`] for the JSON API: unauthenticated requests get 401

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tasktrack_shared::{
    auth::{jwt, policy::PermissionSet},
    models::user::User,
};
use tracing::debug;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "jwt";

/// Authenticated caller, inserted into request extensions
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub permissions: PermissionSet,
}

/// Builds the session cookie for a freshly issued token
pub fn session_cookie(token: String, max_age: chrono::Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age.num_seconds()))
        .path("/")
        .build()
}

/// Expired cookie that makes the browser drop the session
pub fn logout_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(0))
        .path("/")
        .build()
}

/// Token from the Bearer header, else from the session cookie
fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    bearer.or_else(|| {
        CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|t| !t.is_empty())
    })
}

/// Resolves the caller from request headers
///
/// # Errors
///
/// `Unauthorized` for a missing, invalid or expired token, or a token whose
/// user no longer exists. Database failures are internal errors.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> ApiResult<CurrentUser> {
    let token = session_token(headers)
        .ok_or_else(|| ApiError::Unauthorized("Missing session token".to_string()))?;

    let claims = jwt::validate_token(&token, state.jwt_secret())?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Session user no longer exists".to_string()))?;

    let permissions = User::permissions(&state.db, user.id).await?;

    Ok(CurrentUser {
        id: user.id,
        name: user.name,
        email: user.email,
        permissions,
    })
}

/// Guard for HTML pages
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match authenticate(&state, req.headers()).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(ApiError::Unauthorized(reason)) => {
            debug!(path = %req.uri().path(), reason = %reason, "Redirecting to login");
            Redirect::to("/auth/login").into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Guard for the JSON API
pub async fn require_token(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let user = authenticate(&state, req.headers()).await?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_preferred_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("jwt=from-cookie"));

        assert_eq!(session_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn test_cookie_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; jwt=from-cookie"),
        );

        assert_eq!(session_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_no_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("jwt="));
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("tok".to_string(), chrono::Duration::hours(24), true);
        assert_eq!(cookie.name(), "jwt");
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::hours(24)));

        let cookie = logout_cookie(false);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    }
}
