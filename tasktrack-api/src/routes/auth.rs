/// Authentication pages
///
/// # Endpoints
///
/// - `GET  /auth/signup` - Signup form
/// - `POST /auth/signup` - Create account, start session, redirect to `/`
/// - `GET  /auth/login` - Login form
/// - `POST /auth/login` - Start session, redirect to `/`
/// - `POST /auth/logout` - End session, redirect to `/auth/login`
///
/// A session is an HS256 token in the HTTP-only `jwt` cookie. Failed
/// attempts re-render the form with an error and never set the cookie.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    middleware::auth::{logout_cookie, session_cookie},
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use minijinja::context;
use serde::Deserialize;
use tasktrack_shared::{
    auth::{jwt, password},
    models::{
        role::Role,
        user::{CreateUser, User},
    },
};
use tracing::{info, warn};
use validator::Validate;

/// Signup form
#[derive(Debug, Deserialize, Validate)]
pub struct SignupForm {
    /// Display name
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,

    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Login form
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Issues a session token and wraps it in the cookie
fn start_session(state: &AppState, jar: CookieJar, user_id: i32) -> ApiResult<CookieJar> {
    let ttl = state.config.session_ttl();
    let claims = jwt::Claims::with_expiration(user_id, ttl);
    let token = jwt::create_token(&claims, state.jwt_secret())?;

    Ok(jar.add(session_cookie(token, ttl, state.config.api.production)))
}

fn signup_page(
    state: &AppState,
    status: StatusCode,
    name: &str,
    email: &str,
    errors: &[ValidationErrorDetail],
) -> ApiResult<Response> {
    let page = state.views.render(
        "auth/signup.html",
        context! { name => name, email => email, errors => errors },
    )?;
    Ok((status, page).into_response())
}

fn login_page(
    state: &AppState,
    status: StatusCode,
    email: &str,
    error: Option<&str>,
) -> ApiResult<Response> {
    let page = state
        .views
        .render("auth/login.html", context! { email => email, error => error })?;
    Ok((status, page).into_response())
}

pub async fn signup_form(State(state): State<AppState>) -> ApiResult<Response> {
    signup_page(&state, StatusCode::OK, "", "", &[])
}

/// Creates an account
///
/// New users get the `DEFAULT_ROLE` if one is configured and exists.
///
/// # Errors
///
/// - `422`: form re-rendered with field errors
/// - `409`: email already registered, form re-rendered
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> ApiResult<Response> {
    let form = SignupForm {
        name: form.name.trim().to_string(),
        email: form.email.trim().to_lowercase(),
        password: form.password,
    };

    if let Err(errors) = form.validate() {
        let details = match ApiError::from(errors) {
            ApiError::ValidationError(details) => details,
            _ => Vec::new(),
        };
        return signup_page(
            &state,
            StatusCode::UNPROCESSABLE_ENTITY,
            &form.name,
            &form.email,
            &details,
        );
    }

    let role_id = match state.config.default_role.as_deref() {
        Some(role_name) => {
            let role = Role::find_by_name(&state.db, role_name).await?;
            if role.is_none() {
                warn!(role = role_name, "Configured default role does not exist");
            }
            role.map(|r| r.id)
        }
        None => None,
    };

    let password_hash = password::hash_password(&form.password)?;

    let user = match User::create(
        &state.db,
        CreateUser {
            name: form.name.clone(),
            email: form.email.clone(),
            password_hash,
            role_id,
        },
    )
    .await
    {
        Ok(user) => user,
        Err(e) => match ApiError::from(e) {
            ApiError::Conflict(_) => {
                return signup_page(
                    &state,
                    StatusCode::CONFLICT,
                    &form.name,
                    &form.email,
                    &[ValidationErrorDetail::new(
                        "email",
                        "An account with this email already exists",
                    )],
                );
            }
            other => return Err(other),
        },
    };

    info!(user_id = user.id, "User signed up");

    let jar = start_session(&state, jar, user.id)?;
    Ok((jar, Redirect::to("/")).into_response())
}

pub async fn login_form(State(state): State<AppState>) -> ApiResult<Response> {
    login_page(&state, StatusCode::OK, "", None)
}

/// Starts a session
///
/// Unknown email and wrong password are indistinguishable to the caller.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> ApiResult<Response> {
    let email = form.email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &email).await?;
    let verified = match &user {
        Some(user) => password::verify_password(&form.password, &user.password_hash)?,
        None => false,
    };

    let Some(user) = user.filter(|_| verified) else {
        warn!("Failed login attempt");
        return login_page(&state, StatusCode::UNAUTHORIZED, &email, Some(INVALID_CREDENTIALS));
    };

    info!(user_id = user.id, "User logged in");

    let jar = start_session(&state, jar, user.id)?;
    Ok((jar, Redirect::to("/")).into_response())
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    let jar = jar.add(logout_cookie(state.config.api.production));
    (jar, Redirect::to("/auth/login")).into_response()
}
