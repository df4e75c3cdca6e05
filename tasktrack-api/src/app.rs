/// Application state and router builder
///
/// This module defines the shared application state and builds the Axum
/// router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tasktrack_api::{app::{build_app, AppState}, config::Config};
/// use tasktrack_shared::storage::LocalFileStore;
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let store = Arc::new(LocalFileStore::new(config.uploads.dir.clone())?);
/// let state = AppState::new(pool, config, store)?;
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// let app = axum::ServiceExt::<axum::extract::Request>::into_make_service(build_app(state));
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{auth, method_override::method_override, policy, security::SecurityHeadersLayer},
    routes,
    views::Views,
};
use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put, MethodRouter},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tasktrack_shared::{auth::policy::Action, storage::FileStore};
use tower::util::MapRequest;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Compiled page templates
    pub views: Arc<Views>,

    /// Attachment storage
    pub store: Arc<dyn FileStore>,
}

impl AppState {
    /// Creates new application state
    ///
    /// # Errors
    ///
    /// Fails if a page template does not parse.
    pub fn new(
        db: PgPool,
        config: Config,
        store: Arc<dyn FileStore>,
    ) -> Result<Self, minijinja::Error> {
        Ok(Self {
            db,
            config: Arc::new(config),
            views: Arc::new(Views::new()?),
            store,
        })
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Router wrapped in the `_method` override
pub type App = MapRequest<Router, fn(Request) -> Request>;

/// Runs the policy check for `action` before `route`
fn guarded(action: Action, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(action, policy::enforce))
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                      # Health check (public)
/// ├── /auth/                       # Signup, login, logout (public)
/// ├── GET /                        # Home page (session)
/// ├── /task/...                    # Task pages (session + policy)
/// ├── /role/...                    # Role pages (session + policy)
/// └── /api/v1/task/...             # JSON task API (token + policy)
/// ```
///
/// # Middleware Stack
///
/// Outermost first:
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Authentication (session guard or token guard, per route group)
/// 5. Policy (per route, produces the `Grant`)
pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.uploads.max_bytes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route(
            "/signup",
            get(routes::auth::signup_form).post(routes::auth::signup),
        )
        .route(
            "/login",
            get(routes::auth::login_form).post(routes::auth::login),
        )
        .route("/logout", post(routes::auth::logout));

    let task_routes = Router::new()
        .route("/", guarded(Action::ListTasks, get(routes::tasks::index)))
        .route("/create", guarded(Action::CreateTask, get(routes::tasks::create)))
        .route("/store", guarded(Action::CreateTask, post(routes::tasks::store)))
        .route("/progress", guarded(Action::ViewProgress, get(routes::tasks::progress)))
        .route("/move/:id", guarded(Action::MoveTask, patch(routes::tasks::move_task)))
        .route("/:id/edit", guarded(Action::EditTask, get(routes::tasks::edit)))
        .route("/:id/update", guarded(Action::EditTask, put(routes::tasks::update)))
        .route("/:id/delete", guarded(Action::DeleteTask, get(routes::tasks::delete)))
        .route(
            "/:id/destroy",
            guarded(Action::DeleteTask, delete(routes::tasks::destroy)),
        )
        .route(
            "/:task_id/file/store",
            guarded(Action::AttachFile, post(routes::task_files::store)),
        )
        .route(
            "/:task_id/file/:file_id",
            guarded(Action::DetachFile, delete(routes::task_files::destroy)),
        );

    let role_routes = Router::new()
        .route("/", guarded(Action::ViewRoles, get(routes::roles::index)))
        .route("/create", guarded(Action::CreateRole, get(routes::roles::create)))
        .route("/store", guarded(Action::CreateRole, post(routes::roles::store)))
        .route("/:id/edit", guarded(Action::UpdateRole, get(routes::roles::edit)))
        .route("/:id/update", guarded(Action::UpdateRole, put(routes::roles::update)))
        .route("/:id/delete", guarded(Action::DeleteRole, get(routes::roles::delete)))
        .route(
            "/:id/destroy",
            guarded(Action::DeleteRole, delete(routes::roles::destroy)),
        );

    let page_routes = Router::new()
        .route("/", get(routes::home::index))
        .nest("/task", task_routes)
        .nest("/role", role_routes)
        .route_layer(from_fn_with_state(state.clone(), auth::require_session));

    let api_routes = Router::new()
        .route("/", guarded(Action::ListTasks, get(routes::api_tasks::index)))
        .route("/store", guarded(Action::CreateTask, post(routes::api_tasks::store)))
        .route(
            "/:id",
            guarded(Action::ViewTask, get(routes::api_tasks::show))
                .merge(guarded(Action::EditTask, put(routes::api_tasks::update)))
                .merge(guarded(Action::DeleteTask, delete(routes::api_tasks::destroy))),
        )
        .route_layer(from_fn_with_state(state.clone(), auth::require_token));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    let production = state.config.api.production;

    Router::new()
        .merge(health_routes)
        .nest("/auth", auth_routes)
        .merge(page_routes)
        .nest("/api/v1/task", api_routes)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(upload_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}

/// Router plus the `_method` override, ready to serve
///
/// Serve with `axum::ServiceExt::into_make_service`.
pub fn build_app(state: AppState) -> App {
    MapRequest::new(build_router(state), method_override as fn(Request) -> Request)
}
