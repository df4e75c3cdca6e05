//! Common test utilities for integration tests
//!
//! Tests need a PostgreSQL server: set `DATABASE_URL` to run them. Without
//! it [`TestContext::new`] returns `None` and the test returns early.
//!
//! Each context gets its own upload directory; users and roles are created
//! with unique names so tests can share one database.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use std::sync::Arc;
use tasktrack_api::app::{build_app, App, AppState};
use tasktrack_api::config::Config;
use tasktrack_shared::auth::jwt::{create_token, Claims};
use tasktrack_shared::auth::password::hash_password;
use tasktrack_shared::db::migrations::{ensure_database_exists, run_migrations};
use tasktrack_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use tasktrack_shared::models::role::Role;
use tasktrack_shared::models::user::{CreateUser, User};
use tasktrack_shared::storage::LocalFileStore;
use sqlx::PgPool;
use tempfile::TempDir;
use tokio::sync::OnceCell;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const TEST_PASSWORD: &str = "correct horse battery";

const BOUNDARY: &str = "tasktrack-test-boundary";

static DATABASE_READY: OnceCell<()> = OnceCell::const_new();

/// Creates the database and applies migrations once per test binary
async fn prepare_database(url: &str) {
    DATABASE_READY
        .get_or_init(|| async move {
            ensure_database_exists(url).await.expect("Failed to create database");
            let pool = create_pool(DatabaseConfig {
                url: url.to_string(),
                max_connections: 1,
                ..Default::default()
            })
            .await
            .expect("Failed to create pool");
            run_migrations(&pool).await.expect("Failed to run migrations");
            close_pool(pool).await;
        })
        .await;
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub app: App,
    pub config: Config,
    pub uploads: TempDir,
}

/// A user plus a session token for them
pub struct TestUser {
    pub user: User,
    pub token: String,
}

impl TestUser {
    /// Cookie header value carrying the session
    pub fn cookie(&self) -> String {
        format!("jwt={}", self.token)
    }

    /// Authorization header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl TestContext {
    /// Connects, migrates and builds the app; `None` without `DATABASE_URL`
    pub async fn new() -> Option<Self> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let uploads = TempDir::new().expect("Failed to create upload dir");
        let upload_dir = uploads.path().display().to_string();

        let config = Config::from_lookup(|name| match name {
            "DATABASE_URL" => Some(url.clone()),
            "JWT_SECRET" => Some(TEST_SECRET.to_string()),
            "UPLOAD_DIR" => Some(upload_dir.clone()),
            _ => None,
        })
        .expect("Failed to build config");

        prepare_database(&url).await;
        let db = create_pool(DatabaseConfig {
            url,
            max_connections: 5,
            ..Default::default()
        })
        .await
        .expect("Failed to create pool");

        let store = LocalFileStore::new(uploads.path()).expect("Failed to open store");
        let state = AppState::new(db.clone(), config.clone(), Arc::new(store))
            .expect("Templates failed to load");

        Some(Self {
            db,
            app: build_app(state),
            config,
            uploads,
        })
    }

    /// Creates a user holding `role` (by name), or no role
    pub async fn user(&self, role: Option<&str>) -> TestUser {
        let role_id = match role {
            Some(name) => Some(
                Role::find_by_name(&self.db, name)
                    .await
                    .unwrap()
                    .unwrap_or_else(|| panic!("Role {} missing", name))
                    .id,
            ),
            None => None,
        };

        let user = User::create(
            &self.db,
            CreateUser {
                name: "Test User".to_string(),
                email: unique_email(),
                password_hash: hash_password(TEST_PASSWORD).unwrap(),
                role_id,
            },
        )
        .await
        .expect("Failed to create user");

        let token = create_token(&Claims::new(user.id), TEST_SECRET).unwrap();
        TestUser { user, token }
    }

    /// Administrator: every permission
    pub async fn admin(&self) -> TestUser {
        self.user(Some("Administrator")).await
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }
}

pub fn unique_email() -> String {
    format!("user-{}@example.com", Uuid::new_v4().simple())
}

pub fn unique_name(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// URL-encoded POST, the way a browser submits a form
pub fn post_form(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Multipart POST with text fields and an optional `file` part
pub fn post_multipart(
    uri: &str,
    auth: (header::HeaderName, &str),
    fields: &[(&str, &str)],
    file: Option<(&str, &[u8])>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, data)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(auth.0, auth.1)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Asserts a 303 redirect to `location`
pub fn assert_redirect(response: &Response<Body>, location: &str) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], location);
}
