/// Route handlers
///
/// Organized by resource:
///
/// - `health`: health check (public)
/// - `auth`: signup, login, logout pages (public)
/// - `home`: landing page
/// - `tasks`: task pages and the task helpers shared with the JSON API
/// - `task_files`: attachment upload and removal
/// - `roles`: role management pages
/// - `api_tasks`: JSON task API

pub mod api_tasks;
pub mod auth;
pub mod health;
pub mod home;
pub mod roles;
pub mod task_files;
pub mod tasks;
