/// Database models for Tasktrack
///
/// Each model owns its SQL; handlers never build queries themselves.
///
/// # Models
///
/// - `user`: accounts and the permission set resolved through their role
/// - `role`: roles and their role → permission grants
/// - `permission`: the fixed permission catalog
/// - `task`: tasks, owner-scoped reads and writes
/// - `task_file`: files attached to tasks
///
/// # Example
///
/// ```no_run
/// use tasktrack_shared::models::user::{User, CreateUser};
/// use tasktrack_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     name: "Jane Doe".to_string(),
///     email: "jane@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     role_id: None,
/// }).await?;
///
/// let permissions = User::permissions(&pool, user.id).await?;
/// assert!(permissions.is_empty());
/// # Ok(())
/// # }
/// ```

pub mod permission;
pub mod role;
pub mod task;
pub mod task_file;
pub mod user;
