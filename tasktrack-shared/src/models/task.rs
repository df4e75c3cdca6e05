/// Task model and database operations
///
/// Tasks are owned by exactly one user and move between three statuses.
/// Any status may be set from any other; there is no transition table.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('NOT_STARTED', 'IN_PROGRESS', 'COMPLETED');
///
/// CREATE TABLE tasks (
///     id SERIAL PRIMARY KEY,
///     name VARCHAR(255) NOT NULL,
///     due_date DATE NOT NULL,
///     status task_status NOT NULL DEFAULT 'NOT_STARTED',
///     user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Owner scope
///
/// Reads and writes take a `scope: Option<i32>`. `None` reaches every task;
/// `Some(user_id)` adds `user_id = $n` to the statement itself, so the
/// ownership check and the write cannot be separated by another request.
/// A scoped miss comes back as `None`; [`Task::owner_of`] tells the caller
/// whether the task is missing or belongs to someone else.
///
/// # Example
///
/// ```no_run
/// use tasktrack_shared::models::task::{Task, TaskInput, TaskStatus};
/// use chrono::NaiveDate;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, user_id: i32) -> Result<(), sqlx::Error> {
/// let (task, _) = Task::create(&pool, user_id, TaskInput {
///     name: "Write report".to_string(),
///     due_date: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
///     status: TaskStatus::NotStarted,
/// }, None).await?;
///
/// // Only succeeds if `user_id` still owns the task
/// Task::update_status(&pool, task.id, Some(user_id), TaskStatus::InProgress).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::task_file::{NewTaskFile, TaskFile};

/// Task progress status
///
/// Ordering follows declaration order, which is also the column order of
/// the progress board.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
)]
#[sqlx(type_name = "task_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [
        TaskStatus::NotStarted,
        TaskStatus::InProgress,
        TaskStatus::Completed,
    ];

    /// Wire and database form
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "NOT_STARTED",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
        }
    }

    /// Human-readable label for views
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "Not Started",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Invalid task status: {}", s))
    }
}

/// Parses a due date given as `YYYY-MM-DD` or an RFC 3339 timestamp
///
/// Timestamps keep their own calendar date; no timezone shift is applied.
pub fn parse_due_date(input: &str) -> Result<NaiveDate, chrono::ParseError> {
    let input = input.trim();
    match NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        Ok(date) => Ok(date),
        Err(_) => DateTime::parse_from_rfc3339(input).map(|dt| dt.date_naive()),
    }
}

/// Task row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Task {
    pub id: i32,
    pub name: String,
    pub due_date: NaiveDate,
    pub status: TaskStatus,

    /// Owning user
    pub user_id: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Task row with its owner's name joined, as shown in listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TaskListing {
    pub id: i32,
    pub name: String,
    pub due_date: NaiveDate,
    pub status: TaskStatus,
    pub user_id: i32,
    pub owner_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full set of editable task fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInput {
    pub name: String,
    pub due_date: NaiveDate,
    pub status: TaskStatus,
}

/// Per-user status tally for the home page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub completed: i64,
    pub remaining: i64,
}

const LISTING_SELECT: &str = r#"
    SELECT t.id, t.name, t.due_date, t.status, t.user_id, u.name AS owner_name,
           t.created_at, t.updated_at
    FROM tasks t
    JOIN users u ON u.id = t.user_id
"#;

impl Task {
    /// Inserts a task and, if given, its first attachment in one transaction
    ///
    /// The attachment must already be stored; removing it again when this
    /// fails is the caller's job.
    pub async fn create(
        pool: &PgPool,
        owner_id: i32,
        input: TaskInput,
        attachment: Option<NewTaskFile>,
    ) -> Result<(Self, Option<TaskFile>), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (name, due_date, status, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, due_date, status, user_id, created_at, updated_at
            "#,
        )
        .bind(&input.name)
        .bind(input.due_date)
        .bind(input.status)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

        let file = match attachment {
            Some(file) => Some(TaskFile::insert(&mut *tx, task.id, &file).await?),
            None => None,
        };

        tx.commit().await?;

        debug!(task_id = task.id, owner_id, with_file = file.is_some(), "Task created");
        Ok((task, file))
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"
            SELECT id, name, due_date, status, user_id, created_at, updated_at
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Owner of a task, or `None` if it does not exist
    pub async fn owner_of(pool: &PgPool, id: i32) -> Result<Option<i32>, sqlx::Error> {
        sqlx::query_scalar("SELECT user_id FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Tasks visible within `scope`, soonest due first
    pub async fn list(pool: &PgPool, scope: Option<i32>) -> Result<Vec<TaskListing>, sqlx::Error> {
        let sql = format!(
            "{} WHERE ($1::int IS NULL OR t.user_id = $1) ORDER BY t.due_date, t.id",
            LISTING_SELECT
        );

        sqlx::query_as::<_, TaskListing>(&sql)
            .bind(scope)
            .fetch_all(pool)
            .await
    }

    /// One task within `scope`, owner joined
    pub async fn find_listing(
        pool: &PgPool,
        id: i32,
        scope: Option<i32>,
    ) -> Result<Option<TaskListing>, sqlx::Error> {
        let sql = format!(
            "{} WHERE t.id = $1 AND ($2::int IS NULL OR t.user_id = $2)",
            LISTING_SELECT
        );

        sqlx::query_as::<_, TaskListing>(&sql)
            .bind(id)
            .bind(scope)
            .fetch_optional(pool)
            .await
    }

    /// Overwrites name, due date and status
    pub async fn update(
        pool: &PgPool,
        id: i32,
        scope: Option<i32>,
        input: TaskInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET name = $3, due_date = $4, status = $5, updated_at = NOW()
            WHERE id = $1 AND ($2::int IS NULL OR user_id = $2)
            RETURNING id, name, due_date, status, user_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(scope)
        .bind(&input.name)
        .bind(input.due_date)
        .bind(input.status)
        .fetch_optional(pool)
        .await
    }

    /// Changes only the status
    pub async fn update_status(
        pool: &PgPool,
        id: i32,
        scope: Option<i32>,
        status: TaskStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND ($2::int IS NULL OR user_id = $2)
            RETURNING id, name, due_date, status, user_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(scope)
        .bind(status)
        .fetch_optional(pool)
        .await
    }

    /// Deletes a task's file rows and then the task in one transaction
    ///
    /// Returns the storage paths of the removed files so the caller can
    /// unlink them after commit, or `None` if nothing in scope matched.
    pub async fn delete_with_files(
        pool: &PgPool,
        id: i32,
        scope: Option<i32>,
    ) -> Result<Option<Vec<String>>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let deleted: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT id FROM tasks
            WHERE id = $1 AND ($2::int IS NULL OR user_id = $2)
            FOR UPDATE
            "#,
        )
        .bind(id)
        .bind(scope)
        .fetch_optional(&mut *tx)
        .await?;

        if deleted.is_none() {
            return Ok(None);
        }

        let paths: Vec<String> =
            sqlx::query_scalar("DELETE FROM task_files WHERE task_id = $1 RETURNING path")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(task_id = id, files = paths.len(), "Task deleted");
        Ok(Some(paths))
    }

    /// Completed and not-yet-completed task counts for one owner
    pub async fn counts_for_owner(pool: &PgPool, user_id: i32) -> Result<TaskCounts, sqlx::Error> {
        let (completed, remaining): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'COMPLETED'),
                COUNT(*) FILTER (WHERE status <> 'COMPLETED')
            FROM tasks
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(TaskCounts { completed, remaining })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>(), Ok(status));
        }
        assert!("DONE".parse::<TaskStatus>().is_err());
        assert!("not_started".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_order_matches_declaration() {
        let mut shuffled = vec![
            TaskStatus::Completed,
            TaskStatus::NotStarted,
            TaskStatus::InProgress,
        ];
        shuffled.sort();
        assert_eq!(shuffled, TaskStatus::ALL.to_vec());
    }

    #[test]
    fn test_status_serde_form() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");

        let status: TaskStatus = serde_json::from_str("\"COMPLETED\"").unwrap();
        assert_eq!(status, TaskStatus::Completed);
        assert_eq!(TaskStatus::default(), TaskStatus::NotStarted);
    }

    #[test]
    fn test_parse_due_date_accepts_plain_date() {
        let date = parse_due_date("2025-03-14").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
    }

    #[test]
    fn test_parse_due_date_accepts_rfc3339() {
        let date = parse_due_date("2025-03-14T23:30:00+02:00").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());

        let date = parse_due_date(" 2025-12-01T00:00:00Z ").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
    }

    #[test]
    fn test_parse_due_date_rejects_garbage() {
        assert!(parse_due_date("").is_err());
        assert!(parse_due_date("tomorrow").is_err());
        assert!(parse_due_date("2025-02-30").is_err());
    }
}
