/// Files attached to tasks
///
/// # Schema
///
/// ```sql
/// CREATE TABLE task_files (
///     id SERIAL PRIMARY KEY,
///     task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     path VARCHAR(1024) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// `name` is the uploader's original filename; `path` is where the
/// [`crate::storage::FileStore`] put the bytes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Executor, PgPool, Postgres};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TaskFile {
    pub id: i32,
    pub task_id: i32,
    pub name: String,
    pub path: String,
    pub created_at: DateTime<Utc>,
}

/// A stored upload waiting for its row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTaskFile {
    pub name: String,
    pub path: String,
}

impl TaskFile {
    /// Inserts a row on any executor, so it can join a caller's transaction
    pub async fn insert<'e, E>(
        executor: E,
        task_id: i32,
        file: &NewTaskFile,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, TaskFile>(
            r#"
            INSERT INTO task_files (task_id, name, path)
            VALUES ($1, $2, $3)
            RETURNING id, task_id, name, path, created_at
            "#,
        )
        .bind(task_id)
        .bind(&file.name)
        .bind(&file.path)
        .fetch_one(executor)
        .await
    }

    pub async fn list_by_task(pool: &PgPool, task_id: i32) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskFile>(
            r#"
            SELECT id, task_id, name, path, created_at
            FROM task_files
            WHERE task_id = $1
            ORDER BY id
            "#,
        )
        .bind(task_id)
        .fetch_all(pool)
        .await
    }

    /// Finds a file only if it belongs to `task_id`
    pub async fn find_for_task(
        pool: &PgPool,
        task_id: i32,
        file_id: i32,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskFile>(
            r#"
            SELECT id, task_id, name, path, created_at
            FROM task_files
            WHERE id = $1 AND task_id = $2
            "#,
        )
        .bind(file_id)
        .bind(task_id)
        .fetch_optional(pool)
        .await
    }

    /// Returns `false` if no row was deleted
    pub async fn delete(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM task_files WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
