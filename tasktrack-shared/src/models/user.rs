/// User accounts
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id SERIAL PRIMARY KEY,
///     name VARCHAR(100) NOT NULL,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     role_id INTEGER REFERENCES roles(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// A user holds at most one role; their permission set is whatever that
/// role grants.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::auth::policy::PermissionSet;

/// User row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i32,

    /// Display name, shown in the home page greeting
    pub name: String,

    /// Login identifier (unique)
    pub email: String,

    /// Argon2id PHC string; never serialized
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Assigned role, if any
    pub role_id: Option<i32>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: String,
    pub email: String,

    /// Already-hashed password
    pub password_hash: String,

    pub role_id: Option<i32>,
}

impl User {
    /// Inserts a user
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `users_email_key` when the email is
    /// taken.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash, role_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, password_hash, role_id, created_at, updated_at
            "#,
        )
        .bind(data.name)
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.role_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role_id, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role_id, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// Resolves the permission names granted through the user's role
    ///
    /// A user without a role gets an empty set.
    pub async fn permissions(pool: &PgPool, id: i32) -> Result<PermissionSet, sqlx::Error> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT p.name
            FROM users u
            JOIN role_permissions rp ON rp.role_id = u.role_id
            JOIN permissions p ON p.id = rp.permission_id
            WHERE u.id = $1
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        Ok(names.into_iter().collect())
    }

    /// Sets or clears the user's role
    ///
    /// Returns `None` if the user does not exist.
    pub async fn assign_role(
        pool: &PgPool,
        id: i32,
        role_id: Option<i32>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET role_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, email, password_hash, role_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(role_id)
        .fetch_optional(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_is_not_serialized() {
        let user = User {
            id: 1,
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "test@example.com");
    }
}
