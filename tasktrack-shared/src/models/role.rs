/// Roles and their permission grants
///
/// # Schema
///
/// ```sql
/// CREATE TABLE roles (
///     id SERIAL PRIMARY KEY,
///     name VARCHAR(100) NOT NULL UNIQUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE role_permissions (
///     role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
///     permission_id INTEGER NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
///     PRIMARY KEY (role_id, permission_id)
/// );
/// ```
///
/// Every mutation that touches `role_permissions` runs in a transaction: a
/// role with half of its grants applied is never visible.
///
/// # Example
///
/// ```no_run
/// use tasktrack_shared::models::role::{Role, RoleInput};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let role = Role::create_with_permissions(&pool, RoleInput {
///     name: "Reviewer".to_string(),
///     permission_ids: vec![1, 2],
/// }).await?;
///
/// // Replace the grants wholesale
/// Role::update_with_permissions(&pool, role.id, RoleInput {
///     name: "Reviewer".to_string(),
///     permission_ids: vec![2, 3],
/// }).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::debug;

use super::permission::Permission;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Role {
    pub id: i32,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Role with its granted permissions joined
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: Role,

    /// Granted permissions, ordered by id
    pub permissions: Vec<Permission>,
}

impl RoleWithPermissions {
    pub fn permission_ids(&self) -> Vec<i32> {
        self.permissions.iter().map(|p| p.id).collect()
    }
}

/// Input for creating or updating a role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInput {
    pub name: String,

    /// Full set of granted permission ids; duplicates are ignored
    pub permission_ids: Vec<i32>,
}

/// Sorted, duplicate-free copy of `ids`
fn normalize_ids(ids: &[i32]) -> Vec<i32> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

async fn grant_permissions(
    tx: &mut Transaction<'_, Postgres>,
    role_id: i32,
    permission_ids: &[i32],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO role_permissions (role_id, permission_id)
        SELECT $1, UNNEST($2::int4[])
        "#,
    )
    .bind(role_id)
    .bind(normalize_ids(permission_ids))
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn revoke_all_permissions(
    tx: &mut Transaction<'_, Postgres>,
    role_id: i32,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role_id)
        .execute(&mut **tx)
        .await?;

    Ok(result.rows_affected())
}

impl Role {
    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Role>(
            "SELECT id, name, created_at, updated_at FROM roles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Role>(
            "SELECT id, name, created_at, updated_at FROM roles WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    /// Ids of the permissions granted to a role, ascending
    pub async fn permission_ids(pool: &PgPool, id: i32) -> Result<Vec<i32>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT permission_id FROM role_permissions WHERE role_id = $1 ORDER BY permission_id",
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }

    /// Every role with its permissions, ordered by role id
    pub async fn list_with_permissions(
        pool: &PgPool,
    ) -> Result<Vec<RoleWithPermissions>, sqlx::Error> {
        let roles = sqlx::query_as::<_, Role>(
            "SELECT id, name, created_at, updated_at FROM roles ORDER BY id",
        )
        .fetch_all(pool)
        .await?;

        let grants: Vec<(i32, i32, String)> = sqlx::query_as(
            r#"
            SELECT rp.role_id, p.id, p.name
            FROM role_permissions rp
            JOIN permissions p ON p.id = rp.permission_id
            ORDER BY rp.role_id, p.id
            "#,
        )
        .fetch_all(pool)
        .await?;

        let mut by_role: HashMap<i32, Vec<Permission>> = HashMap::new();
        for (role_id, id, name) in grants {
            by_role.entry(role_id).or_default().push(Permission { id, name });
        }

        Ok(roles
            .into_iter()
            .map(|role| RoleWithPermissions {
                permissions: by_role.remove(&role.id).unwrap_or_default(),
                role,
            })
            .collect())
    }

    /// One role with its permissions
    pub async fn find_with_permissions(
        pool: &PgPool,
        id: i32,
    ) -> Result<Option<RoleWithPermissions>, sqlx::Error> {
        let Some(role) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.id, p.name
            FROM role_permissions rp
            JOIN permissions p ON p.id = rp.permission_id
            WHERE rp.role_id = $1
            ORDER BY p.id
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        Ok(Some(RoleWithPermissions { role, permissions }))
    }

    /// Creates a role and its grants atomically
    ///
    /// # Errors
    ///
    /// Unique violation on `roles_name_key` for a taken name; foreign-key
    /// violation for an unknown permission id. Nothing is written in either
    /// case.
    pub async fn create_with_permissions(
        pool: &PgPool,
        input: RoleInput,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name)
            VALUES ($1)
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(&input.name)
        .fetch_one(&mut *tx)
        .await?;

        grant_permissions(&mut tx, role.id, &input.permission_ids).await?;

        tx.commit().await?;

        debug!(role_id = role.id, "Role created");
        Ok(role)
    }

    /// Renames a role and replaces its whole permission set atomically
    ///
    /// Existing grants are deleted and the new list inserted; there is no
    /// diffing. Returns `None` (and writes nothing) if the role is missing.
    pub async fn update_with_permissions(
        pool: &PgPool,
        id: i32,
        input: RoleInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let role = sqlx::query_as::<_, Role>(
            r#"
            UPDATE roles
            SET name = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(role) = role else {
            return Ok(None);
        };

        let revoked = revoke_all_permissions(&mut tx, role.id).await?;
        grant_permissions(&mut tx, role.id, &input.permission_ids).await?;

        tx.commit().await?;

        debug!(role_id = role.id, revoked, "Role permissions replaced");
        Ok(Some(role))
    }

    /// Deletes a role's grants and then the role, atomically
    ///
    /// Users holding the role are left without one (`ON DELETE SET NULL`).
    /// Returns `false` if the role did not exist.
    pub async fn delete(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        revoke_all_permissions(&mut tx, id).await?;

        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }
}
