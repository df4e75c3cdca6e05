/// Permission catalog rows
///
/// The catalog is fixed and seeded by the initial migration; the names
/// match [`crate::auth::policy::PermissionName`].

use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Permission {
    pub id: i32,
    pub name: String,
}

impl Permission {
    /// Whole catalog, ordered by id
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Permission>("SELECT id, name FROM permissions ORDER BY id")
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Permission>("SELECT id, name FROM permissions WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await
    }
}
