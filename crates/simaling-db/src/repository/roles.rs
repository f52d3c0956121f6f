//! Role operations

use chrono::Utc;
use tracing::{debug, info};

use crate::error::DbError;
use crate::models::{Role, RoleRecord};
use crate::repository::Database;
use crate::utils::format_timestamp;

impl Database {
    /// Create the fixed role rows if they are missing
    ///
    /// Safe to call on every startup; existing rows are left untouched.
    pub async fn seed_roles(&self) -> Result<(), DbError> {
        let now = format_timestamp(Utc::now());
        for role in Role::ALL {
            let result = sqlx::query(
                r#"
                INSERT INTO roles (id, role_name, created_at)
                VALUES (?, ?, ?)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(role.id())
            .bind(role.as_str())
            .bind(&now)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                info!("Seeded role {} (id {})", role, role.id());
            } else {
                debug!("Role {} already present", role);
            }
        }
        Ok(())
    }

    /// List all roles
    pub async fn list_roles(&self) -> Result<Vec<RoleRecord>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, role_name, created_at
            FROM roles
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| RoleRecord::try_from(row).map_err(DbError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::test_support::memory_db;

    #[tokio::test]
    async fn seeds_one_row_per_role() {
        let db = memory_db().await;
        db.seed_roles().await.unwrap();
        db.seed_roles().await.unwrap();

        let roles = db.list_roles().await.unwrap();
        let names: Vec<_> = roles.iter().map(|r| (r.id, r.role_name.as_str())).collect();
        assert_eq!(names, vec![(1, "Admin"), (2, "User"), (3, "Security")]);
    }
}
