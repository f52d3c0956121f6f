//! Database repository implementation

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use crate::error::DbError;

// Submodules
mod blacklist;
mod family;
mod funds;
mod roles;
mod security_records;
mod stats;
mod users;

pub use funds::FundsQuery;
pub use security_records::SecurityRecordQuery;
pub use users::UserQuery;

/// Maximum pooled connections for file-backed databases
const MAX_CONNECTIONS: u32 = 8;

/// Database connection and operations
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    ///
    /// In-memory URLs get a single long-lived connection, since every
    /// SQLite connection would otherwise see its own empty database.
    pub async fn new(database_url: &str) -> Result<Self, DbError> {
        info!("Connecting to database: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .connect_with(options)
                .await?
        };

        let db = Self { pool };
        db.run_migrations().await?;
        db.seed_roles().await?;
        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<(), DbError> {
        info!("Running database migrations");

        // Create tables if they don't exist
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS roles (
                id INTEGER PRIMARY KEY,
                role_name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                phone_no TEXT NOT NULL UNIQUE,
                nik TEXT UNIQUE,
                email TEXT,
                password_hash TEXT NOT NULL,
                name TEXT NOT NULL,
                address TEXT NOT NULL DEFAULT '',
                role_id INTEGER NOT NULL REFERENCES roles(id),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_users_role ON users(role_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS family_members (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                head_of_family_id INTEGER NOT NULL REFERENCES users(id),
                nik TEXT,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_family_members_head ON family_members(head_of_family_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS funds (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                amount REAL NOT NULL,
                image TEXT,
                description TEXT NOT NULL,
                is_income BOOLEAN NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_funds_created ON funds(created_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS security_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                security_id INTEGER NOT NULL REFERENCES users(id),
                block TEXT NOT NULL,
                phone_no TEXT NOT NULL,
                longitude TEXT NOT NULL,
                latitude TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_security_records_created ON security_records(created_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        // No uniqueness on token: repeated logouts append duplicate rows
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blacklist_tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                token TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_blacklist_tokens_token ON blacklist_tokens(token)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_blacklist_tokens_expires ON blacklist_tokens(expires_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations completed");
        Ok(())
    }
}

/// Build a `WHERE` clause from collected conditions
pub(crate) fn where_clause(conditions: &[&str]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn where_clause_joins_conditions() {
        assert_eq!(where_clause(&[]), "");
        assert_eq!(
            where_clause(&["a = ?", "b >= ?"]),
            "WHERE a = ? AND b >= ?"
        );
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = test_support::memory_db().await;
        db.run_migrations().await.unwrap();
        db.seed_roles().await.unwrap();
        assert_eq!(db.list_roles().await.unwrap().len(), 3);
    }
}
