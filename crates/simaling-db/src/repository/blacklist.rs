//! Token blacklist operations

use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::error::DbError;
use crate::models::BlacklistEntry;
use crate::repository::Database;
use crate::utils::format_timestamp;

impl Database {
    /// Record a token as invalidated
    ///
    /// Repeated calls for the same token append further rows.
    pub async fn blacklist_token(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<BlacklistEntry, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO blacklist_tokens (token, expires_at, created_at)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(token)
        .bind(format_timestamp(expires_at))
        .bind(format_timestamp(now))
        .fetch_one(&self.pool)
        .await?;

        Ok(BlacklistEntry {
            id: result.get("id"),
            token: token.to_string(),
            expires_at,
            created_at: now,
        })
    }

    /// Check whether a token has been invalidated
    pub async fn is_token_blacklisted(&self, token: &str) -> Result<bool, DbError> {
        let result = sqlx::query("SELECT EXISTS(SELECT 1 FROM blacklist_tokens WHERE token = ?) as found")
            .bind(token)
            .fetch_one(&self.pool)
            .await?;
        let found: bool = result.get("found");
        Ok(found)
    }

    /// Delete entries whose token expired before `now`
    ///
    /// Such tokens already fail signature-time expiry checks, so the rows
    /// carry no information.
    pub async fn purge_expired_blacklist(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM blacklist_tokens WHERE expires_at < ?")
            .bind(format_timestamp(now))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
