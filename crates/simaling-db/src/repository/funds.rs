//! Funds ledger operations

use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::error::DbError;
use crate::models::{Funds, FundsStatus, NewFunds, UpdateFunds};
use crate::repository::{Database, where_clause};
use crate::utils::format_timestamp;

/// Query parameters for listing funds entries
#[derive(Debug, Clone, Default)]
pub struct FundsQuery {
    /// Restrict to entries submitted by this user
    pub user_id: Option<i64>,
    /// Filter by approval status
    pub status: Option<FundsStatus>,
    /// Filter by direction
    pub is_income: Option<bool>,
    /// Inclusive lower bound on creation time
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound on creation time
    pub end: Option<DateTime<Utc>>,
    /// Pagination offset
    pub offset: i64,
    /// Pagination limit
    pub limit: i64,
}

impl Database {
    /// Insert a new funds entry in `Pending` state
    pub async fn insert_funds(&self, funds: NewFunds) -> Result<Funds, DbError> {
        let now = Utc::now();
        let status = FundsStatus::Pending;
        let result = sqlx::query(
            r#"
            INSERT INTO funds (user_id, amount, image, description, is_income, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(funds.user_id)
        .bind(funds.amount)
        .bind(&funds.image)
        .bind(&funds.description)
        .bind(funds.is_income)
        .bind(status.as_str())
        .bind(format_timestamp(now))
        .bind(format_timestamp(now))
        .fetch_one(&self.pool)
        .await?;

        Ok(Funds {
            id: result.get("id"),
            user_id: funds.user_id,
            amount: funds.amount,
            image: funds.image,
            description: funds.description,
            is_income: funds.is_income,
            status,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a funds entry by ID
    pub async fn get_funds(&self, id: i64) -> Result<Option<Funds>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, user_id, amount, image, description, is_income, status, created_at, updated_at
            FROM funds
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| Funds::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// List funds entries with filtering and pagination, newest first
    pub async fn list_funds(&self, query: FundsQuery) -> Result<(Vec<Funds>, i64), DbError> {
        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(user_id) = query.user_id {
            conditions.push("user_id = ?");
            params.push(user_id.to_string());
        }
        if let Some(status) = query.status {
            conditions.push("status = ?");
            params.push(status.as_str().to_string());
        }
        if let Some(is_income) = query.is_income {
            conditions.push("is_income = ?");
            params.push(if is_income { "1" } else { "0" }.to_string());
        }
        if let Some(start) = query.start {
            conditions.push("created_at >= ?");
            params.push(format_timestamp(start));
        }
        if let Some(end) = query.end {
            conditions.push("created_at < ?");
            params.push(format_timestamp(end));
        }

        let where_clause = where_clause(&conditions);

        // Get total count
        let count_sql = format!("SELECT COUNT(*) as count FROM funds {}", where_clause);
        let mut count_query = sqlx::query(&count_sql);
        for param in &params {
            count_query = count_query.bind(param);
        }
        let count_row = count_query.fetch_one(&self.pool).await?;
        let total: i64 = count_row.get("count");

        let sql = format!(
            r#"
            SELECT id, user_id, amount, image, description, is_income, status, created_at, updated_at
            FROM funds
            {}
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
            where_clause
        );

        let mut funds_query = sqlx::query(&sql);
        for param in &params {
            funds_query = funds_query.bind(param);
        }
        funds_query = funds_query.bind(query.limit).bind(query.offset);

        let rows = funds_query.fetch_all(&self.pool).await?;
        let funds: Result<Vec<Funds>, _> = rows
            .iter()
            .map(|row| Funds::try_from(row).map_err(DbError::from))
            .collect();

        Ok((funds?, total))
    }

    /// Update the editable fields of a funds entry
    pub async fn update_funds(&self, id: i64, update: UpdateFunds) -> Result<Option<Funds>, DbError> {
        let now = format_timestamp(Utc::now());
        let result = sqlx::query(
            r#"
            UPDATE funds
            SET amount = ?, description = ?, is_income = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.amount)
        .bind(&update.description)
        .bind(update.is_income)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_funds(id).await
    }

    /// Set the approval status of a funds entry
    pub async fn set_funds_status(&self, id: i64, status: FundsStatus) -> Result<Option<Funds>, DbError> {
        let now = format_timestamp(Utc::now());
        let result = sqlx::query("UPDATE funds SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_funds(id).await
    }

    /// Delete a funds entry, returning the removed row
    pub async fn delete_funds(&self, id: i64) -> Result<Option<Funds>, DbError> {
        let Some(funds) = self.get_funds(id).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM funds WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(Some(funds))
    }

    /// Sum accepted entries of one direction, optionally within `[start, end)`
    pub async fn sum_accepted_funds(
        &self,
        is_income: bool,
        created_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<f64, DbError> {
        let (start, end) = match created_between {
            Some((start, end)) => (Some(format_timestamp(start)), Some(format_timestamp(end))),
            None => (None, None),
        };

        let result = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount), 0.0) as total
            FROM funds
            WHERE is_income = ? AND status = ?
              AND (? IS NULL OR created_at >= ?)
              AND (? IS NULL OR created_at < ?)
            "#,
        )
        .bind(is_income)
        .bind(FundsStatus::Accepted.as_str())
        .bind(&start)
        .bind(&start)
        .bind(&end)
        .bind(&end)
        .fetch_one(&self.pool)
        .await?;
        Ok(result.get("total"))
    }
}
