//! Security guard check-in operations

use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::error::DbError;
use crate::models::{NewSecurityRecord, SecurityRecord};
use crate::repository::{Database, where_clause};
use crate::utils::format_timestamp;

const SELECT_RECORDS: &str = r#"
    SELECT r.id, r.security_id, u.name AS security_name, r.block, r.phone_no,
           r.longitude, r.latitude, r.created_at
    FROM security_records r
    LEFT JOIN users u ON u.id = r.security_id
"#;

/// Query parameters for listing security records
#[derive(Debug, Clone, Default)]
pub struct SecurityRecordQuery {
    /// Restrict to check-ins made by this guard
    pub security_id: Option<i64>,
    /// Restrict to check-ins made at this phone number
    pub phone_no: Option<String>,
    /// Inclusive lower bound on check-in time
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound on check-in time
    pub end: Option<DateTime<Utc>>,
    pub offset: i64,
    /// `None` returns every matching row
    pub limit: Option<i64>,
}

impl Database {
    /// Insert a new check-in
    pub async fn insert_security_record(
        &self,
        record: NewSecurityRecord,
    ) -> Result<SecurityRecord, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO security_records (security_id, block, phone_no, longitude, latitude, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(record.security_id)
        .bind(&record.block)
        .bind(&record.phone_no)
        .bind(&record.longitude)
        .bind(&record.latitude)
        .bind(format_timestamp(now))
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = result.get("id");
        self.get_security_record(id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("security record {}", id)))
    }

    /// Get a check-in by ID
    pub async fn get_security_record(&self, id: i64) -> Result<Option<SecurityRecord>, DbError> {
        let sql = format!("{} WHERE r.id = ?", SELECT_RECORDS);
        let result = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        result
            .map(|row| SecurityRecord::try_from(&row).map_err(DbError::from))
            .transpose()
    }

    /// List check-ins with filtering and optional pagination, newest first
    pub async fn list_security_records(
        &self,
        query: SecurityRecordQuery,
    ) -> Result<(Vec<SecurityRecord>, i64), DbError> {
        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(security_id) = query.security_id {
            conditions.push("r.security_id = ?");
            params.push(security_id.to_string());
        }
        if let Some(phone_no) = &query.phone_no {
            conditions.push("r.phone_no = ?");
            params.push(phone_no.clone());
        }
        if let Some(start) = query.start {
            conditions.push("r.created_at >= ?");
            params.push(format_timestamp(start));
        }
        if let Some(end) = query.end {
            conditions.push("r.created_at < ?");
            params.push(format_timestamp(end));
        }

        let where_clause = where_clause(&conditions);

        let count_sql = format!(
            "SELECT COUNT(*) as count FROM security_records r {}",
            where_clause
        );
        let mut count_query = sqlx::query(&count_sql);
        for param in &params {
            count_query = count_query.bind(param);
        }
        let total: i64 = count_query.fetch_one(&self.pool).await?.get("count");

        // SQLite treats a negative LIMIT as unbounded
        let sql = format!(
            "{} {} ORDER BY r.created_at DESC, r.id DESC LIMIT ? OFFSET ?",
            SELECT_RECORDS, where_clause
        );
        let mut records_query = sqlx::query(&sql);
        for param in &params {
            records_query = records_query.bind(param);
        }
        records_query = records_query
            .bind(query.limit.unwrap_or(-1))
            .bind(query.offset);

        let rows = records_query.fetch_all(&self.pool).await?;
        let records: Result<Vec<SecurityRecord>, _> = rows
            .iter()
            .map(|row| SecurityRecord::try_from(row).map_err(DbError::from))
            .collect();

        Ok((records?, total))
    }

    /// Hard-delete a check-in
    pub async fn delete_security_record(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM security_records WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
