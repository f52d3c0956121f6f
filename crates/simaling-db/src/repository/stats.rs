//! Dashboard aggregates

use chrono::{DateTime, Utc};

use crate::error::DbError;
use crate::models::{DashboardStats, Role};
use crate::repository::Database;

impl Database {
    /// Collect dashboard figures for the period `[start, end)`.
    ///
    /// Head counts and credit are all-time; `users_added` and the
    /// income/expense totals are restricted to the period.
    pub async fn dashboard_stats(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<DashboardStats, DbError> {
        let period = Some((start, end));

        let total_users = self.count_users(Role::User, None).await?;
        let total_security = self.count_users(Role::Security, None).await?;
        let users_added = self.count_users(Role::User, period).await?;

        let all_income = self.sum_accepted_funds(true, None).await?;
        let all_expense = self.sum_accepted_funds(false, None).await?;

        Ok(DashboardStats {
            total_users,
            total_security,
            users_added,
            current_credit: all_income - all_expense,
            total_income: self.sum_accepted_funds(true, period).await?,
            total_expense: self.sum_accepted_funds(false, period).await?,
        })
    }
}
