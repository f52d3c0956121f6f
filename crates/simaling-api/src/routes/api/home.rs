//! Admin dashboard

use axum::{Json, Router, extract::State, routing::get};
use chrono::{Datelike, Utc};
use simaling_auth::{AdminOnly, Authorized};
use simaling_db::utils::month_bounds;

use crate::error::ApiError;
use crate::extract::QueryParams;
use crate::state::AppState;

use super::types::{HomeQuery, HomeResponse};

/// Resolve the requested month, falling back to the current one field by field
fn resolve_period(query: &HomeQuery) -> (i32, u32) {
    let now = Utc::now();
    let month = query
        .month
        .as_deref()
        .and_then(|m| m.trim().parse::<u32>().ok())
        .filter(|m| (1..=12).contains(m))
        .unwrap_or(now.month());
    let year = query
        .year
        .as_deref()
        .and_then(|y| y.trim().parse::<i32>().ok())
        .filter(|y| (1..=9999).contains(y))
        .unwrap_or(now.year());
    (year, month)
}

/// GET /api/home
async fn home(
    _admin: Authorized<AdminOnly>,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<HomeQuery>,
) -> Result<Json<HomeResponse>, ApiError> {
    let (year, month) = resolve_period(&query);
    let (start, end) = month_bounds(year, month)
        .ok_or_else(|| ApiError::Internal(format!("unrepresentable month {}-{}", year, month)))?;

    let stats = state.db.dashboard_stats(start, end).await?;

    Ok(Json(HomeResponse {
        total_users: stats.total_users,
        total_security: stats.total_security,
        users_added_this_month: stats.users_added,
        current_credit: stats.current_credit,
        total_income: stats.total_income,
        total_expense: stats.total_expense,
        month,
        year,
    }))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/home", get(home))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::TestApp;
    use axum::http::StatusCode;
    use serde_json::json;
    use simaling_db::Role;

    #[test]
    fn invalid_period_falls_back_to_now() {
        let now = Utc::now();
        let query = HomeQuery {
            month: Some("13".to_string()),
            year: Some("abc".to_string()),
        };
        assert_eq!(resolve_period(&query), (now.year(), now.month()));

        let query = HomeQuery {
            month: Some("2".to_string()),
            year: Some("2023".to_string()),
        };
        assert_eq!(resolve_period(&query), (2023, 2));
    }

    #[tokio::test]
    async fn dashboard_reports_accepted_totals() {
        let app = TestApp::new().await;
        let admin = app.create_user("0800", "rahasia123", Role::Admin).await;
        let resident = app.create_user("0811", "rahasia123", Role::User).await;
        app.create_user("0899", "rahasia123", Role::Security).await;
        let admin_token = app.token_for(&admin);

        let (_, body) = app
            .post_multipart(
                "/api/funds",
                Some(&app.token_for(&resident)),
                &[("amount", "250"), ("is_income", "true"), ("description", "Iuran")],
                None,
            )
            .await;
        let id = body["data"]["id"].as_i64().unwrap();
        app.put_json(&format!("/api/funds/{}/accept", id), Some(&admin_token), json!({}))
            .await;

        let (status, body) = app.get("/api/home", Some(&admin_token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_users"], 1);
        assert_eq!(body["total_security"], 1);
        assert_eq!(body["users_added_this_month"], 1);
        assert_eq!(body["current_credit"], 250.0);
        assert_eq!(body["total_income"], 250.0);
        assert_eq!(body["total_expense"], 0.0);

        let (_, body) = app.get("/api/home?month=1&year=2000", Some(&admin_token)).await;
        assert_eq!(body["month"], 1);
        assert_eq!(body["year"], 2000);
        assert_eq!(body["total_income"], 0.0);
        assert_eq!(body["current_credit"], 250.0);

        let (status, _) = app.get("/api/home", Some(&app.token_for(&resident))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
