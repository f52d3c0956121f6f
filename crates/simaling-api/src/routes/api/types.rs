//! API request and response types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use simaling_db::utils::day_bounds;
use simaling_db::{FamilyMember, FamilyStatus, NewFamilyMember, User};

use crate::error::ApiError;

// ==================== Pagination ====================

/// Default page size
pub const DEFAULT_LIMIT: i64 = 10;
/// Largest page size a client may request
pub const MAX_LIMIT: i64 = 100;

/// Validated page selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    /// Parse raw `page` and `limit` query values.
    ///
    /// Absent values take the defaults; `limit` is capped at [`MAX_LIMIT`].
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Result<Self, ApiError> {
        let page = match page {
            None => 1,
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(|| ApiError::bad_request("Invalid page number"))?,
        };
        let limit = match limit {
            None => DEFAULT_LIMIT,
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|l| *l >= 1)
                .ok_or_else(|| ApiError::bad_request("Invalid limit number"))?
                .min(MAX_LIMIT),
        };
        Ok(Page { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Paginated list response
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, page: Page) -> Self {
        Self {
            data,
            total,
            page: page.page,
            limit: page.limit,
            total_pages: (total + page.limit - 1) / page.limit,
        }
    }
}

/// Query parameters for a bare paginated listing
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

// ==================== Dates ====================

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request("Invalid date format, expected YYYY-MM-DD"))
}

/// Half-open range covering the inclusive UTC day span `start_date..=end_date`
pub fn date_range(
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), ApiError> {
    let start = start_date.map(parse_date).transpose()?;
    let end = end_date.map(parse_date).transpose()?;

    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(ApiError::bad_request("start_date must not be after end_date"));
        }
    }

    Ok((
        start.map(|d| day_bounds(d).0),
        end.map(|d| day_bounds(d).1),
    ))
}

// ==================== Generic Responses ====================

/// `{"message": ...}`
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `{"data": ...}`
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// `{"message": ..., "data": ...}`
#[derive(Debug, Serialize)]
pub struct MessageDataResponse<T> {
    pub message: String,
    pub data: T,
}

impl<T> MessageDataResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

// ==================== Users ====================

/// Family member entry in a create or update request
#[derive(Debug, Deserialize)]
pub struct FamilyMemberRequest {
    /// Existing member to update; ignored on create
    pub id: Option<i64>,
    pub nik: Option<String>,
    pub name: String,
    pub status: String,
}

impl FamilyMemberRequest {
    pub fn to_new_member(&self) -> Result<NewFamilyMember, ApiError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ApiError::bad_request("Family member name cannot be empty"));
        }
        let status: FamilyStatus = self
            .status
            .parse()
            .map_err(|_| ApiError::bad_request("Invalid family member status"))?;

        Ok(NewFamilyMember {
            nik: non_empty(self.nik.as_deref()),
            name: name.to_string(),
            status,
        })
    }
}

/// Create user request
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub phone_no: String,
    pub nik: Option<String>,
    pub email: Option<String>,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub role_id: i64,
    #[serde(default)]
    pub family_members: Vec<FamilyMemberRequest>,
}

/// Update user request; an absent or empty password keeps the current one
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub phone_no: String,
    pub nik: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub role_id: i64,
    #[serde(default)]
    pub family_members: Vec<FamilyMemberRequest>,
}

/// User list query
#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub name: Option<String>,
}

/// A user together with their family members
#[derive(Debug, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub family_members: Vec<FamilyMember>,
}

/// `{"message": ..., "user": ...}`
#[derive(Debug, Serialize)]
pub struct UserMutationResponse {
    pub message: String,
    pub user: UserDetail,
}

// ==================== Auth & Profile ====================

/// Login request; `phone_no` wins when both identifiers are given
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone_no: Option<String>,
    pub nik: Option<String>,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub role: i64,
}

/// Self-service profile update
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
}

/// Password change request
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

// ==================== Funds ====================

/// Funds list query (admin)
#[derive(Debug, Default, Deserialize)]
pub struct FundsListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub status: Option<String>,
    pub is_income: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Funds update request
#[derive(Debug, Deserialize)]
pub struct UpdateFundsRequest {
    pub amount: f64,
    pub is_income: bool,
    pub description: String,
}

// ==================== Security Records ====================

/// Check-in request
#[derive(Debug, Deserialize)]
pub struct CreateSecurityRecordRequest {
    pub block: String,
    /// Household visited; the guard's own number when absent
    #[serde(default)]
    pub phone_no: Option<String>,
    pub longitude: f64,
    pub latitude: f64,
}

/// Check-in list query (admin)
#[derive(Debug, Default, Deserialize)]
pub struct SecurityRecordListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Single-day query
#[derive(Debug, Default, Deserialize)]
pub struct DayQuery {
    pub date: Option<String>,
}

// ==================== Dashboard ====================

/// Dashboard query; unparseable values fall back to the current month
#[derive(Debug, Default, Deserialize)]
pub struct HomeQuery {
    pub month: Option<String>,
    pub year: Option<String>,
}

/// Dashboard response
#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub total_users: i64,
    pub total_security: i64,
    pub users_added_this_month: i64,
    pub current_credit: f64,
    pub total_income: f64,
    pub total_expense: f64,
    pub month: u32,
    pub year: i32,
}

/// Trimmed value, or `None` when absent or blank
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
