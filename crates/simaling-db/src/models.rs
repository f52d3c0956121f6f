//! Database models

use crate::utils::parse_datetime_or_now;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

/// Error type for parsing models from strings
#[derive(Debug, Clone)]
pub enum ParseError {
    InvalidFamilyStatus(String),
    InvalidFundsStatus(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidFamilyStatus(s) => write!(f, "Invalid family status: {}", s),
            ParseError::InvalidFundsStatus(s) => write!(f, "Invalid funds status: {}", s),
        }
    }
}

impl std::error::Error for ParseError {}

/// User role
///
/// The numeric ids are part of the public API: login responses and user
/// payloads carry `role_id`, and the `roles` table is seeded with exactly
/// these rows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    User,
    Security,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::User, Role::Security];

    pub fn id(&self) -> i64 {
        match self {
            Role::Admin => 1,
            Role::User => 2,
            Role::Security => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::User => "User",
            Role::Security => "Security",
        }
    }

    pub fn from_id(id: i64) -> Option<Role> {
        Role::ALL.into_iter().find(|r| r.id() == id)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row of the `roles` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: i64,
    pub role_name: String,
    pub created_at: DateTime<Utc>,
}

/// User model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub phone_no: String,
    pub nik: Option<String>,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub address: String,
    pub role_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Resolve the role reference; `None` when it points at an unknown role
    pub fn role(&self) -> Option<Role> {
        Role::from_id(self.role_id)
    }
}

/// New user (for insertion)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub phone_no: String,
    pub nik: Option<String>,
    pub email: Option<String>,
    pub password_hash: String,
    pub name: String,
    pub address: String,
    pub role: Role,
}

/// Full user update issued by an administrator
#[derive(Debug, Clone)]
pub struct UpdateUser {
    pub phone_no: String,
    pub nik: Option<String>,
    pub email: Option<String>,
    pub name: String,
    pub address: String,
    pub role: Role,
    /// Replaces the stored hash when present
    pub password_hash: Option<String>,
}

/// Self-service profile update; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
}

/// Relation of a family member to the head of family
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FamilyStatus {
    Wife,
    Child,
}

impl FamilyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FamilyStatus::Wife => "wife",
            FamilyStatus::Child => "child",
        }
    }
}

impl FromStr for FamilyStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wife" => Ok(FamilyStatus::Wife),
            "child" => Ok(FamilyStatus::Child),
            _ => Err(ParseError::InvalidFamilyStatus(s.to_string())),
        }
    }
}

/// Family member model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyMember {
    pub id: i64,
    pub head_of_family_id: i64,
    pub nik: Option<String>,
    pub name: String,
    pub status: FamilyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New family member (for insertion)
#[derive(Debug, Clone)]
pub struct NewFamilyMember {
    pub nik: Option<String>,
    pub name: String,
    pub status: FamilyStatus,
}

/// Family member entry in a user update.
///
/// Entries with an `id` update that member, entries without one are inserted.
#[derive(Debug, Clone)]
pub struct FamilyMemberChange {
    pub id: Option<i64>,
    pub member: NewFamilyMember,
}

/// Approval state of a funds entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FundsStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FundsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundsStatus::Pending => "Pending",
            FundsStatus::Accepted => "Accepted",
            FundsStatus::Rejected => "Rejected",
        }
    }
}

impl FromStr for FundsStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(FundsStatus::Pending),
            "accepted" => Ok(FundsStatus::Accepted),
            "rejected" => Ok(FundsStatus::Rejected),
            _ => Err(ParseError::InvalidFundsStatus(s.to_string())),
        }
    }
}

/// Funds ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Funds {
    pub id: i64,
    pub user_id: i64,
    pub amount: f64,
    /// Path relative to the public base URL, e.g. `uploads/1700000000.jpg`
    pub image: Option<String>,
    pub description: String,
    pub is_income: bool,
    pub status: FundsStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New funds entry (for insertion); always starts as `Pending`
#[derive(Debug, Clone)]
pub struct NewFunds {
    pub user_id: i64,
    pub amount: f64,
    pub image: Option<String>,
    pub description: String,
    pub is_income: bool,
}

/// Editable funds fields
#[derive(Debug, Clone)]
pub struct UpdateFunds {
    pub amount: f64,
    pub description: String,
    pub is_income: bool,
}

/// Security guard check-in, joined with the guard's display name on reads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityRecord {
    pub id: i64,
    pub security_id: i64,
    pub security_name: Option<String>,
    pub block: String,
    pub phone_no: String,
    pub longitude: String,
    pub latitude: String,
    pub created_at: DateTime<Utc>,
}

/// New security record (for insertion)
#[derive(Debug, Clone)]
pub struct NewSecurityRecord {
    pub security_id: i64,
    pub block: String,
    pub phone_no: String,
    pub longitude: String,
    pub latitude: String,
}

/// Invalidated token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub id: i64,
    pub token: String,
    /// Natural expiry of the token; the row is redundant after this instant
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Aggregates for the admin dashboard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_security: i64,
    pub users_added: i64,
    pub current_credit: f64,
    pub total_income: f64,
    pub total_expense: f64,
}

// ==================== TryFrom Implementations ====================

impl TryFrom<&sqlx::sqlite::SqliteRow> for RoleRecord {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        Ok(RoleRecord {
            id: row.try_get("id")?,
            role_name: row.try_get("role_name")?,
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
        })
    }
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for User {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.try_get("id")?,
            phone_no: row.try_get("phone_no")?,
            nik: row.try_get("nik")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            name: row.try_get("name")?,
            address: row.try_get("address")?,
            role_id: row.try_get("role_id")?,
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
            updated_at: parse_datetime_or_now(&row.try_get::<String, _>("updated_at")?),
        })
    }
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for FamilyMember {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        let status_str: String = row.try_get("status")?;
        Ok(FamilyMember {
            id: row.try_get("id")?,
            head_of_family_id: row.try_get("head_of_family_id")?,
            nik: row.try_get("nik")?,
            name: row.try_get("name")?,
            status: FamilyStatus::from_str(&status_str).unwrap_or(FamilyStatus::Child),
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
            updated_at: parse_datetime_or_now(&row.try_get::<String, _>("updated_at")?),
        })
    }
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for Funds {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        let status_str: String = row.try_get("status")?;
        Ok(Funds {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            amount: row.try_get("amount")?,
            image: row.try_get("image")?,
            description: row.try_get("description")?,
            is_income: row.try_get("is_income")?,
            status: FundsStatus::from_str(&status_str).unwrap_or(FundsStatus::Pending),
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
            updated_at: parse_datetime_or_now(&row.try_get::<String, _>("updated_at")?),
        })
    }
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for SecurityRecord {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        Ok(SecurityRecord {
            id: row.try_get("id")?,
            security_id: row.try_get("security_id")?,
            security_name: row.try_get("security_name")?,
            block: row.try_get("block")?,
            phone_no: row.try_get("phone_no")?,
            longitude: row.try_get("longitude")?,
            latitude: row.try_get("latitude")?,
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ids_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::from_id(role.id()), Some(role));
        }
        assert_eq!(Role::from_id(0), None);
        assert_eq!(Role::from_id(4), None);
    }

    #[test]
    fn family_status_rejects_unknown() {
        assert_eq!("Wife".parse::<FamilyStatus>().unwrap(), FamilyStatus::Wife);
        assert!("cousin".parse::<FamilyStatus>().is_err());
    }

    #[test]
    fn user_role_resolution() {
        let now = Utc::now();
        let mut user = User {
            id: 1,
            phone_no: "081234567890".to_string(),
            nik: None,
            email: None,
            password_hash: String::new(),
            name: "Test".to_string(),
            address: String::new(),
            role_id: 3,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(user.role(), Some(Role::Security));

        user.role_id = 9;
        assert_eq!(user.role(), None);
    }
}
