//! User operations

use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::error::DbError;
use crate::models::{
    FamilyMember, FamilyMemberChange, NewFamilyMember, NewUser, Role, UpdateProfile, UpdateUser,
    User,
};
use crate::repository::family::{insert_family_members, sync_family_members};
use crate::repository::{Database, where_clause};
use crate::utils::{escape_like, format_timestamp};

/// Query parameters for listing users
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    /// Case-insensitive substring match on the display name
    pub name: Option<String>,
    /// Pagination offset
    pub offset: i64,
    /// Pagination limit
    pub limit: i64,
}

impl Database {
    // ==================== User Operations ====================

    /// Insert a new user together with their family members
    pub async fn insert_user(
        &self,
        user: NewUser,
        family: Vec<NewFamilyMember>,
    ) -> Result<(User, Vec<FamilyMember>), DbError> {
        let now = Utc::now();

        // Check if phone number or NIK is already registered
        if self.identity_taken(&user.phone_no, user.nik.as_deref(), None).await? {
            return Err(DbError::Duplicate(format!("User '{}' already exists", user.phone_no)));
        }

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO users (phone_no, nik, email, password_hash, name, address, role_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&user.phone_no)
        .bind(&user.nik)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&user.address)
        .bind(user.role.id())
        .bind(format_timestamp(now))
        .bind(format_timestamp(now))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DbError::from_write(e, &user.phone_no))?;

        let id: i64 = result.get("id");
        let members = insert_family_members(&mut *tx, id, &family).await?;
        tx.commit().await?;

        Ok((
            User {
                id,
                phone_no: user.phone_no,
                nik: user.nik,
                email: user.email,
                password_hash: user.password_hash,
                name: user.name,
                address: user.address,
                role_id: user.role.id(),
                created_at: now,
                updated_at: now,
            },
            members,
        ))
    }

    /// Check whether a phone number or NIK belongs to another account
    ///
    /// Soft-deleted accounts still hold their identifiers.
    async fn identity_taken(
        &self,
        phone_no: &str,
        nik: Option<&str>,
        exclude_id: Option<i64>,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM users
            WHERE (phone_no = ? OR (? IS NOT NULL AND nik = ?))
              AND id != ?
            "#,
        )
        .bind(phone_no)
        .bind(nik)
        .bind(nik)
        .bind(exclude_id.unwrap_or(-1))
        .fetch_one(&self.pool)
        .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }

    /// Get a user by phone number
    pub async fn get_user_by_phone(&self, phone_no: &str) -> Result<Option<User>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, phone_no, nik, email, password_hash, name, address, role_id, created_at, updated_at
            FROM users
            WHERE phone_no = ? AND deleted_at IS NULL
            "#,
        )
        .bind(phone_no)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Get a user by NIK (national identity number)
    pub async fn get_user_by_nik(&self, nik: &str) -> Result<Option<User>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, phone_no, nik, email, password_hash, name, address, role_id, created_at, updated_at
            FROM users
            WHERE nik = ? AND deleted_at IS NULL
            "#,
        )
        .bind(nik)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Get a user by ID
    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, phone_no, nik, email, password_hash, name, address, role_id, created_at, updated_at
            FROM users
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// List users with optional name filter and pagination
    pub async fn list_users(&self, query: UserQuery) -> Result<(Vec<User>, i64), DbError> {
        let mut conditions = vec!["deleted_at IS NULL"];
        let mut params: Vec<String> = Vec::new();

        if let Some(name) = &query.name {
            conditions.push("name LIKE ? ESCAPE '\\'");
            params.push(format!("%{}%", escape_like(name)));
        }

        let where_clause = where_clause(&conditions);

        // Get total count
        let count_sql = format!("SELECT COUNT(*) as count FROM users {}", where_clause);
        let mut count_query = sqlx::query(&count_sql);
        for param in &params {
            count_query = count_query.bind(param);
        }
        let count_row = count_query.fetch_one(&self.pool).await?;
        let total: i64 = count_row.get("count");

        let sql = format!(
            r#"
            SELECT id, phone_no, nik, email, password_hash, name, address, role_id, created_at, updated_at
            FROM users
            {}
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
            where_clause
        );

        let mut users_query = sqlx::query(&sql);
        for param in &params {
            users_query = users_query.bind(param);
        }
        users_query = users_query.bind(query.limit).bind(query.offset);

        let rows = users_query.fetch_all(&self.pool).await?;
        let users: Result<Vec<User>, _> = rows
            .iter()
            .map(|row| User::try_from(row).map_err(DbError::from))
            .collect();

        Ok((users?, total))
    }

    /// Replace a user's fields and synchronise their family members
    ///
    /// Returns `None` when the user does not exist.
    pub async fn update_user(
        &self,
        id: i64,
        update: UpdateUser,
        family: Vec<FamilyMemberChange>,
    ) -> Result<Option<User>, DbError> {
        if self.get_user_by_id(id).await?.is_none() {
            return Ok(None);
        }

        if self.identity_taken(&update.phone_no, update.nik.as_deref(), Some(id)).await? {
            return Err(DbError::Duplicate(format!("User '{}' already exists", update.phone_no)));
        }

        let now = format_timestamp(Utc::now());
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE users
            SET phone_no = ?, nik = ?, email = ?, name = ?, address = ?, role_id = ?,
                password_hash = COALESCE(?, password_hash), updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(&update.phone_no)
        .bind(&update.nik)
        .bind(&update.email)
        .bind(&update.name)
        .bind(&update.address)
        .bind(update.role.id())
        .bind(&update.password_hash)
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from_write(e, &update.phone_no))?;

        sync_family_members(&mut *tx, id, &family).await?;
        tx.commit().await?;

        self.get_user_by_id(id).await
    }

    /// Update the self-service profile fields
    pub async fn update_profile(&self, id: i64, update: UpdateProfile) -> Result<Option<User>, DbError> {
        let now = format_timestamp(Utc::now());
        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = COALESCE(?, name),
                address = COALESCE(?, address),
                email = COALESCE(?, email),
                updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(&update.name)
        .bind(&update.address)
        .bind(&update.email)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_user_by_id(id).await
    }

    /// Update user password
    pub async fn update_user_password(&self, id: i64, password_hash: &str) -> Result<bool, DbError> {
        let now = format_timestamp(Utc::now());
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(password_hash)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete a user
    pub async fn delete_user(&self, id: i64) -> Result<bool, DbError> {
        let now = format_timestamp(Utc::now());
        let result = sqlx::query("UPDATE users SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Check if a live administrator exists
    pub async fn has_admin(&self) -> Result<bool, DbError> {
        Ok(self.count_users(Role::Admin, None).await? > 0)
    }

    /// Count live users with a role, optionally only those created in `[start, end)`
    pub async fn count_users(
        &self,
        role: Role,
        created_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<i64, DbError> {
        let (start, end) = match created_between {
            Some((start, end)) => (Some(format_timestamp(start)), Some(format_timestamp(end))),
            None => (None, None),
        };

        let result = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM users
            WHERE role_id = ? AND deleted_at IS NULL
              AND (? IS NULL OR created_at >= ?)
              AND (? IS NULL OR created_at < ?)
            "#,
        )
        .bind(role.id())
        .bind(&start)
        .bind(&start)
        .bind(&end)
        .bind(&end)
        .fetch_one(&self.pool)
        .await?;
        Ok(result.get("count"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FamilyStatus;
    use crate::repository::test_support::{create_user, memory_db};

    fn new_user(phone_no: &str, nik: Option<&str>) -> NewUser {
        NewUser {
            phone_no: phone_no.to_string(),
            nik: nik.map(str::to_string),
            email: Some("warga@example.com".to_string()),
            password_hash: "hash".to_string(),
            name: "Budi".to_string(),
            address: "Blok C no. 3".to_string(),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn insert_user_with_family() {
        let db = memory_db().await;
        let (user, family) = db
            .insert_user(
                new_user("081234567890", Some("3201")),
                vec![NewFamilyMember {
                    nik: None,
                    name: "Siti".to_string(),
                    status: FamilyStatus::Wife,
                }],
            )
            .await
            .unwrap();

        assert_eq!(user.role(), Some(Role::User));
        assert_eq!(family.len(), 1);
        assert_eq!(db.list_family_members(user.id).await.unwrap().len(), 1);

        let by_phone = db.get_user_by_phone("081234567890").await.unwrap().unwrap();
        assert_eq!(by_phone.id, user.id);
        let by_nik = db.get_user_by_nik("3201").await.unwrap().unwrap();
        assert_eq!(by_nik.id, user.id);
    }

    #[tokio::test]
    async fn duplicate_phone_or_nik_is_rejected() {
        let db = memory_db().await;
        db.insert_user(new_user("0811", Some("1")), Vec::new()).await.unwrap();

        let err = db.insert_user(new_user("0811", None), Vec::new()).await.unwrap_err();
        assert!(matches!(err, DbError::Duplicate(_)));

        let err = db.insert_user(new_user("0822", Some("1")), Vec::new()).await.unwrap_err();
        assert!(matches!(err, DbError::Duplicate(_)));
    }

    #[tokio::test]
    async fn soft_deleted_users_are_hidden() {
        let db = memory_db().await;
        let user = create_user(&db, "0811", "Budi", Role::User).await;

        assert!(db.delete_user(user.id).await.unwrap());
        assert!(!db.delete_user(user.id).await.unwrap());
        assert!(db.get_user_by_id(user.id).await.unwrap().is_none());
        assert!(db.get_user_by_phone("0811").await.unwrap().is_none());

        let (users, total) = db
            .list_users(UserQuery { name: None, offset: 0, limit: 10 })
            .await
            .unwrap();
        assert!(users.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn list_users_filters_and_paginates() {
        let db = memory_db().await;
        create_user(&db, "0801", "Andi", Role::User).await;
        create_user(&db, "0802", "Budi", Role::User).await;
        create_user(&db, "0803", "Budiman", Role::Security).await;

        let (users, total) = db
            .list_users(UserQuery { name: Some("budi".to_string()), offset: 0, limit: 1 })
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Budi");

        let (users, _) = db
            .list_users(UserQuery { name: Some("budi".to_string()), offset: 1, limit: 1 })
            .await
            .unwrap();
        assert_eq!(users[0].name, "Budiman");
    }

    #[tokio::test]
    async fn list_users_matches_wildcards_literally() {
        let db = memory_db().await;
        create_user(&db, "0801", "Andi 100%", Role::User).await;
        create_user(&db, "0802", "Budi_Santoso", Role::User).await;
        create_user(&db, "0803", "Citra", Role::User).await;

        for (needle, expected) in [("%", "Andi 100%"), ("_", "Budi_Santoso")] {
            let (users, total) = db
                .list_users(UserQuery { name: Some(needle.to_string()), offset: 0, limit: 10 })
                .await
                .unwrap();
            assert_eq!(total, 1, "{}", needle);
            assert_eq!(users[0].name, expected);
        }
    }

    #[tokio::test]
    async fn update_user_syncs_family() {
        let db = memory_db().await;
        let (user, family) = db
            .insert_user(
                new_user("0811", None),
                vec![
                    NewFamilyMember { nik: None, name: "Siti".to_string(), status: FamilyStatus::Wife },
                    NewFamilyMember { nik: None, name: "Adi".to_string(), status: FamilyStatus::Child },
                ],
            )
            .await
            .unwrap();

        let updated = db
            .update_user(
                user.id,
                UpdateUser {
                    phone_no: "0812".to_string(),
                    nik: None,
                    email: None,
                    name: "Budi S".to_string(),
                    address: "Blok D".to_string(),
                    role: Role::Security,
                    password_hash: None,
                },
                vec![
                    FamilyMemberChange {
                        id: Some(family[0].id),
                        member: NewFamilyMember {
                            nik: None,
                            name: "Siti Aminah".to_string(),
                            status: FamilyStatus::Wife,
                        },
                    },
                    FamilyMemberChange {
                        id: None,
                        member: NewFamilyMember {
                            nik: None,
                            name: "Ayu".to_string(),
                            status: FamilyStatus::Child,
                        },
                    },
                ],
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.phone_no, "0812");
        assert_eq!(updated.role(), Some(Role::Security));
        assert_eq!(updated.password_hash, "hash");

        let names: Vec<_> = db
            .list_family_members(user.id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["Siti Aminah", "Ayu"]);
    }

    #[tokio::test]
    async fn update_missing_user_returns_none() {
        let db = memory_db().await;
        let result = db
            .update_user(
                42,
                UpdateUser {
                    phone_no: "0811".to_string(),
                    nik: None,
                    email: None,
                    name: "X".to_string(),
                    address: String::new(),
                    role: Role::User,
                    password_hash: None,
                },
                Vec::new(),
            )
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn profile_and_password_updates() {
        let db = memory_db().await;
        let user = create_user(&db, "0811", "Budi", Role::User).await;

        let updated = db
            .update_profile(
                user.id,
                UpdateProfile { name: None, address: Some("Blok Z".to_string()), email: None },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Budi");
        assert_eq!(updated.address, "Blok Z");

        assert!(db.update_user_password(user.id, "new-hash").await.unwrap());
        let reloaded = db.get_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.password_hash, "new-hash");
    }

    #[tokio::test]
    async fn counts_users_by_role() {
        let db = memory_db().await;
        assert!(!db.has_admin().await.unwrap());

        create_user(&db, "0800", "Admin", Role::Admin).await;
        create_user(&db, "0801", "A", Role::User).await;
        create_user(&db, "0802", "B", Role::User).await;

        assert!(db.has_admin().await.unwrap());
        assert_eq!(db.count_users(Role::User, None).await.unwrap(), 2);

        let now = Utc::now();
        let window = (now - chrono::Duration::hours(1), now + chrono::Duration::hours(1));
        assert_eq!(db.count_users(Role::User, Some(window)).await.unwrap(), 2);

        let past = (now - chrono::Duration::days(10), now - chrono::Duration::days(9));
        assert_eq!(db.count_users(Role::User, Some(past)).await.unwrap(), 0);
    }
}
