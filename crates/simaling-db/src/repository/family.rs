//! Family member operations
//!
//! Writes run inside the transaction of the owning user operation, so the
//! helpers here take a connection rather than the pool.

use chrono::Utc;
use sqlx::{Row, SqliteConnection};
use std::collections::HashSet;

use crate::error::DbError;
use crate::models::{FamilyMember, FamilyMemberChange, NewFamilyMember};
use crate::repository::Database;
use crate::utils::format_timestamp;

impl Database {
    /// List the family members of a head of family
    pub async fn list_family_members(&self, head_of_family_id: i64) -> Result<Vec<FamilyMember>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, head_of_family_id, nik, name, status, created_at, updated_at
            FROM family_members
            WHERE head_of_family_id = ?
            ORDER BY id
            "#,
        )
        .bind(head_of_family_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| FamilyMember::try_from(row).map_err(DbError::from))
            .collect()
    }
}

/// Insert family members for a head of family
pub(crate) async fn insert_family_members(
    conn: &mut SqliteConnection,
    head_of_family_id: i64,
    members: &[NewFamilyMember],
) -> Result<Vec<FamilyMember>, DbError> {
    let now = Utc::now();
    let mut inserted = Vec::with_capacity(members.len());

    for member in members {
        let row = sqlx::query(
            r#"
            INSERT INTO family_members (head_of_family_id, nik, name, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(head_of_family_id)
        .bind(&member.nik)
        .bind(&member.name)
        .bind(member.status.as_str())
        .bind(format_timestamp(now))
        .bind(format_timestamp(now))
        .fetch_one(&mut *conn)
        .await?;

        inserted.push(FamilyMember {
            id: row.get("id"),
            head_of_family_id,
            nik: member.nik.clone(),
            name: member.name.clone(),
            status: member.status,
            created_at: now,
            updated_at: now,
        });
    }

    Ok(inserted)
}

/// Make the stored family match `changes`
///
/// Entries with a known id are updated, entries without an id are inserted,
/// and stored members absent from `changes` are deleted. Ids that belong to
/// another household are ignored.
pub(crate) async fn sync_family_members(
    conn: &mut SqliteConnection,
    head_of_family_id: i64,
    changes: &[FamilyMemberChange],
) -> Result<(), DbError> {
    let existing: HashSet<i64> = sqlx::query("SELECT id FROM family_members WHERE head_of_family_id = ?")
        .bind(head_of_family_id)
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(|row| row.get("id"))
        .collect();

    let now = format_timestamp(Utc::now());
    let mut kept = HashSet::new();
    let mut new_members = Vec::new();

    for change in changes {
        match change.id {
            Some(id) if existing.contains(&id) => {
                sqlx::query(
                    r#"
                    UPDATE family_members
                    SET nik = ?, name = ?, status = ?, updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&change.member.nik)
                .bind(&change.member.name)
                .bind(change.member.status.as_str())
                .bind(&now)
                .bind(id)
                .execute(&mut *conn)
                .await?;
                kept.insert(id);
            }
            Some(_) => {}
            None => new_members.push(change.member.clone()),
        }
    }

    for id in existing.difference(&kept) {
        sqlx::query("DELETE FROM family_members WHERE id = ?")
            .bind(*id)
            .execute(&mut *conn)
            .await?;
    }

    insert_family_members(conn, head_of_family_id, &new_members).await?;
    Ok(())
}
