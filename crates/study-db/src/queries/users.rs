use anyhow::Result;
use rusqlite::{Connection, params};

use super::OptionalExt;
use crate::models::UserRow;
use crate::Database;

const USER_COLUMNS: &str = "id, email, username, password, \
     password_reset_token, password_reset_expires, created_at, updated_at";

impl Database {
    pub fn create_user(&self, email: &str, username: &str, password_hash: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (email, username, password) VALUES (?1, ?2, ?3)",
                params![email, username, password_hash],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(conn, "email = ?1", params![email])
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", params![id]))
    }

    /// Partial profile update; `None` fields are left untouched.
    pub fn update_user_profile(
        &self,
        id: i64,
        username: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users
                 SET username   = COALESCE(?2, username),
                     password   = COALESCE(?3, password),
                     updated_at = datetime('now')
                 WHERE id = ?1",
                params![id, username, password_hash],
            )?;
            Ok(())
        })
    }

    /// Store a reset token, overwriting any previous one.
    pub fn set_reset_token(&self, user_id: i64, token: &str, expires: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users
                 SET password_reset_token = ?2, password_reset_expires = ?3
                 WHERE id = ?1",
                params![user_id, token, expires],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_reset_token(&self, token: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(conn, "password_reset_token = ?1", params![token])
        })
    }

    pub fn clear_reset_token(&self, user_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users
                 SET password_reset_token = NULL, password_reset_expires = NULL
                 WHERE id = ?1",
                params![user_id],
            )?;
            Ok(())
        })
    }

    /// Redeem a reset token: set the new password and clear the token in one
    /// statement, so a redeemed token can never be replayed.
    pub fn reset_password(&self, user_id: i64, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users
                 SET password = ?2,
                     password_reset_token = NULL,
                     password_reset_expires = NULL,
                     updated_at = datetime('now')
                 WHERE id = ?1",
                params![user_id, password_hash],
            )?;
            Ok(())
        })
    }
}

fn query_user(
    conn: &Connection,
    predicate: &str,
    args: impl rusqlite::Params,
) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate}");
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row(args, |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                username: row.get(2)?,
                password_hash: row.get(3)?,
                password_reset_token: row.get(4)?,
                password_reset_expires: row.get(5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            })
        })
        .optional()?;

    Ok(row)
}
