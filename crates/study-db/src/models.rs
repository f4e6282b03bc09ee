//! Database row types — these map directly to SQLite rows.
//! Distinct from the study-types API models to keep the DB layer independent.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use study_types::models::NotificationType;
use tracing::warn;

pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub password_reset_token: Option<String>,
    pub password_reset_expires: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct StudyRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

pub struct MemberRow {
    pub id: i64,
    pub study_id: i64,
    pub user_id: i64,
    pub username: String,
    pub role: String,
    pub joined_at: String,
}

pub struct PostRow {
    pub id: i64,
    pub study_id: i64,
    pub user_id: i64,
    pub author_username: String,
    pub title: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct PostListRow {
    pub id: i64,
    pub study_id: i64,
    pub user_id: i64,
    pub author_username: String,
    pub title: String,
    pub comment_count: i64,
    pub created_at: String,
}

pub struct IssueRow {
    pub id: i64,
    pub study_id: i64,
    pub user_id: i64,
    pub author_username: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct CommentRow {
    pub id: i64,
    pub post_id: Option<i64>,
    pub issue_id: Option<i64>,
    pub user_id: i64,
    pub author_username: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct NotificationRow {
    pub id: i64,
    pub user_id: i64,
    pub notification_type: String,
    pub message: String,
    pub post_id: Option<i64>,
    pub issue_id: Option<i64>,
    pub study_id: Option<i64>,
    pub from_user_id: Option<i64>,
    pub from_username: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

pub struct NewNotification<'a> {
    pub user_id: i64,
    pub notification_type: NotificationType,
    pub message: &'a str,
    pub post_id: Option<i64>,
    pub issue_id: Option<i64>,
    pub study_id: Option<i64>,
    pub from_user_id: Option<i64>,
}

/// Parse a SQLite timestamp column.
///
/// SQLite's datetime('now') stores \"YYYY-MM-DD HH:MM:SS\" without a
/// timezone; treat it as naive UTC. RFC 3339 values are accepted too.
pub fn parse_datetime(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

/// Parse an optional date column (\"YYYY-MM-DD\").
pub fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?;
    match raw.parse::<NaiveDate>() {
        Ok(d) => Some(d),
        Err(e) => {
            warn!("Corrupt date '{}': {}", raw, e);
            None
        }
    }
}
