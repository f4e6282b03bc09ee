use anyhow::Result;
use rusqlite::params;
use study_types::models::NotificationType;

use crate::models::{NewNotification, NotificationRow};
use crate::Database;

impl Database {
    /// Insert a single notification row. Self-notifications are suppressed:
    /// when the sender is the recipient, nothing is written and `None` is
    /// returned.
    pub fn create_notification(&self, new: NewNotification<'_>) -> Result<Option<i64>> {
        if new.from_user_id == Some(new.user_id) {
            return Ok(None);
        }

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications
                     (user_id, notification_type, message, post_id, issue_id, study_id, from_user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    new.user_id,
                    new.notification_type.as_str(),
                    new.message,
                    new.post_id,
                    new.issue_id,
                    new.study_id,
                    new.from_user_id,
                ],
            )?;
            Ok(Some(conn.last_insert_rowid()))
        })
    }

    /// Fan one notification out to every member of a study except
    /// `exclude_user_id` (and the sender). A single bulk insert keeps the
    /// fan-out atomic and O(1) statements regardless of member count; each
    /// recipient still gets exactly one row.
    #[allow(clippy::too_many_arguments)]
    pub fn notify_study_members(
        &self,
        study_id: i64,
        notification_type: NotificationType,
        message: &str,
        exclude_user_id: i64,
        post_id: Option<i64>,
        issue_id: Option<i64>,
        from_user_id: i64,
    ) -> Result<usize> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO notifications
                     (user_id, notification_type, message, post_id, issue_id, study_id, from_user_id)
                 SELECT m.user_id, ?2, ?3, ?4, ?5, ?1, ?7
                 FROM study_members m
                 WHERE m.study_id = ?1 AND m.user_id != ?6 AND m.user_id != ?7",
                params![
                    study_id,
                    notification_type.as_str(),
                    message,
                    post_id,
                    issue_id,
                    exclude_user_id,
                    from_user_id,
                ],
            )?;
            Ok(inserted)
        })
    }

    pub fn list_notifications(
        &self,
        user_id: i64,
        skip: i64,
        limit: i64,
        unread_only: bool,
    ) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let unread_clause = if unread_only { "AND n.is_read = 0" } else { "" };
            let sql = format!(
                "SELECT n.id, n.user_id, n.notification_type, n.message,
                        n.post_id, n.issue_id, n.study_id, n.from_user_id,
                        u.username, n.is_read, n.created_at
                 FROM notifications n
                 LEFT JOIN users u ON n.from_user_id = u.id
                 WHERE n.user_id = ?1 {unread_clause}
                 ORDER BY n.created_at DESC, n.id DESC
                 LIMIT ?2 OFFSET ?3"
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![user_id, limit, skip], |row| {
                    Ok(NotificationRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        notification_type: row.get(2)?,
                        message: row.get(3)?,
                        post_id: row.get(4)?,
                        issue_id: row.get(5)?,
                        study_id: row.get(6)?,
                        from_user_id: row.get(7)?,
                        from_username: row.get(8)?,
                        is_read: row.get(9)?,
                        created_at: row.get(10)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn count_notifications(&self, user_id: i64, unread_only: bool) -> Result<i64> {
        self.with_conn(|conn| {
            let unread_clause = if unread_only { "AND is_read = 0" } else { "" };
            let sql = format!(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 {unread_clause}"
            );
            let n = conn.query_row(&sql, params![user_id], |row| row.get(0))?;
            Ok(n)
        })
    }

    pub fn unread_notification_count(&self, user_id: i64) -> Result<i64> {
        self.count_notifications(user_id, true)
    }

    /// Mark the given notifications read, or all unread ones when `ids` is
    /// `None`. Only rows owned by `user_id` are touched.
    pub fn mark_notifications_read(&self, user_id: i64, ids: Option<&[i64]>) -> Result<usize> {
        self.with_conn(|conn| {
            let updated = match ids {
                None => conn.execute(
                    "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
                    params![user_id],
                )?,
                Some(ids) if ids.is_empty() => 0,
                Some(ids) => {
                    let placeholders: Vec<String> =
                        (2..=ids.len() + 1).map(|i| format!("?{i}")).collect();
                    let sql = format!(
                        "UPDATE notifications SET is_read = 1
                         WHERE user_id = ?1 AND is_read = 0 AND id IN ({})",
                        placeholders.join(", ")
                    );
                    let mut args: Vec<&dyn rusqlite::types::ToSql> = vec![&user_id];
                    args.extend(ids.iter().map(|id| id as &dyn rusqlite::types::ToSql));
                    conn.execute(&sql, args.as_slice())?
                }
            };
            Ok(updated)
        })
    }

    pub fn delete_notification(&self, id: i64, user_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )?;
            Ok(deleted > 0)
        })
    }

    pub fn delete_all_notifications(&self, user_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM notifications WHERE user_id = ?1",
                params![user_id],
            )?;
            Ok(())
        })
    }
}
