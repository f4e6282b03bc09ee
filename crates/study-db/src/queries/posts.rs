use anyhow::Result;
use rusqlite::params;

use super::OptionalExt;
use crate::models::{PostListRow, PostRow};
use crate::Database;

impl Database {
    pub fn count_posts(&self, study_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM posts WHERE study_id = ?1",
                params![study_id],
                |row| row.get(0),
            )?;
            Ok(n)
        })
    }

    /// List rows carry the author username and comment count in one query.
    pub fn list_posts(&self, study_id: i64, skip: i64, limit: i64) -> Result<Vec<PostListRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.study_id, p.user_id, u.username, p.title,
                        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id),
                        p.created_at
                 FROM posts p
                 JOIN users u ON p.user_id = u.id
                 WHERE p.study_id = ?1
                 ORDER BY p.created_at DESC, p.id DESC
                 LIMIT ?2 OFFSET ?3",
            )?;

            let rows = stmt
                .query_map(params![study_id, limit, skip], |row| {
                    Ok(PostListRow {
                        id: row.get(0)?,
                        study_id: row.get(1)?,
                        user_id: row.get(2)?,
                        author_username: row.get(3)?,
                        title: row.get(4)?,
                        comment_count: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn get_post(&self, id: i64) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.study_id, p.user_id, u.username, p.title, p.content,
                        p.created_at, p.updated_at
                 FROM posts p
                 JOIN users u ON p.user_id = u.id
                 WHERE p.id = ?1",
            )?;

            let row = stmt
                .query_row(params![id], |row| {
                    Ok(PostRow {
                        id: row.get(0)?,
                        study_id: row.get(1)?,
                        user_id: row.get(2)?,
                        author_username: row.get(3)?,
                        title: row.get(4)?,
                        content: row.get(5)?,
                        created_at: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                })
                .optional()?;

            Ok(row)
        })
    }

    pub fn create_post(
        &self,
        study_id: i64,
        user_id: i64,
        title: &str,
        content: &str,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (study_id, user_id, title, content) VALUES (?1, ?2, ?3, ?4)",
                params![study_id, user_id, title, content],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn update_post(&self, id: i64, title: &str, content: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE posts
                 SET title = ?2, content = ?3, updated_at = datetime('now')
                 WHERE id = ?1",
                params![id, title, content],
            )?;
            Ok(())
        })
    }

    /// Comments cascade via the foreign key; notification references are
    /// nulled out by the schema.
    pub fn delete_post(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
            Ok(deleted > 0)
        })
    }
}
