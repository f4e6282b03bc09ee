use anyhow::Result;
use rusqlite::params;
use study_types::models::CommentParent;

use super::OptionalExt;
use crate::models::CommentRow;
use crate::Database;

const COMMENT_SELECT: &str = "SELECT c.id, c.post_id, c.issue_id, c.user_id, u.username, \
     c.content, c.created_at, c.updated_at \
     FROM comments c JOIN users u ON c.user_id = u.id";

impl Database {
    pub fn list_comments(&self, parent: CommentParent) -> Result<Vec<CommentRow>> {
        let (predicate, id) = match parent {
            CommentParent::Post(id) => ("c.post_id = ?1", id),
            CommentParent::Issue(id) => ("c.issue_id = ?1", id),
        };
        self.with_conn(|conn| {
            let sql = format!("{COMMENT_SELECT} WHERE {predicate} ORDER BY c.created_at, c.id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![id], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_comment(&self, id: i64) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!("{COMMENT_SELECT} WHERE c.id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let row = stmt.query_row(params![id], comment_from_row).optional()?;
            Ok(row)
        })
    }

    pub fn create_comment(&self, parent: CommentParent, user_id: i64, content: &str) -> Result<i64> {
        let (post_id, issue_id) = parent.column_pair();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (post_id, issue_id, user_id, content) VALUES (?1, ?2, ?3, ?4)",
                params![post_id, issue_id, user_id, content],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn update_comment(&self, id: i64, content: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE comments SET content = ?2, updated_at = datetime('now') WHERE id = ?1",
                params![id, content],
            )?;
            Ok(())
        })
    }

    pub fn delete_comment(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
            Ok(deleted > 0)
        })
    }
}

fn comment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        issue_id: row.get(2)?,
        user_id: row.get(3)?,
        author_username: row.get(4)?,
        content: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
