use anyhow::Result;
use rusqlite::params;
use study_types::IssueStatus;

use super::OptionalExt;
use crate::models::IssueRow;
use crate::Database;

const ISSUE_SELECT: &str = "SELECT i.id, i.study_id, i.user_id, u.username, i.title, \
     i.description, i.status, i.start_date, i.end_date, i.created_at, i.updated_at \
     FROM issues i JOIN users u ON i.user_id = u.id";

impl Database {
    /// All issues of a study. Status filtering happens after read-time
    /// derivation, so pagination is applied by the caller on the filtered
    /// set rather than in SQL.
    pub fn list_issues(&self, study_id: i64) -> Result<Vec<IssueRow>> {
        self.with_conn(|conn| {
            let sql = format!("{ISSUE_SELECT} WHERE i.study_id = ?1 ORDER BY i.created_at DESC, i.id DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![study_id], issue_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_issue(&self, id: i64) -> Result<Option<IssueRow>> {
        self.with_conn(|conn| {
            let sql = format!("{ISSUE_SELECT} WHERE i.id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let row = stmt.query_row(params![id], issue_from_row).optional()?;
            Ok(row)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_issue(
        &self,
        study_id: i64,
        user_id: i64,
        title: &str,
        description: Option<&str>,
        start_date: Option<&str>,
        end_date: Option<&str>,
        status: IssueStatus,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO issues (study_id, user_id, title, description, start_date, end_date, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    study_id,
                    user_id,
                    title,
                    description,
                    start_date,
                    end_date,
                    status.as_str()
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update_issue(
        &self,
        id: i64,
        title: &str,
        description: Option<&str>,
        start_date: Option<&str>,
        end_date: Option<&str>,
        status: IssueStatus,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE issues
                 SET title = ?2, description = ?3, start_date = ?4, end_date = ?5,
                     status = ?6, updated_at = datetime('now')
                 WHERE id = ?1",
                params![id, title, description, start_date, end_date, status.as_str()],
            )?;
            Ok(())
        })
    }

    pub fn delete_issue(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM issues WHERE id = ?1", params![id])?;
            Ok(deleted > 0)
        })
    }
}

fn issue_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<IssueRow> {
    Ok(IssueRow {
        id: row.get(0)?,
        study_id: row.get(1)?,
        user_id: row.get(2)?,
        author_username: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        status: row.get(6)?,
        start_date: row.get(7)?,
        end_date: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}
