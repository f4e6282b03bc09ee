use anyhow::Result;
use rusqlite::{Connection, params};
use study_types::models::MemberRole;

use super::OptionalExt;
use crate::models::{MemberRow, StudyRow};
use crate::Database;

impl Database {
    // -- Studies --

    pub fn count_studies(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row("SELECT COUNT(*) FROM studies", [], |row| row.get(0))?;
            Ok(n)
        })
    }

    pub fn list_studies(&self, skip: i64, limit: i64) -> Result<Vec<(StudyRow, i64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.name, s.description, s.creator_id, s.created_at, s.updated_at,
                        (SELECT COUNT(*) FROM study_members m WHERE m.study_id = s.id)
                 FROM studies s
                 ORDER BY s.id
                 LIMIT ?1 OFFSET ?2",
            )?;

            let rows = stmt
                .query_map(params![limit, skip], |row| {
                    Ok((
                        StudyRow {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            description: row.get(2)?,
                            creator_id: row.get(3)?,
                            created_at: row.get(4)?,
                            updated_at: row.get(5)?,
                        },
                        row.get(6)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn get_study(&self, id: i64) -> Result<Option<StudyRow>> {
        self.with_conn(|conn| query_study(conn, "id = ?1", params![id]))
    }

    pub fn get_study_by_name(&self, name: &str) -> Result<Option<StudyRow>> {
        self.with_conn(|conn| query_study(conn, "name = ?1", params![name]))
    }

    /// Create a study and its creator's admin membership in one transaction,
    /// so the study is never visible without its creator-membership.
    pub fn create_study(
        &self,
        name: &str,
        description: Option<&str>,
        creator_id: i64,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO studies (name, description, creator_id) VALUES (?1, ?2, ?3)",
                params![name, description, creator_id],
            )?;
            let study_id = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO study_members (study_id, user_id, role) VALUES (?1, ?2, ?3)",
                params![study_id, creator_id, MemberRole::Admin.as_str()],
            )?;
            tx.commit()?;
            Ok(study_id)
        })
    }

    pub fn update_study(&self, id: i64, name: &str, description: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE studies
                 SET name = ?2, description = ?3, updated_at = datetime('now')
                 WHERE id = ?1",
                params![id, name, description],
            )?;
            Ok(())
        })
    }

    /// Cascading study deletion in dependency order, one transaction:
    /// notifications referencing the study or its posts/issues, comments on
    /// its posts and issues, posts, issues, members, then the study row.
    pub fn delete_study(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM notifications
                 WHERE study_id = ?1
                    OR post_id IN (SELECT id FROM posts WHERE study_id = ?1)
                    OR issue_id IN (SELECT id FROM issues WHERE study_id = ?1)",
                params![id],
            )?;
            tx.execute(
                "DELETE FROM comments
                 WHERE post_id IN (SELECT id FROM posts WHERE study_id = ?1)",
                params![id],
            )?;
            tx.execute(
                "DELETE FROM comments
                 WHERE issue_id IN (SELECT id FROM issues WHERE study_id = ?1)",
                params![id],
            )?;
            tx.execute("DELETE FROM posts WHERE study_id = ?1", params![id])?;
            tx.execute("DELETE FROM issues WHERE study_id = ?1", params![id])?;
            tx.execute("DELETE FROM study_members WHERE study_id = ?1", params![id])?;
            let deleted = tx.execute("DELETE FROM studies WHERE id = ?1", params![id])?;
            tx.commit()?;
            Ok(deleted > 0)
        })
    }

    // -- Members --

    pub fn is_member(&self, study_id: i64, user_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM study_members WHERE study_id = ?1 AND user_id = ?2",
                    params![study_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(exists.is_some())
        })
    }

    pub fn add_member(&self, study_id: i64, user_id: i64, role: MemberRole) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO study_members (study_id, user_id, role) VALUES (?1, ?2, ?3)",
                params![study_id, user_id, role.as_str()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_member(&self, study_id: i64, user_id: i64) -> Result<Option<MemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.study_id, m.user_id, u.username, m.role, m.joined_at
                 FROM study_members m
                 JOIN users u ON m.user_id = u.id
                 WHERE m.study_id = ?1 AND m.user_id = ?2",
            )?;
            let row = stmt
                .query_row(params![study_id, user_id], member_from_row)
                .optional()?;
            Ok(row)
        })
    }

    pub fn count_members(&self, study_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM study_members WHERE study_id = ?1",
                params![study_id],
                |row| row.get(0),
            )?;
            Ok(n)
        })
    }

    pub fn list_members(&self, study_id: i64, skip: i64, limit: i64) -> Result<Vec<MemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.study_id, m.user_id, u.username, m.role, m.joined_at
                 FROM study_members m
                 JOIN users u ON m.user_id = u.id
                 WHERE m.study_id = ?1
                 ORDER BY m.joined_at, m.id
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(params![study_id, limit, skip], member_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Every member of a study, for the study-detail view.
    pub fn list_all_members(&self, study_id: i64) -> Result<Vec<MemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.study_id, m.user_id, u.username, m.role, m.joined_at
                 FROM study_members m
                 JOIN users u ON m.user_id = u.id
                 WHERE m.study_id = ?1
                 ORDER BY m.joined_at, m.id",
            )?;
            let rows = stmt
                .query_map(params![study_id], member_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn remove_member(&self, study_id: i64, user_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM study_members WHERE study_id = ?1 AND user_id = ?2",
                params![study_id, user_id],
            )?;
            Ok(deleted > 0)
        })
    }
}

fn member_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemberRow> {
    Ok(MemberRow {
        id: row.get(0)?,
        study_id: row.get(1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
        role: row.get(4)?,
        joined_at: row.get(5)?,
    })
}

fn query_study(
    conn: &Connection,
    predicate: &str,
    args: impl rusqlite::Params,
) -> Result<Option<StudyRow>> {
    let sql = format!(
        "SELECT id, name, description, creator_id, created_at, updated_at
         FROM studies WHERE {predicate}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row(args, |row| {
            Ok(StudyRow {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                creator_id: row.get(3)?,
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            })
        })
        .optional()?;
    Ok(row)
}
