use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use deorganized_types::models::FeedbackCategory;

use crate::Database;
use crate::models::{FeedbackRow, parse_col};

const FEEDBACK_COLUMNS: &str = "id, category, message, user_identifier, resolved, admin_notes, created_at";

impl Database {
    pub fn create_feedback(
        &self,
        category: FeedbackCategory,
        message: &str,
        user_identifier: &str,
    ) -> Result<FeedbackRow> {
        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO feedback (id, category, message, user_identifier, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.to_string(), category.as_str(), message, user_identifier, crate::now()],
            )?;
            query_feedback(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Feedback {} vanished after insert", id))
        })
    }

    /// Newest first, optionally narrowed to resolved or unresolved entries.
    pub fn list_feedback(&self, resolved: Option<bool>) -> Result<Vec<FeedbackRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {FEEDBACK_COLUMNS} FROM feedback
                 WHERE (?1 IS NULL OR resolved = ?1)
                 ORDER BY created_at DESC, rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([resolved], map_feedback)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_feedback(
        &self,
        id: Uuid,
        resolved: Option<bool>,
        admin_notes: Option<&str>,
    ) -> Result<Option<FeedbackRow>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE feedback SET
                    resolved = COALESCE(?2, resolved),
                    admin_notes = COALESCE(?3, admin_notes)
                 WHERE id = ?1",
                params![id.to_string(), resolved, admin_notes],
            )?;
            query_feedback(conn, id)
        })
    }
}

fn query_feedback(conn: &Connection, id: Uuid) -> Result<Option<FeedbackRow>> {
    let sql = format!("SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE id = ?1");
    let row = conn.query_row(&sql, [id.to_string()], map_feedback).optional()?;
    Ok(row)
}

fn map_feedback(row: &Row) -> rusqlite::Result<FeedbackRow> {
    Ok(FeedbackRow {
        id: parse_col(row, 0)?,
        category: parse_col(row, 1)?,
        message: row.get(2)?,
        user_identifier: row.get(3)?,
        resolved: row.get(4)?,
        admin_notes: row.get(5)?,
        created_at: parse_col(row, 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_with_notes() {
        let db = Database::open_in_memory().unwrap();
        let entry = db
            .create_feedback(FeedbackCategory::Bug, "player freezes", "anonymous")
            .unwrap();
        assert!(!entry.resolved);

        let updated = db
            .update_feedback(entry.id, Some(true), Some("fixed in player 2"))
            .unwrap()
            .unwrap();
        assert!(updated.resolved);
        assert_eq!(updated.admin_notes.as_deref(), Some("fixed in player 2"));

        assert!(db.list_feedback(Some(false)).unwrap().is_empty());
        assert_eq!(db.list_feedback(None).unwrap().len(), 1);
    }
}
