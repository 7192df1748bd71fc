use anyhow::Result;
use rusqlite::{OptionalExtension, Row, params};
use uuid::Uuid;

use deorganized_types::models::{TargetKind, TargetRef};

use crate::Database;
use crate::models::{NotificationRow, parse_col, parse_opt_col};

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, actor_id, notification_type, target_type, target_id, is_read, created_at";

impl Database {
    /// The recipient's notifications, newest first.
    pub fn list_notifications(&self, recipient_id: Uuid) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE recipient_id = ?1
                 ORDER BY created_at DESC, rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([recipient_id.to_string()], map_notification)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Fetch one notification, only if it belongs to `recipient_id`.
    pub fn get_notification(&self, id: Uuid, recipient_id: Uuid) -> Result<Option<NotificationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1 AND recipient_id = ?2"
            );
            let row = conn
                .query_row(
                    &sql,
                    params![id.to_string(), recipient_id.to_string()],
                    map_notification,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Returns false when the notification is missing or someone else's.
    pub fn mark_notification_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND recipient_id = ?2",
                params![id.to_string(), recipient_id.to_string()],
            )?;
            Ok(affected > 0)
        })
    }

    /// Mark every unread notification read; returns how many changed.
    pub fn mark_all_notifications_read(&self, recipient_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE recipient_id = ?1 AND is_read = 0",
                [recipient_id.to_string()],
            )?;
            Ok(affected)
        })
    }

    pub fn unread_notification_count(&self, recipient_id: Uuid) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND is_read = 0",
                [recipient_id.to_string()],
                |r| r.get(0),
            )?;
            Ok(count)
        })
    }
}

fn map_notification(row: &Row) -> rusqlite::Result<NotificationRow> {
    let target = match (parse_opt_col::<TargetKind>(row, 4)?, parse_opt_col::<Uuid>(row, 5)?) {
        (Some(kind), Some(id)) => Some(TargetRef::new(kind, id)),
        _ => None,
    };

    Ok(NotificationRow {
        id: parse_col(row, 0)?,
        recipient_id: parse_col(row, 1)?,
        actor_id: parse_col(row, 2)?,
        notification_type: parse_col(row, 3)?,
        target,
        is_read: row.get(6)?,
        created_at: parse_col(row, 7)?,
    })
}
