use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;
use uuid::Uuid;

use deorganized_types::models::{GuestRequestStatus, NotificationType, TargetKind, TargetRef};

use super::shows::{add_guest, query_show};
use crate::Database;
use crate::fanout::{fire_and_forget, notify};
use crate::models::{GuestRequestRow, parse_col};

const GUEST_REQUEST_COLUMNS: &str =
    "g.id, g.show_id, g.requester_id, g.message, g.status, g.created_at, g.updated_at";

impl Database {
    /// Insert a pending request and notify the show's creator.
    pub fn create_guest_request(
        &self,
        show_id: Uuid,
        requester_id: Uuid,
        message: &str,
    ) -> Result<GuestRequestRow> {
        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            let show = query_show(conn, "s.id = ?1", &show_id.to_string())?
                .ok_or_else(|| anyhow::anyhow!("Show {} not found", show_id))?;

            conn.execute(
                "INSERT INTO guest_requests (id, show_id, requester_id, message, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?5)",
                params![
                    id.to_string(),
                    show_id.to_string(),
                    requester_id.to_string(),
                    message,
                    crate::now(),
                ],
            )?;

            fire_and_forget(
                "guest_request",
                notify(
                    conn,
                    show.creator_id,
                    requester_id,
                    NotificationType::GuestRequest,
                    Some(TargetRef::new(TargetKind::Show, show_id)),
                ),
            );

            query_guest_request(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Guest request {} vanished after insert", id))
        })
    }

    pub fn get_guest_request(&self, id: Uuid) -> Result<Option<GuestRequestRow>> {
        self.with_conn(|conn| query_guest_request(conn, id))
    }

    /// An existing request from `requester_id` for the show, in any status.
    pub fn find_guest_request(
        &self,
        show_id: Uuid,
        requester_id: Uuid,
    ) -> Result<Option<GuestRequestRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {GUEST_REQUEST_COLUMNS} FROM guest_requests g
                 WHERE g.show_id = ?1 AND g.requester_id = ?2"
            );
            let row = conn
                .query_row(
                    &sql,
                    params![show_id.to_string(), requester_id.to_string()],
                    map_guest_request,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Requests the user has sent, newest first.
    pub fn list_sent_guest_requests(&self, requester_id: Uuid) -> Result<Vec<GuestRequestRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {GUEST_REQUEST_COLUMNS} FROM guest_requests g
                 WHERE g.requester_id = ?1
                 ORDER BY g.created_at DESC, g.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([requester_id.to_string()], map_guest_request)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Pending requests for shows the user created, newest first.
    pub fn list_received_guest_requests(&self, creator_id: Uuid) -> Result<Vec<GuestRequestRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {GUEST_REQUEST_COLUMNS} FROM guest_requests g
                 JOIN shows s ON s.id = g.show_id
                 WHERE s.creator_id = ?1 AND g.status = 'pending'
                 ORDER BY g.created_at DESC, g.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([creator_id.to_string()], map_guest_request)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Move a pending request to `accepted` or `declined` and notify the
    /// requester. Accepting also adds the requester to the show's guests.
    /// `None` when the request is not pending.
    pub fn resolve_guest_request(
        &self,
        id: Uuid,
        actor_id: Uuid,
        accept: bool,
    ) -> Result<Option<GuestRequestRow>> {
        let (status, kind) = if accept {
            (GuestRequestStatus::Accepted, NotificationType::GuestAccepted)
        } else {
            (GuestRequestStatus::Declined, NotificationType::GuestDeclined)
        };

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let changed = tx.execute(
                "UPDATE guest_requests SET status = ?2, updated_at = ?3
                 WHERE id = ?1 AND status = 'pending'",
                params![id.to_string(), status.as_str(), crate::now()],
            )?;
            if changed == 0 {
                return Ok(None);
            }

            let request = query_guest_request(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("Guest request {} vanished during update", id))?;
            if accept {
                add_guest(&tx, request.show_id, request.requester_id)?;
            }
            tx.commit()?;

            info!("Guest request {} {}", id, status);

            fire_and_forget(
                kind.as_str(),
                notify(
                    conn,
                    request.requester_id,
                    actor_id,
                    kind,
                    Some(TargetRef::new(TargetKind::Show, request.show_id)),
                ),
            );

            Ok(Some(request))
        })
    }
}

fn query_guest_request(conn: &Connection, id: Uuid) -> Result<Option<GuestRequestRow>> {
    let sql = format!("SELECT {GUEST_REQUEST_COLUMNS} FROM guest_requests g WHERE g.id = ?1");
    let row = conn.query_row(&sql, [id.to_string()], map_guest_request).optional()?;
    Ok(row)
}

fn map_guest_request(row: &Row) -> rusqlite::Result<GuestRequestRow> {
    Ok(GuestRequestRow {
        id: parse_col(row, 0)?,
        show_id: parse_col(row, 1)?,
        requester_id: parse_col(row, 2)?,
        message: row.get(3)?,
        status: parse_col(row, 4)?,
        created_at: parse_col(row, 5)?,
        updated_at: parse_col(row, 6)?,
    })
}
