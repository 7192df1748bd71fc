//! Notification fan-out: derived notification rows written after a primary write.
//!
//! Fan-out is one-shot. A failure is logged and dropped; the primary write
//! that triggered it has already happened and is not rolled back.

use anyhow::Result;
use rusqlite::{Connection, params};
use tracing::{debug, warn};
use uuid::Uuid;

use deorganized_types::models::{NotificationType, TargetRef};

use crate::targets::resolve_owner;

/// Insert a notification row and return its id.
pub(crate) fn notify(
    conn: &Connection,
    recipient: Uuid,
    actor: Uuid,
    kind: NotificationType,
    target: Option<TargetRef>,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO notifications (id, recipient_id, actor_id, notification_type, target_type, target_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id.to_string(),
            recipient.to_string(),
            actor.to_string(),
            kind.as_str(),
            target.map(|t| t.kind.as_str()),
            target.map(|t| t.id.to_string()),
            crate::now(),
        ],
    )?;
    Ok(id)
}

/// Notify the owner of `target` that `actor` engaged with it.
/// Skips targets without an owner and actors engaging with their own content.
pub(crate) fn notify_owner(
    conn: &Connection,
    actor: Uuid,
    kind: NotificationType,
    target: TargetRef,
) -> Result<Option<Uuid>> {
    let Some(owner) = resolve_owner(conn, target)? else {
        debug!("No owner for {}, skipping {} notification", target, kind);
        return Ok(None);
    };

    if owner == actor {
        return Ok(None);
    }

    notify(conn, owner, actor, kind, Some(target)).map(Some)
}

/// Run a fan-out step, logging instead of propagating failure.
pub(crate) fn fire_and_forget<T>(what: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Dropped {} notification: {}", what, e);
            None
        }
    }
}
