//! Lookup table behind polymorphic `(target_type, target_id)` references.
//!
//! Likes, comments and notifications never hold a real foreign key to the
//! thing they point at. Everything that needs to know about the target
//! (does it exist, who owns it, how to delete it with its engagement) goes
//! through [`TargetSpec`].

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use deorganized_types::models::{TargetKind, TargetRef};

use crate::Database;
use crate::models::parse_col;

/// Owner attributes, in the order they are tried.
pub const OWNER_SEARCH_ORDER: [&str; 3] = ["creator_id", "author_id", "organizer_id"];

pub struct TargetSpec {
    pub kind: TargetKind,
    pub table: &'static str,
    /// Owner columns present on `table`.
    pub owner_columns: &'static [&'static str],
}

pub const TARGETS: [TargetSpec; 4] = [
    TargetSpec {
        kind: TargetKind::Show,
        table: "shows",
        owner_columns: &["creator_id"],
    },
    TargetSpec {
        kind: TargetKind::Post,
        table: "posts",
        owner_columns: &["author_id"],
    },
    TargetSpec {
        kind: TargetKind::Event,
        table: "events",
        owner_columns: &["organizer_id"],
    },
    TargetSpec {
        kind: TargetKind::Comment,
        table: "comments",
        owner_columns: &[],
    },
];

pub fn spec(kind: TargetKind) -> &'static TargetSpec {
    // every TargetKind has exactly one entry
    TARGETS
        .iter()
        .find(|s| s.kind == kind)
        .unwrap_or(&TARGETS[0])
}

pub(crate) fn target_exists(conn: &Connection, target: TargetRef) -> Result<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?1", spec(target.kind).table);
    let found = conn
        .query_row(&sql, [target.id.to_string()], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

/// Walk [`OWNER_SEARCH_ORDER`] and return the first owner set on the target.
/// `None` when the target is gone or has no owner attribute.
pub(crate) fn resolve_owner(conn: &Connection, target: TargetRef) -> Result<Option<Uuid>> {
    let spec = spec(target.kind);

    for column in OWNER_SEARCH_ORDER {
        if !spec.owner_columns.contains(&column) {
            continue;
        }
        let sql = format!("SELECT {column} FROM {} WHERE id = ?1", spec.table);
        let owner = conn
            .query_row(&sql, [target.id.to_string()], |row| {
                parse_opt_uuid(row.get::<_, Option<String>>(0)?)
            })
            .optional()?
            .flatten();
        if owner.is_some() {
            return Ok(owner);
        }
    }

    Ok(None)
}

fn parse_opt_uuid(raw: Option<String>) -> rusqlite::Result<Option<Uuid>> {
    raw.map(|s| {
        s.parse::<Uuid>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

/// Remove every like, comment and notification that references `target`,
/// including engagement on the comments being removed.
pub(crate) fn purge_engagement(conn: &Connection, target: TargetRef) -> Result<()> {
    let kind = target.kind.as_str();
    let id = target.id.to_string();

    let comment_ids: Vec<Uuid> = {
        let mut stmt =
            conn.prepare("SELECT id FROM comments WHERE target_type = ?1 AND target_id = ?2")?;
        stmt.query_map(params![kind, id], |row| parse_col(row, 0))?
            .collect::<std::result::Result<Vec<_>, _>>()?
    };
    for comment_id in comment_ids {
        purge_refs(conn, TargetRef::new(TargetKind::Comment, comment_id))?;
    }

    conn.execute(
        "DELETE FROM comments WHERE target_type = ?1 AND target_id = ?2",
        params![kind, id],
    )?;
    purge_refs(conn, target)?;
    Ok(())
}

/// Likes and notifications pointing at `target`.
fn purge_refs(conn: &Connection, target: TargetRef) -> Result<()> {
    let kind = target.kind.as_str();
    let id = target.id.to_string();
    conn.execute(
        "DELETE FROM likes WHERE target_type = ?1 AND target_id = ?2",
        params![kind, id],
    )?;
    conn.execute(
        "DELETE FROM notifications WHERE target_type = ?1 AND target_id = ?2",
        params![kind, id],
    )?;
    Ok(())
}

/// Ids of `root` and every reply below it.
fn comment_subtree(conn: &Connection, root: Uuid) -> Result<Vec<Uuid>> {
    let mut stmt = conn.prepare(
        "WITH RECURSIVE tree(id) AS (
             SELECT ?1
             UNION ALL
             SELECT c.id FROM comments c JOIN tree t ON c.parent_id = t.id
         )
         SELECT id FROM tree",
    )?;
    let ids = stmt
        .query_map([root.to_string()], |row| parse_col(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

impl Database {
    pub fn target_exists(&self, target: TargetRef) -> Result<bool> {
        self.with_conn(|conn| target_exists(conn, target))
    }

    pub fn resolve_owner(&self, target: TargetRef) -> Result<Option<Uuid>> {
        self.with_conn(|conn| resolve_owner(conn, target))
    }

    /// Delete a target row and everything that references it, atomically.
    /// Returns false when the target did not exist.
    pub fn delete_target(&self, target: TargetRef) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !target_exists(&tx, target)? {
                return Ok(false);
            }

            if target.kind == TargetKind::Comment {
                // replies share the parent's target, so only their own refs need purging
                for id in comment_subtree(&tx, target.id)?.into_iter().rev() {
                    purge_refs(&tx, TargetRef::new(TargetKind::Comment, id))?;
                    tx.execute("DELETE FROM comments WHERE id = ?1", [id.to_string()])?;
                }
            } else {
                purge_engagement(&tx, target)?;
                let sql = format!("DELETE FROM {} WHERE id = ?1", spec(target.kind).table);
                tx.execute(&sql, [target.id.to_string()])?;
            }

            tx.commit()?;
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_spec() {
        for kind in TargetKind::ALL {
            assert_eq!(spec(*kind).kind, *kind);
        }
    }

    #[test]
    fn owner_columns_follow_search_order() {
        for target in &TARGETS {
            for column in target.owner_columns {
                assert!(OWNER_SEARCH_ORDER.contains(column));
            }
        }
        assert!(spec(TargetKind::Comment).owner_columns.is_empty());
    }
}
