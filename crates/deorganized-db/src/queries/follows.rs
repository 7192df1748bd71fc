use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;
use uuid::Uuid;

use deorganized_types::models::NotificationType;

use crate::Database;
use crate::fanout::{fire_and_forget, notify};
use crate::models::{FollowRow, parse_col};

const FOLLOW_COLUMNS: &str = "id, follower_id, following_id, created_at";

pub enum FollowToggle {
    Followed(FollowRow),
    Unfollowed,
}

impl Database {
    /// Follow or unfollow. A new follow notifies the followed user.
    /// Following yourself fails on the table's CHECK constraint.
    pub fn toggle_follow(&self, follower_id: Uuid, following_id: Uuid) -> Result<FollowToggle> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
                params![follower_id.to_string(), following_id.to_string()],
            )?;
            if removed > 0 {
                debug!("User {} unfollowed {}", follower_id, following_id);
                return Ok(FollowToggle::Unfollowed);
            }

            let id = Uuid::new_v4();
            conn.execute(
                "INSERT INTO follows (id, follower_id, following_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    id.to_string(),
                    follower_id.to_string(),
                    following_id.to_string(),
                    crate::now(),
                ],
            )?;
            let follow = query_follow(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Follow {} vanished after insert", id))?;

            fire_and_forget(
                "follow",
                notify(conn, following_id, follower_id, NotificationType::Follow, None),
            );

            Ok(FollowToggle::Followed(follow))
        })
    }

    /// Newest first, filtered by either side of the relationship.
    pub fn list_follows(
        &self,
        follower: Option<Uuid>,
        following: Option<Uuid>,
    ) -> Result<Vec<FollowRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {FOLLOW_COLUMNS} FROM follows
                 WHERE (?1 IS NULL OR follower_id = ?1)
                   AND (?2 IS NULL OR following_id = ?2)
                 ORDER BY created_at DESC, rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![
                        follower.map(|id| id.to_string()),
                        following.map(|id| id.to_string()),
                    ],
                    map_follow,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn is_following(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM follows WHERE follower_id = ?1 AND following_id = ?2",
                    params![follower_id.to_string(), following_id.to_string()],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }
}

fn query_follow(conn: &Connection, id: Uuid) -> Result<Option<FollowRow>> {
    let sql = format!("SELECT {FOLLOW_COLUMNS} FROM follows WHERE id = ?1");
    let row = conn.query_row(&sql, [id.to_string()], map_follow).optional()?;
    Ok(row)
}

fn map_follow(row: &Row) -> rusqlite::Result<FollowRow> {
    Ok(FollowRow {
        id: parse_col(row, 0)?,
        follower_id: parse_col(row, 1)?,
        following_id: parse_col(row, 2)?,
        created_at: parse_col(row, 3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::NewUser;

    fn user(db: &Database, name: &str) -> Uuid {
        db.create_user(&NewUser {
            username: name.into(),
            ..NewUser::default()
        })
        .unwrap()
        .id
    }

    #[test]
    fn self_follow_is_never_persisted() {
        let db = Database::open_in_memory().unwrap();
        let me = user(&db, "me");

        let err = db.toggle_follow(me, me).err().unwrap();
        assert!(crate::is_constraint_violation(&err));
        assert!(db.list_follows(Some(me), None).unwrap().is_empty());
        assert!(!db.is_following(me, me).unwrap());
    }

    #[test]
    fn toggle_follows_then_unfollows_and_notifies_once() {
        let db = Database::open_in_memory().unwrap();
        let fan = user(&db, "fan");
        let star = user(&db, "star");

        assert!(matches!(db.toggle_follow(fan, star).unwrap(), FollowToggle::Followed(_)));
        assert!(db.is_following(fan, star).unwrap());
        assert_eq!(db.follow_counts(star).unwrap(), (1, 0));
        assert_eq!(db.follow_counts(fan).unwrap(), (0, 1));

        assert!(matches!(db.toggle_follow(fan, star).unwrap(), FollowToggle::Unfollowed));
        assert!(!db.is_following(fan, star).unwrap());

        let notes = db.list_notifications(star).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].notification_type, NotificationType::Follow);
        assert!(notes[0].target.is_none());
    }
}
