//! Likes and comments: the engagement rows that point at a target through
//! `(target_type, target_id)`.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;
use uuid::Uuid;

use deorganized_types::models::{NotificationType, TargetKind, TargetRef};

use super::{as_params, placeholders};
use crate::Database;
use crate::fanout::{fire_and_forget, notify_owner};
use crate::models::{CommentRow, LikeRow, parse_col, target_col};
use crate::targets::target_exists;

const LIKE_COLUMNS: &str = "id, user_id, target_type, target_id, created_at";
const COMMENT_COLUMNS: &str = "id, user_id, target_type, target_id, text, parent_id, created_at, updated_at";

/// Replies nested under each top-level comment.
pub const NESTED_REPLY_LIMIT: usize = 5;

pub enum LikeToggle {
    Liked(LikeRow),
    Unliked,
}

#[derive(Debug, Default)]
pub struct LikeFilter {
    pub target_kind: Option<TargetKind>,
    pub target_id: Option<Uuid>,
    pub user: Option<Uuid>,
}

#[derive(Debug, Default)]
pub struct CommentFilter {
    pub target_kind: Option<TargetKind>,
    pub target_id: Option<Uuid>,
    pub top_level: bool,
}

impl Database {
    // -- Likes --

    /// Remove the user's like on `target` if there is one, otherwise add it.
    /// `None` when the target does not exist.
    pub fn toggle_like(&self, user_id: Uuid, target: TargetRef) -> Result<Option<LikeToggle>> {
        self.with_conn(|conn| {
            if !target_exists(conn, target)? {
                return Ok(None);
            }

            let removed = conn.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND target_type = ?2 AND target_id = ?3",
                params![user_id.to_string(), target.kind.as_str(), target.id.to_string()],
            )?;
            if removed > 0 {
                debug!("User {} unliked {}", user_id, target);
                return Ok(Some(LikeToggle::Unliked));
            }

            let id = Uuid::new_v4();
            conn.execute(
                "INSERT INTO likes (id, user_id, target_type, target_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.to_string(),
                    user_id.to_string(),
                    target.kind.as_str(),
                    target.id.to_string(),
                    crate::now(),
                ],
            )?;
            let like = query_like(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Like {} vanished after insert", id))?;

            fire_and_forget("like", notify_owner(conn, user_id, NotificationType::Like, target));

            Ok(Some(LikeToggle::Liked(like)))
        })
    }

    /// Newest first.
    pub fn list_likes(&self, filter: &LikeFilter) -> Result<Vec<LikeRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {LIKE_COLUMNS} FROM likes
                 WHERE (?1 IS NULL OR target_type = ?1)
                   AND (?2 IS NULL OR target_id = ?2)
                   AND (?3 IS NULL OR user_id = ?3)
                 ORDER BY created_at DESC, rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![
                        filter.target_kind.map(|k| k.as_str()),
                        filter.target_id.map(|id| id.to_string()),
                        filter.user.map(|id| id.to_string()),
                    ],
                    map_like,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_like(&self, id: Uuid) -> Result<Option<LikeRow>> {
        self.with_conn(|conn| query_like(conn, id))
    }

    pub fn count_likes(&self, target: TargetRef) -> Result<i64> {
        self.with_conn(|conn| count_for_target(conn, "likes", target))
    }

    pub fn has_liked(&self, user_id: Uuid, target: TargetRef) -> Result<bool> {
        Ok(!self.liked_ids(user_id, target.kind, &[target.id])?.is_empty())
    }

    /// Like counts for many targets of one kind. Targets with no likes are absent.
    pub fn like_counts(&self, kind: TargetKind, ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> {
        self.with_conn(|conn| counts_for_targets(conn, "likes", kind, ids))
    }

    /// Which of `ids` the user has liked.
    pub fn liked_ids(&self, user_id: Uuid, kind: TargetKind, ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let mut values = vec![user_id.to_string(), kind.as_str().to_string()];
        values.extend(ids.iter().map(Uuid::to_string));

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT target_id FROM likes
                 WHERE user_id = ?1 AND target_type = ?2 AND target_id IN ({})",
                placeholders(ids.len(), 3)
            );
            let mut stmt = conn.prepare(&sql)?;
            let liked = stmt
                .query_map(as_params(&values).as_slice(), |row| parse_col(row, 0))?
                .collect::<std::result::Result<HashSet<_>, _>>()?;
            Ok(liked)
        })
    }

    // -- Comments --

    /// Insert a comment. A top-level comment notifies the target's owner;
    /// replies never notify.
    pub fn create_comment(
        &self,
        user_id: Uuid,
        target: TargetRef,
        text: &str,
        parent_id: Option<Uuid>,
    ) -> Result<CommentRow> {
        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, user_id, target_type, target_id, text, parent_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    id.to_string(),
                    user_id.to_string(),
                    target.kind.as_str(),
                    target.id.to_string(),
                    text,
                    parent_id.map(|p| p.to_string()),
                    crate::now(),
                ],
            )?;
            let comment = query_comment(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Comment {} vanished after insert", id))?;

            if parent_id.is_none() {
                fire_and_forget(
                    "comment",
                    notify_owner(conn, user_id, NotificationType::Comment, target),
                );
            }

            Ok(comment)
        })
    }

    pub fn get_comment(&self, id: Uuid) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| query_comment(conn, id))
    }

    /// Newest first.
    pub fn list_comments(&self, filter: &CommentFilter) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {COMMENT_COLUMNS} FROM comments
                 WHERE (?1 IS NULL OR target_type = ?1)
                   AND (?2 IS NULL OR target_id = ?2)
                   AND (?3 = 0 OR parent_id IS NULL)
                 ORDER BY created_at DESC, rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![
                        filter.target_kind.map(|k| k.as_str()),
                        filter.target_id.map(|id| id.to_string()),
                        filter.top_level,
                    ],
                    map_comment,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Direct replies for each parent, newest first, at most
    /// [`NESTED_REPLY_LIMIT`] per parent.
    pub fn recent_replies(&self, parent_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<CommentRow>>> {
        if parent_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let values: Vec<String> = parent_ids.iter().map(Uuid::to_string).collect();
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {COMMENT_COLUMNS} FROM comments
                 WHERE parent_id IN ({})
                 ORDER BY created_at DESC, rowid DESC",
                placeholders(values.len(), 1)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(as_params(&values).as_slice(), map_comment)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut grouped: HashMap<Uuid, Vec<CommentRow>> = HashMap::new();
            for row in rows {
                let Some(parent) = row.parent_id else { continue };
                let replies = grouped.entry(parent).or_default();
                if replies.len() < NESTED_REPLY_LIMIT {
                    replies.push(row);
                }
            }
            Ok(grouped)
        })
    }

    /// Number of direct replies per comment. Comments with none are absent.
    pub fn reply_counts(&self, parent_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> {
        if parent_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let values: Vec<String> = parent_ids.iter().map(Uuid::to_string).collect();
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT parent_id, COUNT(*) FROM comments
                 WHERE parent_id IN ({})
                 GROUP BY parent_id",
                placeholders(values.len(), 1)
            );
            let mut stmt = conn.prepare(&sql)?;
            let counts = stmt
                .query_map(as_params(&values).as_slice(), |row| {
                    Ok((parse_col::<Uuid>(row, 0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<std::result::Result<HashMap<_, _>, _>>()?;
            Ok(counts)
        })
    }

    pub fn update_comment(&self, id: Uuid, text: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE comments SET text = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), text, crate::now()],
            )?;
            query_comment(conn, id)
        })
    }

    pub fn count_comments(&self, target: TargetRef) -> Result<i64> {
        self.with_conn(|conn| count_for_target(conn, "comments", target))
    }

    pub fn comment_counts(&self, kind: TargetKind, ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> {
        self.with_conn(|conn| counts_for_targets(conn, "comments", kind, ids))
    }
}

fn count_for_target(conn: &Connection, table: &str, target: TargetRef) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE target_type = ?1 AND target_id = ?2");
    let count = conn.query_row(
        &sql,
        params![target.kind.as_str(), target.id.to_string()],
        |r| r.get(0),
    )?;
    Ok(count)
}

fn counts_for_targets(
    conn: &Connection,
    table: &str,
    kind: TargetKind,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, i64>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut values = vec![kind.as_str().to_string()];
    values.extend(ids.iter().map(Uuid::to_string));

    let sql = format!(
        "SELECT target_id, COUNT(*) FROM {table}
         WHERE target_type = ?1 AND target_id IN ({})
         GROUP BY target_id",
        placeholders(ids.len(), 2)
    );
    let mut stmt = conn.prepare(&sql)?;
    let counts = stmt
        .query_map(as_params(&values).as_slice(), |row| {
            Ok((parse_col::<Uuid>(row, 0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<std::result::Result<HashMap<_, _>, _>>()?;
    Ok(counts)
}

fn query_like(conn: &Connection, id: Uuid) -> Result<Option<LikeRow>> {
    let sql = format!("SELECT {LIKE_COLUMNS} FROM likes WHERE id = ?1");
    let row = conn.query_row(&sql, [id.to_string()], map_like).optional()?;
    Ok(row)
}

fn query_comment(conn: &Connection, id: Uuid) -> Result<Option<CommentRow>> {
    let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1");
    let row = conn.query_row(&sql, [id.to_string()], map_comment).optional()?;
    Ok(row)
}

fn map_like(row: &Row) -> rusqlite::Result<LikeRow> {
    Ok(LikeRow {
        id: parse_col(row, 0)?,
        user_id: parse_col(row, 1)?,
        target: target_col(row, 2)?,
        created_at: parse_col(row, 4)?,
    })
}

fn map_comment(row: &Row) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: parse_col(row, 0)?,
        user_id: parse_col(row, 1)?,
        target: target_col(row, 2)?,
        text: row.get(4)?,
        parent_id: crate::models::parse_opt_col(row, 5)?,
        created_at: parse_col(row, 6)?,
        updated_at: parse_col(row, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{NewPost, NewUser};

    struct Fixture {
        db: Database,
        author: Uuid,
        reader: Uuid,
        post: TargetRef,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let author = db
            .create_user(&NewUser {
                username: "author".into(),
                ..NewUser::default()
            })
            .unwrap()
            .id;
        let reader = db
            .create_user(&NewUser {
                username: "reader".into(),
                ..NewUser::default()
            })
            .unwrap()
            .id;
        let post = db
            .create_post(&NewPost {
                author_id: author,
                content: "gm".into(),
                image: None,
                is_pinned: false,
            })
            .unwrap();
        Fixture {
            db,
            author,
            reader,
            post: TargetRef::new(TargetKind::Post, post.id),
        }
    }

    #[test]
    fn double_toggle_restores_the_original_state() {
        let f = fixture();
        assert_eq!(f.db.count_likes(f.post).unwrap(), 0);

        assert!(matches!(
            f.db.toggle_like(f.reader, f.post).unwrap(),
            Some(LikeToggle::Liked(_))
        ));
        assert_eq!(f.db.count_likes(f.post).unwrap(), 1);
        assert!(f.db.has_liked(f.reader, f.post).unwrap());

        assert!(matches!(
            f.db.toggle_like(f.reader, f.post).unwrap(),
            Some(LikeToggle::Unliked)
        ));
        assert_eq!(f.db.count_likes(f.post).unwrap(), 0);
        assert!(!f.db.has_liked(f.reader, f.post).unwrap());
    }

    #[test]
    fn liking_a_missing_target_is_rejected() {
        let f = fixture();
        let ghost = TargetRef::new(TargetKind::Show, Uuid::new_v4());
        assert!(f.db.toggle_like(f.reader, ghost).unwrap().is_none());
    }

    #[test]
    fn like_notifies_owner_but_not_self() {
        let f = fixture();
        f.db.toggle_like(f.author, f.post).unwrap();
        assert_eq!(f.db.unread_notification_count(f.author).unwrap(), 0);

        f.db.toggle_like(f.reader, f.post).unwrap();
        let notes = f.db.list_notifications(f.author).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].notification_type, NotificationType::Like);
        assert_eq!(notes[0].target, Some(f.post));
        assert_eq!(notes[0].actor_id, f.reader);
    }

    #[test]
    fn replies_do_not_notify() {
        let f = fixture();
        let top = f.db.create_comment(f.reader, f.post, "first", None).unwrap();
        assert_eq!(f.db.list_notifications(f.author).unwrap().len(), 1);

        f.db.create_comment(f.reader, f.post, "reply", Some(top.id)).unwrap();
        assert_eq!(f.db.list_notifications(f.author).unwrap().len(), 1);

        let notes = f.db.list_notifications(f.author).unwrap();
        assert_eq!(notes[0].notification_type, NotificationType::Comment);
    }

    #[test]
    fn replies_nest_under_top_level_comments() {
        let f = fixture();
        let top = f.db.create_comment(f.reader, f.post, "top", None).unwrap();
        for i in 0..7 {
            f.db.create_comment(f.author, f.post, &format!("reply {i}"), Some(top.id))
                .unwrap();
        }

        let top_level = f
            .db
            .list_comments(&CommentFilter {
                target_kind: Some(TargetKind::Post),
                target_id: Some(f.post.id),
                top_level: true,
            })
            .unwrap();
        assert_eq!(top_level.len(), 1);

        let replies = f.db.recent_replies(&[top.id]).unwrap();
        assert_eq!(replies[&top.id].len(), NESTED_REPLY_LIMIT);
        assert_eq!(replies[&top.id][0].text, "reply 6");
        assert_eq!(f.db.reply_counts(&[top.id]).unwrap()[&top.id], 7);
        assert_eq!(f.db.count_comments(f.post).unwrap(), 8);
    }

    #[test]
    fn deleting_a_target_removes_its_engagement() {
        let f = fixture();
        f.db.toggle_like(f.reader, f.post).unwrap();
        let top = f.db.create_comment(f.reader, f.post, "top", None).unwrap();
        f.db.create_comment(f.author, f.post, "reply", Some(top.id)).unwrap();
        let on_comment = TargetRef::new(TargetKind::Comment, top.id);
        f.db.toggle_like(f.author, on_comment).unwrap();

        assert!(f.db.delete_target(f.post).unwrap());

        assert_eq!(f.db.count_likes(f.post).unwrap(), 0);
        assert_eq!(f.db.count_comments(f.post).unwrap(), 0);
        assert_eq!(f.db.count_likes(on_comment).unwrap(), 0);
        assert!(f.db.list_notifications(f.author).unwrap().is_empty());
        assert!(!f.db.delete_target(f.post).unwrap());
    }

    #[test]
    fn deleting_a_comment_removes_its_replies() {
        let f = fixture();
        let top = f.db.create_comment(f.reader, f.post, "top", None).unwrap();
        let reply = f.db.create_comment(f.author, f.post, "reply", Some(top.id)).unwrap();
        let nested = f.db.create_comment(f.reader, f.post, "deeper", Some(reply.id)).unwrap();
        let other = f.db.create_comment(f.author, f.post, "other", None).unwrap();

        assert!(f.db.delete_target(TargetRef::new(TargetKind::Comment, top.id)).unwrap());

        assert!(f.db.get_comment(reply.id).unwrap().is_none());
        assert!(f.db.get_comment(nested.id).unwrap().is_none());
        assert!(f.db.get_comment(other.id).unwrap().is_some());
    }

    #[test]
    fn batch_counts_cover_many_targets() {
        let f = fixture();
        f.db.toggle_like(f.reader, f.post).unwrap();
        f.db.toggle_like(f.author, f.post).unwrap();

        let counts = f.db.like_counts(TargetKind::Post, &[f.post.id, Uuid::new_v4()]).unwrap();
        assert_eq!(counts.get(&f.post.id), Some(&2));
        assert_eq!(counts.len(), 1);

        let liked = f.db.liked_ids(f.reader, TargetKind::Post, &[f.post.id]).unwrap();
        assert!(liked.contains(&f.post.id));
    }
}
