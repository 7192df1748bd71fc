use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use crate::Database;
use crate::models::{PostRow, parse_col};

const POST_COLUMNS: &str = "p.id, p.author_id, p.content, p.image, p.is_pinned, p.created_at, p.updated_at";

#[derive(Debug)]
pub struct NewPost {
    pub author_id: Uuid,
    pub content: String,
    pub image: Option<String>,
    pub is_pinned: bool,
}

#[derive(Debug, Default)]
pub struct PostChanges {
    pub content: Option<String>,
    pub image: Option<String>,
    pub is_pinned: Option<bool>,
}

impl Database {
    pub fn create_post(&self, post: &NewPost) -> Result<PostRow> {
        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (id, author_id, content, image, is_pinned, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    id.to_string(),
                    post.author_id.to_string(),
                    post.content,
                    post.image,
                    post.is_pinned,
                    crate::now(),
                ],
            )?;
            query_post(conn, id)?.ok_or_else(|| anyhow::anyhow!("Post {} vanished after insert", id))
        })
    }

    pub fn get_post(&self, id: Uuid) -> Result<Option<PostRow>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    /// Pinned posts first, then newest first.
    pub fn list_posts(&self, author: Option<Uuid>) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {POST_COLUMNS} FROM posts p
                 WHERE (?1 IS NULL OR p.author_id = ?1)
                 ORDER BY p.is_pinned DESC, p.created_at DESC, p.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([author.map(|id| id.to_string())], map_post)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Posts by everyone `user_id` follows, newest first.
    pub fn feed(&self, user_id: Uuid) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {POST_COLUMNS} FROM posts p
                 JOIN follows f ON f.following_id = p.author_id
                 WHERE f.follower_id = ?1
                 ORDER BY p.created_at DESC, p.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id.to_string()], map_post)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_post(&self, id: Uuid, changes: &PostChanges) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE posts SET
                    content = COALESCE(?2, content),
                    image = COALESCE(?3, image),
                    is_pinned = COALESCE(?4, is_pinned),
                    updated_at = ?5
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    changes.content,
                    changes.image,
                    changes.is_pinned,
                    crate::now(),
                ],
            )?;
            query_post(conn, id)
        })
    }
}

fn query_post(conn: &Connection, id: Uuid) -> Result<Option<PostRow>> {
    let sql = format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = ?1");
    let row = conn.query_row(&sql, [id.to_string()], map_post).optional()?;
    Ok(row)
}

fn map_post(row: &Row) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: parse_col(row, 0)?,
        author_id: parse_col(row, 1)?,
        content: row.get(2)?,
        image: row.get(3)?,
        is_pinned: row.get(4)?,
        created_at: parse_col(row, 5)?,
        updated_at: parse_col(row, 6)?,
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

    fn post(db: &Database, author_id: Uuid, content: &str, is_pinned: bool) -> PostRow {
        db.create_post(&NewPost {
            author_id,
            content: content.into(),
            image: None,
            is_pinned,
        })
        .unwrap()
    }

    #[test]
    fn pinned_posts_sort_first() {
        let db = Database::open_in_memory().unwrap();
        let author = user(&db, "writer");
        post(&db, author, "old pinned", true);
        post(&db, author, "newer", false);
        post(&db, author, "newest", false);

        let contents: Vec<String> =
            db.list_posts(Some(author)).unwrap().into_iter().map(|p| p.content).collect();
        assert_eq!(contents, vec!["old pinned", "newest", "newer"]);
    }

    #[test]
    fn feed_only_includes_followed_authors() {
        let db = Database::open_in_memory().unwrap();
        let reader = user(&db, "reader");
        let followed = user(&db, "followed");
        let stranger = user(&db, "stranger");
        post(&db, followed, "hello followers", false);
        post(&db, stranger, "nobody sees this", false);

        db.toggle_follow(reader, followed).unwrap();
        let feed = db.feed(reader).unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].author_id, followed);
    }

    #[test]
    fn update_keeps_unset_fields() {
        let db = Database::open_in_memory().unwrap();
        let author = user(&db, "writer");
        let created = post(&db, author, "draft", false);

        let updated = db
            .update_post(
                created.id,
                &PostChanges {
                    is_pinned: Some(true),
                    ..PostChanges::default()
                },
            )
            .unwrap()
            .unwrap();
        assert!(updated.is_pinned);
        assert_eq!(updated.content, "draft");
    }
}
