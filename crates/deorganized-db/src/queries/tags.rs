use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use super::like_pattern;
use crate::Database;
use crate::models::{TagRow, parse_col};

impl Database {
    pub fn create_tag(&self, name: &str, slug: &str) -> Result<TagRow> {
        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tags (id, name, slug, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id.to_string(), name, slug, crate::now()],
            )?;
            Ok(TagRow {
                id,
                name: name.to_string(),
                slug: slug.to_string(),
            })
        })
    }

    pub fn get_tag_by_slug(&self, slug: &str) -> Result<Option<TagRow>> {
        self.with_conn(|conn| {
            let tag = conn
                .query_row(
                    "SELECT id, name, slug FROM tags WHERE slug = ?1",
                    [slug],
                    map_tag,
                )
                .optional()?;
            Ok(tag)
        })
    }

    /// Alphabetical, optionally narrowed by a name search.
    pub fn list_tags(&self, search: Option<&str>) -> Result<Vec<TagRow>> {
        let pattern = like_pattern(search);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, slug FROM tags
                 WHERE (?1 IS NULL OR name LIKE ?1)
                 ORDER BY name",
            )?;
            let rows = stmt
                .query_map([pattern], map_tag)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// Tags attached to a show, alphabetical.
pub(crate) fn tags_for_show(conn: &Connection, show_id: Uuid) -> Result<Vec<TagRow>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, t.slug FROM tags t
         JOIN show_tags st ON st.tag_id = t.id
         WHERE st.show_id = ?1
         ORDER BY t.name",
    )?;
    let rows = stmt
        .query_map([show_id.to_string()], map_tag)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_tag(row: &Row) -> rusqlite::Result<TagRow> {
    Ok(TagRow {
        id: parse_col(row, 0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_slug_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.create_tag("Bitcoin", "bitcoin").unwrap();
        let err = db.create_tag("bitcoin", "bitcoin").unwrap_err();
        assert!(crate::is_constraint_violation(&err));
    }

    #[test]
    fn list_is_alphabetical_and_searchable() {
        let db = Database::open_in_memory().unwrap();
        db.create_tag("Stacks", "stacks").unwrap();
        db.create_tag("Art", "art").unwrap();
        db.create_tag("Music", "music").unwrap();

        let names: Vec<String> = db.list_tags(None).unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Art", "Music", "Stacks"]);

        let found = db.list_tags(Some("mus")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].slug, "music");
    }
}
