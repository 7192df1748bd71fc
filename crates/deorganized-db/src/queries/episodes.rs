use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use uuid::Uuid;

use crate::models::{EpisodeRow, parse_col};
use crate::{Database, timestamp};

const EPISODE_COLUMNS: &str = "id, show_id, episode_number, title, description, air_date, \
     duration_minutes, video_url, created_at";

#[derive(Debug)]
pub struct NewEpisode {
    pub show_id: Uuid,
    pub episode_number: u32,
    pub title: String,
    pub description: String,
    pub air_date: DateTime<Utc>,
    pub duration_minutes: Option<u32>,
    pub video_url: String,
}

impl Database {
    pub fn create_episode(&self, episode: &NewEpisode) -> Result<EpisodeRow> {
        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO show_episodes (id, show_id, episode_number, title, description, air_date,
                                            duration_minutes, video_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id.to_string(),
                    episode.show_id.to_string(),
                    episode.episode_number,
                    episode.title,
                    episode.description,
                    timestamp(&episode.air_date),
                    episode.duration_minutes,
                    episode.video_url,
                    crate::now(),
                ],
            )?;

            let sql = format!("SELECT {EPISODE_COLUMNS} FROM show_episodes WHERE id = ?1");
            let row = conn.query_row(&sql, [id.to_string()], map_episode)?;
            Ok(row)
        })
    }

    pub fn get_episode(&self, id: Uuid) -> Result<Option<EpisodeRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {EPISODE_COLUMNS} FROM show_episodes WHERE id = ?1");
            let row = conn.query_row(&sql, [id.to_string()], map_episode).optional()?;
            Ok(row)
        })
    }

    /// Ordered by episode number, optionally for a single show.
    pub fn list_episodes(&self, show_id: Option<Uuid>) -> Result<Vec<EpisodeRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {EPISODE_COLUMNS} FROM show_episodes
                 WHERE (?1 IS NULL OR show_id = ?1)
                 ORDER BY episode_number, air_date"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([show_id.map(|id| id.to_string())], map_episode)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_episode(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM show_episodes WHERE id = ?1", [id.to_string()])?;
            Ok(affected > 0)
        })
    }
}

fn map_episode(row: &Row) -> rusqlite::Result<EpisodeRow> {
    Ok(EpisodeRow {
        id: parse_col(row, 0)?,
        show_id: parse_col(row, 1)?,
        episode_number: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        air_date: parse_col(row, 5)?,
        duration_minutes: row.get(6)?,
        video_url: row.get(7)?,
        created_at: parse_col(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{NewShow, NewUser};
    use deorganized_types::models::{Role, ShowStatus, TargetKind, TargetRef};
    use deorganized_types::schedule::Schedule;

    fn show(db: &Database) -> Uuid {
        let creator = db
            .create_user(&NewUser {
                username: "host".into(),
                role: Some(Role::Creator),
                ..NewUser::default()
            })
            .unwrap();
        db.create_show(&NewShow {
            creator_id: creator.id,
            title: "Pod".into(),
            description: String::new(),
            thumbnail: None,
            external_link: None,
            link_platform: None,
            status: ShowStatus::Draft,
            schedule: Schedule::default(),
            tag_ids: vec![],
        })
        .unwrap()
        .id
    }

    fn episode(show_id: Uuid, number: u32) -> NewEpisode {
        NewEpisode {
            show_id,
            episode_number: number,
            title: format!("Episode {number}"),
            description: String::new(),
            air_date: Utc::now(),
            duration_minutes: Some(45),
            video_url: String::new(),
        }
    }

    #[test]
    fn episode_numbers_are_unique_per_show() {
        let db = Database::open_in_memory().unwrap();
        let show_id = show(&db);
        db.create_episode(&episode(show_id, 2)).unwrap();
        db.create_episode(&episode(show_id, 1)).unwrap();
        let err = db.create_episode(&episode(show_id, 1)).unwrap_err();
        assert!(crate::is_constraint_violation(&err));

        let numbers: Vec<u32> = db
            .list_episodes(Some(show_id))
            .unwrap()
            .iter()
            .map(|e| e.episode_number)
            .collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn deleting_the_show_removes_its_episodes() {
        let db = Database::open_in_memory().unwrap();
        let show_id = show(&db);
        let ep = db.create_episode(&episode(show_id, 1)).unwrap();

        assert!(db.delete_target(TargetRef::new(TargetKind::Show, show_id)).unwrap());
        assert!(db.get_episode(ep.id).unwrap().is_none());
    }
}
