use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::debug;
use uuid::Uuid;

use deorganized_types::models::{LinkPlatform, NotificationType, ShowStatus, TargetKind, TargetRef};
use deorganized_types::schedule::Schedule;
use deorganized_types::validation::slugify;

use super::{as_params, like_pattern, placeholders};
use super::tags::tags_for_show;
use super::users::map_user;
use crate::Database;
use crate::fanout::{fire_and_forget, notify};
use crate::models::{
    ShowRow, TagRow, UserRow, cancelled_json, parse_col, parse_opt_col, schedule_col,
};

const SHOW_COLUMNS: &str = "s.id, s.slug, s.title, s.description, s.thumbnail, s.creator_id, \
     s.external_link, s.link_platform, s.status, \
     s.is_recurring, s.recurrence_type, s.day_of_week, s.scheduled_time, s.cancelled_instances, \
     s.share_count, s.created_at, s.updated_at";

#[derive(Debug)]
pub struct NewShow {
    pub creator_id: Uuid,
    pub title: String,
    pub description: String,
    pub thumbnail: Option<String>,
    pub external_link: Option<String>,
    pub link_platform: Option<LinkPlatform>,
    pub status: ShowStatus,
    pub schedule: Schedule,
    pub tag_ids: Vec<Uuid>,
}

/// Partial update. `schedule` replaces the whole schedule when set;
/// `tag_ids` replaces the tag set when set.
#[derive(Debug, Default)]
pub struct ShowChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub external_link: Option<String>,
    pub link_platform: Option<LinkPlatform>,
    pub status: Option<ShowStatus>,
    pub schedule: Option<Schedule>,
    pub tag_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Default)]
pub struct ShowFilter {
    pub status: Option<ShowStatus>,
    pub creator: Option<Uuid>,
    /// A show must carry every one of these.
    pub tag_ids: Vec<Uuid>,
    pub is_recurring: Option<bool>,
    pub day_of_week: Option<u8>,
    pub search: Option<String>,
}

impl Database {
    pub fn create_show(&self, show: &NewShow) -> Result<ShowRow> {
        let id = Uuid::new_v4();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let slug = unique_slug(&tx, &show.title)?;
            let now = crate::now();
            let schedule = &show.schedule;

            tx.execute(
                "INSERT INTO shows (id, slug, title, description, thumbnail, creator_id, external_link,
                                    link_platform, status, is_recurring, recurrence_type, day_of_week,
                                    scheduled_time, cancelled_instances, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
                params![
                    id.to_string(),
                    slug,
                    show.title,
                    show.description,
                    show.thumbnail,
                    show.creator_id.to_string(),
                    show.external_link,
                    show.link_platform.map(|p| p.as_str()),
                    show.status.as_str(),
                    schedule.is_recurring,
                    schedule.recurrence_type.map(|r| r.as_str()),
                    schedule.day_of_week,
                    schedule.scheduled_time.map(|t| t.format("%H:%M:%S").to_string()),
                    cancelled_json(schedule),
                    now,
                ],
            )?;
            set_tags(&tx, id, &show.tag_ids)?;

            let row = query_show(&tx, "s.id = ?1", &id.to_string())?
                .ok_or_else(|| anyhow::anyhow!("Show {} vanished after insert", id))?;
            tx.commit()?;

            debug!("Created show {} ({})", row.slug, row.id);
            Ok(row)
        })
    }

    pub fn get_show_by_slug(&self, slug: &str) -> Result<Option<ShowRow>> {
        self.with_conn(|conn| query_show(conn, "s.slug = ?1", slug))
    }

    pub fn get_show_by_id(&self, id: Uuid) -> Result<Option<ShowRow>> {
        self.with_conn(|conn| query_show(conn, "s.id = ?1", &id.to_string()))
    }

    /// Newest first.
    pub fn list_shows(&self, filter: &ShowFilter) -> Result<Vec<ShowRow>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(status) = filter.status {
            bind(&mut clauses, &mut values, "s.status = ?", Value::Text(status.as_str().into()));
        }
        if let Some(creator) = filter.creator {
            bind(&mut clauses, &mut values, "s.creator_id = ?", Value::Text(creator.to_string()));
        }
        if let Some(recurring) = filter.is_recurring {
            bind(&mut clauses, &mut values, "s.is_recurring = ?", Value::Integer(recurring.into()));
        }
        if let Some(day) = filter.day_of_week {
            bind(&mut clauses, &mut values, "s.day_of_week = ?", Value::Integer(day.into()));
        }
        if let Some(pattern) = like_pattern(filter.search.as_deref()) {
            bind(
                &mut clauses,
                &mut values,
                "(s.title LIKE ? OR s.description LIKE ?)",
                Value::Text(pattern),
            );
        }
        for tag_id in &filter.tag_ids {
            bind(
                &mut clauses,
                &mut values,
                "EXISTS (SELECT 1 FROM show_tags st WHERE st.show_id = s.id AND st.tag_id = ?)",
                Value::Text(tag_id.to_string()),
            );
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SHOW_COLUMNS} FROM shows s {where_sql} ORDER BY s.created_at DESC, s.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), map_show)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_show(&self, id: Uuid, changes: &ShowChanges) -> Result<Option<ShowRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let schedule = changes.schedule.as_ref();

            tx.execute(
                "UPDATE shows SET
                    title = COALESCE(?2, title),
                    description = COALESCE(?3, description),
                    thumbnail = COALESCE(?4, thumbnail),
                    external_link = COALESCE(?5, external_link),
                    link_platform = COALESCE(?6, link_platform),
                    status = COALESCE(?7, status),
                    updated_at = ?8
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    changes.title,
                    changes.description,
                    changes.thumbnail,
                    changes.external_link,
                    changes.link_platform.map(|p| p.as_str()),
                    changes.status.map(|s| s.as_str()),
                    crate::now(),
                ],
            )?;

            if let Some(schedule) = schedule {
                write_schedule(&tx, id, schedule)?;
            }
            if let Some(tag_ids) = &changes.tag_ids {
                tx.execute("DELETE FROM show_tags WHERE show_id = ?1", [id.to_string()])?;
                set_tags(&tx, id, tag_ids)?;
            }

            let row = query_show(&tx, "s.id = ?1", &id.to_string())?;
            tx.commit()?;
            Ok(row)
        })
    }

    /// Bump the share counter and return the new value.
    pub fn increment_show_share(&self, id: Uuid) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let count = conn
                .query_row(
                    "UPDATE shows SET share_count = share_count + 1 WHERE id = ?1 RETURNING share_count",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(count)
        })
    }

    /// Mark one occurrence as cancelled and leave the creator a
    /// `show_cancelled` notification. Returns the updated show, or `None`
    /// when the show does not exist.
    pub fn cancel_show_instance(&self, id: Uuid, date: NaiveDate) -> Result<Option<ShowRow>> {
        self.with_conn(|conn| {
            let Some(mut show) = query_show(conn, "s.id = ?1", &id.to_string())? else {
                return Ok(None);
            };

            if show.schedule.cancel_instance(date) {
                conn.execute(
                    "UPDATE shows SET cancelled_instances = ?2, updated_at = ?3 WHERE id = ?1",
                    params![id.to_string(), cancelled_json(&show.schedule), crate::now()],
                )?;
                debug!("Cancelled {} of show {}", date, show.slug);
            }

            fire_and_forget(
                "show_cancelled",
                notify(
                    conn,
                    show.creator_id,
                    show.creator_id,
                    NotificationType::ShowCancelled,
                    Some(TargetRef::new(TargetKind::Show, id)),
                ),
            );

            Ok(Some(show))
        })
    }

    pub fn get_shows_by_ids(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, ShowRow>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let values: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SHOW_COLUMNS} FROM shows s WHERE s.id IN ({})",
                placeholders(values.len(), 1)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(as_params(&values).as_slice(), map_show)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().map(|s| (s.id, s)).collect())
        })
    }

    pub fn count_shows_by_creator(&self, creator_id: Uuid) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM shows WHERE creator_id = ?1",
                [creator_id.to_string()],
                |r| r.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn get_show_tags(&self, show_id: Uuid) -> Result<Vec<TagRow>> {
        self.with_conn(|conn| tags_for_show(conn, show_id))
    }

    pub fn get_show_guests(&self, show_id: Uuid) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.email, u.password, u.display_name, u.first_name, u.last_name,
                        u.role, u.wallet_address, u.bio, u.profile_picture, u.cover_photo, u.website,
                        u.twitter, u.instagram, u.youtube, u.is_verified, u.is_staff, u.date_joined,
                        u.updated_at
                 FROM users u
                 JOIN show_guests g ON g.user_id = u.id
                 WHERE g.show_id = ?1
                 ORDER BY u.username",
            )?;
            let rows = stmt
                .query_map([show_id.to_string()], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Shows the user has liked, newest like first.
    pub fn liked_shows(&self, user_id: Uuid) -> Result<Vec<ShowRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SHOW_COLUMNS} FROM shows s
                 JOIN likes l ON l.target_type = 'show' AND l.target_id = s.id
                 WHERE l.user_id = ?1
                 ORDER BY l.created_at DESC, l.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id.to_string()], map_show)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Ids from `ids` that do not name an existing tag.
    pub fn missing_tags(&self, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let mut missing = Vec::new();
            for id in ids {
                let found = conn
                    .query_row("SELECT 1 FROM tags WHERE id = ?1", [id.to_string()], |_| Ok(()))
                    .optional()?;
                if found.is_none() {
                    missing.push(*id);
                }
            }
            Ok(missing)
        })
    }
}

/// Append `clause` with every `?` bound to `value` as the next numbered parameter.
fn bind(clauses: &mut Vec<String>, values: &mut Vec<Value>, clause: &str, value: Value) {
    values.push(value);
    clauses.push(clause.replace('?', &format!("?{}", values.len())));
}

/// `title` slugified, with `-1`, `-2`, ... appended until it is free.
fn unique_slug(conn: &Connection, title: &str) -> Result<String> {
    let mut base = slugify(title);
    if base.is_empty() {
        base = "show".to_string();
    }

    let mut candidate = base.clone();
    let mut counter = 1;
    loop {
        let taken = conn
            .query_row("SELECT 1 FROM shows WHERE slug = ?1", [&candidate], |_| Ok(()))
            .optional()?
            .is_some();
        if !taken {
            return Ok(candidate);
        }
        candidate = format!("{base}-{counter}");
        counter += 1;
    }
}

fn set_tags(conn: &Connection, show_id: Uuid, tag_ids: &[Uuid]) -> Result<()> {
    for tag_id in tag_ids {
        conn.execute(
            "INSERT OR IGNORE INTO show_tags (show_id, tag_id) VALUES (?1, ?2)",
            params![show_id.to_string(), tag_id.to_string()],
        )?;
    }
    Ok(())
}

fn write_schedule(conn: &Connection, show_id: Uuid, schedule: &Schedule) -> Result<()> {
    conn.execute(
        "UPDATE shows SET is_recurring = ?2, recurrence_type = ?3, day_of_week = ?4,
                          scheduled_time = ?5, cancelled_instances = ?6
         WHERE id = ?1",
        params![
            show_id.to_string(),
            schedule.is_recurring,
            schedule.recurrence_type.map(|r| r.as_str()),
            schedule.day_of_week,
            schedule.scheduled_time.map(|t| t.format("%H:%M:%S").to_string()),
            cancelled_json(schedule),
        ],
    )?;
    Ok(())
}

/// Add a guest to a show; adding twice is a no-op.
pub(crate) fn add_guest(conn: &Connection, show_id: Uuid, user_id: Uuid) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO show_guests (show_id, user_id) VALUES (?1, ?2)",
        params![show_id.to_string(), user_id.to_string()],
    )?;
    Ok(())
}

pub(crate) fn query_show(conn: &Connection, clause: &str, value: &str) -> Result<Option<ShowRow>> {
    let sql = format!("SELECT {SHOW_COLUMNS} FROM shows s WHERE {clause}");
    let row = conn.query_row(&sql, [value], map_show).optional()?;
    Ok(row)
}

fn map_show(row: &Row) -> rusqlite::Result<ShowRow> {
    Ok(ShowRow {
        id: parse_col(row, 0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        thumbnail: row.get(4)?,
        creator_id: parse_col(row, 5)?,
        external_link: row.get(6)?,
        link_platform: parse_opt_col(row, 7)?,
        status: parse_col(row, 8)?,
        schedule: schedule_col(row, 9)?,
        share_count: row.get(14)?,
        created_at: parse_col(row, 15)?,
        updated_at: parse_col(row, 16)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::NewUser;
    use deorganized_types::models::{RecurrenceType, Role};

    fn creator(db: &Database, name: &str) -> Uuid {
        db.create_user(&NewUser {
            username: name.to_string(),
            role: Some(Role::Creator),
            ..NewUser::default()
        })
        .unwrap()
        .id
    }

    fn new_show(creator_id: Uuid, title: &str) -> NewShow {
        NewShow {
            creator_id,
            title: title.to_string(),
            description: "about".to_string(),
            thumbnail: None,
            external_link: None,
            link_platform: None,
            status: ShowStatus::Published,
            schedule: Schedule::default(),
            tag_ids: vec![],
        }
    }

    #[test]
    fn colliding_titles_get_numbered_slugs() {
        let db = Database::open_in_memory().unwrap();
        let owner = creator(&db, "host");
        let first = db.create_show(&new_show(owner, "Morning Show")).unwrap();
        let second = db.create_show(&new_show(owner, "Morning Show")).unwrap();
        let third = db.create_show(&new_show(owner, "Morning Show")).unwrap();
        assert_eq!(first.slug, "morning-show");
        assert_eq!(second.slug, "morning-show-1");
        assert_eq!(third.slug, "morning-show-2");
    }

    #[test]
    fn schedule_survives_storage() {
        let db = Database::open_in_memory().unwrap();
        let owner = creator(&db, "host");
        let mut show = new_show(owner, "Weekend Live");
        show.schedule = Schedule {
            is_recurring: true,
            recurrence_type: Some(RecurrenceType::Weekends),
            day_of_week: None,
            scheduled_time: chrono::NaiveTime::from_hms_opt(17, 30, 0),
            cancelled_instances: vec![],
        };
        let created = db.create_show(&show).unwrap();
        let loaded = db.get_show_by_slug(&created.slug).unwrap().unwrap();
        assert_eq!(loaded.schedule, show.schedule);
    }

    #[test]
    fn tag_filter_requires_every_tag() {
        let db = Database::open_in_memory().unwrap();
        let owner = creator(&db, "host");
        let music = db.create_tag("Music", "music").unwrap();
        let live = db.create_tag("Live", "live").unwrap();

        let mut both = new_show(owner, "Both");
        both.tag_ids = vec![music.id, live.id];
        db.create_show(&both).unwrap();
        let mut one = new_show(owner, "One");
        one.tag_ids = vec![music.id];
        db.create_show(&one).unwrap();

        let filter = ShowFilter {
            tag_ids: vec![music.id, live.id],
            ..ShowFilter::default()
        };
        let shows = db.list_shows(&filter).unwrap();
        assert_eq!(shows.len(), 1);
        assert_eq!(shows[0].title, "Both");

        let tags = db.get_show_tags(shows[0].id).unwrap();
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn cancel_instance_persists_and_notifies_creator() {
        let db = Database::open_in_memory().unwrap();
        let owner = creator(&db, "host");
        let show = db.create_show(&new_show(owner, "Daily")).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();

        db.cancel_show_instance(show.id, date).unwrap().unwrap();
        db.cancel_show_instance(show.id, date).unwrap().unwrap();

        let loaded = db.get_show_by_id(show.id).unwrap().unwrap();
        assert_eq!(loaded.schedule.cancelled_instances, vec!["2024-06-15".to_string()]);
        assert_eq!(db.unread_notification_count(owner).unwrap(), 2);
    }

    #[test]
    fn share_counter_increments() {
        let db = Database::open_in_memory().unwrap();
        let owner = creator(&db, "host");
        let show = db.create_show(&new_show(owner, "Shared")).unwrap();
        assert_eq!(db.increment_show_share(show.id).unwrap(), Some(1));
        assert_eq!(db.increment_show_share(show.id).unwrap(), Some(2));
        assert_eq!(db.increment_show_share(Uuid::new_v4()).unwrap(), None);
    }
}
