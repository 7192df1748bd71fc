use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use deorganized_types::schedule::Schedule;

use crate::models::{EventRow, cancelled_json, parse_col, parse_opt_col, schedule_col};
use crate::{Database, timestamp};

const EVENT_COLUMNS: &str = "id, title, description, banner_image, organizer_id, start_datetime, \
     end_datetime, venue_name, address, is_virtual, meeting_link, capacity, registration_link, \
     registration_deadline, is_public, \
     is_recurring, recurrence_type, day_of_week, scheduled_time, cancelled_instances, \
     share_count, created_at, updated_at";

#[derive(Debug, Default)]
pub struct NewEvent {
    pub organizer_id: Uuid,
    pub title: String,
    pub description: String,
    pub banner_image: Option<String>,
    pub start_datetime: Option<DateTime<Utc>>,
    pub end_datetime: Option<DateTime<Utc>>,
    pub venue_name: String,
    pub address: String,
    pub is_virtual: bool,
    pub meeting_link: String,
    pub capacity: Option<u32>,
    pub registration_link: String,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub is_public: bool,
    pub schedule: Schedule,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct EventChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub banner_image: Option<String>,
    pub start_datetime: Option<DateTime<Utc>>,
    pub end_datetime: Option<DateTime<Utc>>,
    pub venue_name: Option<String>,
    pub address: Option<String>,
    pub is_virtual: Option<bool>,
    pub meeting_link: Option<String>,
    pub capacity: Option<u32>,
    pub registration_link: Option<String>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub is_public: Option<bool>,
    pub schedule: Option<Schedule>,
}

#[derive(Debug, Default)]
pub struct EventFilter {
    pub organizer: Option<Uuid>,
    pub is_recurring: Option<bool>,
    /// Private events are only listed for their organizer.
    pub viewer: Option<Uuid>,
}

impl Database {
    pub fn create_event(&self, event: &NewEvent) -> Result<EventRow> {
        let id = Uuid::new_v4();
        let schedule = &event.schedule;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO events (id, title, description, banner_image, organizer_id, start_datetime,
                                     end_datetime, venue_name, address, is_virtual, meeting_link, capacity,
                                     registration_link, registration_deadline, is_public, is_recurring,
                                     recurrence_type, day_of_week, scheduled_time, cancelled_instances,
                                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                         ?17, ?18, ?19, ?20, ?21, ?21)",
                params![
                    id.to_string(),
                    event.title,
                    event.description,
                    event.banner_image,
                    event.organizer_id.to_string(),
                    event.start_datetime.as_ref().map(timestamp),
                    event.end_datetime.as_ref().map(timestamp),
                    event.venue_name,
                    event.address,
                    event.is_virtual,
                    event.meeting_link,
                    event.capacity,
                    event.registration_link,
                    event.registration_deadline.as_ref().map(timestamp),
                    event.is_public,
                    schedule.is_recurring,
                    schedule.recurrence_type.map(|r| r.as_str()),
                    schedule.day_of_week,
                    schedule.scheduled_time.map(|t| t.format("%H:%M:%S").to_string()),
                    cancelled_json(schedule),
                    crate::now(),
                ],
            )?;
            query_event(conn, id)?.ok_or_else(|| anyhow::anyhow!("Event {} vanished after insert", id))
        })
    }

    pub fn get_event(&self, id: Uuid) -> Result<Option<EventRow>> {
        self.with_conn(|conn| query_event(conn, id))
    }

    /// Ordered by start time; recurring events without one come first.
    pub fn list_events(&self, filter: &EventFilter) -> Result<Vec<EventRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {EVENT_COLUMNS} FROM events
                 WHERE (?1 IS NULL OR organizer_id = ?1)
                   AND (?2 IS NULL OR is_recurring = ?2)
                   AND (is_public = 1 OR organizer_id = ?3)
                 ORDER BY start_datetime, created_at"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![
                        filter.organizer.map(|id| id.to_string()),
                        filter.is_recurring,
                        filter.viewer.map(|id| id.to_string()),
                    ],
                    map_event,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_event(&self, id: Uuid, changes: &EventChanges) -> Result<Option<EventRow>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE events SET
                    title = COALESCE(?2, title),
                    description = COALESCE(?3, description),
                    banner_image = COALESCE(?4, banner_image),
                    start_datetime = COALESCE(?5, start_datetime),
                    end_datetime = COALESCE(?6, end_datetime),
                    venue_name = COALESCE(?7, venue_name),
                    address = COALESCE(?8, address),
                    is_virtual = COALESCE(?9, is_virtual),
                    meeting_link = COALESCE(?10, meeting_link),
                    capacity = COALESCE(?11, capacity),
                    registration_link = COALESCE(?12, registration_link),
                    registration_deadline = COALESCE(?13, registration_deadline),
                    is_public = COALESCE(?14, is_public),
                    updated_at = ?15
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    changes.title,
                    changes.description,
                    changes.banner_image,
                    changes.start_datetime.as_ref().map(timestamp),
                    changes.end_datetime.as_ref().map(timestamp),
                    changes.venue_name,
                    changes.address,
                    changes.is_virtual,
                    changes.meeting_link,
                    changes.capacity,
                    changes.registration_link,
                    changes.registration_deadline.as_ref().map(timestamp),
                    changes.is_public,
                    crate::now(),
                ],
            )?;

            if let Some(schedule) = &changes.schedule {
                conn.execute(
                    "UPDATE events SET is_recurring = ?2, recurrence_type = ?3, day_of_week = ?4,
                                       scheduled_time = ?5, cancelled_instances = ?6
                     WHERE id = ?1",
                    params![
                        id.to_string(),
                        schedule.is_recurring,
                        schedule.recurrence_type.map(|r| r.as_str()),
                        schedule.day_of_week,
                        schedule.scheduled_time.map(|t| t.format("%H:%M:%S").to_string()),
                        cancelled_json(schedule),
                    ],
                )?;
            }

            query_event(conn, id)
        })
    }

    pub fn increment_event_share(&self, id: Uuid) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let count = conn
                .query_row(
                    "UPDATE events SET share_count = share_count + 1 WHERE id = ?1 RETURNING share_count",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(count)
        })
    }
}

fn query_event(conn: &Connection, id: Uuid) -> Result<Option<EventRow>> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");
    let row = conn.query_row(&sql, [id.to_string()], map_event).optional()?;
    Ok(row)
}

fn map_event(row: &Row) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: parse_col(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        banner_image: row.get(3)?,
        organizer_id: parse_col(row, 4)?,
        start_datetime: parse_opt_col(row, 5)?,
        end_datetime: parse_opt_col(row, 6)?,
        venue_name: row.get(7)?,
        address: row.get(8)?,
        is_virtual: row.get(9)?,
        meeting_link: row.get(10)?,
        capacity: row.get(11)?,
        registration_link: row.get(12)?,
        registration_deadline: parse_opt_col(row, 13)?,
        is_public: row.get(14)?,
        schedule: schedule_col(row, 15)?,
        share_count: row.get(20)?,
        created_at: parse_col(row, 21)?,
        updated_at: parse_col(row, 22)?,
    })
}
