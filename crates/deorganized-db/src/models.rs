//! Database row types. These map directly to SQLite rows and stay
//! separate from the API response shapes in deorganized-types.

use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

use deorganized_types::models::{
    FeedbackCategory, GuestRequestStatus, LinkPlatform, NotificationType, RecurrenceType, Role,
    ShowStatus, TargetKind, TargetRef,
};
use deorganized_types::schedule::Schedule;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub wallet_address: Option<String>,
    pub bio: String,
    pub profile_picture: Option<String>,
    pub cover_photo: Option<String>,
    pub website: String,
    pub twitter: String,
    pub instagram: String,
    pub youtube: String,
    pub is_verified: bool,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TagRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone)]
pub struct ShowRow {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub thumbnail: Option<String>,
    pub creator_id: Uuid,
    pub external_link: Option<String>,
    pub link_platform: Option<LinkPlatform>,
    pub status: ShowStatus,
    pub schedule: Schedule,
    pub share_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EpisodeRow {
    pub id: Uuid,
    pub show_id: Uuid,
    pub episode_number: u32,
    pub title: String,
    pub description: String,
    pub air_date: DateTime<Utc>,
    pub duration_minutes: Option<u32>,
    pub video_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub image: Option<String>,
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EventRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub banner_image: Option<String>,
    pub organizer_id: Uuid,
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
    pub share_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LikeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target: TargetRef,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target: TargetRef,
    pub text: String,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FollowRow {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub following_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NotificationRow {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub actor_id: Uuid,
    pub notification_type: NotificationType,
    pub target: Option<TargetRef>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct GuestRequestRow {
    pub id: Uuid,
    pub show_id: Uuid,
    pub requester_id: Uuid,
    pub message: String,
    pub status: GuestRequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FeedbackRow {
    pub id: Uuid,
    pub category: FeedbackCategory,
    pub message: String,
    pub user_identifier: String,
    pub resolved: bool,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

// -- Column decoding --

/// Read a TEXT column and parse it with `FromStr`.
pub(crate) fn parse_col<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_opt_col<T>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

/// Read the `(target_type, target_id)` pair starting at `idx`.
pub(crate) fn target_col(row: &Row, idx: usize) -> rusqlite::Result<TargetRef> {
    Ok(TargetRef::new(parse_col::<TargetKind>(row, idx)?, parse_col(row, idx + 1)?))
}

/// Read the five schedule columns starting at `idx`:
/// is_recurring, recurrence_type, day_of_week, scheduled_time, cancelled_instances.
pub(crate) fn schedule_col(row: &Row, idx: usize) -> rusqlite::Result<Schedule> {
    let cancelled: String = row.get(idx + 4)?;
    let cancelled_instances: Vec<String> = serde_json::from_str(&cancelled)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx + 4, Type::Text, Box::new(e)))?;

    Ok(Schedule {
        is_recurring: row.get(idx)?,
        recurrence_type: parse_opt_col::<RecurrenceType>(row, idx + 1)?,
        day_of_week: row.get(idx + 2)?,
        scheduled_time: parse_opt_col::<NaiveTime>(row, idx + 3)?,
        cancelled_instances,
    })
}

pub(crate) fn cancelled_json(schedule: &Schedule) -> String {
    serde_json::to_string(&schedule.cancelled_instances).unwrap_or_else(|_| "[]".to_string())
}
