use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use deorganized_db::Database;
use deorganized_db::models::EventRow;
use deorganized_db::queries::{EventChanges, EventFilter, NewEvent};
use deorganized_types::api::{EventListQuery, EventResponse, EventWriteRequest, ShareResponse};
use deorganized_types::models::{TargetKind, TargetRef};
use deorganized_types::schedule::Schedule;
use deorganized_types::validation::{FieldErrors, check_url};

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{AuthUser, Viewer};
use crate::shows::apply_schedule;
use crate::views;

pub async fn list(
    State(state): State<AppState>,
    viewer: Viewer,
    ApiQuery(query): ApiQuery<EventListQuery>,
) -> ApiResult<Json<Vec<EventResponse>>> {
    blocking(&state, move |db| {
        let events = db.list_events(&EventFilter {
            organizer: query.organizer,
            is_recurring: query.is_recurring,
            viewer: viewer.id(),
        })?;
        Ok(Json(views::event_responses(db, events, viewer.id())?))
    })
    .await
}

pub async fn retrieve(
    State(state): State<AppState>,
    viewer: Viewer,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<EventResponse>> {
    blocking(&state, move |db| {
        let event = visible_event(db, id, viewer.id())?;
        Ok(Json(views::event_response(db, event, viewer.id())?))
    })
    .await
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiJson(req): ApiJson<EventWriteRequest>,
) -> ApiResult<(StatusCode, Json<EventResponse>)> {
    let schedule = apply_schedule(
        Schedule::default(),
        req.is_recurring,
        req.recurrence_type,
        req.day_of_week,
        req.scheduled_time,
    );
    let event = NewEvent {
        organizer_id: claims.sub,
        title: req.title.unwrap_or_default(),
        description: req.description.unwrap_or_default(),
        banner_image: req.banner_image,
        start_datetime: req.start_datetime,
        end_datetime: req.end_datetime,
        venue_name: req.venue_name.unwrap_or_default(),
        address: req.address.unwrap_or_default(),
        is_virtual: req.is_virtual.unwrap_or(false),
        meeting_link: req.meeting_link.unwrap_or_default(),
        capacity: req.capacity,
        registration_link: req.registration_link.unwrap_or_default(),
        registration_deadline: req.registration_deadline,
        is_public: req.is_public.unwrap_or(true),
        schedule,
    };

    validate_event(&EventShape {
        title: &event.title,
        start: event.start_datetime,
        end: event.end_datetime,
        is_virtual: event.is_virtual,
        meeting_link: &event.meeting_link,
        registration_link: &event.registration_link,
        schedule: &event.schedule,
    })
    .into_result()?;

    blocking(&state, move |db| {
        let created = db.create_event(&event)?;
        Ok((StatusCode::CREATED, Json(views::event_response(db, created, Some(claims.sub))?)))
    })
    .await
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<EventWriteRequest>,
) -> ApiResult<Json<EventResponse>> {
    blocking(&state, move |db| {
        let current = owned_event(db, id, claims.sub)?;

        let schedule_touched = req.is_recurring.is_some()
            || req.recurrence_type.is_some()
            || req.day_of_week.is_some()
            || req.scheduled_time.is_some();
        let schedule = apply_schedule(
            current.schedule.clone(),
            req.is_recurring,
            req.recurrence_type,
            req.day_of_week,
            req.scheduled_time,
        );

        // validate the event as it will look after the update
        validate_event(&EventShape {
            title: req.title.as_deref().unwrap_or(&current.title),
            start: req.start_datetime.or(current.start_datetime),
            end: req.end_datetime.or(current.end_datetime),
            is_virtual: req.is_virtual.unwrap_or(current.is_virtual),
            meeting_link: req.meeting_link.as_deref().unwrap_or(&current.meeting_link),
            registration_link: req.registration_link.as_deref().unwrap_or(&current.registration_link),
            schedule: &schedule,
        })
        .into_result()?;

        let updated = db
            .update_event(
                id,
                &EventChanges {
                    title: req.title,
                    description: req.description,
                    banner_image: req.banner_image,
                    start_datetime: req.start_datetime,
                    end_datetime: req.end_datetime,
                    venue_name: req.venue_name,
                    address: req.address,
                    is_virtual: req.is_virtual,
                    meeting_link: req.meeting_link,
                    capacity: req.capacity,
                    registration_link: req.registration_link,
                    registration_deadline: req.registration_deadline,
                    is_public: req.is_public,
                    schedule: schedule_touched.then_some(schedule),
                },
            )?
            .ok_or_else(|| ApiError::not_found("Event"))?;
        Ok(Json(views::event_response(db, updated, Some(claims.sub))?))
    })
    .await
}

pub async fn delete(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |db| {
        owned_event(db, id, claims.sub)?;
        db.delete_target(TargetRef::new(TargetKind::Event, id))?;
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}

pub async fn share(
    State(state): State<AppState>,
    viewer: Viewer,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ShareResponse>> {
    blocking(&state, move |db| {
        visible_event(db, id, viewer.id())?;
        let share_count = db
            .increment_event_share(id)?
            .ok_or_else(|| ApiError::not_found("Event"))?;
        Ok(Json(ShareResponse {
            success: true,
            share_count,
        }))
    })
    .await
}

/// Private events exist only for their organizer.
fn visible_event(db: &Database, id: Uuid, viewer: Option<Uuid>) -> ApiResult<EventRow> {
    db.get_event(id)?
        .filter(|e| e.is_public || Some(e.organizer_id) == viewer)
        .ok_or_else(|| ApiError::not_found("Event"))
}

fn owned_event(db: &Database, id: Uuid, user_id: Uuid) -> ApiResult<EventRow> {
    let event = visible_event(db, id, Some(user_id))?;
    if event.organizer_id != user_id {
        return Err(ApiError::forbidden("Only the organizer can do that"));
    }
    Ok(event)
}

struct EventShape<'a> {
    title: &'a str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    is_virtual: bool,
    meeting_link: &'a str,
    registration_link: &'a str,
    schedule: &'a Schedule,
}

fn validate_event(event: &EventShape<'_>) -> FieldErrors {
    let mut errors = event.schedule.validate();

    if event.title.trim().is_empty() {
        errors.add("title", "This field may not be blank.");
    }
    if !event.schedule.is_recurring && event.start.is_none() {
        errors.add("start_datetime", "One-time events must have a start date and time.");
    }
    if let (Some(start), Some(end)) = (event.start, event.end) {
        if end <= start {
            errors.add("end_datetime", "End time must be after start time.");
        }
    }
    if event.is_virtual && event.meeting_link.trim().is_empty() {
        errors.add("meeting_link", "Virtual events must have a meeting link.");
    }
    for (field, value) in [
        ("meeting_link", event.meeting_link),
        ("registration_link", event.registration_link),
    ] {
        if !value.is_empty() {
            if let Err(msg) = check_url(value) {
                errors.add(field, msg);
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn shape<'a>(schedule: &'a Schedule) -> EventShape<'a> {
        EventShape {
            title: "Meetup",
            start: Some(Utc::now()),
            end: None,
            is_virtual: false,
            meeting_link: "",
            registration_link: "",
            schedule,
        }
    }

    #[test]
    fn one_off_events_need_a_start() {
        let schedule = Schedule::default();
        let mut event = shape(&schedule);
        event.start = None;
        assert!(validate_event(&event).contains("start_datetime"));
    }

    #[test]
    fn end_must_follow_start() {
        let schedule = Schedule::default();
        let mut event = shape(&schedule);
        event.end = event.start.map(|s| s - Duration::hours(1));
        assert!(validate_event(&event).contains("end_datetime"));

        event.end = event.start.map(|s| s + Duration::hours(1));
        assert!(validate_event(&event).is_empty());
    }

    #[test]
    fn virtual_events_need_a_link() {
        let schedule = Schedule::default();
        let mut event = shape(&schedule);
        event.is_virtual = true;
        assert!(validate_event(&event).contains("meeting_link"));

        event.meeting_link = "https://meet.example.com/abc";
        assert!(validate_event(&event).is_empty());
    }
}
