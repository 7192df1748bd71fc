use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use chrono::{NaiveTime, Utc};
use tracing::info;
use uuid::Uuid;

use deorganized_db::Database;
use deorganized_db::models::ShowRow;
use deorganized_db::queries::{NewShow, ShowChanges, ShowFilter};
use deorganized_types::api::{
    CancelInstanceRequest, ShareResponse, ShowListQuery, ShowResponse, ShowWriteRequest,
};
use deorganized_types::models::{RecurrenceType, Role, ShowStatus, TargetKind, TargetRef};
use deorganized_types::schedule::{Occurrence, Schedule};
use deorganized_types::validation::{FieldErrors, check_url};

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{AuthUser, Viewer};
use crate::views;

const INSTANCE_WINDOW_DAYS: u32 = 30;

pub async fn list(
    State(state): State<AppState>,
    viewer: Viewer,
    ApiQuery(query): ApiQuery<ShowListQuery>,
) -> ApiResult<Json<Vec<ShowResponse>>> {
    let tag_ids = parse_tag_list(query.tags.as_deref())?;
    // anonymous visitors only ever see published shows
    let status = match viewer.id() {
        Some(_) => query.status,
        None if query.status.is_some_and(|s| s != ShowStatus::Published) => return Ok(Json(Vec::new())),
        None => Some(ShowStatus::Published),
    };

    blocking(&state, move |db| {
        let shows = db.list_shows(&ShowFilter {
            status,
            creator: query.creator,
            tag_ids,
            is_recurring: query.is_recurring,
            day_of_week: query.day_of_week,
            search: query.search,
        })?;
        Ok(Json(views::show_responses(db, shows, viewer.id(), false)?))
    })
    .await
}

pub async fn retrieve(
    State(state): State<AppState>,
    viewer: Viewer,
    ApiPath(slug): ApiPath<String>,
) -> ApiResult<Json<ShowResponse>> {
    blocking(&state, move |db| {
        let show = visible_show(db, &slug, &viewer)?;
        Ok(Json(views::show_response(db, show, viewer.id(), true)?))
    })
    .await
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiJson(req): ApiJson<ShowWriteRequest>,
) -> ApiResult<(StatusCode, Json<ShowResponse>)> {
    let schedule = apply_schedule(
        Schedule::default(),
        req.is_recurring,
        req.recurrence_type,
        req.day_of_week,
        req.scheduled_time,
    );

    let mut errors = schedule.validate();
    let title = req.title.unwrap_or_default();
    if title.trim().is_empty() {
        errors.add("title", "This field is required.");
    }
    check_link(&mut errors, req.external_link.as_deref());
    errors.into_result()?;

    blocking(&state, move |db| {
        let user = db.get_user_by_id(claims.sub)?.ok_or(ApiError::Unauthorized)?;
        if user.role != Role::Creator {
            return Err(ApiError::forbidden("Only creators can create shows"));
        }

        let tag_ids = req.tag_ids.unwrap_or_default();
        check_tags(db, &tag_ids)?;

        let show = db.create_show(&NewShow {
            creator_id: user.id,
            title,
            description: req.description.unwrap_or_default(),
            thumbnail: req.thumbnail,
            external_link: req.external_link,
            link_platform: req.link_platform,
            status: req.status.unwrap_or(ShowStatus::Draft),
            schedule,
            tag_ids,
        })?;
        info!("{} created show {}", user.username, show.slug);

        Ok((
            StatusCode::CREATED,
            Json(views::show_response(db, show, Some(user.id), true)?),
        ))
    })
    .await
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(slug): ApiPath<String>,
    ApiJson(req): ApiJson<ShowWriteRequest>,
) -> ApiResult<Json<ShowResponse>> {
    let mut errors = FieldErrors::default();
    if req.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        errors.add("title", "This field may not be blank.");
    }
    check_link(&mut errors, req.external_link.as_deref());
    errors.into_result()?;

    blocking(&state, move |db| {
        let show = owned_show(db, &slug, claims.sub)?;

        let schedule_touched = req.is_recurring.is_some()
            || req.recurrence_type.is_some()
            || req.day_of_week.is_some()
            || req.scheduled_time.is_some();
        let schedule = if schedule_touched {
            let schedule = apply_schedule(
                show.schedule.clone(),
                req.is_recurring,
                req.recurrence_type,
                req.day_of_week,
                req.scheduled_time,
            );
            schedule.validate().into_result()?;
            Some(schedule)
        } else {
            None
        };

        if let Some(tag_ids) = &req.tag_ids {
            check_tags(db, tag_ids)?;
        }

        let updated = db
            .update_show(
                show.id,
                &ShowChanges {
                    title: req.title,
                    description: req.description,
                    thumbnail: req.thumbnail,
                    external_link: req.external_link,
                    link_platform: req.link_platform,
                    status: req.status,
                    schedule,
                    tag_ids: req.tag_ids,
                },
            )?
            .ok_or_else(|| ApiError::not_found("Show"))?;
        Ok(Json(views::show_response(db, updated, Some(claims.sub), true)?))
    })
    .await
}

pub async fn delete(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(slug): ApiPath<String>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |db| {
        let show = owned_show(db, &slug, claims.sub)?;
        db.delete_target(TargetRef::new(TargetKind::Show, show.id))?;
        info!("Deleted show {}", show.slug);
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}

/// Published recurring shows.
pub async fn upcoming(State(state): State<AppState>, viewer: Viewer) -> ApiResult<Json<Vec<ShowResponse>>> {
    blocking(&state, move |db| {
        let shows = db.list_shows(&ShowFilter {
            status: Some(ShowStatus::Published),
            is_recurring: Some(true),
            ..ShowFilter::default()
        })?;
        Ok(Json(views::show_responses(db, shows, viewer.id(), false)?))
    })
    .await
}

/// Every show the caller created, drafts included.
pub async fn mine(State(state): State<AppState>, AuthUser(claims): AuthUser) -> ApiResult<Json<Vec<ShowResponse>>> {
    blocking(&state, move |db| {
        let shows = db.list_shows(&ShowFilter {
            creator: Some(claims.sub),
            ..ShowFilter::default()
        })?;
        Ok(Json(views::show_responses(db, shows, Some(claims.sub), false)?))
    })
    .await
}

pub async fn share(
    State(state): State<AppState>,
    viewer: Viewer,
    ApiPath(slug): ApiPath<String>,
) -> ApiResult<Json<ShareResponse>> {
    blocking(&state, move |db| {
        let show = visible_show(db, &slug, &viewer)?;
        let share_count = db
            .increment_show_share(show.id)?
            .ok_or_else(|| ApiError::not_found("Show"))?;
        Ok(Json(ShareResponse {
            success: true,
            share_count,
        }))
    })
    .await
}

/// Dated occurrences over the next 30 days, starting today.
pub async fn instances(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(slug): ApiPath<String>,
) -> ApiResult<Json<Vec<Occurrence>>> {
    blocking(&state, move |db| {
        let show = load_show(db, &slug)?;
        if !show.schedule.is_recurring {
            return Err(ApiError::bad_request("This show is not recurring"));
        }
        let today = Utc::now().date_naive();
        Ok(Json(show.schedule.upcoming_instances(today, INSTANCE_WINDOW_DAYS)))
    })
    .await
}

pub async fn cancel_instance(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(slug): ApiPath<String>,
    ApiJson(req): ApiJson<CancelInstanceRequest>,
) -> ApiResult<Json<ShowResponse>> {
    blocking(&state, move |db| {
        let show = owned_show(db, &slug, claims.sub)?;
        let updated = db
            .cancel_show_instance(show.id, req.date)?
            .ok_or_else(|| ApiError::not_found("Show"))?;
        info!("Cancelled {} of show {}", req.date, updated.slug);
        Ok(Json(views::show_response(db, updated, Some(claims.sub), true)?))
    })
    .await
}

// -- Helpers --

pub(crate) fn load_show(db: &Database, slug: &str) -> ApiResult<ShowRow> {
    db.get_show_by_slug(slug)?.ok_or_else(|| ApiError::not_found("Show"))
}

/// Drafts and archived shows are hidden from anonymous visitors.
fn visible_show(db: &Database, slug: &str, viewer: &Viewer) -> ApiResult<ShowRow> {
    let show = load_show(db, slug)?;
    if viewer.id().is_none() && show.status != ShowStatus::Published {
        return Err(ApiError::not_found("Show"));
    }
    Ok(show)
}

fn owned_show(db: &Database, slug: &str, user_id: Uuid) -> ApiResult<ShowRow> {
    let show = load_show(db, slug)?;
    if show.creator_id != user_id {
        return Err(ApiError::forbidden("Only the show's creator can do that"));
    }
    Ok(show)
}

/// Overlay whichever schedule fields were submitted onto `base`.
pub(crate) fn apply_schedule(
    mut base: Schedule,
    is_recurring: Option<bool>,
    recurrence_type: Option<RecurrenceType>,
    day_of_week: Option<u8>,
    scheduled_time: Option<NaiveTime>,
) -> Schedule {
    if let Some(recurring) = is_recurring {
        base.is_recurring = recurring;
    }
    if recurrence_type.is_some() {
        base.recurrence_type = recurrence_type;
    }
    if day_of_week.is_some() {
        base.day_of_week = day_of_week;
    }
    if scheduled_time.is_some() {
        base.scheduled_time = scheduled_time;
    }
    base
}

fn check_link(errors: &mut FieldErrors, link: Option<&str>) {
    if let Some(url) = link.filter(|u| !u.is_empty()) {
        if let Err(msg) = check_url(url) {
            errors.add("external_link", msg);
        }
    }
}

fn check_tags(db: &Database, tag_ids: &[Uuid]) -> ApiResult<()> {
    let missing = db.missing_tags(tag_ids)?;
    if let Some(id) = missing.first() {
        return Err(ApiError::field("tag_ids", format!("Invalid pk \"{id}\" - object does not exist.")));
    }
    Ok(())
}

fn parse_tag_list(raw: Option<&str>) -> ApiResult<Vec<Uuid>> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Uuid>().map_err(|_| ApiError::field("tags", format!("'{s}' is not a valid tag id"))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_list_parsing() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(parse_tag_list(Some(&format!("{a}, {b},"))).unwrap(), vec![a, b]);
        assert!(parse_tag_list(None).unwrap().is_empty());
        assert!(parse_tag_list(Some("music")).is_err());
    }

    #[test]
    fn schedule_overlay_keeps_untouched_fields() {
        let base = Schedule {
            is_recurring: true,
            recurrence_type: Some(RecurrenceType::Daily),
            scheduled_time: NaiveTime::from_hms_opt(17, 0, 0),
            ..Schedule::default()
        };
        let merged = apply_schedule(base.clone(), None, Some(RecurrenceType::Weekends), None, None);
        assert_eq!(merged.recurrence_type, Some(RecurrenceType::Weekends));
        assert_eq!(merged.scheduled_time, base.scheduled_time);
        assert!(merged.is_recurring);
    }
}
