use axum::{
    Json,
    extract::State,
};
use uuid::Uuid;

use deorganized_types::api::{CountResponse, MarkAllReadResponse, NotificationResponse};

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiPath;
use crate::middleware::AuthUser;
use crate::views;

pub async fn list(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> ApiResult<Json<Vec<NotificationResponse>>> {
    blocking(&state, move |db| {
        let notifications = db.list_notifications(claims.sub)?;
        Ok(Json(views::notification_responses(db, notifications)?))
    })
    .await
}

/// Someone else's notification is reported as missing.
pub async fn mark_read(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<NotificationResponse>> {
    blocking(&state, move |db| {
        if !db.mark_notification_read(id, claims.sub)? {
            return Err(ApiError::not_found("Notification"));
        }
        let notification = db
            .get_notification(id, claims.sub)?
            .ok_or_else(|| ApiError::not_found("Notification"))?;
        let mut responses = views::notification_responses(db, vec![notification])?;
        responses.pop().map(Json).ok_or_else(|| ApiError::not_found("Notification"))
    })
    .await
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> ApiResult<Json<MarkAllReadResponse>> {
    blocking(&state, move |db| {
        let count = db.mark_all_notifications_read(claims.sub)?;
        Ok(Json(MarkAllReadResponse {
            status: "all marked as read",
            count,
        }))
    })
    .await
}

pub async fn unread_count(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> ApiResult<Json<CountResponse>> {
    blocking(&state, move |db| {
        Ok(Json(CountResponse {
            count: db.unread_notification_count(claims.sub)?,
        }))
    })
    .await
}
