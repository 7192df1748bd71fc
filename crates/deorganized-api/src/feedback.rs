use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use tracing::info;
use uuid::Uuid;

use deorganized_types::api::{
    CreateFeedbackRequest, FeedbackQuery, FeedbackReceived, FeedbackResponse, UpdateFeedbackRequest,
};

use crate::admin::require_staff;
use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{AuthUser, Viewer};
use crate::views;

/// Open to anyone. Signed-in users are identified by username when they
/// don't supply an identifier.
pub async fn create(
    State(state): State<AppState>,
    viewer: Viewer,
    ApiJson(req): ApiJson<CreateFeedbackRequest>,
) -> ApiResult<(StatusCode, Json<FeedbackReceived>)> {
    if req.message.trim().is_empty() {
        return Err(ApiError::field("message", "This field may not be blank."));
    }

    let identifier = req
        .user_identifier
        .filter(|s| !s.trim().is_empty())
        .or_else(|| viewer.0.as_ref().map(|c| c.username.clone()))
        .unwrap_or_else(|| "anonymous".to_string());

    blocking(&state, move |db| {
        let row = db.create_feedback(req.category, &req.message, &identifier)?;
        info!("Feedback {} received ({})", row.id, row.category);
        Ok((
            StatusCode::CREATED,
            Json(FeedbackReceived {
                success: true,
                message: "Thank you for your feedback!",
            }),
        ))
    })
    .await
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiQuery(query): ApiQuery<FeedbackQuery>,
) -> ApiResult<Json<Vec<FeedbackResponse>>> {
    blocking(&state, move |db| {
        require_staff(db, claims.sub)?;
        let rows = db.list_feedback(query.resolved)?;
        Ok(Json(rows.into_iter().map(views::feedback).collect()))
    })
    .await
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateFeedbackRequest>,
) -> ApiResult<Json<FeedbackResponse>> {
    blocking(&state, move |db| {
        require_staff(db, claims.sub)?;
        let row = db
            .update_feedback(id, req.resolved, req.admin_notes.as_deref())?
            .ok_or_else(|| ApiError::not_found("Feedback"))?;
        Ok(Json(views::feedback(row)))
    })
    .await
}
