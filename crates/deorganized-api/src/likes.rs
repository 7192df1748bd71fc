use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;

use deorganized_db::queries::{LikeFilter, LikeToggle};
use deorganized_types::api::{
    CountResponse, LikeQuery, LikeResponse, TargetQuery, ToggleLikeRequest, ToggleLikeResponse,
};
use deorganized_types::models::TargetRef;

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::views;

/// Like the target, or remove the caller's existing like.
pub async fn toggle(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiJson(req): ApiJson<ToggleLikeRequest>,
) -> ApiResult<(StatusCode, Json<ToggleLikeResponse>)> {
    let target = TargetRef::new(req.target_type, req.target_id);
    blocking(&state, move |db| {
        let toggled = db
            .toggle_like(claims.sub, target)?
            .ok_or_else(|| ApiError::NotFound(format!("{} not found", target.kind)))?;

        match toggled {
            LikeToggle::Liked(like) => Ok((
                StatusCode::CREATED,
                Json(ToggleLikeResponse {
                    status: "liked",
                    like: Some(views::like_response(db, like)?),
                }),
            )),
            LikeToggle::Unliked => Ok((
                StatusCode::OK,
                Json(ToggleLikeResponse {
                    status: "unliked",
                    like: None,
                }),
            )),
        }
    })
    .await
}

pub async fn list(State(state): State<AppState>, ApiQuery(query): ApiQuery<LikeQuery>) -> ApiResult<Json<Vec<LikeResponse>>> {
    blocking(&state, move |db| {
        let likes = db.list_likes(&LikeFilter {
            target_kind: query.target_type,
            target_id: query.target_id,
            user: query.user,
        })?;
        Ok(Json(views::like_responses(db, likes)?))
    })
    .await
}

pub async fn retrieve(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<LikeResponse>> {
    blocking(&state, move |db| {
        let like = db.get_like(id)?.ok_or_else(|| ApiError::not_found("Like"))?;
        Ok(Json(views::like_response(db, like)?))
    })
    .await
}

pub async fn count(State(state): State<AppState>, ApiQuery(query): ApiQuery<TargetQuery>) -> ApiResult<Json<CountResponse>> {
    let target = TargetRef::new(query.target_type, query.target_id);
    blocking(&state, move |db| {
        Ok(Json(CountResponse {
            count: db.count_likes(target)?,
        }))
    })
    .await
}
