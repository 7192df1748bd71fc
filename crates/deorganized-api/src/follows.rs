use axum::{
    Json,
    extract::State,
    http::StatusCode,
};

use deorganized_db::queries::FollowToggle;
use deorganized_types::api::{FollowQuery, FollowResponse, ToggleFollowRequest, ToggleFollowResponse, UserIdQuery};

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::middleware::AuthUser;
use crate::views;

pub async fn toggle(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiJson(req): ApiJson<ToggleFollowRequest>,
) -> ApiResult<(StatusCode, Json<ToggleFollowResponse>)> {
    if req.following_id == claims.sub {
        return Err(ApiError::bad_request("You cannot follow yourself"));
    }

    blocking(&state, move |db| {
        db.get_user_by_id(req.following_id)?
            .ok_or_else(|| ApiError::not_found("User"))?;

        match db.toggle_follow(claims.sub, req.following_id)? {
            FollowToggle::Followed(follow) => Ok((
                StatusCode::CREATED,
                Json(ToggleFollowResponse {
                    status: "followed",
                    follow: Some(views::follow_response(db, follow)?),
                }),
            )),
            FollowToggle::Unfollowed => Ok((
                StatusCode::OK,
                Json(ToggleFollowResponse {
                    status: "unfollowed",
                    follow: None,
                }),
            )),
        }
    })
    .await
}

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<FollowQuery>,
) -> ApiResult<Json<Vec<FollowResponse>>> {
    blocking(&state, move |db| {
        let follows = db.list_follows(query.follower, query.following)?;
        Ok(Json(views::follow_responses(db, follows)?))
    })
    .await
}

/// Who follows `user_id`.
pub async fn followers(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserIdQuery>,
) -> ApiResult<Json<Vec<FollowResponse>>> {
    blocking(&state, move |db| {
        let follows = db.list_follows(None, Some(query.user_id))?;
        Ok(Json(views::follow_responses(db, follows)?))
    })
    .await
}

/// Who `user_id` follows.
pub async fn following(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserIdQuery>,
) -> ApiResult<Json<Vec<FollowResponse>>> {
    blocking(&state, move |db| {
        let follows = db.list_follows(Some(query.user_id), None)?;
        Ok(Json(views::follow_responses(db, follows)?))
    })
    .await
}
