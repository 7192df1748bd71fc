use axum::{
    Json,
    extract::State,
};
use uuid::Uuid;

use deorganized_db::queries::{ProfileUpdate, UserFilter};
use deorganized_types::api::{
    CreatorProfileResponse, ShowResponse, UpdateProfileRequest, UserListQuery, UserResponse,
};
use deorganized_types::models::Role;
use deorganized_types::validation::{BIO_MAX, FieldErrors, check_max_len, check_url, check_username};

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{AuthUser, Viewer};
use crate::views;

pub async fn me(State(state): State<AppState>, AuthUser(claims): AuthUser) -> ApiResult<Json<UserResponse>> {
    blocking(&state, move |db| {
        let user = db.get_user_by_id(claims.sub)?.ok_or(ApiError::Unauthorized)?;
        Ok(Json(views::user_response(db, user)?))
    })
    .await
}

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> ApiResult<Json<Vec<UserResponse>>> {
    blocking(&state, move |db| {
        let users = db.list_users(&UserFilter {
            role: query.role,
            is_verified: query.is_verified,
            search: query.search,
            limit: None,
        })?;
        Ok(Json(views::user_responses(db, users)?))
    })
    .await
}

pub async fn retrieve(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<UserResponse>> {
    blocking(&state, move |db| {
        let user = db.get_user_by_id(id)?.ok_or_else(|| ApiError::not_found("User"))?;
        Ok(Json(views::user_response(db, user)?))
    })
    .await
}

/// Partial profile update. Users may only edit themselves, and a creator
/// cannot go back to being a regular user.
pub async fn update(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<UserResponse>> {
    if id != claims.sub {
        return Err(ApiError::forbidden("You can only edit your own profile"));
    }

    let mut errors = FieldErrors::default();
    if let Some(name) = &req.username {
        if let Err(msg) = check_username(name) {
            errors.add("username", msg);
        }
    }
    if let Some(bio) = &req.bio {
        check_max_len(&mut errors, "bio", bio, BIO_MAX);
    }
    for (field, value) in [("website", &req.website), ("youtube", &req.youtube)] {
        if let Some(url) = value.as_deref().filter(|u| !u.is_empty()) {
            if let Err(msg) = check_url(url) {
                errors.add(field, msg);
            }
        }
    }
    errors.into_result()?;

    blocking(&state, move |db| {
        let current = db.get_user_by_id(id)?.ok_or_else(|| ApiError::not_found("User"))?;

        if current.role == Role::Creator && req.role == Some(Role::User) {
            return Err(ApiError::field("role", "Creators cannot downgrade to a regular user account."));
        }
        if let Some(name) = &req.username {
            if db.username_taken(name, Some(id))? {
                return Err(ApiError::field("username", "This username is already taken"));
            }
        }

        let updated = db
            .update_profile(
                id,
                &ProfileUpdate {
                    username: req.username,
                    display_name: req.display_name,
                    bio: req.bio,
                    profile_picture: req.profile_picture,
                    cover_photo: req.cover_photo,
                    website: req.website,
                    twitter: req.twitter,
                    instagram: req.instagram,
                    youtube: req.youtube,
                    role: req.role,
                },
            )?
            .ok_or_else(|| ApiError::not_found("User"))?;
        Ok(Json(views::user_response(db, updated)?))
    })
    .await
}

pub async fn creator_profile(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<CreatorProfileResponse>> {
    blocking(&state, move |db| {
        let user = db
            .get_user_by_id(id)?
            .filter(|u| u.role == Role::Creator)
            .ok_or_else(|| ApiError::not_found("Creator"))?;
        let show_count = db.count_shows_by_creator(user.id)?;
        Ok(Json(CreatorProfileResponse {
            profile: views::user_response(db, user)?,
            show_count,
        }))
    })
    .await
}

pub async fn liked_shows(
    State(state): State<AppState>,
    viewer: Viewer,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<ShowResponse>>> {
    blocking(&state, move |db| {
        db.get_user_by_id(id)?.ok_or_else(|| ApiError::not_found("User"))?;
        let shows = db.liked_shows(id)?;
        Ok(Json(views::show_responses(db, shows, viewer.id(), false)?))
    })
    .await
}

/// The accounts `id` follows, newest follow first.
pub async fn following(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<UserResponse>>> {
    blocking(&state, move |db| {
        db.get_user_by_id(id)?.ok_or_else(|| ApiError::not_found("User"))?;
        let ids: Vec<Uuid> = db
            .list_follows(Some(id), None)?
            .into_iter()
            .map(|f| f.following_id)
            .collect();
        let mut users = db.get_users_by_ids(&ids)?;
        let ordered = ids.iter().filter_map(|id| users.remove(id)).collect();
        Ok(Json(views::user_responses(db, ordered)?))
    })
    .await
}
