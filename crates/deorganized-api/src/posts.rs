use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;

use deorganized_db::Database;
use deorganized_db::models::PostRow;
use deorganized_db::queries::{NewPost, PostChanges};
use deorganized_types::api::{PostListQuery, PostResponse, PostWriteRequest};
use deorganized_types::models::{TargetKind, TargetRef};
use deorganized_types::validation::{FieldErrors, POST_MAX, check_max_len};

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{AuthUser, Viewer};
use crate::views;

pub async fn list(
    State(state): State<AppState>,
    viewer: Viewer,
    ApiQuery(query): ApiQuery<PostListQuery>,
) -> ApiResult<Json<Vec<PostResponse>>> {
    blocking(&state, move |db| {
        let posts = db.list_posts(query.author)?;
        Ok(Json(views::post_responses(db, posts, viewer.id())?))
    })
    .await
}

/// Posts from accounts the caller follows.
pub async fn feed(State(state): State<AppState>, AuthUser(claims): AuthUser) -> ApiResult<Json<Vec<PostResponse>>> {
    blocking(&state, move |db| {
        let posts = db.feed(claims.sub)?;
        Ok(Json(views::post_responses(db, posts, Some(claims.sub))?))
    })
    .await
}

pub async fn retrieve(
    State(state): State<AppState>,
    viewer: Viewer,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<PostResponse>> {
    blocking(&state, move |db| {
        let post = load_post(db, id)?;
        Ok(Json(views::post_response(db, post, viewer.id())?))
    })
    .await
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiJson(req): ApiJson<PostWriteRequest>,
) -> ApiResult<(StatusCode, Json<PostResponse>)> {
    let content = req.content.unwrap_or_default();
    let mut errors = FieldErrors::default();
    if content.trim().is_empty() {
        errors.add("content", "This field is required.");
    }
    check_max_len(&mut errors, "content", &content, POST_MAX);
    errors.into_result()?;

    blocking(&state, move |db| {
        let post = db.create_post(&NewPost {
            author_id: claims.sub,
            content,
            image: req.image,
            is_pinned: req.is_pinned.unwrap_or(false),
        })?;
        Ok((StatusCode::CREATED, Json(views::post_response(db, post, Some(claims.sub))?)))
    })
    .await
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<PostWriteRequest>,
) -> ApiResult<Json<PostResponse>> {
    let mut errors = FieldErrors::default();
    if let Some(content) = &req.content {
        if content.trim().is_empty() {
            errors.add("content", "This field may not be blank.");
        }
        check_max_len(&mut errors, "content", content, POST_MAX);
    }
    errors.into_result()?;

    blocking(&state, move |db| {
        let post = load_post(db, id)?;
        if post.author_id != claims.sub {
            return Err(ApiError::forbidden("You can only edit your own posts"));
        }

        let updated = db
            .update_post(
                id,
                &PostChanges {
                    content: req.content,
                    image: req.image,
                    is_pinned: req.is_pinned,
                },
            )?
            .ok_or_else(|| ApiError::not_found("Post"))?;
        Ok(Json(views::post_response(db, updated, Some(claims.sub))?))
    })
    .await
}

/// Authors delete their own posts; staff may delete any.
pub async fn delete(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |db| {
        let post = load_post(db, id)?;
        if post.author_id != claims.sub {
            let is_staff = db.get_user_by_id(claims.sub)?.is_some_and(|u| u.is_staff);
            if !is_staff {
                return Err(ApiError::forbidden("You can only delete your own posts"));
            }
        }
        db.delete_target(TargetRef::new(TargetKind::Post, id))?;
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}

fn load_post(db: &Database, id: Uuid) -> ApiResult<PostRow> {
    db.get_post(id)?.ok_or_else(|| ApiError::not_found("Post"))
}
