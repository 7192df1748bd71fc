use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;

use deorganized_db::Database;
use deorganized_db::models::CommentRow;
use deorganized_db::queries::CommentFilter;
use deorganized_types::api::{
    CommentQuery, CommentResponse, CountResponse, CreateCommentRequest, TargetQuery,
    UpdateCommentRequest,
};
use deorganized_types::models::{TargetKind, TargetRef};
use deorganized_types::validation::{COMMENT_MAX, FieldErrors, check_max_len};

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::views;

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CommentQuery>,
) -> ApiResult<Json<Vec<CommentResponse>>> {
    blocking(&state, move |db| {
        let comments = db.list_comments(&CommentFilter {
            target_kind: query.target_type,
            target_id: query.target_id,
            top_level: query.top_level.unwrap_or(false),
        })?;
        Ok(Json(views::comment_responses(db, comments)?))
    })
    .await
}

pub async fn retrieve(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<CommentResponse>> {
    blocking(&state, move |db| {
        let comment = load_comment(db, id)?;
        Ok(Json(views::comment_response(db, comment)?))
    })
    .await
}

/// Comment on a show, post or event. A reply must name a parent on the
/// same target.
pub async fn create(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiJson(req): ApiJson<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentResponse>)> {
    check_text(&req.text)?;
    if req.target_type == TargetKind::Comment {
        return Err(ApiError::field("target_type", "Comments cannot target other comments; use 'parent'."));
    }
    let target = TargetRef::new(req.target_type, req.target_id);

    blocking(&state, move |db| {
        if !db.target_exists(target)? {
            return Err(ApiError::NotFound(format!("{} not found", target.kind)));
        }

        if let Some(parent_id) = req.parent {
            let parent = db
                .get_comment(parent_id)?
                .ok_or_else(|| ApiError::field("parent", "Parent comment does not exist."))?;
            if parent.target != target {
                return Err(ApiError::field("parent", "Parent comment belongs to a different target."));
            }
        }

        let comment = db.create_comment(claims.sub, target, &req.text, req.parent)?;
        Ok((StatusCode::CREATED, Json(views::comment_response(db, comment)?)))
    })
    .await
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateCommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    check_text(&req.text)?;
    blocking(&state, move |db| {
        let comment = load_comment(db, id)?;
        if comment.user_id != claims.sub {
            return Err(ApiError::forbidden("You can only edit your own comments"));
        }
        let updated = db
            .update_comment(id, &req.text)?
            .ok_or_else(|| ApiError::not_found("Comment"))?;
        Ok(Json(views::comment_response(db, updated)?))
    })
    .await
}

/// Removes the comment with its replies and their likes.
pub async fn delete(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |db| {
        let comment = load_comment(db, id)?;
        if comment.user_id != claims.sub {
            return Err(ApiError::forbidden("You can only delete your own comments"));
        }
        db.delete_target(TargetRef::new(TargetKind::Comment, id))?;
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}

pub async fn count(State(state): State<AppState>, ApiQuery(query): ApiQuery<TargetQuery>) -> ApiResult<Json<CountResponse>> {
    let target = TargetRef::new(query.target_type, query.target_id);
    blocking(&state, move |db| {
        Ok(Json(CountResponse {
            count: db.count_comments(target)?,
        }))
    })
    .await
}

fn load_comment(db: &Database, id: Uuid) -> ApiResult<CommentRow> {
    db.get_comment(id)?.ok_or_else(|| ApiError::not_found("Comment"))
}

fn check_text(text: &str) -> ApiResult<()> {
    let mut errors = FieldErrors::default();
    if text.trim().is_empty() {
        errors.add("text", "This field may not be blank.");
    }
    check_max_len(&mut errors, "text", text, COMMENT_MAX);
    Ok(errors.into_result()?)
}
