use axum::{
    Json,
    extract::State,
    http::StatusCode,
};

use deorganized_types::api::{CreateTagRequest, SearchQuery, TagResponse};
use deorganized_types::validation::slugify;

use crate::admin::require_staff;
use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::views;

pub async fn list(State(state): State<AppState>, ApiQuery(query): ApiQuery<SearchQuery>) -> ApiResult<Json<Vec<TagResponse>>> {
    blocking(&state, move |db| {
        let tags = db.list_tags(query.search.as_deref())?;
        Ok(Json(tags.into_iter().map(views::tag).collect()))
    })
    .await
}

pub async fn retrieve(State(state): State<AppState>, ApiPath(slug): ApiPath<String>) -> ApiResult<Json<TagResponse>> {
    blocking(&state, move |db| {
        let tag = db.get_tag_by_slug(&slug)?.ok_or_else(|| ApiError::not_found("Tag"))?;
        Ok(Json(views::tag(tag)))
    })
    .await
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiJson(req): ApiJson<CreateTagRequest>,
) -> ApiResult<(StatusCode, Json<TagResponse>)> {
    let name = req.name.trim().to_string();
    let slug = slugify(&name);
    if slug.is_empty() {
        return Err(ApiError::field("name", "Tag name must contain letters or numbers."));
    }

    blocking(&state, move |db| {
        require_staff(db, claims.sub)?;
        if db.get_tag_by_slug(&slug)?.is_some() {
            return Err(ApiError::field("name", "tag with this name already exists."));
        }
        let tag = db.create_tag(&name, &slug)?;
        Ok((StatusCode::CREATED, Json(views::tag(tag))))
    })
    .await
}
