use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;

use deorganized_db::queries::NewEpisode;
use deorganized_types::api::{CreateEpisodeRequest, EpisodeQuery, EpisodeResponse};
use deorganized_types::validation::{FieldErrors, check_url};

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::views;

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EpisodeQuery>,
) -> ApiResult<Json<Vec<EpisodeResponse>>> {
    blocking(&state, move |db| {
        let episodes = db.list_episodes(query.show)?;
        Ok(Json(episodes.into_iter().map(views::episode).collect()))
    })
    .await
}

pub async fn retrieve(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<EpisodeResponse>> {
    blocking(&state, move |db| {
        let episode = db.get_episode(id)?.ok_or_else(|| ApiError::not_found("Episode"))?;
        Ok(Json(views::episode(episode)))
    })
    .await
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiJson(req): ApiJson<CreateEpisodeRequest>,
) -> ApiResult<(StatusCode, Json<EpisodeResponse>)> {
    let mut errors = FieldErrors::default();
    if req.title.trim().is_empty() {
        errors.add("title", "This field may not be blank.");
    }
    if let Some(url) = req.video_url.as_deref().filter(|u| !u.is_empty()) {
        if let Err(msg) = check_url(url) {
            errors.add("video_url", msg);
        }
    }
    errors.into_result()?;

    blocking(&state, move |db| {
        let show = db
            .get_show_by_id(req.show_id)?
            .ok_or_else(|| ApiError::not_found("Show"))?;
        if show.creator_id != claims.sub {
            return Err(ApiError::forbidden("Only the show's creator can add episodes"));
        }

        let episode = db.create_episode(&NewEpisode {
            show_id: show.id,
            episode_number: req.episode_number,
            title: req.title,
            description: req.description.unwrap_or_default(),
            air_date: req.air_date,
            duration_minutes: req.duration_minutes,
            video_url: req.video_url.unwrap_or_default(),
        })?;
        Ok((StatusCode::CREATED, Json(views::episode(episode))))
    })
    .await
}

pub async fn delete(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |db| {
        let episode = db.get_episode(id)?.ok_or_else(|| ApiError::not_found("Episode"))?;
        let show = db
            .get_show_by_id(episode.show_id)?
            .ok_or_else(|| ApiError::not_found("Show"))?;
        if show.creator_id != claims.sub {
            return Err(ApiError::forbidden("Only the show's creator can delete episodes"));
        }
        db.delete_episode(id)?;
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}
