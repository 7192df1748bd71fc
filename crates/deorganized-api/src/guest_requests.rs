use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use tracing::info;
use uuid::Uuid;

use deorganized_db::Database;
use deorganized_db::models::{GuestRequestRow, ShowRow};
use deorganized_types::api::{CreateGuestRequest, GuestRequestQuery, GuestRequestResponse};
use deorganized_types::models::Role;

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::views;

/// Ask to appear on another creator's show.
pub async fn create(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiJson(req): ApiJson<CreateGuestRequest>,
) -> ApiResult<(StatusCode, Json<GuestRequestResponse>)> {
    blocking(&state, move |db| {
        let requester = db.get_user_by_id(claims.sub)?.ok_or(ApiError::Unauthorized)?;
        if requester.role != Role::Creator {
            return Err(ApiError::forbidden("Only creators can request to guest on shows"));
        }

        let show = db
            .get_show_by_id(req.show_id)?
            .ok_or_else(|| ApiError::not_found("Show"))?;
        if show.creator_id == requester.id {
            return Err(ApiError::bad_request("You cannot request to guest on your own show"));
        }
        if db.find_guest_request(show.id, requester.id)?.is_some() {
            return Err(ApiError::bad_request("You have already requested to guest on this show"));
        }

        let request = db.create_guest_request(show.id, requester.id, req.message.as_deref().unwrap_or_default())?;
        info!("{} asked to guest on {}", requester.username, show.slug);
        Ok((StatusCode::CREATED, Json(views::guest_request_response(db, request)?)))
    })
    .await
}

/// Requests the caller sent, or with `?received=true` pending requests
/// for the caller's shows.
pub async fn list(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiQuery(query): ApiQuery<GuestRequestQuery>,
) -> ApiResult<Json<Vec<GuestRequestResponse>>> {
    blocking(&state, move |db| {
        let requests = if query.received.unwrap_or(false) {
            db.list_received_guest_requests(claims.sub)?
        } else {
            db.list_sent_guest_requests(claims.sub)?
        };
        Ok(Json(views::guest_request_responses(db, requests)?))
    })
    .await
}

pub async fn retrieve(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<GuestRequestResponse>> {
    blocking(&state, move |db| {
        let (request, show) = load_request(db, id)?;
        if request.requester_id != claims.sub && show.creator_id != claims.sub {
            return Err(ApiError::forbidden("Not your guest request"));
        }
        Ok(Json(views::guest_request_response(db, request)?))
    })
    .await
}

pub async fn accept(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<GuestRequestResponse>> {
    blocking(&state, move |db| resolve(db, id, claims.sub, true)).await
}

pub async fn decline(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<GuestRequestResponse>> {
    blocking(&state, move |db| resolve(db, id, claims.sub, false)).await
}

fn resolve(db: &Database, id: Uuid, actor: Uuid, accept: bool) -> ApiResult<Json<GuestRequestResponse>> {
    let (request, show) = load_request(db, id)?;
    if show.creator_id != actor {
        return Err(ApiError::forbidden("Only the show's creator can respond to this request"));
    }

    let resolved = db
        .resolve_guest_request(id, actor, accept)?
        .ok_or_else(|| ApiError::bad_request(format!("This request has already been {}", request.status)))?;
    info!("Guest request {} for {} is now {}", id, show.slug, resolved.status);
    Ok(Json(views::guest_request_response(db, resolved)?))
}

fn load_request(db: &Database, id: Uuid) -> ApiResult<(GuestRequestRow, ShowRow)> {
    let request = db
        .get_guest_request(id)?
        .ok_or_else(|| ApiError::not_found("Guest request"))?;
    let show = db
        .get_show_by_id(request.show_id)?
        .ok_or_else(|| ApiError::not_found("Show"))?;
    Ok((request, show))
}
