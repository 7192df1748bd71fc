use axum::{
    Json,
    extract::State,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use deorganized_db::Database;
use deorganized_db::models::UserRow;
use deorganized_db::queries::UserFilter;
use deorganized_types::api::{
    AdminActivity, AdminFeedback, AdminOverview, AdminStats, UserListQuery, UserResponse,
    VerificationToggleResponse,
};

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::views;

const RECENT_SIGNUPS: u32 = 10;

/// Load the caller and require the staff flag.
pub(crate) fn require_staff(db: &Database, user_id: Uuid) -> ApiResult<UserRow> {
    match db.get_user_by_id(user_id)? {
        Some(user) if user.is_staff => Ok(user),
        Some(_) => Err(ApiError::forbidden("Staff access required")),
        None => Err(ApiError::Unauthorized),
    }
}

pub async fn stats(State(state): State<AppState>, AuthUser(claims): AuthUser) -> ApiResult<Json<AdminStats>> {
    blocking(&state, move |db| {
        require_staff(db, claims.sub)?;

        let counts = db.platform_counts(Utc::now())?;
        let recent = db.list_users(&UserFilter {
            limit: Some(RECENT_SIGNUPS),
            ..UserFilter::default()
        })?;

        Ok(Json(AdminStats {
            overview: AdminOverview {
                total_users: counts.users,
                total_creators: counts.creators,
                total_regular_users: counts.users - counts.creators,
                total_shows: counts.shows,
                total_events: counts.events,
                total_posts: counts.posts,
            },
            activity: AdminActivity {
                new_users_7d: counts.new_users_7d,
                new_users_30d: counts.new_users_30d,
                total_likes: counts.likes,
                total_comments: counts.comments,
                total_follows: counts.follows,
            },
            feedback: AdminFeedback {
                total: counts.feedback,
                unresolved: counts.unresolved_feedback,
            },
            recent_users: recent.iter().map(views::summary).collect(),
        }))
    })
    .await
}

pub async fn users(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> ApiResult<Json<Vec<UserResponse>>> {
    blocking(&state, move |db| {
        require_staff(db, claims.sub)?;
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

pub async fn toggle_verification(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<VerificationToggleResponse>> {
    blocking(&state, move |db| {
        let admin = require_staff(db, claims.sub)?;
        let user = db.toggle_verified(id)?.ok_or_else(|| ApiError::not_found("User"))?;

        let verb = if user.is_verified { "verified" } else { "unverified" };
        info!("{} {} user {}", admin.username, verb, user.username);

        Ok(Json(VerificationToggleResponse {
            message: format!("User {} has been {}", user.username, verb),
            id: user.id,
            username: user.username,
            is_verified: user.is_verified,
        }))
    })
    .await
}
