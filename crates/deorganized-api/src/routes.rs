use axum::{
    Json, Router, middleware,
    routing::{get, patch, post},
};
use serde_json::{Value, json};

use crate::auth::{self, AppState};
use crate::middleware::authenticate;
use crate::{
    admin, comments, episodes, events, feedback, follows, guest_requests, likes, notifications,
    posts, shows, tags, users,
};

/// Every route under `/api`, plus `GET /health`. Bearer tokens are
/// resolved once by [`authenticate`]; handlers that need a user take
/// [`crate::middleware::AuthUser`].
pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/wallet-login-or-check", post(auth::wallet_login_or_check))
        .route("/auth/complete-setup", post(auth::complete_setup))
        .route("/auth/token/refresh", post(auth::refresh_token))
        .route("/auth/token/verify", post(auth::verify_token));

    let user_routes = Router::new()
        .route("/users", get(users::list))
        .route("/users/me", get(users::me))
        .route("/users/{id}", get(users::retrieve).patch(users::update))
        .route("/users/{id}/creator-profile", get(users::creator_profile))
        .route("/users/{id}/liked-shows", get(users::liked_shows))
        .route("/users/{id}/following", get(users::following))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/users", get(admin::users))
        .route("/admin/users/{id}/toggle-verification", post(admin::toggle_verification));

    let show_routes = Router::new()
        .route("/shows", get(shows::list).post(shows::create))
        .route("/shows/upcoming", get(shows::upcoming))
        .route("/shows/mine", get(shows::mine))
        .route(
            "/shows/{slug}",
            get(shows::retrieve).patch(shows::update).delete(shows::delete),
        )
        .route("/shows/{slug}/share", post(shows::share))
        .route("/shows/{slug}/instances", get(shows::instances))
        .route("/shows/{slug}/cancel-instance", post(shows::cancel_instance))
        .route("/episodes", get(episodes::list).post(episodes::create))
        .route("/episodes/{id}", get(episodes::retrieve).delete(episodes::delete))
        .route("/tags", get(tags::list).post(tags::create))
        .route("/tags/{slug}", get(tags::retrieve))
        .route("/guest-requests", get(guest_requests::list).post(guest_requests::create))
        .route("/guest-requests/{id}", get(guest_requests::retrieve))
        .route("/guest-requests/{id}/accept", post(guest_requests::accept))
        .route("/guest-requests/{id}/decline", post(guest_requests::decline));

    let content_routes = Router::new()
        .route("/posts", get(posts::list).post(posts::create))
        .route("/posts/feed", get(posts::feed))
        .route(
            "/posts/{id}",
            get(posts::retrieve).patch(posts::update).delete(posts::delete),
        )
        .route("/events", get(events::list).post(events::create))
        .route(
            "/events/{id}",
            get(events::retrieve).patch(events::update).delete(events::delete),
        )
        .route("/events/{id}/share", post(events::share))
        .route("/feedback", get(feedback::list).post(feedback::create))
        .route("/feedback/{id}", patch(feedback::update));

    let social_routes = Router::new()
        .route("/likes", get(likes::list))
        .route("/likes/toggle", post(likes::toggle))
        .route("/likes/count", get(likes::count))
        .route("/likes/{id}", get(likes::retrieve))
        .route("/comments", get(comments::list).post(comments::create))
        .route("/comments/count", get(comments::count))
        .route(
            "/comments/{id}",
            get(comments::retrieve).patch(comments::update).delete(comments::delete),
        )
        .route("/follows", get(follows::list))
        .route("/follows/toggle", post(follows::toggle))
        .route("/follows/followers", get(follows::followers))
        .route("/follows/following", get(follows::following))
        .route("/notifications", get(notifications::list))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/mark-all-read", post(notifications::mark_all_read))
        .route("/notifications/{id}/mark-read", post(notifications::mark_read));

    let api = Router::new()
        .merge(auth_routes)
        .merge(user_routes)
        .merge(show_routes)
        .merge(content_routes)
        .merge(social_routes)
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

