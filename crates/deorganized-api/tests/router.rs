use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::{Datelike, NaiveDate, Weekday};
use serde_json::{Value, json};
use tower::ServiceExt;

use deorganized_api::auth::issue_tokens;
use deorganized_api::{AppState, AppStateInner, AuthConfig, router};
use deorganized_db::Database;
use deorganized_db::queries::NewUser;
use deorganized_types::models::Role;

const WALLET: &str = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7";

struct TestApp {
    app: Router,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            auth: AuthConfig::new("router-test-secret"),
        });
        Self {
            app: router(state.clone()),
            state,
        }
    }

    /// Create a user directly and return its id and an access token.
    fn user(&self, username: &str, role: Role) -> (String, String) {
        let user = self
            .state
            .db
            .create_user(&NewUser {
                username: username.into(),
                role: Some(role),
                ..NewUser::default()
            })
            .unwrap();
        let tokens = issue_tokens(&self.state.auth, &user).unwrap();
        (user.id.to_string(), tokens.access)
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    async fn create_show(&self, token: &str, body: Value) -> Value {
        let (status, show) = self.post("/api/shows", Some(token), body).await;
        assert_eq!(status, StatusCode::CREATED, "{show}");
        show
    }
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn bad_token_is_rejected_even_on_public_routes() {
    let app = TestApp::new();
    let (status, _) = app.get("/api/shows", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/users/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_then_login_by_email() {
    let app = TestApp::new();
    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": "correct-horse",
                "password2": "correct-horse",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["user"]["role"], "user");

    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "username": "alice@example.com", "password": "correct-horse" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["tokens"]["access"].as_str().unwrap().to_string();

    let (status, me) = app.get("/api/users/me", Some(&access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");

    let (status, _) = app
        .post("/api/auth/login", None, json!({ "username": "alice", "password": "wrong-horse" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn mismatched_passwords_are_a_field_error() {
    let app = TestApp::new();
    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({
                "username": "bob",
                "email": "bob@example.com",
                "password": "password-one",
                "password2": "password-two",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["password"].is_array());
}

#[tokio::test]
async fn wallet_setup_twice_is_rejected() {
    let app = TestApp::new();

    let (status, body) = app
        .post("/api/auth/wallet-login-or-check", None, json!({ "wallet_address": WALLET }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_new"], true);

    let setup = json!({ "wallet_address": WALLET, "role": "creator" });
    let (status, body) = app.post("/api/auth/complete-setup", None, setup.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["user"]["username"], "user_SP2J6ZY4");
    assert_eq!(body["user"]["is_creator"], true);

    let (status, _) = app.post("/api/auth/complete-setup", None, setup).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post("/api/auth/wallet-login-or-check", None, json!({ "wallet_address": WALLET }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_new"], false);
    assert!(body["tokens"]["access"].is_string());
}

#[tokio::test]
async fn refresh_token_cannot_be_used_as_access_token() {
    let app = TestApp::new();
    let (_, body) = app
        .post("/api/auth/complete-setup", None, json!({ "wallet_address": WALLET }))
        .await;
    let refresh = body["tokens"]["refresh"].as_str().unwrap().to_string();

    let (status, _) = app.get("/api/users/me", Some(&refresh)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.post("/api/auth/token/refresh", None, json!({ "refresh": refresh })).await;
    assert_eq!(status, StatusCode::OK);
    let access = body["access"].as_str().unwrap().to_string();
    let (status, _) = app.get("/api/users/me", Some(&access)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn profiles_are_only_editable_by_their_owner() {
    let app = TestApp::new();
    let (alice_id, alice) = app.user("alice", Role::Creator);
    let (_, mallory) = app.user("mallory", Role::User);

    let uri = format!("/api/users/{alice_id}");
    let (status, _) = app
        .send(Method::PATCH, &uri, Some(&mallory), Some(json!({ "bio": "pwned" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::PATCH, &uri, Some(&alice), Some(json!({ "bio": "hello" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bio"], "hello");

    let (status, _) = app
        .send(Method::PATCH, &uri, Some(&alice), Some(json!({ "role": "user" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_creators_create_shows_and_only_owners_edit_them() {
    let app = TestApp::new();
    let (_, host) = app.user("host", Role::Creator);
    let (_, viewer) = app.user("viewer", Role::User);

    let (status, _) = app.post("/api/shows", Some(&viewer), json!({ "title": "Nope" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let show = app.create_show(&host, json!({ "title": "Morning Brew" })).await;
    assert_eq!(show["slug"], "morning-brew");

    let uri = format!("/api/shows/{}", show["slug"].as_str().unwrap());
    let (status, _) = app
        .send(Method::PATCH, &uri, Some(&viewer), Some(json!({ "title": "Hijacked" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send(Method::DELETE, &uri, Some(&host), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn anonymous_listing_hides_drafts() {
    let app = TestApp::new();
    let (_, host) = app.user("host", Role::Creator);
    app.create_show(&host, json!({ "title": "Live", "status": "published" })).await;
    app.create_show(&host, json!({ "title": "Secret", "status": "draft" })).await;

    let (_, anonymous) = app.get("/api/shows", None).await;
    assert_eq!(anonymous.as_array().unwrap().len(), 1);

    let (_, signed_in) = app.get("/api/shows", Some(&host)).await;
    assert_eq!(signed_in.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn drafts_are_hidden_from_anonymous_visitors() {
    let app = TestApp::new();
    let (_, host) = app.user("host", Role::Creator);
    let show = app.create_show(&host, json!({ "title": "Work In Progress" })).await;
    assert_eq!(show["status"], "draft");

    let uri = "/api/shows/work-in-progress";
    let (status, body) = app.get(uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
    let (status, _) = app.post("/api/shows/work-in-progress/share", None, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, listed) = app.get("/api/shows?status=draft", None).await;
    assert_eq!(listed, json!([]));

    let (status, _) = app.get(uri, Some(&host)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(Method::PATCH, uri, Some(&host), Some(json!({ "status": "published" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.get(uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Work In Progress");
}

#[tokio::test]
async fn malformed_input_is_a_json_400() {
    let app = TestApp::new();
    let (_, token) = app.user("someone", Role::User);

    let (status, body) = app.post("/api/auth/login", None, json!({ "username": "x" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["password"][0], "This field is required.");

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "username": "bob", "password": "pw-pw-pw-pw", "password2": "pw-pw-pw-pw" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["email"].is_array(), "{body}");

    let (status, body) = app.post("/api/auth/login", None, json!({ "username": 5, "password": "x" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "{body}");

    let (status, body) = app.post("/api/likes/toggle", Some(&token), json!({ "target_type": "show" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["target_id"].is_array(), "{body}");

    let (status, body) = app.get("/api/likes/count?target_type=post", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["target_id"][0], "This field is required.");

    let (status, body) = app.get("/api/comments/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "{body}");
}

#[tokio::test]
async fn weekend_show_instances_fall_on_weekends() {
    let app = TestApp::new();
    let (_, host) = app.user("host", Role::Creator);
    let show = app
        .create_show(
            &host,
            json!({
                "title": "Weekend Wrap",
                "is_recurring": true,
                "recurrence_type": "WEEKENDS",
                "scheduled_time": "17:00:00",
            }),
        )
        .await;
    assert_eq!(show["schedule_display"], "Weekends at 05:00 PM");

    let (status, _) = app.get("/api/shows/weekend-wrap/instances", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.get("/api/shows/weekend-wrap/instances", Some(&host)).await;
    assert_eq!(status, StatusCode::OK);
    let instances = body.as_array().unwrap();
    assert!((8..=10).contains(&instances.len()), "{} instances", instances.len());
    for instance in instances {
        let date = NaiveDate::parse_from_str(instance["date"].as_str().unwrap(), "%Y-%m-%d").unwrap();
        assert!(matches!(date.weekday(), Weekday::Sat | Weekday::Sun));
    }

    app.create_show(&host, json!({ "title": "One Off" })).await;
    let (status, _) = app.get("/api/shows/one-off/instances", Some(&host)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn recurring_show_without_time_is_invalid() {
    let app = TestApp::new();
    let (_, host) = app.user("host", Role::Creator);
    let (status, body) = app
        .post(
            "/api/shows",
            Some(&host),
            json!({ "title": "Broken", "is_recurring": true, "recurrence_type": "DAILY" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["scheduled_time"].is_array());
}

#[tokio::test]
async fn cancelling_an_instance_notifies_the_creator() {
    let app = TestApp::new();
    let (_, host) = app.user("host", Role::Creator);
    app.create_show(
        &host,
        json!({
            "title": "Daily Dose",
            "is_recurring": true,
            "recurrence_type": "DAILY",
            "scheduled_time": "09:00:00",
        }),
    )
    .await;

    let (status, show) = app
        .post("/api/shows/daily-dose/cancel-instance", Some(&host), json!({ "date": "2030-01-05" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(show["cancelled_instances"], json!(["2030-01-05"]));

    let (_, notifications) = app.get("/api/notifications", Some(&host)).await;
    assert_eq!(notifications[0]["notification_type"], "show_cancelled");
    assert_eq!(notifications[0]["show_slug"], "daily-dose");
}

#[tokio::test]
async fn like_toggle_round_trips_and_notifies_owner() {
    let app = TestApp::new();
    let (_, host) = app.user("host", Role::Creator);
    let (_, fan) = app.user("fan", Role::User);
    let show = app.create_show(&host, json!({ "title": "Likeable" })).await;
    let target = json!({ "target_type": "show", "target_id": show["id"] });

    let (status, body) = app.post("/api/likes/toggle", Some(&fan), target.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "liked");

    let count_uri = format!("/api/likes/count?target_type=show&target_id={}", show["id"].as_str().unwrap());
    let (_, count) = app.get(&count_uri, None).await;
    assert_eq!(count["count"], 1);

    let (_, unread) = app.get("/api/notifications/unread-count", Some(&host)).await;
    assert_eq!(unread["count"], 1);

    let (status, body) = app.post("/api/likes/toggle", Some(&fan), target).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unliked");
    let (_, count) = app.get(&count_uri, None).await;
    assert_eq!(count["count"], 0);

    let missing = json!({ "target_type": "post", "target_id": uuid::Uuid::new_v4() });
    let (status, _) = app.post("/api/likes/toggle", Some(&fan), missing).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn replies_must_share_the_parent_target() {
    let app = TestApp::new();
    let (_, host) = app.user("host", Role::Creator);
    let first = app.create_show(&host, json!({ "title": "First" })).await;
    let second = app.create_show(&host, json!({ "title": "Second" })).await;

    let (status, parent) = app
        .post(
            "/api/comments",
            Some(&host),
            json!({ "target_type": "show", "target_id": first["id"], "text": "hi" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .post(
            "/api/comments",
            Some(&host),
            json!({ "target_type": "show", "target_id": second["id"], "text": "lost", "parent": parent["id"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn self_follow_is_rejected() {
    let app = TestApp::new();
    let (id, token) = app.user("narcissus", Role::User);
    let (status, _) = app
        .post("/api/follows/toggle", Some(&token), json!({ "following_id": id }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn guest_request_flow() {
    let app = TestApp::new();
    let (_, host) = app.user("host", Role::Creator);
    let (guest_id, guest) = app.user("guest", Role::Creator);
    let (_, fan) = app.user("fan", Role::User);
    let show = app.create_show(&host, json!({ "title": "Panel Night", "status": "published" })).await;
    let body = json!({ "show_id": show["id"], "message": "Let me on!" });

    let (status, _) = app.post("/api/guest-requests", Some(&fan), body.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.post("/api/guest-requests", Some(&host), body.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, request) = app.post("/api/guest-requests", Some(&guest), body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["status"], "pending");

    let (status, _) = app.post("/api/guest-requests", Some(&guest), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, received) = app.get("/api/guest-requests?received=true", Some(&host)).await;
    assert_eq!(received.as_array().unwrap().len(), 1);

    let accept_uri = format!("/api/guest-requests/{}/accept", request["id"].as_str().unwrap());
    let (status, _) = app.post(&accept_uri, Some(&guest), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, accepted) = app.post(&accept_uri, Some(&host), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["status"], "accepted");

    let (status, _) = app.post(&accept_uri, Some(&host), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, detail) = app.get("/api/shows/panel-night", None).await;
    assert_eq!(detail["guests"][0]["id"], guest_id);

    let (_, notifications) = app.get("/api/notifications", Some(&guest)).await;
    assert_eq!(notifications[0]["notification_type"], "guest_accepted");
}

#[tokio::test]
async fn admin_routes_require_staff() {
    let app = TestApp::new();
    let (_, regular) = app.user("regular", Role::User);
    let (status, _) = app.get("/api/admin/stats", Some(&regular)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (admin_id, admin) = app.user("admin", Role::User);
    app.state.db.set_staff(admin_id.parse().unwrap(), true).unwrap();
    let (status, stats) = app.get("/api/admin/stats", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["overview"]["total_users"], 2);
}
