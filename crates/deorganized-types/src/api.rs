use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    EventStatus, FeedbackCategory, GuestRequestStatus, LinkPlatform, NotificationType,
    RecurrenceType, Role, ShowStatus, TargetKind,
};
use crate::schedule::Schedule;

// -- JWT Claims --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims for both access and refresh tokens; `kind` tells them apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub kind: TokenKind,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password2: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    /// Username or email.
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

#[derive(Debug, Deserialize)]
pub struct WalletCheckRequest {
    pub wallet_address: String,
}

#[derive(Debug, Serialize)]
pub struct WalletCheckResponse {
    pub is_new: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenPair>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompleteSetupRequest {
    pub wallet_address: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub instagram: Option<String>,
    pub youtube: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub access: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

// -- Users --

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub wallet_address: Option<String>,
    pub bio: String,
    pub profile_picture: Option<String>,
    pub cover_photo: Option<String>,
    pub website: String,
    pub twitter: String,
    pub instagram: String,
    pub youtube: String,
    pub is_verified: bool,
    pub is_staff: bool,
    pub is_creator: bool,
    pub follower_count: i64,
    pub following_count: i64,
    pub date_joined: DateTime<Utc>,
}

/// Compact user shape nested inside other resources.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub profile_picture: Option<String>,
    pub role: Role,
    pub is_verified: bool,
    pub is_creator: bool,
}

#[derive(Debug, Serialize)]
pub struct CreatorProfileResponse {
    #[serde(flatten)]
    pub profile: UserResponse,
    pub show_count: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub cover_photo: Option<String>,
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub instagram: Option<String>,
    pub youtube: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<Role>,
    pub is_verified: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerificationToggleResponse {
    pub id: Uuid,
    pub username: String,
    pub is_verified: bool,
    pub message: String,
}

// -- Admin --

#[derive(Debug, Serialize)]
pub struct AdminStats {
    pub overview: AdminOverview,
    pub activity: AdminActivity,
    pub feedback: AdminFeedback,
    pub recent_users: Vec<UserSummary>,
}

#[derive(Debug, Serialize)]
pub struct AdminOverview {
    pub total_users: i64,
    pub total_creators: i64,
    pub total_regular_users: i64,
    pub total_shows: i64,
    pub total_events: i64,
    pub total_posts: i64,
}

#[derive(Debug, Serialize)]
pub struct AdminActivity {
    pub new_users_7d: i64,
    pub new_users_30d: i64,
    pub total_likes: i64,
    pub total_comments: i64,
    pub total_follows: i64,
}

#[derive(Debug, Serialize)]
pub struct AdminFeedback {
    pub total: i64,
    pub unresolved: i64,
}

// -- Tags --

#[derive(Debug, Clone, Serialize)]
pub struct TagResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTagRequest {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

// -- Shows --

#[derive(Debug, Serialize)]
pub struct ShowResponse {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub thumbnail: Option<String>,
    pub creator: UserSummary,
    pub tags: Vec<TagResponse>,
    pub external_link: Option<String>,
    pub link_platform: Option<LinkPlatform>,
    pub status: ShowStatus,
    #[serde(flatten)]
    pub schedule: Schedule,
    pub schedule_display: String,
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub user_has_liked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episodes: Option<Vec<EpisodeResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guests: Option<Vec<UserSummary>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body for both create (POST) and partial update (PATCH) of a show.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShowWriteRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub external_link: Option<String>,
    pub link_platform: Option<LinkPlatform>,
    pub tag_ids: Option<Vec<Uuid>>,
    pub status: Option<ShowStatus>,
    pub is_recurring: Option<bool>,
    pub recurrence_type: Option<RecurrenceType>,
    pub day_of_week: Option<u8>,
    pub scheduled_time: Option<chrono::NaiveTime>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShowListQuery {
    pub status: Option<ShowStatus>,
    pub creator: Option<Uuid>,
    /// Comma separated tag ids; a show must carry all of them.
    pub tags: Option<String>,
    pub is_recurring: Option<bool>,
    pub day_of_week: Option<u8>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub success: bool,
    pub share_count: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CancelInstanceRequest {
    pub date: NaiveDate,
}

// -- Episodes --

#[derive(Debug, Serialize)]
pub struct EpisodeResponse {
    pub id: Uuid,
    pub show_id: Uuid,
    pub episode_number: u32,
    pub title: String,
    pub description: String,
    pub air_date: DateTime<Utc>,
    pub duration_minutes: Option<u32>,
    pub video_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateEpisodeRequest {
    pub show_id: Uuid,
    pub episode_number: u32,
    pub title: String,
    pub description: Option<String>,
    pub air_date: DateTime<Utc>,
    pub duration_minutes: Option<u32>,
    pub video_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EpisodeQuery {
    pub show: Option<Uuid>,
}

// -- Posts --

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub author: UserSummary,
    pub content: String,
    pub image: Option<String>,
    pub is_pinned: bool,
    pub like_count: i64,
    pub comment_count: i64,
    pub user_has_liked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostWriteRequest {
    pub content: Option<String>,
    pub image: Option<String>,
    pub is_pinned: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostListQuery {
    pub author: Option<Uuid>,
}

// -- Events --

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub banner_image: Option<String>,
    pub organizer: UserSummary,
    pub start_datetime: Option<DateTime<Utc>>,
    pub end_datetime: Option<DateTime<Utc>>,
    pub venue_name: String,
    pub address: String,
    pub is_virtual: bool,
    pub meeting_link: String,
    pub capacity: Option<u32>,
    pub registration_link: String,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub is_public: bool,
    #[serde(flatten)]
    pub schedule: Schedule,
    pub schedule_display: String,
    pub status: EventStatus,
    pub is_upcoming: bool,
    pub is_ongoing: bool,
    pub is_past: bool,
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub user_has_liked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventWriteRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub banner_image: Option<String>,
    pub start_datetime: Option<DateTime<Utc>>,
    pub end_datetime: Option<DateTime<Utc>>,
    pub venue_name: Option<String>,
    pub address: Option<String>,
    pub is_virtual: Option<bool>,
    pub meeting_link: Option<String>,
    pub capacity: Option<u32>,
    pub registration_link: Option<String>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub is_public: Option<bool>,
    pub is_recurring: Option<bool>,
    pub recurrence_type: Option<RecurrenceType>,
    pub day_of_week: Option<u8>,
    pub scheduled_time: Option<chrono::NaiveTime>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventListQuery {
    pub organizer: Option<Uuid>,
    pub is_recurring: Option<bool>,
}

// -- Likes --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleLikeRequest {
    pub target_type: TargetKind,
    pub target_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub id: Uuid,
    pub user: UserSummary,
    pub target_type: TargetKind,
    pub target_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ToggleLikeResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub like: Option<LikeResponse>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LikeQuery {
    pub target_type: Option<TargetKind>,
    pub target_id: Option<Uuid>,
    pub user: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct TargetQuery {
    pub target_type: TargetKind,
    pub target_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub target_type: TargetKind,
    pub target_id: Uuid,
    pub text: String,
    pub parent: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCommentRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub user: UserSummary,
    pub text: String,
    pub parent: Option<Uuid>,
    pub target_type: TargetKind,
    pub target_id: Uuid,
    pub reply_count: i64,
    pub replies: Vec<CommentResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentQuery {
    pub target_type: Option<TargetKind>,
    pub target_id: Option<Uuid>,
    pub top_level: Option<bool>,
}

// -- Follows --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleFollowRequest {
    pub following_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct FollowResponse {
    pub id: Uuid,
    pub follower: UserSummary,
    pub following: UserSummary,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ToggleFollowResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow: Option<FollowResponse>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FollowQuery {
    pub follower: Option<Uuid>,
    pub following: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

// -- Notifications --

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub actor: UserSummary,
    pub notification_type: NotificationType,
    pub target_type: Option<TargetKind>,
    pub target_id: Option<Uuid>,
    pub show_slug: Option<String>,
    pub show_title: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub status: &'static str,
    pub count: usize,
}

// -- Guest requests --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGuestRequest {
    pub show_id: Uuid,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GuestRequestResponse {
    pub id: Uuid,
    pub show_id: Uuid,
    pub show_title: String,
    pub show_slug: String,
    pub requester: UserSummary,
    pub message: String,
    pub status: GuestRequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GuestRequestQuery {
    pub received: Option<bool>,
}

// -- Feedback --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateFeedbackRequest {
    pub category: FeedbackCategory,
    pub message: String,
    pub user_identifier: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackReceived {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub id: Uuid,
    pub category: FeedbackCategory,
    pub message: String,
    pub user_identifier: String,
    pub resolved: bool,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedbackQuery {
    pub resolved: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateFeedbackRequest {
    pub resolved: Option<bool>,
    pub admin_notes: Option<String>,
}
