//! Row-to-response conversion. Batch variants load counts, authors and
//! like state for a whole page with one query per concern.

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use chrono::Utc;
use uuid::Uuid;

use deorganized_db::Database;
use deorganized_db::models::{
    CommentRow, EpisodeRow, EventRow, FeedbackRow, FollowRow, GuestRequestRow, LikeRow,
    NotificationRow, PostRow, ShowRow, TagRow, UserRow,
};
use deorganized_types::api::{
    CommentResponse, EpisodeResponse, EventResponse, FeedbackResponse, FollowResponse,
    GuestRequestResponse, LikeResponse, NotificationResponse, PostResponse, ShowResponse,
    TagResponse, UserResponse, UserSummary,
};
use deorganized_types::models::{Role, TargetKind};
use deorganized_types::schedule::{DisplayStyle, EventTiming};

// -- Users --

pub fn summary(user: &UserRow) -> UserSummary {
    UserSummary {
        id: user.id,
        username: user.username.clone(),
        display_name: user.display_name.clone(),
        profile_picture: user.profile_picture.clone(),
        role: user.role,
        is_verified: user.is_verified,
        is_creator: user.role == Role::Creator,
    }
}

pub fn user_response(db: &Database, user: UserRow) -> Result<UserResponse> {
    let (follower_count, following_count) = db.follow_counts(user.id)?;
    Ok(UserResponse {
        is_creator: user.role == Role::Creator,
        id: user.id,
        username: user.username,
        display_name: user.display_name,
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
        role: user.role,
        wallet_address: user.wallet_address,
        bio: user.bio,
        profile_picture: user.profile_picture,
        cover_photo: user.cover_photo,
        website: user.website,
        twitter: user.twitter,
        instagram: user.instagram,
        youtube: user.youtube,
        is_verified: user.is_verified,
        is_staff: user.is_staff,
        follower_count,
        following_count,
        date_joined: user.date_joined,
    })
}

pub fn user_responses(db: &Database, users: Vec<UserRow>) -> Result<Vec<UserResponse>> {
    users.into_iter().map(|u| user_response(db, u)).collect()
}

struct Summaries(HashMap<Uuid, UserSummary>);

impl Summaries {
    fn load(db: &Database, ids: impl IntoIterator<Item = Uuid>) -> Result<Self> {
        let mut ids: Vec<Uuid> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        let users = db.get_users_by_ids(&ids)?;
        Ok(Self(users.iter().map(|(id, u)| (*id, summary(u))).collect()))
    }

    fn get(&self, id: Uuid) -> Result<UserSummary> {
        self.0
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow!("User {} referenced but missing", id))
    }
}

// -- Shows --

pub fn show_responses(
    db: &Database,
    shows: Vec<ShowRow>,
    viewer: Option<Uuid>,
    detail: bool,
) -> Result<Vec<ShowResponse>> {
    let ids: Vec<Uuid> = shows.iter().map(|s| s.id).collect();
    let creators = Summaries::load(db, shows.iter().map(|s| s.creator_id))?;
    let likes = db.like_counts(TargetKind::Show, &ids)?;
    let comments = db.comment_counts(TargetKind::Show, &ids)?;
    let liked = match viewer {
        Some(user_id) => db.liked_ids(user_id, TargetKind::Show, &ids)?,
        None => Default::default(),
    };

    shows
        .into_iter()
        .map(|show| {
            let tags: Vec<TagResponse> = db.get_show_tags(show.id)?.into_iter().map(tag).collect();
            let (episodes, guests) = if detail {
                let episodes: Vec<EpisodeResponse> =
                    db.list_episodes(Some(show.id))?.into_iter().map(episode).collect();
                let guests: Vec<UserSummary> = db.get_show_guests(show.id)?.iter().map(summary).collect();
                (Some(episodes), Some(guests))
            } else {
                (None, None)
            };

            Ok(ShowResponse {
                creator: creators.get(show.creator_id)?,
                like_count: likes.get(&show.id).copied().unwrap_or(0),
                comment_count: comments.get(&show.id).copied().unwrap_or(0),
                user_has_liked: liked.contains(&show.id),
                schedule_display: show.schedule.display(DisplayStyle::SHOW),
                id: show.id,
                slug: show.slug,
                title: show.title,
                description: show.description,
                thumbnail: show.thumbnail,
                tags,
                external_link: show.external_link,
                link_platform: show.link_platform,
                status: show.status,
                schedule: show.schedule,
                share_count: show.share_count,
                episodes,
                guests,
                created_at: show.created_at,
                updated_at: show.updated_at,
            })
        })
        .collect()
}

pub fn show_response(
    db: &Database,
    show: ShowRow,
    viewer: Option<Uuid>,
    detail: bool,
) -> Result<ShowResponse> {
    show_responses(db, vec![show], viewer, detail)?
        .pop()
        .ok_or_else(|| anyhow!("Show conversion produced nothing"))
}

pub fn tag(row: TagRow) -> TagResponse {
    TagResponse {
        id: row.id,
        name: row.name,
        slug: row.slug,
    }
}

pub fn episode(row: EpisodeRow) -> EpisodeResponse {
    EpisodeResponse {
        id: row.id,
        show_id: row.show_id,
        episode_number: row.episode_number,
        title: row.title,
        description: row.description,
        air_date: row.air_date,
        duration_minutes: row.duration_minutes,
        video_url: row.video_url,
        created_at: row.created_at,
    }
}

// -- Posts and events --

pub fn post_responses(db: &Database, posts: Vec<PostRow>, viewer: Option<Uuid>) -> Result<Vec<PostResponse>> {
    let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
    let authors = Summaries::load(db, posts.iter().map(|p| p.author_id))?;
    let likes = db.like_counts(TargetKind::Post, &ids)?;
    let comments = db.comment_counts(TargetKind::Post, &ids)?;
    let liked = match viewer {
        Some(user_id) => db.liked_ids(user_id, TargetKind::Post, &ids)?,
        None => Default::default(),
    };

    posts
        .into_iter()
        .map(|post| {
            Ok(PostResponse {
                author: authors.get(post.author_id)?,
                like_count: likes.get(&post.id).copied().unwrap_or(0),
                comment_count: comments.get(&post.id).copied().unwrap_or(0),
                user_has_liked: liked.contains(&post.id),
                id: post.id,
                content: post.content,
                image: post.image,
                is_pinned: post.is_pinned,
                created_at: post.created_at,
                updated_at: post.updated_at,
            })
        })
        .collect()
}

pub fn post_response(db: &Database, post: PostRow, viewer: Option<Uuid>) -> Result<PostResponse> {
    post_responses(db, vec![post], viewer)?
        .pop()
        .ok_or_else(|| anyhow!("Post conversion produced nothing"))
}

pub fn event_responses(db: &Database, events: Vec<EventRow>, viewer: Option<Uuid>) -> Result<Vec<EventResponse>> {
    let now = Utc::now();
    let ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
    let organizers = Summaries::load(db, events.iter().map(|e| e.organizer_id))?;
    let likes = db.like_counts(TargetKind::Event, &ids)?;
    let comments = db.comment_counts(TargetKind::Event, &ids)?;
    let liked = match viewer {
        Some(user_id) => db.liked_ids(user_id, TargetKind::Event, &ids)?,
        None => Default::default(),
    };

    events
        .into_iter()
        .map(|event| {
            let timing = EventTiming::at(
                event.start_datetime,
                event.end_datetime,
                event.schedule.is_recurring,
                now,
            );
            Ok(EventResponse {
                organizer: organizers.get(event.organizer_id)?,
                like_count: likes.get(&event.id).copied().unwrap_or(0),
                comment_count: comments.get(&event.id).copied().unwrap_or(0),
                user_has_liked: liked.contains(&event.id),
                schedule_display: event.schedule.display(DisplayStyle::EVENT),
                status: timing.status,
                is_upcoming: timing.is_upcoming,
                is_ongoing: timing.is_ongoing,
                is_past: timing.is_past,
                id: event.id,
                title: event.title,
                description: event.description,
                banner_image: event.banner_image,
                start_datetime: event.start_datetime,
                end_datetime: event.end_datetime,
                venue_name: event.venue_name,
                address: event.address,
                is_virtual: event.is_virtual,
                meeting_link: event.meeting_link,
                capacity: event.capacity,
                registration_link: event.registration_link,
                registration_deadline: event.registration_deadline,
                is_public: event.is_public,
                schedule: event.schedule,
                share_count: event.share_count,
                created_at: event.created_at,
                updated_at: event.updated_at,
            })
        })
        .collect()
}

pub fn event_response(db: &Database, event: EventRow, viewer: Option<Uuid>) -> Result<EventResponse> {
    event_responses(db, vec![event], viewer)?
        .pop()
        .ok_or_else(|| anyhow!("Event conversion produced nothing"))
}

// -- Engagement --

pub fn like_responses(db: &Database, likes: Vec<LikeRow>) -> Result<Vec<LikeResponse>> {
    let users = Summaries::load(db, likes.iter().map(|l| l.user_id))?;
    likes
        .into_iter()
        .map(|like| {
            Ok(LikeResponse {
                id: like.id,
                user: users.get(like.user_id)?,
                target_type: like.target.kind,
                target_id: like.target.id,
                created_at: like.created_at,
            })
        })
        .collect()
}

pub fn like_response(db: &Database, like: LikeRow) -> Result<LikeResponse> {
    like_responses(db, vec![like])?
        .pop()
        .ok_or_else(|| anyhow!("Like conversion produced nothing"))
}

/// Top-level comments carry their newest replies, one level deep.
pub fn comment_responses(db: &Database, comments: Vec<CommentRow>) -> Result<Vec<CommentResponse>> {
    let ids: Vec<Uuid> = comments.iter().map(|c| c.id).collect();
    let mut replies = db.recent_replies(&ids)?;

    let all_ids: Vec<Uuid> = ids
        .iter()
        .copied()
        .chain(replies.values().flatten().map(|r| r.id))
        .collect();
    let reply_counts = db.reply_counts(&all_ids)?;
    let users = Summaries::load(
        db,
        comments
            .iter()
            .chain(replies.values().flatten())
            .map(|c| c.user_id),
    )?;

    let convert = |comment: CommentRow, nested: Vec<CommentResponse>| -> Result<CommentResponse> {
        Ok(CommentResponse {
            user: users.get(comment.user_id)?,
            reply_count: reply_counts.get(&comment.id).copied().unwrap_or(0),
            replies: nested,
            id: comment.id,
            text: comment.text,
            parent: comment.parent_id,
            target_type: comment.target.kind,
            target_id: comment.target.id,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        })
    };

    comments
        .into_iter()
        .map(|comment| {
            let nested = replies
                .remove(&comment.id)
                .unwrap_or_default()
                .into_iter()
                .map(|reply| convert(reply, Vec::new()))
                .collect::<Result<Vec<_>>>()?;
            convert(comment, nested)
        })
        .collect()
}

pub fn comment_response(db: &Database, comment: CommentRow) -> Result<CommentResponse> {
    comment_responses(db, vec![comment])?
        .pop()
        .ok_or_else(|| anyhow!("Comment conversion produced nothing"))
}

pub fn follow_responses(db: &Database, follows: Vec<FollowRow>) -> Result<Vec<FollowResponse>> {
    let users = Summaries::load(
        db,
        follows.iter().flat_map(|f| [f.follower_id, f.following_id]),
    )?;
    follows
        .into_iter()
        .map(|follow| {
            Ok(FollowResponse {
                id: follow.id,
                follower: users.get(follow.follower_id)?,
                following: users.get(follow.following_id)?,
                created_at: follow.created_at,
            })
        })
        .collect()
}

pub fn follow_response(db: &Database, follow: FollowRow) -> Result<FollowResponse> {
    follow_responses(db, vec![follow])?
        .pop()
        .ok_or_else(|| anyhow!("Follow conversion produced nothing"))
}

// -- Notifications and guest requests --

/// Show-targeted notifications also carry the show's slug and title.
pub fn notification_responses(
    db: &Database,
    notifications: Vec<NotificationRow>,
) -> Result<Vec<NotificationResponse>> {
    let actors = Summaries::load(db, notifications.iter().map(|n| n.actor_id))?;
    let show_ids: Vec<Uuid> = notifications
        .iter()
        .filter_map(|n| n.target)
        .filter(|t| t.kind == TargetKind::Show)
        .map(|t| t.id)
        .collect();
    let shows = db.get_shows_by_ids(&show_ids)?;

    notifications
        .into_iter()
        .map(|n| {
            let show = n
                .target
                .filter(|t| t.kind == TargetKind::Show)
                .and_then(|t| shows.get(&t.id));
            Ok(NotificationResponse {
                id: n.id,
                recipient_id: n.recipient_id,
                actor: actors.get(n.actor_id)?,
                notification_type: n.notification_type,
                target_type: n.target.map(|t| t.kind),
                target_id: n.target.map(|t| t.id),
                show_slug: show.map(|s| s.slug.clone()),
                show_title: show.map(|s| s.title.clone()),
                is_read: n.is_read,
                created_at: n.created_at,
            })
        })
        .collect()
}

pub fn guest_request_responses(
    db: &Database,
    requests: Vec<GuestRequestRow>,
) -> Result<Vec<GuestRequestResponse>> {
    let requesters = Summaries::load(db, requests.iter().map(|r| r.requester_id))?;
    let show_ids: Vec<Uuid> = requests.iter().map(|r| r.show_id).collect();
    let shows = db.get_shows_by_ids(&show_ids)?;

    requests
        .into_iter()
        .map(|req| {
            let show = shows
                .get(&req.show_id)
                .ok_or_else(|| anyhow!("Show {} referenced but missing", req.show_id))?;
            Ok(GuestRequestResponse {
                id: req.id,
                show_id: req.show_id,
                show_title: show.title.clone(),
                show_slug: show.slug.clone(),
                requester: requesters.get(req.requester_id)?,
                message: req.message,
                status: req.status,
                created_at: req.created_at,
                updated_at: req.updated_at,
            })
        })
        .collect()
}

pub fn guest_request_response(db: &Database, request: GuestRequestRow) -> Result<GuestRequestResponse> {
    guest_request_responses(db, vec![request])?
        .pop()
        .ok_or_else(|| anyhow!("Guest request conversion produced nothing"))
}

pub fn feedback(row: FeedbackRow) -> FeedbackResponse {
    FeedbackResponse {
        id: row.id,
        category: row.category,
        message: row.message,
        user_identifier: row.user_identifier,
        resolved: row.resolved,
        admin_notes: row.admin_notes,
        created_at: row.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deorganized_db::queries::{NewShow, NewUser};
    use deorganized_types::models::{ShowStatus, TargetRef};

    fn user(db: &Database, name: &str, role: Role) -> UserRow {
        db.create_user(&NewUser {
            username: name.into(),
            role: Some(role),
            ..NewUser::default()
        })
        .unwrap()
    }

    #[test]
    fn show_page_carries_counts_and_like_state() {
        let db = Database::open_in_memory().unwrap();
        let host = user(&db, "host", Role::Creator);
        let fan = user(&db, "fan", Role::User);
        let show = db
            .create_show(&NewShow {
                creator_id: host.id,
                title: "Night Owls".into(),
                description: String::new(),
                thumbnail: None,
                external_link: None,
                link_platform: None,
                status: ShowStatus::Published,
                schedule: Default::default(),
                tag_ids: Vec::new(),
            })
            .unwrap();
        db.toggle_like(fan.id, TargetRef::new(TargetKind::Show, show.id)).unwrap();

        let as_fan = show_response(&db, show.clone(), Some(fan.id), true).unwrap();
        assert_eq!(as_fan.like_count, 1);
        assert!(as_fan.user_has_liked);
        assert_eq!(as_fan.schedule_display, "No recurring schedule");
        assert_eq!(as_fan.episodes.as_ref().map(Vec::len), Some(0));

        let anonymous = show_response(&db, show, None, false).unwrap();
        assert!(!anonymous.user_has_liked);
        assert!(anonymous.episodes.is_none());
    }

    #[test]
    fn comments_nest_their_replies() {
        let db = Database::open_in_memory().unwrap();
        let host = user(&db, "host", Role::Creator);
        let post = db
            .create_post(&deorganized_db::queries::NewPost {
                author_id: host.id,
                content: "hello".into(),
                image: None,
                is_pinned: false,
            })
            .unwrap();
        let target = TargetRef::new(TargetKind::Post, post.id);
        let top = db.create_comment(host.id, target, "first", None).unwrap();
        db.create_comment(host.id, target, "reply", Some(top.id)).unwrap();

        let view = comment_response(&db, top).unwrap();
        assert_eq!(view.reply_count, 1);
        assert_eq!(view.replies.len(), 1);
        assert_eq!(view.replies[0].text, "reply");
        assert_eq!(view.replies[0].parent, Some(view.id));
    }
}
