mod engagement;
mod episodes;
mod events;
mod feedback;
mod follows;
mod guest_requests;
mod notifications;
mod posts;
mod shows;
mod stats;
mod tags;
mod users;

pub use engagement::{CommentFilter, LikeFilter, LikeToggle};
pub use episodes::NewEpisode;
pub use events::{EventChanges, EventFilter, NewEvent};
pub use follows::FollowToggle;
pub use posts::{NewPost, PostChanges};
pub use shows::{NewShow, ShowChanges, ShowFilter};
pub use stats::PlatformCounts;
pub use users::{NewUser, ProfileUpdate, UserFilter};

use rusqlite::types::ToSql;

/// `?{start}, ?{start+1}, ...` for an IN clause of `n` values.
pub(crate) fn placeholders(n: usize, start: usize) -> String {
    (start..start + n)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Borrow a slice of owned SQL values as the `&[&dyn ToSql]` rusqlite wants.
pub(crate) fn as_params(values: &[String]) -> Vec<&dyn ToSql> {
    values.iter().map(|v| v as &dyn ToSql).collect()
}

/// `%term%` for a case-insensitive LIKE search, or None for a blank term.
pub(crate) fn like_pattern(term: Option<&str>) -> Option<String> {
    term.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("%{}%", t))
}
