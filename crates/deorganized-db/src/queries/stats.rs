use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::{Database, timestamp};

/// Platform-wide totals for the admin dashboard.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PlatformCounts {
    pub users: i64,
    pub creators: i64,
    pub shows: i64,
    pub events: i64,
    pub posts: i64,
    pub likes: i64,
    pub comments: i64,
    pub follows: i64,
    pub feedback: i64,
    pub unresolved_feedback: i64,
    pub new_users_7d: i64,
    pub new_users_30d: i64,
}

impl Database {
    pub fn platform_counts(&self, now: DateTime<Utc>) -> Result<PlatformCounts> {
        self.with_conn(|conn| {
            let week_ago = timestamp(&(now - Duration::days(7)));
            let month_ago = timestamp(&(now - Duration::days(30)));

            Ok(PlatformCounts {
                users: count(conn, "SELECT COUNT(*) FROM users")?,
                creators: count(conn, "SELECT COUNT(*) FROM users WHERE role = 'creator'")?,
                shows: count(conn, "SELECT COUNT(*) FROM shows")?,
                events: count(conn, "SELECT COUNT(*) FROM events")?,
                posts: count(conn, "SELECT COUNT(*) FROM posts")?,
                likes: count(conn, "SELECT COUNT(*) FROM likes")?,
                comments: count(conn, "SELECT COUNT(*) FROM comments")?,
                follows: count(conn, "SELECT COUNT(*) FROM follows")?,
                feedback: count(conn, "SELECT COUNT(*) FROM feedback")?,
                unresolved_feedback: count(conn, "SELECT COUNT(*) FROM feedback WHERE resolved = 0")?,
                new_users_7d: joined_since(conn, &week_ago)?,
                new_users_30d: joined_since(conn, &month_ago)?,
            })
        })
    }
}

fn count(conn: &Connection, sql: &str) -> Result<i64> {
    Ok(conn.query_row(sql, [], |r| r.get(0))?)
}

fn joined_since(conn: &Connection, since: &str) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM users WHERE date_joined >= ?1",
        [since],
        |r| r.get(0),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::NewUser;
    use deorganized_types::models::{FeedbackCategory, Role};

    #[test]
    fn counts_split_creators_and_recent_signups() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&NewUser {
            username: "maker".into(),
            role: Some(Role::Creator),
            ..NewUser::default()
        })
        .unwrap();
        db.create_user(&NewUser {
            username: "viewer".into(),
            ..NewUser::default()
        })
        .unwrap();
        db.create_feedback(FeedbackCategory::General, "nice", "anon").unwrap();

        let counts = db.platform_counts(Utc::now()).unwrap();
        assert_eq!(counts.users, 2);
        assert_eq!(counts.creators, 1);
        assert_eq!(counts.new_users_7d, 2);
        assert_eq!(counts.unresolved_feedback, 1);

        let later = db.platform_counts(Utc::now() + Duration::days(60)).unwrap();
        assert_eq!(later.new_users_30d, 0);
    }
}
