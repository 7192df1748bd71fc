use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL UNIQUE,
                email           TEXT,
                password        TEXT,
                display_name    TEXT,
                first_name      TEXT NOT NULL DEFAULT '',
                last_name       TEXT NOT NULL DEFAULT '',
                role            TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'creator')),
                wallet_address  TEXT UNIQUE,
                bio             TEXT NOT NULL DEFAULT '',
                profile_picture TEXT,
                cover_photo     TEXT,
                website         TEXT NOT NULL DEFAULT '',
                twitter         TEXT NOT NULL DEFAULT '',
                instagram       TEXT NOT NULL DEFAULT '',
                youtube         TEXT NOT NULL DEFAULT '',
                is_verified     INTEGER NOT NULL DEFAULT 0,
                is_staff        INTEGER NOT NULL DEFAULT 0,
                date_joined     TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_users_role ON users(role, date_joined);
            CREATE INDEX idx_users_email ON users(email);

            CREATE TABLE tags (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL UNIQUE,
                slug        TEXT NOT NULL UNIQUE,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE shows (
                id                  TEXT PRIMARY KEY,
                slug                TEXT NOT NULL UNIQUE,
                title               TEXT NOT NULL,
                description         TEXT NOT NULL,
                thumbnail           TEXT,
                creator_id          TEXT NOT NULL REFERENCES users(id),
                external_link       TEXT,
                link_platform       TEXT,
                status              TEXT NOT NULL DEFAULT 'draft',
                is_recurring        INTEGER NOT NULL DEFAULT 0,
                recurrence_type     TEXT,
                day_of_week         INTEGER,
                scheduled_time      TEXT,
                cancelled_instances TEXT NOT NULL DEFAULT '[]',
                share_count         INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE INDEX idx_shows_status ON shows(status, created_at);
            CREATE INDEX idx_shows_creator ON shows(creator_id, status);

            CREATE TABLE show_tags (
                show_id TEXT NOT NULL REFERENCES shows(id) ON DELETE CASCADE,
                tag_id  TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (show_id, tag_id)
            );

            CREATE TABLE show_guests (
                show_id TEXT NOT NULL REFERENCES shows(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL REFERENCES users(id),
                PRIMARY KEY (show_id, user_id)
            );

            CREATE TABLE show_episodes (
                id                TEXT PRIMARY KEY,
                show_id           TEXT NOT NULL REFERENCES shows(id) ON DELETE CASCADE,
                episode_number    INTEGER NOT NULL,
                title             TEXT NOT NULL,
                description       TEXT NOT NULL DEFAULT '',
                air_date          TEXT NOT NULL,
                duration_minutes  INTEGER,
                video_url         TEXT NOT NULL DEFAULT '',
                created_at        TEXT NOT NULL,
                UNIQUE (show_id, episode_number)
            );

            CREATE TABLE posts (
                id          TEXT PRIMARY KEY,
                author_id   TEXT NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                image       TEXT,
                is_pinned   INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_posts_author ON posts(author_id, created_at);

            CREATE TABLE events (
                id                    TEXT PRIMARY KEY,
                title                 TEXT NOT NULL,
                description           TEXT NOT NULL,
                banner_image          TEXT,
                organizer_id          TEXT NOT NULL REFERENCES users(id),
                start_datetime        TEXT,
                end_datetime          TEXT,
                venue_name            TEXT NOT NULL DEFAULT '',
                address               TEXT NOT NULL DEFAULT '',
                is_virtual            INTEGER NOT NULL DEFAULT 0,
                meeting_link          TEXT NOT NULL DEFAULT '',
                capacity              INTEGER,
                registration_link     TEXT NOT NULL DEFAULT '',
                registration_deadline TEXT,
                is_public             INTEGER NOT NULL DEFAULT 1,
                is_recurring          INTEGER NOT NULL DEFAULT 0,
                recurrence_type       TEXT,
                day_of_week           INTEGER,
                scheduled_time        TEXT,
                cancelled_instances   TEXT NOT NULL DEFAULT '[]',
                share_count           INTEGER NOT NULL DEFAULT 0,
                created_at            TEXT NOT NULL,
                updated_at            TEXT NOT NULL
            );

            CREATE INDEX idx_events_start ON events(start_datetime, is_public);
            CREATE INDEX idx_events_organizer ON events(organizer_id, start_datetime);

            -- Engagement rows point at their target through (target_type, target_id)
            CREATE TABLE likes (
                id           TEXT PRIMARY KEY,
                user_id      TEXT NOT NULL REFERENCES users(id),
                target_type  TEXT NOT NULL,
                target_id    TEXT NOT NULL,
                created_at   TEXT NOT NULL,
                UNIQUE (user_id, target_type, target_id)
            );

            CREATE INDEX idx_likes_target ON likes(target_type, target_id);

            CREATE TABLE comments (
                id           TEXT PRIMARY KEY,
                user_id      TEXT NOT NULL REFERENCES users(id),
                target_type  TEXT NOT NULL,
                target_id    TEXT NOT NULL,
                text         TEXT NOT NULL,
                parent_id    TEXT REFERENCES comments(id) ON DELETE CASCADE,
                created_at   TEXT NOT NULL,
                updated_at   TEXT NOT NULL
            );

            CREATE INDEX idx_comments_target ON comments(target_type, target_id, created_at);
            CREATE INDEX idx_comments_parent ON comments(parent_id);

            CREATE TABLE follows (
                id            TEXT PRIMARY KEY,
                follower_id   TEXT NOT NULL REFERENCES users(id),
                following_id  TEXT NOT NULL REFERENCES users(id),
                created_at    TEXT NOT NULL,
                UNIQUE (follower_id, following_id),
                CHECK (follower_id <> following_id)
            );

            CREATE INDEX idx_follows_following ON follows(following_id, created_at);

            CREATE TABLE notifications (
                id                 TEXT PRIMARY KEY,
                recipient_id       TEXT NOT NULL REFERENCES users(id),
                actor_id           TEXT NOT NULL REFERENCES users(id),
                notification_type  TEXT NOT NULL,
                target_type        TEXT,
                target_id          TEXT,
                is_read            INTEGER NOT NULL DEFAULT 0,
                created_at         TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_recipient ON notifications(recipient_id, is_read, created_at);
            CREATE INDEX idx_notifications_target ON notifications(target_type, target_id);

            CREATE TABLE guest_requests (
                id            TEXT PRIMARY KEY,
                show_id       TEXT NOT NULL REFERENCES shows(id) ON DELETE CASCADE,
                requester_id  TEXT NOT NULL REFERENCES users(id),
                message       TEXT NOT NULL DEFAULT '',
                status        TEXT NOT NULL DEFAULT 'pending',
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            );

            CREATE INDEX idx_guest_requests_show ON guest_requests(show_id, requester_id);

            CREATE TABLE feedback (
                id               TEXT PRIMARY KEY,
                category         TEXT NOT NULL,
                message          TEXT NOT NULL,
                user_identifier  TEXT NOT NULL,
                resolved         INTEGER NOT NULL DEFAULT 0,
                admin_notes      TEXT,
                created_at       TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();
        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }
}
