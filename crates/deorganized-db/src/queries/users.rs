use std::collections::HashMap;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use deorganized_types::models::Role;

use super::{as_params, like_pattern, placeholders};
use crate::Database;
use crate::models::{UserRow, parse_col};

const USER_COLUMNS: &str = "id, username, email, password, display_name, first_name, last_name, role, \
     wallet_address, bio, profile_picture, cover_photo, website, twitter, instagram, youtube, \
     is_verified, is_staff, date_joined, updated_at";

#[derive(Debug, Default)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    /// Argon2 hash; `None` leaves the account without a usable password.
    pub password_hash: Option<String>,
    pub display_name: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub role: Option<Role>,
    pub wallet_address: Option<String>,
    pub bio: String,
    pub website: String,
    pub twitter: String,
    pub instagram: String,
    pub youtube: String,
}

/// Fields left as `None` keep their current value.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
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

#[derive(Debug, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub is_verified: Option<bool>,
    pub search: Option<String>,
    pub limit: Option<u32>,
}

impl Database {
    pub fn create_user(&self, user: &NewUser) -> Result<UserRow> {
        self.with_conn(|conn| insert_user(conn, user))
    }

    /// Wallet signup: the insert runs in its own transaction so a constraint
    /// failure leaves nothing behind.
    pub fn create_wallet_user(&self, user: &NewUser) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let row = insert_user(&tx, user)?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_where(conn, "username = ?1", username))
    }

    /// Look a user up by username first, then by email.
    pub fn get_user_by_login(&self, login: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| match query_user_where(conn, "username = ?1", login)? {
            Some(user) => Ok(Some(user)),
            None => query_user_where(conn, "email = ?1", login),
        })
    }

    pub fn get_user_by_wallet(&self, wallet_address: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_where(conn, "wallet_address = ?1", wallet_address))
    }

    pub fn wallet_exists(&self, wallet_address: &str) -> Result<bool> {
        Ok(self.get_user_by_wallet(wallet_address)?.is_some())
    }

    /// Whether `username` is taken by anyone other than `except`.
    pub fn username_taken(&self, username: &str, except: Option<Uuid>) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<String> = conn
                .query_row(
                    "SELECT id FROM users WHERE username = ?1 AND (?2 IS NULL OR id <> ?2)",
                    params![username, except.map(|id| id.to_string())],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Batch-fetch users for nesting into responses.
    pub fn get_users_by_ids(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, UserRow>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let values: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id IN ({})",
                placeholders(values.len(), 1)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(as_params(&values).as_slice(), map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().map(|u| (u.id, u)).collect())
        })
    }

    pub fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET
                    username = COALESCE(?2, username),
                    display_name = COALESCE(?3, display_name),
                    bio = COALESCE(?4, bio),
                    profile_picture = COALESCE(?5, profile_picture),
                    cover_photo = COALESCE(?6, cover_photo),
                    website = COALESCE(?7, website),
                    twitter = COALESCE(?8, twitter),
                    instagram = COALESCE(?9, instagram),
                    youtube = COALESCE(?10, youtube),
                    role = COALESCE(?11, role),
                    updated_at = ?12
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    update.username,
                    update.display_name,
                    update.bio,
                    update.profile_picture,
                    update.cover_photo,
                    update.website,
                    update.twitter,
                    update.instagram,
                    update.youtube,
                    update.role.map(|r| r.as_str()),
                    crate::now(),
                ],
            )?;
            query_user_by_id(conn, id)
        })
    }

    /// Newest first.
    pub fn list_users(&self, filter: &UserFilter) -> Result<Vec<UserRow>> {
        let pattern = like_pattern(filter.search.as_deref());
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE (?1 IS NULL OR role = ?1)
                   AND (?2 IS NULL OR is_verified = ?2)
                   AND (?3 IS NULL OR username LIKE ?3 OR first_name LIKE ?3 OR last_name LIKE ?3)
                 ORDER BY date_joined DESC, rowid DESC
                 LIMIT ?4"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![
                        filter.role.map(|r| r.as_str()),
                        filter.is_verified,
                        pattern,
                        filter.limit.map(i64::from).unwrap_or(-1),
                    ],
                    map_user,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Flip `is_verified` and return the updated user.
    pub fn toggle_verified(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET is_verified = NOT is_verified, updated_at = ?2 WHERE id = ?1",
                params![id.to_string(), crate::now()],
            )?;
            query_user_by_id(conn, id)
        })
    }

    pub fn set_staff(&self, id: Uuid, is_staff: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET is_staff = ?2 WHERE id = ?1",
                params![id.to_string(), is_staff],
            )?;
            Ok(())
        })
    }

    /// (followers, following) for one user.
    pub fn follow_counts(&self, id: Uuid) -> Result<(i64, i64)> {
        self.with_conn(|conn| {
            let uid = id.to_string();
            let followers: i64 = conn.query_row(
                "SELECT COUNT(*) FROM follows WHERE following_id = ?1",
                [&uid],
                |r| r.get(0),
            )?;
            let following: i64 = conn.query_row(
                "SELECT COUNT(*) FROM follows WHERE follower_id = ?1",
                [&uid],
                |r| r.get(0),
            )?;
            Ok((followers, following))
        })
    }
}

fn insert_user(conn: &Connection, user: &NewUser) -> Result<UserRow> {
    let id = Uuid::new_v4();
    let now = crate::now();
    conn.execute(
        "INSERT INTO users (id, username, email, password, display_name, first_name, last_name, role,
                            wallet_address, bio, website, twitter, instagram, youtube, date_joined, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
        params![
            id.to_string(),
            user.username,
            user.email,
            user.password_hash,
            user.display_name,
            user.first_name,
            user.last_name,
            user.role.unwrap_or(Role::User).as_str(),
            user.wallet_address,
            user.bio,
            user.website,
            user.twitter,
            user.instagram,
            user.youtube,
            now,
        ],
    )?;

    query_user_by_id(conn, id)?.ok_or_else(|| anyhow::anyhow!("User {} vanished after insert", id))
}

pub(crate) fn query_user_by_id(conn: &Connection, id: Uuid) -> Result<Option<UserRow>> {
    query_user_where(conn, "id = ?1", &id.to_string())
}

fn query_user_where(conn: &Connection, clause: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {clause} LIMIT 1");
    let row = conn.query_row(&sql, [value], map_user).optional()?;
    Ok(row)
}

pub(crate) fn map_user(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: parse_col(row, 0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        display_name: row.get(4)?,
        first_name: row.get(5)?,
        last_name: row.get(6)?,
        role: parse_col(row, 7)?,
        wallet_address: row.get(8)?,
        bio: row.get(9)?,
        profile_picture: row.get(10)?,
        cover_photo: row.get(11)?,
        website: row.get(12)?,
        twitter: row.get(13)?,
        instagram: row.get(14)?,
        youtube: row.get(15)?,
        is_verified: row.get(16)?,
        is_staff: row.get(17)?,
        date_joined: parse_col(row, 18)?,
        updated_at: parse_col(row, 19)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: Some(format!("{username}@example.com")),
            ..NewUser::default()
        }
    }

    #[test]
    fn login_falls_back_to_email() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user(&new_user("alice")).unwrap();
        assert_eq!(user.role, Role::User);

        let by_email = db.get_user_by_login("alice@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(db.get_user_by_login("nobody").unwrap().is_none());
    }

    #[test]
    fn duplicate_wallet_is_a_constraint_violation() {
        let db = Database::open_in_memory().unwrap();
        let mut first = new_user("first");
        first.wallet_address = Some("SP000WALLET".into());
        db.create_wallet_user(&first).unwrap();

        let mut second = new_user("second");
        second.wallet_address = Some("SP000WALLET".into());
        let err = db.create_wallet_user(&second).unwrap_err();
        assert!(crate::is_constraint_violation(&err));
        assert!(db.get_user_by_username("second").unwrap().is_none());
    }

    #[test]
    fn profile_update_keeps_unset_fields() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user(&new_user("bob")).unwrap();

        let updated = db
            .update_profile(
                user.id,
                &ProfileUpdate {
                    bio: Some("hello".into()),
                    role: Some(Role::Creator),
                    ..ProfileUpdate::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.bio, "hello");
        assert_eq!(updated.role, Role::Creator);
        assert_eq!(updated.username, "bob");
        assert!(db.username_taken("bob", None).unwrap());
        assert!(!db.username_taken("bob", Some(user.id)).unwrap());
    }

    #[test]
    fn list_users_filters_by_role_and_search() {
        let db = Database::open_in_memory().unwrap();
        let mut creator = new_user("maker");
        creator.role = Some(Role::Creator);
        db.create_user(&creator).unwrap();
        db.create_user(&new_user("viewer")).unwrap();

        let creators = db
            .list_users(&UserFilter {
                role: Some(Role::Creator),
                ..UserFilter::default()
            })
            .unwrap();
        assert_eq!(creators.len(), 1);
        assert_eq!(creators[0].username, "maker");

        let found = db
            .list_users(&UserFilter {
                search: Some("VIEW".into()),
                ..UserFilter::default()
            })
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
