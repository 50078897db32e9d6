use anyhow::Result;
use rusqlite::{Connection, params};

use super::OptionalExt;
use crate::Database;
use crate::models::{ProfilePatch, ProfileRow, UserRow};

impl Database {
    // -- Users --

    /// Create the auth record and its empty profile in one transaction.
    /// Returns false, writing nothing, when the email is already taken.
    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
        full_name: Option<&str>,
        campus: Option<&str>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT INTO users (id, email, password, created_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT DO NOTHING",
                params![id, email, password_hash, crate::now()],
            )?;
            if inserted == 0 {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO profiles (id, email, full_name, campus) VALUES (?1, ?2, ?3, ?4)",
                params![id, email, full_name, campus],
            )?;
            tx.commit()?;
            Ok(true)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, email))
    }

    // -- Profiles --

    pub fn get_profile(&self, id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, id))
    }

    /// Apply the present fields of `patch`. Returns the updated profile, or
    /// `None` if no profile exists for `id`.
    pub fn update_profile(&self, id: &str, patch: &ProfilePatch) -> Result<Option<ProfileRow>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE profiles SET
                    full_name  = COALESCE(?2, full_name),
                    campus     = COALESCE(?3, campus),
                    major      = COALESCE(?4, major),
                    bio        = COALESCE(?5, bio),
                    avatar_url = COALESCE(?6, avatar_url)
                 WHERE id = ?1",
                params![
                    id,
                    patch.full_name,
                    patch.campus,
                    patch.major,
                    patch.bio,
                    patch.avatar_url
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_profile(conn, id)
        })
    }

    /// Turn the user into a seller. There is no way back.
    pub fn setup_shop(
        &self,
        id: &str,
        shop_name: &str,
        shop_description: Option<&str>,
    ) -> Result<Option<ProfileRow>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE profiles SET is_seller = 1, shop_name = ?2, shop_description = ?3
                 WHERE id = ?1",
                params![id, shop_name, shop_description],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_profile(conn, id)
        })
    }
}

fn query_user(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, email, password, created_at FROM users WHERE email = ?1")?;

    let row = stmt
        .query_row([email], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_profile(conn: &Connection, id: &str) -> Result<Option<ProfileRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, email, full_name, campus, major, bio, is_seller, shop_name,
                shop_description, avatar_url
         FROM profiles WHERE id = ?1",
    )?;

    let row = stmt
        .query_row([id], |row| {
            Ok(ProfileRow {
                id: row.get(0)?,
                email: row.get(1)?,
                full_name: row.get(2)?,
                campus: row.get(3)?,
                major: row.get(4)?,
                bio: row.get(5)?,
                is_seller: row.get(6)?,
                shop_name: row.get(7)?,
                shop_description: row.get(8)?,
                avatar_url: row.get(9)?,
            })
        })
        .optional()?;

    Ok(row)
}
