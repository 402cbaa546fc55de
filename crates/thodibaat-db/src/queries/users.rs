use crate::models::{BlockedUserRow, ParticipantRow, UserRow};
use crate::{Database, OptionalExt};
use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        name: &str,
        email: &str,
        password_hash: &str,
        privacy_settings: &str,
        now: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, password, privacy_settings, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![id, name, email, password_hash, privacy_settings, now],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Presence heartbeat: flips `is_online` and stamps `last_seen`.
    pub fn set_presence(&self, user_id: &str, is_online: bool, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET is_online = ?2, last_seen = ?3, updated_at = ?3 WHERE id = ?1",
                params![user_id, is_online, now],
            )?;
            Ok(())
        })
    }

    /// Directory search, excluding the given ids (the caller plus anyone
    /// blocked in either direction). Returns the page and the total count.
    pub fn search_users(
        &self,
        exclude_ids: &[String],
        search: Option<&str>,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<ParticipantRow>, u64)> {
        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=exclude_ids.len()).map(|i| format!("?{}", i)).collect();
            let mut filter = format!("id NOT IN ({})", placeholders.join(", "));
            let mut values: Vec<Value> =
                exclude_ids.iter().map(|id| Value::from(id.clone())).collect();

            if let Some(term) = search.filter(|t| !t.is_empty()) {
                let pattern = format!("%{}%", term);
                filter.push_str(&format!(
                    " AND (name LIKE ?{n} OR email LIKE ?{n})",
                    n = values.len() + 1
                ));
                values.push(Value::from(pattern));
            }

            let total: u64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM users WHERE {}", filter),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )?;

            let sql = format!(
                "SELECT id, name, email, avatar, is_online, last_seen
                 FROM users WHERE {} ORDER BY name ASC LIMIT ?{} OFFSET ?{}",
                filter,
                values.len() + 1,
                values.len() + 2
            );
            values.push(Value::from(limit as i64));
            values.push(Value::from(offset as i64));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), map_participant)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total))
        })
    }

    // -- Blocking --

    /// Directed check: has `blocker` blocked `blocked`?
    pub fn is_blocked(&self, blocker_id: &str, blocked_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM blocked_users WHERE blocker_id = ?1 AND blocked_id = ?2",
                    params![blocker_id, blocked_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Either direction between two users suppresses messaging.
    pub fn is_blocked_between(&self, a: &str, b: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM blocked_users
                     WHERE (blocker_id = ?1 AND blocked_id = ?2)
                        OR (blocker_id = ?2 AND blocked_id = ?1)",
                    params![a, b],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn block_user(&self, blocker_id: &str, blocked_id: &str, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO blocked_users (blocker_id, blocked_id, created_at) VALUES (?1, ?2, ?3)",
                params![blocker_id, blocked_id, now],
            )?;
            Ok(())
        })
    }

    /// Idempotent: removing a non-existent block is a no-op.
    pub fn unblock_user(&self, blocker_id: &str, blocked_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM blocked_users WHERE blocker_id = ?1 AND blocked_id = ?2",
                params![blocker_id, blocked_id],
            )?;
            Ok(())
        })
    }

    pub fn list_blocked(&self, blocker_id: &str) -> Result<Vec<BlockedUserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.name, u.email, u.avatar, b.created_at
                 FROM blocked_users b
                 JOIN users u ON u.id = b.blocked_id
                 WHERE b.blocker_id = ?1
                 ORDER BY b.created_at DESC",
            )?;
            let rows = stmt
                .query_map([blocker_id], |row| {
                    Ok(BlockedUserRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        avatar: row.get(3)?,
                        blocked_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Ids of everyone in a block relation with this user, either direction.
    pub fn blocked_ids_for(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT CASE WHEN blocker_id = ?1 THEN blocked_id ELSE blocker_id END
                 FROM blocked_users
                 WHERE blocker_id = ?1 OR blocked_id = ?1",
            )?;
            let rows = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name, email, password, avatar, bio, role, is_online,
                last_seen, privacy_settings, created_at, updated_at
         FROM users WHERE {} = ?1",
        column
    ))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                avatar: row.get(4)?,
                bio: row.get(5)?,
                role: row.get(6)?,
                is_online: row.get(7)?,
                last_seen: row.get(8)?,
                privacy_settings: row.get(9)?,
                created_at: row.get(10)?,
                updated_at: row.get(11)?,
            })
        })
        .optional()?;

    Ok(row)
}

pub(crate) fn map_participant(row: &rusqlite::Row<'_>) -> rusqlite::Result<ParticipantRow> {
    Ok(ParticipantRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        avatar: row.get(3)?,
        is_online: row.get(4)?,
        last_seen: row.get(5)?,
    })
}
