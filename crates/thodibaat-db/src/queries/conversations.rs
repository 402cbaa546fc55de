use crate::models::{ConversationRow, ParticipantRow};
use crate::{Database, OptionalExt};
use anyhow::Result;
use rusqlite::{Connection, params};

impl Database {
    /// Create a 1:1 thread with exactly two participants and, when a first
    /// message is given, that message plus the denormalized cache. One
    /// transaction.
    pub fn create_direct_conversation(
        &self,
        conversation_id: &str,
        creator_id: &str,
        recipient_id: &str,
        first_message: Option<(&str, &str)>,
        now: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let (last_message, last_message_at) = match first_message {
                Some((_, content)) => (Some(content), Some(now)),
                None => (None, None),
            };
            tx.execute(
                "INSERT INTO conversations (id, is_group, last_message, last_message_at, created_at, updated_at)
                 VALUES (?1, 0, ?2, ?3, ?4, ?4)",
                params![conversation_id, last_message, last_message_at, now],
            )?;

            for user_id in [creator_id, recipient_id] {
                tx.execute(
                    "INSERT INTO conversation_participants (conversation_id, user_id) VALUES (?1, ?2)",
                    params![conversation_id, user_id],
                )?;
            }

            if let Some((message_id, content)) = first_message {
                // Stamped strictly after the conversation row so a poll
                // cursor equal to the creation time still sees it.
                let message_at = crate::strictly_after(now);
                insert_message_tx(&tx, message_id, conversation_id, creator_id, content, "text", &message_at)?;
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// Create a group: the creator becomes admin, everyone in `member_ids`
    /// (already deduplicated, creator included) joins, and a `system`
    /// message records the creation. One transaction.
    pub fn create_group_conversation(
        &self,
        conversation_id: &str,
        name: &str,
        admin_id: &str,
        member_ids: &[String],
        system_message: (&str, &str),
        now: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let (message_id, content) = system_message;
            tx.execute(
                "INSERT INTO conversations (id, is_group, name, admin_id, last_message, last_message_at, created_at, updated_at)
                 VALUES (?1, 1, ?2, ?3, ?4, ?5, ?5, ?5)",
                params![conversation_id, name, admin_id, content, now],
            )?;

            for user_id in member_ids {
                tx.execute(
                    "INSERT OR IGNORE INTO conversation_participants (conversation_id, user_id) VALUES (?1, ?2)",
                    params![conversation_id, user_id],
                )?;
            }

            let message_at = crate::strictly_after(now);
            insert_message_tx(&tx, message_id, conversation_id, admin_id, content, "system", &message_at)?;

            tx.commit()?;
            Ok(())
        })
    }

    /// The existing 1:1 thread between two users, if any.
    pub fn find_direct_between(&self, a: &str, b: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let id: Option<String> = conn
                .query_row(
                    "SELECT c.id FROM conversations c
                     JOIN conversation_participants p1 ON p1.conversation_id = c.id AND p1.user_id = ?1
                     JOIN conversation_participants p2 ON p2.conversation_id = c.id AND p2.user_id = ?2
                     WHERE c.is_group = 0",
                    params![a, b],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(id)
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, is_group, name, group_avatar, admin_id, last_message,
                        last_message_at, created_at, updated_at
                 FROM conversations WHERE id = ?1",
            )?;
            let row = stmt.query_row([id], map_conversation).optional()?;
            Ok(row)
        })
    }

    pub fn participants(&self, conversation_id: &str) -> Result<Vec<ParticipantRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.name, u.email, u.avatar, u.is_online, u.last_seen
                 FROM conversation_participants cp
                 JOIN users u ON u.id = cp.user_id
                 WHERE cp.conversation_id = ?1
                 ORDER BY u.name ASC",
            )?;
            let rows = stmt
                .query_map([conversation_id], super::users::map_participant)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn is_participant(&self, conversation_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM conversation_participants WHERE conversation_id = ?1 AND user_id = ?2",
                    params![conversation_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// The caller's conversations, most recent activity first. `search`
    /// matches the group name or another participant's name.
    pub fn list_conversations(
        &self,
        user_id: &str,
        search: Option<&str>,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<ConversationRow>, u64)> {
        let pattern = search
            .filter(|t| !t.is_empty())
            .map(|t| format!("%{}%", t));

        self.with_conn(|conn| {
            let filter = "cp.user_id = ?1
                 AND (?2 IS NULL
                      OR c.name LIKE ?2
                      OR EXISTS (
                          SELECT 1 FROM conversation_participants op
                          JOIN users u ON u.id = op.user_id
                          WHERE op.conversation_id = c.id
                            AND op.user_id != ?1
                            AND u.name LIKE ?2))";

            let total: u64 = conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM conversations c
                     JOIN conversation_participants cp ON cp.conversation_id = c.id
                     WHERE {}",
                    filter
                ),
                params![user_id, pattern],
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT c.id, c.is_group, c.name, c.group_avatar, c.admin_id,
                        c.last_message, c.last_message_at, c.created_at, c.updated_at
                 FROM conversations c
                 JOIN conversation_participants cp ON cp.conversation_id = c.id
                 WHERE {}
                 ORDER BY c.last_message_at DESC NULLS LAST, c.updated_at DESC
                 LIMIT ?3 OFFSET ?4",
                filter
            ))?;
            let rows = stmt
                .query_map(params![user_id, pattern, limit, offset], map_conversation)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total))
        })
    }

    /// Delta for the list-level poll: conversations touched after `since`.
    pub fn conversations_updated_since(
        &self,
        user_id: &str,
        since: &str,
    ) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.is_group, c.name, c.group_avatar, c.admin_id,
                        c.last_message, c.last_message_at, c.created_at, c.updated_at
                 FROM conversations c
                 JOIN conversation_participants cp ON cp.conversation_id = c.id
                 WHERE cp.user_id = ?1 AND c.updated_at > ?2
                 ORDER BY c.updated_at DESC",
            )?;
            let rows = stmt
                .query_map(params![user_id, since], map_conversation)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Admin-only group mutation: rename, change avatar, add and remove
    /// members. The removal list must already have the admin filtered out.
    pub fn update_group(
        &self,
        conversation_id: &str,
        name: Option<&str>,
        group_avatar: Option<&str>,
        add_ids: &[String],
        remove_ids: &[String],
        now: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            if let Some(name) = name {
                tx.execute(
                    "UPDATE conversations SET name = ?2 WHERE id = ?1",
                    params![conversation_id, name],
                )?;
            }
            if let Some(avatar) = group_avatar {
                tx.execute(
                    "UPDATE conversations SET group_avatar = ?2 WHERE id = ?1",
                    params![conversation_id, avatar],
                )?;
            }
            for user_id in add_ids {
                tx.execute(
                    "INSERT OR IGNORE INTO conversation_participants (conversation_id, user_id) VALUES (?1, ?2)",
                    params![conversation_id, user_id],
                )?;
            }
            for user_id in remove_ids {
                tx.execute(
                    "DELETE FROM conversation_participants WHERE conversation_id = ?1 AND user_id = ?2",
                    params![conversation_id, user_id],
                )?;
            }
            tx.execute(
                "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
                params![conversation_id, now],
            )?;

            tx.commit()?;
            Ok(())
        })
    }

    /// A non-admin member leaving a group.
    pub fn remove_participant(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM conversation_participants WHERE conversation_id = ?1 AND user_id = ?2",
                params![conversation_id, user_id],
            )?;
            Ok(())
        })
    }

    /// Hard delete of a thread: messages, membership rows, then the
    /// conversation itself, in one transaction.
    pub fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM messages WHERE conversation_id = ?1", [conversation_id])?;
            tx.execute(
                "DELETE FROM conversation_participants WHERE conversation_id = ?1",
                [conversation_id],
            )?;
            tx.execute("DELETE FROM conversations WHERE id = ?1", [conversation_id])?;
            tx.commit()?;
            Ok(())
        })
    }
}

pub(crate) fn insert_message_tx(
    conn: &Connection,
    id: &str,
    conversation_id: &str,
    sender_id: &str,
    content: &str,
    kind: &str,
    now: &str,
) -> Result<()> {
    let read_by = serde_json::to_string(&[sender_id])?;
    conn.execute(
        "INSERT INTO messages (id, conversation_id, sender_id, content, type, read_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![id, conversation_id, sender_id, content, kind, read_by, now],
    )?;
    Ok(())
}

fn map_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        is_group: row.get(1)?,
        name: row.get(2)?,
        group_avatar: row.get(3)?,
        admin_id: row.get(4)?,
        last_message: row.get(5)?,
        last_message_at: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
