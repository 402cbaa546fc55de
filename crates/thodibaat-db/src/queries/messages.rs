use crate::models::{LastMessageRow, MessageRow, is_unread_for};
use crate::{DELETED_PLACEHOLDER, Database, OptionalExt};
use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};

const MESSAGE_COLUMNS: &str = "m.id, m.conversation_id, m.sender_id, u.name, u.avatar,
        m.content, m.type, m.file_url, m.reply_to_id, m.read_by, m.is_deleted,
        m.created_at, m.updated_at";

impl Database {
    /// Send a message: insert it (read only by the sender), refresh the
    /// conversation's denormalized last-message cache and mark the sender
    /// online, all in one transaction so a crash cannot leave the cache
    /// stale.
    #[allow(clippy::too_many_arguments)]
    pub fn send_message(
        &self,
        id: &str,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
        kind: &str,
        file_url: Option<&str>,
        reply_to_id: Option<&str>,
        now: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let read_by = serde_json::to_string(&[sender_id])?;
            tx.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, content, type,
                                       file_url, reply_to_id, read_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![id, conversation_id, sender_id, content, kind, file_url, reply_to_id, read_by, now],
            )?;
            tx.execute(
                "UPDATE conversations SET last_message = ?2, last_message_at = ?3, updated_at = ?3
                 WHERE id = ?1",
                params![conversation_id, content, now],
            )?;
            tx.execute(
                "UPDATE users SET is_online = 1, last_seen = ?2, updated_at = ?2 WHERE id = ?1",
                params![sender_id, now],
            )?;

            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_message(&self, conversation_id: &str, message_id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages m
                 LEFT JOIN users u ON u.id = m.sender_id
                 WHERE m.id = ?1 AND m.conversation_id = ?2"
            ))?;
            let row = stmt
                .query_row(params![message_id, conversation_id], map_message)
                .optional()?;
            Ok(row)
        })
    }

    /// Paginated history, newest first. `before`/`after` bound `created_at`
    /// exclusively; the handler re-reverses the page for display.
    pub fn list_messages(
        &self,
        conversation_id: &str,
        before: Option<&str>,
        after: Option<&str>,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<MessageRow>, u64)> {
        self.with_conn(|conn| {
            let mut filter = String::from("m.conversation_id = ?1");
            let mut values: Vec<Value> = vec![Value::from(conversation_id.to_string())];

            if let Some(before) = before {
                filter.push_str(&format!(" AND m.created_at < ?{}", values.len() + 1));
                values.push(Value::from(before.to_string()));
            }
            if let Some(after) = after {
                filter.push_str(&format!(" AND m.created_at > ?{}", values.len() + 1));
                values.push(Value::from(after.to_string()));
            }

            let total: u64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM messages m WHERE {}", filter),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )?;

            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages m
                 LEFT JOIN users u ON u.id = m.sender_id
                 WHERE {filter}
                 ORDER BY m.created_at DESC
                 LIMIT ?{} OFFSET ?{}",
                values.len() + 1,
                values.len() + 2
            );
            values.push(Value::from(limit as i64));
            values.push(Value::from(offset as i64));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total))
        })
    }

    /// New arrivals for the conversation poll: created strictly after the
    /// cursor, oldest first.
    pub fn messages_created_since(
        &self,
        conversation_id: &str,
        since: &str,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages m
                 LEFT JOIN users u ON u.id = m.sender_id
                 WHERE m.conversation_id = ?1 AND m.created_at > ?2
                 ORDER BY m.created_at ASC"
            ))?;
            let rows = stmt
                .query_map(params![conversation_id, since], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// History-altering events for the poll: rows touched after the cursor
    /// but created at-or-before it, so edits, deletions and read receipts
    /// are distinguished from new arrivals.
    pub fn messages_updated_since(
        &self,
        conversation_id: &str,
        since: &str,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages m
                 LEFT JOIN users u ON u.id = m.sender_id
                 WHERE m.conversation_id = ?1 AND m.updated_at > ?2 AND m.created_at <= ?2
                 ORDER BY m.updated_at ASC"
            ))?;
            let rows = stmt
                .query_map(params![conversation_id, since], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The single most recent message, for conversation summaries.
    pub fn last_message(&self, conversation_id: &str) -> Result<Option<LastMessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, content, type, sender_id, created_at, is_deleted
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at DESC
                 LIMIT 1",
            )?;
            let row = stmt
                .query_row([conversation_id], |row| {
                    Ok(LastMessageRow {
                        id: row.get(0)?,
                        content: row.get(1)?,
                        kind: row.get(2)?,
                        sender_id: row.get(3)?,
                        created_at: row.get(4)?,
                        is_deleted: row.get(5)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    pub fn edit_message(&self, message_id: &str, content: &str, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET content = ?2, updated_at = ?3 WHERE id = ?1",
                params![message_id, content, now],
            )?;
            Ok(())
        })
    }

    /// One-way `active -> deleted` transition. The row stays so history and
    /// ordering are preserved, but displayable fields are redacted at the
    /// source.
    pub fn soft_delete_message(&self, message_id: &str, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET is_deleted = 1, content = ?2, file_url = NULL, updated_at = ?3
                 WHERE id = ?1",
                params![message_id, DELETED_PLACEHOLDER, now],
            )?;
            Ok(())
        })
    }

    /// Append the caller to the reader list of every unread message from
    /// other senders. Idempotent: rows already naming the caller are left
    /// untouched. Returns how many rows changed.
    pub fn mark_read(&self, conversation_id: &str, user_id: &str, now: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let unread = query_unread_read_by(&tx, conversation_id, user_id)?;
            let mut count = 0u64;
            for (id, read_by) in unread {
                let mut readers: Vec<String> = serde_json::from_str(&read_by).unwrap_or_default();
                readers.push(user_id.to_string());
                tx.execute(
                    "UPDATE messages SET read_by = ?2, updated_at = ?3 WHERE id = ?1",
                    params![id, serde_json::to_string(&readers)?, now],
                )?;
                count += 1;
            }

            tx.commit()?;
            Ok(count)
        })
    }

    /// The one unread-count implementation, shared by the listing, the list
    /// poll and the total badge: non-deleted messages from other senders
    /// whose reader list excludes the caller.
    pub fn unread_count(&self, conversation_id: &str, user_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            Ok(query_unread_read_by(conn, conversation_id, user_id)?.len() as u64)
        })
    }

    /// Unread total across every conversation the user belongs to.
    pub fn total_unread(&self, user_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.read_by FROM messages m
                 JOIN conversation_participants cp
                   ON cp.conversation_id = m.conversation_id AND cp.user_id = ?1
                 WHERE m.sender_id != ?1 AND m.is_deleted = 0",
            )?;
            let read_bys = stmt
                .query_map([user_id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(read_bys
                .iter()
                .filter(|rb| is_unread_for(rb, user_id))
                .count() as u64)
        })
    }
}

fn query_unread_read_by(
    conn: &Connection,
    conversation_id: &str,
    user_id: &str,
) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT id, read_by FROM messages
         WHERE conversation_id = ?1 AND sender_id != ?2 AND is_deleted = 0",
    )?;
    let rows = stmt
        .query_map(params![conversation_id, user_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows
        .into_iter()
        .filter(|(_, read_by)| is_unread_for(read_by, user_id))
        .collect())
}

fn map_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_name: row
            .get::<_, Option<String>>(3)?
            .unwrap_or_else(|| "unknown".to_string()),
        sender_avatar: row.get(4)?,
        content: row.get(5)?,
        kind: row.get(6)?,
        file_url: row.get(7)?,
        reply_to_id: row.get(8)?,
        read_by: row.get(9)?,
        is_deleted: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}
