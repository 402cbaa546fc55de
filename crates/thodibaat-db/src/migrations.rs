use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id               TEXT PRIMARY KEY,
            name             TEXT NOT NULL,
            email            TEXT NOT NULL UNIQUE,
            password         TEXT NOT NULL,
            avatar           TEXT,
            bio              TEXT,
            role             TEXT NOT NULL DEFAULT 'user',
            is_online        INTEGER NOT NULL DEFAULT 0,
            last_seen        TEXT,
            privacy_settings TEXT NOT NULL DEFAULT '{}',
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS conversations (
            id              TEXT PRIMARY KEY,
            is_group        INTEGER NOT NULL DEFAULT 0,
            name            TEXT,
            group_avatar    TEXT,
            admin_id        TEXT REFERENCES users(id),
            last_message    TEXT,
            last_message_at TEXT,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS conversation_participants (
            conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            user_id         TEXT NOT NULL REFERENCES users(id),
            PRIMARY KEY (conversation_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_participants_user
            ON conversation_participants(user_id);

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            sender_id       TEXT NOT NULL REFERENCES users(id),
            content         TEXT NOT NULL,
            type            TEXT NOT NULL DEFAULT 'text',
            file_url        TEXT,
            reply_to_id     TEXT REFERENCES messages(id),
            read_by         TEXT NOT NULL DEFAULT '[]',
            is_deleted      INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_messages_updated
            ON messages(conversation_id, updated_at);

        CREATE TABLE IF NOT EXISTS blocked_users (
            blocker_id  TEXT NOT NULL REFERENCES users(id),
            blocked_id  TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            PRIMARY KEY (blocker_id, blocked_id)
        );

        CREATE TABLE IF NOT EXISTS businesses (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            name        TEXT NOT NULL,
            category    TEXT NOT NULL,
            description TEXT NOT NULL,
            contact     TEXT NOT NULL,
            products    TEXT NOT NULL DEFAULT '[]',
            logo        TEXT,
            status      TEXT NOT NULL DEFAULT 'pending',
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_businesses_status
            ON businesses(status, created_at);

        CREATE TABLE IF NOT EXISTS waitlist (
            id            TEXT PRIMARY KEY,
            email         TEXT NOT NULL UNIQUE,
            business_name TEXT,
            category      TEXT,
            status        TEXT NOT NULL DEFAULT 'pending',
            created_at    TEXT NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
