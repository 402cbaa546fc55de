/// Database row types — these map directly to SQLite rows.
/// Distinct from the thodibaat-types wire models to keep the DB layer
/// independent of response shaping.

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub role: String,
    pub is_online: bool,
    pub last_seen: Option<String>,
    pub privacy_settings: String,
    pub created_at: String,
    pub updated_at: String,
}

/// The participant projection used everywhere a conversation embeds its
/// members.
#[derive(Clone)]
pub struct ParticipantRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub is_online: bool,
    pub last_seen: Option<String>,
}

pub struct ConversationRow {
    pub id: String,
    pub is_group: bool,
    pub name: Option<String>,
    pub group_avatar: Option<String>,
    pub admin_id: Option<String>,
    pub last_message: Option<String>,
    pub last_message_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_avatar: Option<String>,
    pub content: String,
    pub kind: String,
    pub file_url: Option<String>,
    pub reply_to_id: Option<String>,
    pub read_by: String,
    pub is_deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl MessageRow {
    /// `read_by` is stored as a JSON array of user ids.
    pub fn read_by_list(&self) -> Vec<String> {
        parse_read_by(&self.read_by)
    }
}

pub fn parse_read_by(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_default()
}

/// The single definition of "unread for this user": the reader list does
/// not contain them. Senders never count (their own rows are filtered out
/// in SQL before this runs).
pub fn is_unread_for(read_by_json: &str, user_id: &str) -> bool {
    !parse_read_by(read_by_json).iter().any(|id| id == user_id)
}

/// The compact last-message projection for conversation summaries.
pub struct LastMessageRow {
    pub id: String,
    pub content: String,
    pub kind: String,
    pub sender_id: String,
    pub created_at: String,
    pub is_deleted: bool,
}

pub struct BlockedUserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub blocked_at: String,
}

pub struct BusinessRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub contact: String,
    pub products: String,
    pub logo: Option<String>,
    pub status: String,
    pub created_at: String,
}

pub struct WaitlistRow {
    pub id: String,
    pub email: String,
    pub business_name: Option<String>,
    pub category: Option<String>,
    pub status: String,
    pub created_at: String,
}
