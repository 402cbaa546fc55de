use serde::{Deserialize, Serialize};

// -- JWT Claims --

/// JWT claims shared between thodibaat-api (middleware) and the auth
/// handlers that mint tokens. Canonical definition lives here in
/// thodibaat-types to avoid duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: UserProfile,
}

// -- Users --

/// Full profile minus the password hash. Timestamps are RFC3339 strings,
/// exactly as stored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub role: String,
    pub is_online: bool,
    pub last_seen: Option<String>,
    pub privacy_settings: serde_json::Value,
    pub created_at: String,
}

/// The slice of a user embedded in conversation payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub is_online: bool,
    pub last_seen: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<ParticipantInfo>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub is_online: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub message: String,
    pub is_online: bool,
    pub last_seen: String,
}

// -- Blocking --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedUserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub blocked_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedListResponse {
    pub blocked_users: Vec<BlockedUserInfo>,
}

// -- Pagination --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total_count: u64,
    pub total_pages: u64,
    pub has_more: bool,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total_count: u64) -> Self {
        Self {
            page,
            limit,
            total_count,
            total_pages: total_count.div_ceil(limit as u64),
            has_more: (page as u64) * (limit as u64) < total_count,
        }
    }
}

// -- Conversations --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    pub name: Option<String>,
    pub participant_ids: Option<Vec<String>>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConversationRequest {
    pub name: Option<String>,
    pub group_avatar: Option<String>,
    pub add_participant_ids: Option<Vec<String>>,
    pub remove_participant_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ListConversationsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
}

/// A conversation as returned by GET /conversations/:id and POST
/// /conversations.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    pub id: String,
    pub is_group: bool,
    pub name: Option<String>,
    pub group_avatar: Option<String>,
    pub admin_id: Option<String>,
    pub participants: Vec<ParticipantInfo>,
    pub other_participants: Vec<ParticipantInfo>,
    pub last_message: Option<String>,
    pub last_message_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// The compact last-message preview embedded in conversation summaries.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessagePreview {
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sender_id: String,
    pub created_at: String,
    pub is_deleted: bool,
}

/// One entry of the conversation listing / list poll, enriched with the
/// computed unread count.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub is_group: bool,
    pub name: String,
    pub group_avatar: Option<String>,
    pub admin_id: Option<String>,
    pub participants: Vec<ParticipantInfo>,
    pub other_participants: Vec<ParticipantInfo>,
    pub last_message: Option<LastMessagePreview>,
    pub unread_count: u64,
    pub last_message_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummary>,
    pub pagination: Pagination,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub file_url: Option<String>,
    pub reply_to_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditMessageRequest {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub before: Option<String>,
    pub after: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSender {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender: MessageSender,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub file_url: Option<String>,
    pub reply_to_id: Option<String>,
    pub read_by: Vec<String>,
    pub is_deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<MessageResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub message: String,
    pub count: u64,
}

// -- Polling --

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    pub since: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantStatus {
    pub user_id: String,
    pub name: String,
    pub is_online: bool,
    pub last_seen: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPollResponse {
    pub new_messages: Vec<MessageResponse>,
    pub updated_messages: Vec<MessageResponse>,
    pub participant_statuses: Vec<ParticipantStatus>,
    pub server_time: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalPollResponse {
    pub updated_conversations: Vec<ConversationSummary>,
    pub total_unread_count: u64,
    pub server_time: String,
}

// -- Businesses --

#[derive(Debug, Deserialize)]
pub struct CreateBusinessRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub contact: Option<serde_json::Value>,
    pub products: Option<serde_json::Value>,
    pub logo: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessInfo {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub contact: serde_json::Value,
    pub products: serde_json::Value,
    pub logo: Option<String>,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ListBusinessesQuery {
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BusinessListResponse {
    pub businesses: Vec<BusinessInfo>,
}

#[derive(Debug, Serialize)]
pub struct CreateBusinessResponse {
    pub message: String,
    pub business: BusinessInfo,
}

// -- Waitlist --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinWaitlistRequest {
    pub email: Option<String>,
    pub business_name: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistEntryInfo {
    pub id: String,
    pub email: String,
    pub business_name: Option<String>,
    pub category: Option<String>,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct JoinWaitlistResponse {
    pub message: String,
    pub entry: WaitlistEntryInfo,
}

// -- Upload --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
}
