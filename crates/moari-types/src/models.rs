use serde::{Deserialize, Serialize};

use crate::moment::{self, Moment};

/// A direct message between two users, optionally about a club.
///
/// Immutable once sent except for `read`, which only ever flips to `true`
/// when the receiver opens the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(rename = "senderUid")]
    pub sender_id: String,
    #[serde(rename = "receiverUid")]
    pub receiver_id: String,
    #[serde(rename = "message")]
    pub body: String,
    pub club_id: Option<String>,
    pub club_name: Option<String>,
    pub created_at: Moment,
    pub read: bool,
}

impl Message {
    /// Total order used everywhere messages are compared by recency.
    pub fn order_key(&self) -> (Moment, &str) {
        (self.created_at, self.id.as_str())
    }
}

/// Per-peer projection of a user's messages. Derived on every request,
/// never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub peer_id: String,
    pub last_message: String,
    #[serde(serialize_with = "moment::as_millis")]
    pub last_message_time: Moment,
    pub club_id: Option<String>,
    pub club_name: Option<String>,
    pub unread_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    pub id: String,
    pub name: String,
    pub one_line_intro: String,
    pub description: String,
    pub interview_date: String,
    pub image_url: String,
    pub owner_id: String,
    pub tags: Vec<String>,
    pub club_link: String,
    pub created_at: Moment,
    pub updated_at: Moment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub display_name: String,
    pub email: String,
}

/// Display name shown for a user: the stored name, or the local part of
/// their email when the name is blank.
pub fn display_name_or_local_part(display_name: Option<&str>, email: &str) -> String {
    match display_name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => email.split('@').next().unwrap_or_default().to_string(),
    }
}
