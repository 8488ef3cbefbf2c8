//! Messaging rows as stored by the backend

use crate::address::WalletAddress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A conversation between wallet addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    /// Lowercase addresses, order irrelevant
    pub participants: Vec<String>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub group_avatar: Option<String>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// First participant that is not `me`
    pub fn other_participant(&self, me: &WalletAddress) -> Option<&str> {
        self.participants
            .iter()
            .map(String::as_str)
            .find(|p| !me.matches(p))
    }
}

/// A message, with its attachment embedded when it has one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// The message's attachment; the store returns a list, only the first counts
    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachments.first()
    }

    pub fn is_from(&self, address: &WalletAddress) -> bool {
        address.matches(&self.sender)
    }
}

/// File metadata for an uploaded attachment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub message_id: String,
    /// Object path inside the `attachments` bucket
    pub file_path: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub created_at: DateTime<Utc>,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.file_type.starts_with("image/")
    }
}

/// Insert payload for `conversations`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewConversation {
    pub participants: Vec<String>,
    pub is_group: bool,
    pub last_message: Option<String>,
    pub last_message_time: DateTime<Utc>,
}

/// Insert payload for `messages`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMessage {
    pub conversation_id: String,
    pub sender: String,
    pub content: String,
}

/// Insert payload for `attachments`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAttachment {
    pub message_id: String,
    pub file_path: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
}
