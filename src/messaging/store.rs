//! Chat persistence seam
//!
//! [`ChatStore`] covers the relational calls the messaging services make; the
//! backend client implements it with PostgREST queries.

use super::models::{Attachment, Conversation, Message, NewAttachment, NewConversation, NewMessage};
use crate::backend::{BackendClient, BackendResult, TableQuery};
use async_trait::async_trait;

pub const CONVERSATIONS_TABLE: &str = "conversations";
pub const MESSAGES_TABLE: &str = "messages";
pub const ATTACHMENTS_TABLE: &str = "attachments";

/// Relational storage for conversations, messages and attachments
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Conversations including `participant`, most recently updated first
    async fn conversations_for(&self, participant: &str) -> BackendResult<Vec<Conversation>>;

    /// Non-group conversations whose participants contain both addresses
    async fn find_direct(&self, a: &str, b: &str) -> BackendResult<Vec<Conversation>>;

    async fn insert_conversation(&self, row: &NewConversation) -> BackendResult<Conversation>;

    /// Messages with embedded attachments, oldest first
    async fn messages(&self, conversation_id: &str) -> BackendResult<Vec<Message>>;

    async fn insert_message(&self, row: &NewMessage) -> BackendResult<Message>;

    async fn insert_attachment(&self, row: &NewAttachment) -> BackendResult<Attachment>;
}

#[async_trait]
impl ChatStore for BackendClient {
    async fn conversations_for(&self, participant: &str) -> BackendResult<Vec<Conversation>> {
        let query = TableQuery::new(CONVERSATIONS_TABLE)
            .select("*")
            .contains("participants", &[participant])
            .order("updated_at", false);
        self.select(&query).await
    }

    async fn find_direct(&self, a: &str, b: &str) -> BackendResult<Vec<Conversation>> {
        let query = TableQuery::new(CONVERSATIONS_TABLE)
            .select("*")
            .contains("participants", &[a, b])
            .not_eq("is_group", "true");
        self.select(&query).await
    }

    async fn insert_conversation(&self, row: &NewConversation) -> BackendResult<Conversation> {
        self.insert(CONVERSATIONS_TABLE, row).await
    }

    async fn messages(&self, conversation_id: &str) -> BackendResult<Vec<Message>> {
        let query = TableQuery::new(MESSAGES_TABLE)
            .select("*,attachments(*)")
            .eq("conversation_id", conversation_id)
            .order("created_at", true);
        self.select(&query).await
    }

    async fn insert_message(&self, row: &NewMessage) -> BackendResult<Message> {
        self.insert(MESSAGES_TABLE, row).await
    }

    async fn insert_attachment(&self, row: &NewAttachment) -> BackendResult<Attachment> {
        self.insert(ATTACHMENTS_TABLE, row).await
    }
}
