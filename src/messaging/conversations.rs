//! Conversation listing and direct-conversation lookup

use super::models::{Conversation, NewConversation};
use super::store::ChatStore;
use super::{MessagingError, MessagingResult};
use crate::address::{abbreviate, WalletAddress};
use chrono::Utc;
use std::sync::Arc;

/// Conversation operations for the signed-in identity
#[derive(Clone)]
pub struct ConversationService {
    store: Arc<dyn ChatStore>,
}

impl ConversationService {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }

    /// Conversations `me` takes part in, most recently updated first
    pub async fn list_for(&self, me: &WalletAddress) -> MessagingResult<Vec<Conversation>> {
        let conversations = self.store.conversations_for(me.as_str()).await?;
        tracing::debug!(address = %me, count = conversations.len(), "Loaded conversations");
        Ok(conversations)
    }

    /// Reuse the direct conversation between `me` and `other`, or create it
    ///
    /// The existence check and the insert are separate requests, so two
    /// clients making first contact at once can both insert.
    pub async fn find_or_create_direct(
        &self,
        me: &WalletAddress,
        other: &str,
    ) -> MessagingResult<Conversation> {
        let other = WalletAddress::parse(other)?;
        if &other == me {
            return Err(MessagingError::SelfConversation);
        }

        let existing = self.store.find_direct(me.as_str(), other.as_str()).await?;
        if let Some(conversation) = existing.into_iter().next() {
            tracing::debug!(conversation_id = %conversation.id, "Reusing direct conversation");
            return Ok(conversation);
        }

        let row = NewConversation {
            participants: vec![me.to_string(), other.to_string()],
            is_group: false,
            last_message: None,
            last_message_time: Utc::now(),
        };
        let created = self.store.insert_conversation(&row).await?;
        tracing::info!(conversation_id = %created.id, with = %other, "Created direct conversation");
        Ok(created)
    }
}

/// Conversations with a participant containing `query`, case-insensitively
pub fn filter_by_participant<'a>(conversations: &'a [Conversation], query: &str) -> Vec<&'a Conversation> {
    let needle = query.trim().to_lowercase();
    conversations
        .iter()
        .filter(|c| {
            needle.is_empty()
                || c.participants
                    .iter()
                    .any(|p| p.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Short label for the other side of a conversation
pub fn other_participant_label(conversation: &Conversation, me: &WalletAddress) -> String {
    conversation
        .other_participant(me)
        .map(abbreviate)
        .unwrap_or_else(|| "Unknown".to_string())
}
