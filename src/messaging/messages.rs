//! Message listing and sending

use super::models::{Message, NewAttachment, NewMessage};
use super::store::ChatStore;
use super::{MessagingError, MessagingResult};
use crate::address::WalletAddress;
use crate::attachments::{AttachmentStore, FileUpload};
use std::sync::Arc;

/// What the user typed and/or picked
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub text: String,
    pub file: Option<FileUpload>,
}

impl Draft {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            file: None,
        }
    }

    pub fn with_file(mut self, file: FileUpload) -> Self {
        self.file = Some(file);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.file.is_none()
    }
}

/// Summary stored as the content of a file message
pub fn file_message_content(file: &FileUpload) -> String {
    if file.is_image() {
        format!("Sent an image: {}", file.name)
    } else {
        format!("Sent a file: {}", file.name)
    }
}

/// Message operations inside a conversation
#[derive(Clone)]
pub struct MessageService {
    store: Arc<dyn ChatStore>,
    attachments: AttachmentStore,
}

impl MessageService {
    pub fn new(store: Arc<dyn ChatStore>, attachments: AttachmentStore) -> Self {
        Self { store, attachments }
    }

    pub fn attachments(&self) -> &AttachmentStore {
        &self.attachments
    }

    /// Messages of a conversation, oldest first
    pub async fn list_messages(&self, conversation_id: &str) -> MessagingResult<Vec<Message>> {
        let messages = self.store.messages(conversation_id).await?;
        tracing::debug!(conversation_id = %conversation_id, count = messages.len(), "Loaded messages");
        Ok(messages)
    }

    /// Send a draft as `sender`
    ///
    /// A file is uploaded first and replaces the text with a summary. The
    /// message row is inserted before the attachment row; if the latter fails
    /// the message stays.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        sender: &WalletAddress,
        draft: Draft,
    ) -> MessagingResult<Message> {
        if draft.is_empty() {
            return Err(MessagingError::EmptyMessage);
        }

        let uploaded = match &draft.file {
            Some(file) => Some(self.attachments.upload_message_file(file).await?),
            None => None,
        };

        let content = match &draft.file {
            Some(file) => file_message_content(file),
            None => draft.text.clone(),
        };

        let mut message = self
            .store
            .insert_message(&NewMessage {
                conversation_id: conversation_id.to_string(),
                sender: sender.to_string(),
                content,
            })
            .await?;

        if let (Some(file), Some(file_path)) = (draft.file, uploaded) {
            let row = NewAttachment {
                message_id: message.id.clone(),
                file_path,
                file_name: file.name.clone(),
                file_size: file.size(),
                file_type: file.content_type.clone(),
            };
            match self.store.insert_attachment(&row).await {
                Ok(attachment) => message.attachments.push(attachment),
                Err(source) => {
                    tracing::error!(message_id = %message.id, "Attachment insert failed: {}", source);
                    return Err(MessagingError::AttachmentInsert {
                        message_id: message.id,
                        source,
                    });
                }
            }
        }

        tracing::info!(conversation_id = %conversation_id, message_id = %message.id, "Message sent");
        Ok(message)
    }
}
