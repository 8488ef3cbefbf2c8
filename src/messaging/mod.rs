//! Messaging
//!
//! Conversations, messages with attachments, and live refresh of an open
//! conversation.

pub mod conversations;
pub mod live;
pub mod messages;
pub mod models;
pub mod store;

pub use conversations::{filter_by_participant, other_participant_label, ConversationService};
pub use live::LiveConversation;
pub use messages::{Draft, MessageService};
pub use models::{Attachment, Conversation, Message, NewAttachment, NewConversation, NewMessage};
pub use store::ChatStore;

use crate::address::InvalidAddress;
use crate::backend::BackendError;
use thiserror::Error;

/// Messaging errors
#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("You can't start a conversation with yourself")]
    SelfConversation,

    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddress),

    #[error("Nothing to send")]
    EmptyMessage,

    /// The message row exists; only its attachment row is missing
    #[error("Message {message_id} was sent but its attachment could not be saved: {source}")]
    AttachmentInsert {
        message_id: String,
        #[source]
        source: BackendError,
    },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Result type alias for messaging operations
pub type MessagingResult<T> = Result<T, MessagingError>;
