//! Messages page

use super::format::{relative_time, truncate};
use crate::address::WalletAddress;
use crate::attachments::AttachmentStore;
use crate::messaging::{other_participant_label, Conversation, Message};
use chrono::{DateTime, Utc};

const THREAD_WIDTH: usize = 72;

/// Conversation list, one line per conversation
pub fn render_conversation_list(
    conversations: &[&Conversation],
    me: &WalletAddress,
    now: DateTime<Utc>,
) -> String {
    if conversations.is_empty() {
        return "No conversations yet. Start one with `kraken new <address>`.\n".to_string();
    }

    let mut out = String::new();
    for conversation in conversations {
        let preview = conversation
            .last_message
            .as_deref()
            .map(|m| truncate(m, 40))
            .unwrap_or_else(|| "No messages yet".to_string());
        let when = conversation
            .last_message_time
            .map(|t| relative_time(t, now))
            .unwrap_or_default();
        out.push_str(&format!(
            "{:<15} {:<40} {}\n  id: {}\n",
            other_participant_label(conversation, me),
            preview,
            when,
            conversation.id
        ));
    }
    out
}

/// Read receipt for an own message
fn ticks(message: &Message) -> &'static str {
    if message.read {
        "✓✓"
    } else {
        "✓"
    }
}

fn render_attachment(message: &Message, attachments: &AttachmentStore) -> Option<String> {
    let attachment = message.attachment()?;
    let kind = if attachment.is_image() { "image" } else { "file" };
    Some(format!(
        "[{}] {} {}",
        kind,
        attachment.file_name,
        attachments.public_url(&attachment.file_path)
    ))
}

/// Message thread; own messages are right-aligned with read ticks
pub fn render_thread(
    conversation: &Conversation,
    messages: &[Message],
    me: &WalletAddress,
    attachments: &AttachmentStore,
    now: DateTime<Utc>,
) -> String {
    let mut out = format!("Chat with {}\n\n", other_participant_label(conversation, me));
    if messages.is_empty() {
        out.push_str("No messages yet\n");
        return out;
    }

    for message in messages {
        let mut lines = Vec::new();
        if let Some(attachment) = render_attachment(message, attachments) {
            lines.push(attachment);
        }
        lines.push(message.content.clone());
        let when = relative_time(message.created_at, now);

        if message.is_from(me) {
            lines.push(format!("{} {}", when, ticks(message)));
            for line in lines {
                out.push_str(&format!("{:>width$}\n", line, width = THREAD_WIDTH));
            }
        } else {
            lines.push(when);
            for line in lines {
                out.push_str(&format!("{}\n", line));
            }
        }
        out.push('\n');
    }
    out
}
