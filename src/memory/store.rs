//! Conversation transcript rendering
//!
//! Handlers receive their trimmed window as plain text.

use crate::models::{ChatMessage, MessageRole};

fn role_label(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "**User**",
        MessageRole::Assistant => "**Assistant**",
        MessageRole::System => "**System**",
    }
}

/// Formatted conversation for LLM prompts
pub fn format_transcript(messages: &[ChatMessage]) -> String {
    let mut context = String::new();
    context.push_str("## Conversation History\n\n");

    for msg in messages {
        context.push_str(role_label(msg.role));
        context.push_str(": ");
        context.push_str(&msg.content);
        context.push_str("\n\n");
    }

    context
}

/// Text of the most recent user message in the window
pub fn latest_user_message(messages: &[ChatMessage]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::User)
        .map(|m| m.content.as_str())
}
