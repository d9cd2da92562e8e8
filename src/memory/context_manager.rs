//! Context Window Management
//!
//! Each handler sees only the tail of the conversation. Focused handlers
//! (education, market, news) get a short window; handlers that track
//! state over time (goal planning, portfolio) get a longer one.

use crate::models::{AgentType, ChatMessage, MessageRole};
use tracing::debug;

/// Configuration for per-handler context windows
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Window for education, market and news (3 turns)
    pub focused_window: usize,
    /// Window for goal planning and portfolio (7-8 turns)
    pub history_window: usize,
    /// Window for unrecognized handler labels
    pub default_window: usize,
    /// Estimated-token budget. Advisory only.
    pub max_context_tokens: usize,
    /// Message count above which trimming is recommended
    pub max_messages_before_trim: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            focused_window: 6,
            history_window: 15,
            default_window: 10,
            max_context_tokens: 4000,
            max_messages_before_trim: 20,
        }
    }
}

/// Selects the message window each handler receives
#[derive(Debug, Clone, Default)]
pub struct ContextTrimmer {
    config: ContextConfig,
}

impl ContextTrimmer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn window_for(&self, agent: AgentType) -> usize {
        match agent {
            AgentType::Education | AgentType::Market | AgentType::News => {
                self.config.focused_window
            }
            AgentType::GoalPlanning | AgentType::Portfolio => self.config.history_window,
        }
    }

    /// Last N messages for the handler, unmodified and in order
    pub fn trim_for_agent<'a>(&self, messages: &'a [ChatMessage], agent: AgentType) -> &'a [ChatMessage] {
        let window = self.window_for(agent);
        let trimmed = last_n(messages, window);

        debug!(
            agent = %agent,
            window,
            kept = trimmed.len(),
            context = %self.context_summary(trimmed),
            "Trimmed context for handler"
        );

        trimmed
    }

    /// Same as `trim_for_agent`, for a free-form handler label
    pub fn trim_for_label<'a>(&self, messages: &'a [ChatMessage], label: &str) -> &'a [ChatMessage] {
        match label.parse::<AgentType>() {
            Ok(agent) => self.trim_for_agent(messages, agent),
            Err(_) => last_n(messages, self.config.default_window),
        }
    }

    /// Whether the history has outgrown the configured limits
    pub fn should_trim(&self, messages: &[ChatMessage]) -> bool {
        messages.len() > self.config.max_messages_before_trim
            || estimate_tokens(messages) > self.config.max_context_tokens
    }

    /// One-line description for logs
    pub fn context_summary(&self, messages: &[ChatMessage]) -> String {
        if messages.is_empty() {
            return "Empty conversation".to_string();
        }

        let user = messages.iter().filter(|m| m.role == MessageRole::User).count();
        let assistant = messages
            .iter()
            .filter(|m| m.role == MessageRole::Assistant)
            .count();

        format!(
            "{} messages ({} turns) - ~{} tokens - {} user, {} assistant",
            messages.len(),
            messages.len() / 2,
            estimate_tokens(messages),
            user,
            assistant
        )
    }
}

fn last_n(messages: &[ChatMessage], n: usize) -> &[ChatMessage] {
    &messages[messages.len().saturating_sub(n)..]
}

/// Rough token estimate: 4 characters per token plus 20% structural overhead
pub fn estimate_tokens(messages: &[ChatMessage]) -> usize {
    let chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
    (chars as f64 / 4.0 * 1.2) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(n: usize) -> Vec<ChatMessage> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("Question {}", i))
                } else {
                    ChatMessage::assistant(format!("Answer {}", i))
                }
            })
            .collect()
    }

    #[test]
    fn test_windows_per_agent() {
        let trimmer = ContextTrimmer::new();
        let messages = conversation(20);

        assert_eq!(trimmer.trim_for_agent(&messages, AgentType::Education).len(), 6);
        assert_eq!(trimmer.trim_for_agent(&messages, AgentType::Market).len(), 6);
        assert_eq!(trimmer.trim_for_agent(&messages, AgentType::News).len(), 6);
        assert_eq!(trimmer.trim_for_agent(&messages, AgentType::Portfolio).len(), 15);
        assert_eq!(trimmer.trim_for_agent(&messages, AgentType::GoalPlanning).len(), 15);
        assert_eq!(trimmer.trim_for_label(&messages, "general").len(), 10);
        assert_eq!(trimmer.trim_for_label(&messages, "market").len(), 6);
    }

    #[test]
    fn test_trim_keeps_tail_in_order() {
        let trimmer = ContextTrimmer::new();
        let messages = conversation(9);

        let trimmed = trimmer.trim_for_agent(&messages, AgentType::News);
        assert_eq!(trimmed, &messages[3..]);
        assert_eq!(trimmed.last().unwrap().content, "Question 8");
    }

    #[test]
    fn test_short_history_untouched() {
        let trimmer = ContextTrimmer::new();
        let messages = conversation(3);
        assert_eq!(trimmer.trim_for_agent(&messages, AgentType::Portfolio), &messages[..]);
        assert!(trimmer.trim_for_agent(&[], AgentType::Market).is_empty());
    }

    #[test]
    fn test_estimate_tokens() {
        let messages = vec![ChatMessage::user("Hello world")];
        assert_eq!(estimate_tokens(&messages), 3);
        assert_eq!(estimate_tokens(&[]), 0);
    }

    #[test]
    fn test_should_trim() {
        let trimmer = ContextTrimmer::new();
        assert!(!trimmer.should_trim(&vec![ChatMessage::user("Hi"); 5]));
        assert!(trimmer.should_trim(&vec![ChatMessage::user("Hi"); 30]));
        assert!(trimmer.should_trim(&[ChatMessage::user("x".repeat(20_000))]));
    }

    #[test]
    fn test_context_summary() {
        let trimmer = ContextTrimmer::new();
        let messages = vec![
            ChatMessage::user("Hello"),
            ChatMessage::assistant("Hi there!"),
            ChatMessage::user("How are you?"),
        ];
        let summary = trimmer.context_summary(&messages);
        assert!(summary.starts_with("3 messages (1 turns)"));
        assert!(summary.ends_with("2 user, 1 assistant"));
        assert_eq!(trimmer.context_summary(&[]), "Empty conversation");
    }
}
