//! Text generation seam
//!
//! The supervisor and the prompt-driven handlers only need `text -> text`.
//! Gemini implements it in production; `ScriptedGenerator` keeps the system
//! functional without an LLM.

use crate::error::OrchestrationError;
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Opaque language model: system instruction + user prompt -> text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}

/// One scripted outcome
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    /// Non-fatal service failure
    Failure(String),
    /// Missing credentials
    Unconfigured,
}

/// Mock generator for development & testing.
/// Replays scripted replies in order, then repeats the fallback if one is set.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<ScriptedReply>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    /// Answers every call with the same text
    pub fn repeating(text: impl Into<String>) -> Self {
        Self {
            fallback: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| ScriptedReply::Text(t.into())).collect())
    }

    /// `(system, prompt)` pairs received so far
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push((system.to_string(), prompt.to_string()));
        }

        let next = self
            .replies
            .lock()
            .map_err(|_| OrchestrationError::LlmError("script lock poisoned".to_string()))?
            .pop_front();

        match next {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Failure(reason)) => Err(OrchestrationError::LlmError(reason)),
            Some(ScriptedReply::Unconfigured) => Err(OrchestrationError::ConfigurationError(
                "GEMINI_API_KEY not configured".to_string(),
            )),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| OrchestrationError::LlmError("script exhausted".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let generator = ScriptedGenerator::new(vec![
            ScriptedReply::Text("first".into()),
            ScriptedReply::Failure("503".into()),
            ScriptedReply::Unconfigured,
        ]);

        assert_eq!(generator.generate("sys", "a").await.unwrap(), "first");
        assert!(!generator.generate("sys", "b").await.unwrap_err().is_fatal());
        assert!(generator.generate("sys", "c").await.unwrap_err().is_fatal());
        assert!(generator.generate("sys", "d").await.is_err());
        assert_eq!(generator.prompts().len(), 4);
    }

    #[tokio::test]
    async fn test_repeating_generator() {
        let generator = ScriptedGenerator::repeating("same");
        for _ in 0..3 {
            assert_eq!(generator.generate("", "q").await.unwrap(), "same");
        }
        assert_eq!(generator.prompts()[2].1, "q");
    }
}
