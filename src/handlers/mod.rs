//! Specialized handlers
//!
//! One handler per `AgentType`. Handlers receive an already trimmed window
//! of the conversation and return the reply text.

use crate::error::OrchestrationError;
use crate::generation::TextGenerator;
use crate::goals::GoalStore;
use crate::models::{AgentType, ChatMessage};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

pub mod education;
pub mod goal_planning;
pub mod llm;

pub use education::{EducationHandler, HttpRetriever, Retriever};
pub use goal_planning::GoalPlanningHandler;
pub use llm::PromptHandler;

/// Input for a single handler invocation
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    pub thread_id: String,
    pub messages: Vec<ChatMessage>,
    pub verbose: bool,
}

/// A response-generating specialist.
///
/// Implementations may return any error; the dispatcher passes through
/// configuration errors and turns everything else into reply text.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn invoke(&self, request: HandlerRequest) -> Result<String>;
}

/// Keep fatal errors, convert the rest into an `"Error: ..."` reply
pub fn contain_failure(agent: AgentType, outcome: Result<String>) -> Result<String> {
    match outcome {
        Ok(text) => Ok(text),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(agent = %agent, error = %e, "Handler failed, returning error text");
            Ok(format!("Error: {}", e))
        }
    }
}

/// Fixed-response handler for tests and demos
pub struct StaticHandler {
    response: String,
}

impl StaticHandler {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl Handler for StaticHandler {
    async fn invoke(&self, _request: HandlerRequest) -> Result<String> {
        Ok(self.response.clone())
    }
}

/// Always fails with the given error message
pub struct FailingHandler {
    message: String,
    fatal: bool,
}

impl FailingHandler {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: false,
        }
    }

    pub fn unconfigured(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: true,
        }
    }
}

#[async_trait]
impl Handler for FailingHandler {
    async fn invoke(&self, _request: HandlerRequest) -> Result<String> {
        if self.fatal {
            Err(OrchestrationError::ConfigurationError(self.message.clone()))
        } else {
            Err(OrchestrationError::HandlerError(self.message.clone()))
        }
    }
}

/// The closed set of handlers, one per agent type
#[derive(Clone)]
pub struct HandlerTable {
    education: Arc<dyn Handler>,
    goal_planning: Arc<dyn Handler>,
    portfolio: Arc<dyn Handler>,
    market: Arc<dyn Handler>,
    news: Arc<dyn Handler>,
}

impl HandlerTable {
    pub fn new(
        education: Arc<dyn Handler>,
        goal_planning: Arc<dyn Handler>,
        portfolio: Arc<dyn Handler>,
        market: Arc<dyn Handler>,
        news: Arc<dyn Handler>,
    ) -> Self {
        Self {
            education,
            goal_planning,
            portfolio,
            market,
            news,
        }
    }

    /// Production wiring: prompt handlers over one generator, retrieval for
    /// education when a retriever is configured, goal context for planning.
    pub fn standard(
        generator: Arc<dyn TextGenerator>,
        retriever: Option<Arc<dyn Retriever>>,
        goals: Arc<GoalStore>,
    ) -> Self {
        let education: Arc<dyn Handler> = match retriever {
            Some(retriever) => Arc::new(EducationHandler::new(retriever, generator.clone())),
            None => Arc::new(PromptHandler::for_agent(AgentType::Education, generator.clone())),
        };

        Self {
            education,
            goal_planning: Arc::new(GoalPlanningHandler::new(goals, generator.clone())),
            portfolio: Arc::new(PromptHandler::for_agent(AgentType::Portfolio, generator.clone())),
            market: Arc::new(PromptHandler::for_agent(AgentType::Market, generator.clone())),
            news: Arc::new(PromptHandler::for_agent(AgentType::News, generator)),
        }
    }

    /// Every agent answered by `StaticHandler`s naming themselves
    pub fn echo() -> Self {
        let reply = |agent: AgentType| -> Arc<dyn Handler> {
            Arc::new(StaticHandler::new(format!("{} response", agent)))
        };

        Self {
            education: reply(AgentType::Education),
            goal_planning: reply(AgentType::GoalPlanning),
            portfolio: reply(AgentType::Portfolio),
            market: reply(AgentType::Market),
            news: reply(AgentType::News),
        }
    }

    /// Replace one entry
    pub fn with(mut self, agent: AgentType, handler: Arc<dyn Handler>) -> Self {
        match agent {
            AgentType::Education => self.education = handler,
            AgentType::GoalPlanning => self.goal_planning = handler,
            AgentType::Portfolio => self.portfolio = handler,
            AgentType::Market => self.market = handler,
            AgentType::News => self.news = handler,
        }
        self
    }

    pub fn get(&self, agent: AgentType) -> &Arc<dyn Handler> {
        match agent {
            AgentType::Education => &self.education,
            AgentType::GoalPlanning => &self.goal_planning,
            AgentType::Portfolio => &self.portfolio,
            AgentType::Market => &self.market,
            AgentType::News => &self.news,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> HandlerRequest {
        HandlerRequest {
            thread_id: "thread".to_string(),
            messages: vec![ChatMessage::user("hi")],
            verbose: false,
        }
    }

    #[tokio::test]
    async fn test_table_resolves_every_agent() {
        let table = HandlerTable::echo();
        for agent in AgentType::ALL {
            let reply = table.get(agent).invoke(request()).await.unwrap();
            assert_eq!(reply, format!("{} response", agent));
        }
    }

    #[tokio::test]
    async fn test_with_replaces_single_entry() {
        let table = HandlerTable::echo().with(AgentType::News, Arc::new(StaticHandler::new("headline")));
        assert_eq!(table.get(AgentType::News).invoke(request()).await.unwrap(), "headline");
        assert_eq!(
            table.get(AgentType::Market).invoke(request()).await.unwrap(),
            "market response"
        );
    }

    #[tokio::test]
    async fn test_contain_failure() {
        let soft = FailingHandler::new("quote service down").invoke(request()).await;
        assert_eq!(
            contain_failure(AgentType::Market, soft).unwrap(),
            "Error: Handler error: quote service down"
        );

        let hard = FailingHandler::unconfigured("GEMINI_API_KEY not configured")
            .invoke(request())
            .await;
        assert!(contain_failure(AgentType::Market, hard).unwrap_err().is_fatal());

        assert_eq!(
            contain_failure(AgentType::Market, Ok("fine".into())).unwrap(),
            "fine"
        );
    }
}
