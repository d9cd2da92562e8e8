//! Prompt-driven handler: fixed system prompt + transcript -> generator

use super::{Handler, HandlerRequest};
use crate::generation::TextGenerator;
use crate::memory::format_transcript;
use crate::models::AgentType;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

const EDUCATION_PROMPT: &str = "You are a financial educator. Explain financial concepts, accounts and \
taxation clearly and accurately for a non-expert. Use short examples. Do not give personalized investment advice.";

const GOAL_PLANNING_PROMPT: &str = "You are a financial goal planner. Help the user define savings goals, \
estimate required monthly savings and judge whether they are on track. Show the numbers you use.";

const PORTFOLIO_PROMPT: &str = "You are a portfolio analyst for current investors. Discuss diversification, \
concentration, risk and performance of the holdings the user describes. Ask for holdings if none are given.";

const MARKET_PROMPT: &str = "You are a market analyst. Describe market conditions, indices, sectors and \
individual stocks or ETFs the user asks about. State that data may be delayed.";

const NEWS_PROMPT: &str = "You are an investment research assistant. Summarize recent developments, the bull \
and bear case and key risks for the companies the user is considering. Stay balanced.";

const RESPONSE_INSTRUCTION: &str = "Respond to the latest user message, using earlier messages only as context.";

pub fn system_prompt_for(agent: AgentType) -> &'static str {
    match agent {
        AgentType::Education => EDUCATION_PROMPT,
        AgentType::GoalPlanning => GOAL_PLANNING_PROMPT,
        AgentType::Portfolio => PORTFOLIO_PROMPT,
        AgentType::Market => MARKET_PROMPT,
        AgentType::News => NEWS_PROMPT,
    }
}

/// Renders the window into a user prompt, prefixed by optional extra context
pub(crate) fn render_prompt(extra_context: Option<&str>, request: &HandlerRequest) -> String {
    let transcript = format_transcript(&request.messages);
    match extra_context {
        Some(extra) => format!("{}\n\n{}\n{}", extra, transcript, RESPONSE_INSTRUCTION),
        None => format!("{}\n{}", transcript, RESPONSE_INSTRUCTION),
    }
}

pub struct PromptHandler {
    agent: AgentType,
    system_prompt: &'static str,
    generator: Arc<dyn TextGenerator>,
}

impl PromptHandler {
    pub fn for_agent(agent: AgentType, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            agent,
            system_prompt: system_prompt_for(agent),
            generator,
        }
    }
}

#[async_trait]
impl Handler for PromptHandler {
    async fn invoke(&self, request: HandlerRequest) -> Result<String> {
        let prompt = render_prompt(None, &request);

        if request.verbose {
            info!(
                thread_id = %request.thread_id,
                agent = %self.agent,
                messages = request.messages.len(),
                "Invoking prompt handler"
            );
        }

        self.generator.generate(self.system_prompt, &prompt).await
    }
}
