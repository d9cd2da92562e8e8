//! Supervisor
//!
//! LLM-backed routing for questions the fast router could not place
//! confidently. May schedule several agents in sequence.

use crate::generation::TextGenerator;
use crate::models::{ContextHints, RoutingContext, SupervisorDecision};
use crate::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

pub mod parse;
pub mod prompt;

pub use parse::{fallback_decision, parse_decision};
pub use prompt::{build_prompt, SUPERVISOR_SYSTEM_PROMPT};

/// Full transparency view of one supervisor call
#[derive(Debug, Clone, Serialize)]
pub struct SupervisorAnalysis {
    pub decision: SupervisorDecision,
    pub prompt_sent: String,
    pub raw_response: Option<String>,
}

pub struct Supervisor {
    generator: Arc<dyn TextGenerator>,
}

impl Supervisor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Decide which agent(s) answer the question.
    ///
    /// Only a configuration error is returned as `Err`; malformed output and
    /// service failures fall back to the keyword heuristic.
    pub async fn decide(
        &self,
        question: &str,
        context: Option<&RoutingContext>,
        hints: Option<&ContextHints>,
    ) -> Result<SupervisorDecision> {
        Ok(self.analyze(question, context, hints).await?.decision)
    }

    pub async fn analyze(
        &self,
        question: &str,
        context: Option<&RoutingContext>,
        hints: Option<&ContextHints>,
    ) -> Result<SupervisorAnalysis> {
        let prompt = build_prompt(question, context, hints);

        let (decision, raw_response) =
            match self.generator.generate(SUPERVISOR_SYSTEM_PROMPT, &prompt).await {
                Ok(response) => (parse_decision(&response, question), Some(response)),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Supervisor generation failed, using fallback routing");
                    (
                        fallback_decision(question, &format!("Generation error: {}", e)),
                        None,
                    )
                }
            };

        info!(
            primary = %decision.primary_agent,
            secondary = ?decision.secondary_agents,
            mode = ?decision.execution_mode,
            "Supervisor decision"
        );

        Ok(SupervisorAnalysis {
            decision,
            prompt_sent: prompt,
            raw_response,
        })
    }
}
