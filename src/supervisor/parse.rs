//! Supervisor response parsing and heuristic fallback
//!
//! Parsing never fails: anything unusable degrades to a single-agent
//! decision picked by keyword heuristics.

use crate::error::OrchestrationError;
use crate::models::{AgentType, ExecutionMode, SupervisorDecision};
use serde_json::Value;
use tracing::warn;

const DEFAULT_REASONING: &str = "Supervisor routing decision";

/// Heuristic buckets, checked in order. The tax bucket is answered by education.
const FALLBACK_BUCKETS: &[(&str, AgentType, &[&str])] = &[
    ("portfolio", AgentType::Portfolio, &["portfolio", "holdings", "my stocks"]),
    ("goal_planning", AgentType::GoalPlanning, &["save", "goal", "retirement plan"]),
    ("market", AgentType::Market, &["market", "sector", "index"]),
    ("news", AgentType::News, &["invest", "should i", "risks"]),
    ("tax", AgentType::Education, &["tax", "deduction", "ira", "401k"]),
];

/// Greedy extraction: first `{` through last `}`.
pub fn extract_json(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

pub fn parse_decision(response: &str, question: &str) -> SupervisorDecision {
    let Some(json) = extract_json(response) else {
        return fallback_decision(question, "No JSON in response");
    };

    match decision_from_json(json) {
        Ok(decision) => decision,
        Err(e) => {
            warn!(error = %e, "Supervisor response could not be parsed");
            fallback_decision(question, &format!("Parsing error: {}", e))
        }
    }
}

fn decision_from_json(json: &str) -> crate::Result<SupervisorDecision> {
    let data: Value = serde_json::from_str(json)
        .map_err(|e| OrchestrationError::SupervisorParseError(e.to_string()))?;

    let object = data.as_object().ok_or_else(|| {
        OrchestrationError::SupervisorParseError("response is not a JSON object".to_string())
    })?;

    let primary_agent = object
        .get("primary_agent")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<AgentType>().ok())
        .unwrap_or(AgentType::Education);

    let mut secondary_agents: Vec<AgentType> = Vec::new();
    if let Some(entries) = object.get("secondary_agents").and_then(Value::as_array) {
        for agent in entries
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|s| s.parse::<AgentType>().ok())
        {
            if agent != primary_agent && !secondary_agents.contains(&agent) {
                secondary_agents.push(agent);
            }
        }
    }

    let execution_mode = object
        .get("execution_mode")
        .and_then(Value::as_str)
        .and_then(ExecutionMode::parse)
        .unwrap_or(ExecutionMode::Single);

    let reasoning = object
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_REASONING)
        .to_string();

    let mut decision = SupervisorDecision {
        primary_agent,
        secondary_agents,
        execution_mode,
        reasoning,
        workflow_steps: Vec::new(),
    };
    decision.workflow_steps = workflow_steps(&decision);

    Ok(decision)
}

/// Numbered steps, only for sequential runs with more than one agent
fn workflow_steps(decision: &SupervisorDecision) -> Vec<String> {
    if decision.execution_mode != ExecutionMode::Sequential || decision.secondary_agents.is_empty()
    {
        return Vec::new();
    }

    let agents = decision.agents_queue();
    let mut steps: Vec<String> = agents
        .iter()
        .enumerate()
        .map(|(i, agent)| format!("{}. Call {} agent", i + 1, agent))
        .collect();
    steps.push(format!("{}. Synthesize results", agents.len() + 1));
    steps
}

/// Keyword heuristic used whenever the model's answer is unusable
pub fn fallback_decision(question: &str, cause: &str) -> SupervisorDecision {
    let question_lower = question.to_lowercase();

    let (bucket, agent) = FALLBACK_BUCKETS
        .iter()
        .find(|(_, _, words)| words.iter().any(|w| question_lower.contains(w)))
        .map(|(bucket, agent, _)| (*bucket, *agent))
        .unwrap_or(("education", AgentType::Education));

    SupervisorDecision::single(
        agent,
        format!("Fallback routing ({}): Heuristic matched '{}'", cause, bucket),
    )
}
