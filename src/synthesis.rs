//! Result synthesis
//!
//! Merges handler outputs into the final reply. One result passes through
//! untouched; several become labeled sections in completion order.

use crate::models::AgentType;
use indexmap::IndexMap;

const RULE_WIDTH: usize = 70;

pub const NO_RESPONSE: &str = "No specialized agent produced a response for this question.";

pub fn synthesize(agent_results: &IndexMap<AgentType, String>) -> String {
    match agent_results.len() {
        0 => NO_RESPONSE.to_string(),
        1 => agent_results
            .values()
            .next()
            .cloned()
            .unwrap_or_else(|| NO_RESPONSE.to_string()),
        n => synthesize_sections(agent_results, n),
    }
}

fn synthesize_sections(agent_results: &IndexMap<AgentType, String>, count: usize) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut parts: Vec<String> = Vec::with_capacity(agent_results.len() * 4 + 4);

    for (agent, result) in agent_results {
        parts.push(format!("**{} ANALYSIS**", agent.as_str().to_uppercase()));
        parts.push(rule.clone());
        parts.push(result.clone());
        parts.push(String::new());
    }

    parts.push(rule.clone());
    parts.push("**COMPREHENSIVE ANALYSIS**".to_string());
    parts.push(rule);
    parts.push(format!(
        "Based on the analysis from {} specialized agents above, you now have a complete answer to your question.",
        count
    ));

    parts.join("\n")
}
