//! Supervisor prompt construction

use crate::models::{ContextHints, InvestmentStage, RoutingContext};

pub const SUPERVISOR_SYSTEM_PROMPT: &str = r#"You are a routing supervisor for a financial assistant with 5 specialized agents.

Agents:
- education: financial concepts, definitions, how things work, taxes and accounts
- goal_planning: savings goals, required monthly savings, goal progress and priorities
- portfolio: analysis of holdings the user ALREADY owns (diversification, risk, performance)
- market: market conditions, indices, sectors, individual stock and ETF data
- news: investment research, news and risks for companies the user is considering

Rules:
- Prefer a single agent unless the question clearly needs several.
- Use "sequential" when one agent's output informs the next (e.g. goal first, then portfolio).
- Only choose portfolio when the user owns investments.

Respond with JSON only."#;

/// Full user-side prompt: question, rendered context, expected JSON shape.
pub fn build_prompt(
    question: &str,
    context: Option<&RoutingContext>,
    hints: Option<&ContextHints>,
) -> String {
    let context_info = format_context(context, hints);

    format!(
        r#"User Question: "{question}"

{context_info}

Analyze the question and provide your routing decision in JSON format.

Required JSON structure:
{{
  "primary_agent": "education|goal_planning|portfolio|market|news",
  "secondary_agents": [],
  "execution_mode": "single|sequential|parallel",
  "reasoning": "explanation of routing decision"
}}

Your JSON response:
"#
    )
}

/// Readable rendering of the user context and the fast router's hints
pub fn format_context(context: Option<&RoutingContext>, hints: Option<&ContextHints>) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(ctx) = context {
        parts.push("**Context:**".to_string());

        let user = &ctx.user_context;
        if user.has_portfolio == Some(true) {
            parts.push("- User has an existing portfolio".to_string());
        }
        if !user.active_goals.is_empty() {
            parts.push(format!("- User has {} active goal(s)", user.active_goals.len()));
        }
        if let Some(risk) = user.risk_tolerance {
            parts.push(format!("- User risk tolerance: {}", risk));
        }
        match user.investment_stage {
            InvestmentStage::Potential => parts.push(
                "- User is researching potential investments (not yet invested)".to_string(),
            ),
            InvestmentStage::Current => parts.push("- User is a current investor".to_string()),
            InvestmentStage::Unknown => {}
        }
        if let Some(agent) = ctx.last_agent {
            parts.push(format!("- Last agent used: {}", agent));
        }
    }

    if let Some(hints) = hints.filter(|h| !h.is_empty()) {
        parts.push("\n**Fast Router Analysis:**".to_string());

        if !hints.keyword_scores.is_empty() {
            let top: Vec<String> = hints
                .keyword_scores
                .iter()
                .take(3)
                .map(|s| format!("{} {:.2}", s.agent, s.score))
                .collect();
            parts.push(format!("- Top keyword matches: {}", top.join(", ")));
        }
        if let Some(pattern) = &hints.pattern_matched {
            parts.push(format!("- Pattern matched: {}", pattern));
        }
        if let (Some(score), Some(margin)) = (hints.winner_score, hints.margin) {
            parts.push(format!("- Score: {:.2}, Margin: {:.2}", score, margin));
        }
    }

    if parts.is_empty() {
        return "**Context:** No additional context available".to_string();
    }

    parts.join("\n")
}
