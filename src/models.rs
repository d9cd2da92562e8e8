//! Core data models for routing and orchestration

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

//
// ================= Agents =================
//

/// The closed set of specialized handlers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Education,
    GoalPlanning,
    Portfolio,
    Market,
    News,
}

impl AgentType {
    pub const ALL: [AgentType; 5] = [
        AgentType::Education,
        AgentType::GoalPlanning,
        AgentType::Portfolio,
        AgentType::Market,
        AgentType::News,
    ];

    /// Wire name, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Education => "education",
            AgentType::GoalPlanning => "goal_planning",
            AgentType::Portfolio => "portfolio",
            AgentType::Market => "market",
            AgentType::News => "news",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentType::ALL
            .iter()
            .copied()
            .find(|agent| agent.as_str() == s)
            .ok_or_else(|| format!("unknown agent type: {}", s))
    }
}

//
// ================= Fast Router =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Direct,
    Supervisor,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeywordScore {
    pub agent: AgentType,
    pub score: f64,
}

/// What the fast router learned, handed to the supervisor when it defers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContextHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_matched: Option<String>,
    /// Top three agents by keyword score, descending
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyword_scores: Vec<KeywordScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<f64>,
}

impl ContextHints {
    pub fn is_empty(&self) -> bool {
        self.pattern_matched.is_none()
            && self.keyword_scores.is_empty()
            && self.winner_score.is_none()
            && self.margin.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouterDecision {
    pub route: RouteKind,
    pub agent: Option<AgentType>,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub context_hints: ContextHints,
}

impl RouterDecision {
    pub fn direct(
        agent: AgentType,
        confidence: f64,
        reasoning: String,
        context_hints: ContextHints,
    ) -> Self {
        Self {
            route: RouteKind::Direct,
            agent: Some(agent),
            confidence,
            reasoning,
            context_hints,
        }
    }

    pub fn supervisor(confidence: f64, reasoning: String, context_hints: ContextHints) -> Self {
        Self {
            route: RouteKind::Supervisor,
            agent: None,
            confidence,
            reasoning,
            context_hints,
        }
    }

    /// The agent to run when the route is direct.
    pub fn direct_agent(&self) -> Option<AgentType> {
        match self.route {
            RouteKind::Direct => self.agent,
            RouteKind::Supervisor => None,
        }
    }
}

//
// ================= Supervisor =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Single,
    Sequential,
    Parallel,
}

impl ExecutionMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "single" => Some(ExecutionMode::Single),
            "sequential" => Some(ExecutionMode::Sequential),
            "parallel" => Some(ExecutionMode::Parallel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupervisorDecision {
    pub primary_agent: AgentType,
    #[serde(default)]
    pub secondary_agents: Vec<AgentType>,
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    pub reasoning: String,
    #[serde(default)]
    pub workflow_steps: Vec<String>,
}

impl SupervisorDecision {
    pub fn single(agent: AgentType, reasoning: String) -> Self {
        Self {
            primary_agent: agent,
            secondary_agents: Vec::new(),
            execution_mode: ExecutionMode::Single,
            reasoning,
            workflow_steps: Vec::new(),
        }
    }

    /// `[primary] + secondary`, in execution order.
    pub fn agents_queue(&self) -> Vec<AgentType> {
        let mut queue = Vec::with_capacity(1 + self.secondary_agents.len());
        queue.push(self.primary_agent);
        queue.extend(self.secondary_agents.iter().copied());
        queue
    }
}

//
// ================= Execution Plan =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionPlan {
    pub agents_queue: Vec<AgentType>,
    pub current_index: usize,
    pub needs_synthesis: bool,
}

impl ExecutionPlan {
    pub fn new(agents_queue: Vec<AgentType>) -> Self {
        Self {
            agents_queue,
            current_index: 0,
            needs_synthesis: true,
        }
    }

    pub fn next_agent(&self) -> Option<AgentType> {
        self.agents_queue.get(self.current_index).copied()
    }

    /// Called exactly once per completed handler.
    pub fn advance(&mut self) {
        self.current_index += 1;
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_index >= self.agents_queue.len()
    }
}

//
// ================= User Context =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Low,
    Medium,
    High,
}

impl RiskTolerance {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Some(RiskTolerance::Low),
            "medium" | "moderate" => Some(RiskTolerance::Medium),
            "high" => Some(RiskTolerance::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskTolerance::Low => "low",
            RiskTolerance::Medium => "medium",
            RiskTolerance::High => "high",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InvestmentStage {
    #[default]
    Unknown,
    /// Researching, not yet invested
    Potential,
    Current,
}

/// Soft signals accumulated over a thread.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserContext {
    /// `None` means unknown, which is not penalized by the router
    #[serde(default)]
    pub has_portfolio: Option<bool>,
    #[serde(default)]
    pub active_goals: Vec<u32>,
    #[serde(default)]
    pub risk_tolerance: Option<RiskTolerance>,
    #[serde(default)]
    pub investment_stage: InvestmentStage,
    #[serde(default)]
    pub last_agent: Option<AgentType>,
}

/// Router input: the persisted user context plus the previous handler.
#[derive(Debug, Clone, Default)]
pub struct RoutingContext {
    pub user_context: UserContext,
    pub last_agent: Option<AgentType>,
}

//
// ================= Conversation =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// The single mutable record threaded through one request and persisted per thread.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationState {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub router_decision: Option<RouterDecision>,
    #[serde(default)]
    pub supervisor_decision: Option<SupervisorDecision>,
    #[serde(default)]
    pub user_context: UserContext,
    /// Insertion order is completion order
    #[serde(default)]
    pub agent_results: IndexMap<AgentType, String>,
    #[serde(default)]
    pub current_agent: Option<AgentType>,
    #[serde(default)]
    pub agents_completed: Vec<AgentType>,
    #[serde(default)]
    pub execution_plan: Option<ExecutionPlan>,
    #[serde(default)]
    pub final_response: Option<String>,
}

impl ConversationState {
    /// Clear per-request fields and append the new user message.
    /// Messages, user context and the last agent carry over.
    pub fn begin_turn(&mut self, question: &str) {
        self.router_decision = None;
        self.supervisor_decision = None;
        self.agent_results.clear();
        self.agents_completed.clear();
        self.execution_plan = None;
        self.final_response = None;
        self.messages.push(ChatMessage::user(question));
    }

    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
    }

    pub fn routing_context(&self) -> RoutingContext {
        RoutingContext {
            user_context: self.user_context.clone(),
            last_agent: self.current_agent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_type_wire_names() {
        for agent in AgentType::ALL {
            let json = serde_json::to_string(&agent).unwrap();
            assert_eq!(json, format!("\"{}\"", agent.as_str()));
            assert_eq!(agent.as_str().parse::<AgentType>().unwrap(), agent);
        }
        assert!("tax".parse::<AgentType>().is_err());
        assert!("Portfolio".parse::<AgentType>().is_err());
    }

    #[test]
    fn test_execution_plan_cursor() {
        let mut plan = ExecutionPlan::new(vec![AgentType::GoalPlanning, AgentType::Portfolio]);
        assert_eq!(plan.next_agent(), Some(AgentType::GoalPlanning));
        plan.advance();
        assert_eq!(plan.current_index, 1);
        assert_eq!(plan.next_agent(), Some(AgentType::Portfolio));
        assert!(!plan.is_exhausted());
        plan.advance();
        assert!(plan.is_exhausted());
        assert_eq!(plan.next_agent(), None);
    }

    #[test]
    fn test_begin_turn_keeps_thread_data() {
        let mut state = ConversationState::default();
        state.begin_turn("first");
        state.messages.push(ChatMessage::assistant("answer"));
        state.agent_results.insert(AgentType::Market, "answer".into());
        state.agents_completed.push(AgentType::Market);
        state.current_agent = Some(AgentType::Market);
        state.user_context.has_portfolio = Some(true);
        state.final_response = Some("answer".into());

        state.begin_turn("second");

        assert_eq!(state.messages.len(), 3);
        assert_eq!(state.last_user_message(), Some("second"));
        assert!(state.agent_results.is_empty());
        assert!(state.agents_completed.is_empty());
        assert!(state.final_response.is_none());
        assert_eq!(state.current_agent, Some(AgentType::Market));
        assert_eq!(state.user_context.has_portfolio, Some(true));
    }

    #[test]
    fn test_state_wire_shape() {
        let mut state = ConversationState::default();
        state.begin_turn("How is my portfolio performing?");
        state.agent_results.insert(AgentType::GoalPlanning, "plan".into());

        let value = serde_json::to_value(&state).unwrap();
        for field in [
            "messages",
            "user_context",
            "agent_results",
            "agents_completed",
            "execution_plan",
            "final_response",
        ] {
            assert!(value.get(field).is_some(), "missing field {}", field);
        }
        assert!(value["execution_plan"].is_null());
        assert!(value["final_response"].is_null());
        assert_eq!(value["agent_results"]["goal_planning"], "plan");
        assert_eq!(value["messages"][0]["role"], "user");

        let back: ConversationState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }
}
