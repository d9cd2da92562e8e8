//! Request dispatcher
//!
//! Drives one request through the routing state machine:
//! fast routing, optional supervision, one or more handlers, optional
//! synthesis. All per-request data lives in the `ConversationState`.

use crate::error::OrchestrationError;
use crate::handlers::{contain_failure, HandlerRequest, HandlerTable};
use crate::memory::ContextTrimmer;
use crate::models::{
    AgentType, ChatMessage, ConversationState, ExecutionMode, ExecutionPlan, InvestmentStage,
    RouteKind,
};
use crate::router::FastRouter;
use crate::supervisor::Supervisor;
use crate::synthesis::synthesize;
use crate::Result;
use tracing::{debug, info, warn};

/// Upper bound on transitions for a single request
const MAX_TRANSITIONS: usize = 32;

const POTENTIAL_INVESTOR_PHRASES: &[&str] = &["should i invest", "thinking about investing"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    FastRouting,
    Supervising,
    AgentExec(AgentType),
    SequenceRouting,
    Synthesizing,
    Terminal,
}

pub struct Dispatcher {
    supervisor: Supervisor,
    handlers: HandlerTable,
    trimmer: ContextTrimmer,
    verbose: bool,
}

impl Dispatcher {
    pub fn new(supervisor: Supervisor, handlers: HandlerTable, trimmer: ContextTrimmer) -> Self {
        Self {
            supervisor,
            handlers,
            trimmer,
            verbose: false,
        }
    }

    /// Pass `verbose` through to every handler invocation
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run from `FastRouting` to `Terminal`, returning the visited states.
    pub async fn run(&self, thread_id: &str, state: &mut ConversationState) -> Result<Vec<DispatchState>> {
        let mut current = DispatchState::FastRouting;
        let mut trace = vec![current];

        while current != DispatchState::Terminal {
            if trace.len() > MAX_TRANSITIONS {
                return Err(OrchestrationError::InvalidPlan(format!(
                    "Dispatch exceeded {} transitions",
                    MAX_TRANSITIONS
                )));
            }

            current = self.step(thread_id, current, state).await?;
            trace.push(current);
        }

        debug!(thread_id = %thread_id, transitions = trace.len() - 1, "Dispatch finished");
        Ok(trace)
    }

    /// Perform one transition
    pub async fn step(
        &self,
        thread_id: &str,
        current: DispatchState,
        state: &mut ConversationState,
    ) -> Result<DispatchState> {
        match current {
            DispatchState::FastRouting => self.fast_route(thread_id, state),
            DispatchState::Supervising => self.supervise(thread_id, state).await,
            DispatchState::AgentExec(agent) => self.execute_agent(thread_id, agent, state).await,
            DispatchState::SequenceRouting => Ok(next_in_sequence(state)),
            DispatchState::Synthesizing => {
                let response = synthesize(&state.agent_results);
                info!(
                    thread_id = %thread_id,
                    handlers = state.agent_results.len(),
                    "Synthesized multi-agent response"
                );
                state.messages.push(ChatMessage::assistant(response.clone()));
                state.final_response = Some(response);
                Ok(DispatchState::Terminal)
            }
            DispatchState::Terminal => Ok(DispatchState::Terminal),
        }
    }

    fn fast_route(&self, thread_id: &str, state: &mut ConversationState) -> Result<DispatchState> {
        let question = latest_question(state)?;
        let context = state.routing_context();
        let decision = FastRouter::route(&question, Some(&context));

        info!(
            thread_id = %thread_id,
            route = ?decision.route,
            agent = ?decision.agent,
            confidence = decision.confidence,
            "Fast router decision"
        );

        let next = match (decision.route, decision.direct_agent()) {
            (RouteKind::Direct, Some(agent)) => DispatchState::AgentExec(agent),
            _ => DispatchState::Supervising,
        };

        state.router_decision = Some(decision);
        Ok(next)
    }

    async fn supervise(&self, thread_id: &str, state: &mut ConversationState) -> Result<DispatchState> {
        let question = latest_question(state)?;
        let context = state.routing_context();
        let hints = state
            .router_decision
            .as_ref()
            .map(|d| d.context_hints.clone())
            .filter(|h| !h.is_empty());

        let decision = self
            .supervisor
            .decide(&question, Some(&context), hints.as_ref())
            .await?;

        let queue = decision.agents_queue();
        let first = decision.primary_agent;

        if decision.execution_mode != ExecutionMode::Single && queue.len() > 1 {
            if decision.execution_mode == ExecutionMode::Parallel {
                info!(
                    thread_id = %thread_id,
                    agents = queue.len(),
                    "Parallel mode requested, executing sequentially"
                );
            }
            state.execution_plan = Some(ExecutionPlan::new(queue));
        }

        state.supervisor_decision = Some(decision);
        Ok(DispatchState::AgentExec(first))
    }

    async fn execute_agent(
        &self,
        thread_id: &str,
        agent: AgentType,
        state: &mut ConversationState,
    ) -> Result<DispatchState> {
        if state.agents_completed.contains(&agent) {
            warn!(thread_id = %thread_id, agent = %agent, "Handler already ran for this request, skipping");
            return Ok(self.after_handler(state, None));
        }

        let window = self.trimmer.trim_for_agent(&state.messages, agent).to_vec();
        debug!(
            thread_id = %thread_id,
            agent = %agent,
            window = window.len(),
            history_over_budget = self.trimmer.should_trim(&state.messages),
            "Invoking handler"
        );

        let request = HandlerRequest {
            thread_id: thread_id.to_string(),
            messages: window,
            verbose: self.verbose,
        };

        let outcome = self.handlers.get(agent).invoke(request).await;
        let response = contain_failure(agent, outcome)?;

        state.messages.push(ChatMessage::assistant(response.clone()));
        state.agent_results.insert(agent, response.clone());
        state.agents_completed.push(agent);
        state.current_agent = Some(agent);
        update_user_context(state, agent);

        info!(
            thread_id = %thread_id,
            agent = %agent,
            completed = state.agents_completed.len(),
            "Handler completed"
        );

        Ok(self.after_handler(state, Some(response)))
    }

    fn after_handler(&self, state: &mut ConversationState, response: Option<String>) -> DispatchState {
        match state.execution_plan.as_mut() {
            Some(plan) => {
                plan.advance();
                DispatchState::SequenceRouting
            }
            None => {
                if response.is_some() {
                    state.final_response = response;
                }
                DispatchState::Terminal
            }
        }
    }
}

fn latest_question(state: &ConversationState) -> Result<String> {
    state
        .last_user_message()
        .map(str::to_string)
        .ok_or_else(|| OrchestrationError::StateError("Conversation has no user message".to_string()))
}

fn next_in_sequence(state: &ConversationState) -> DispatchState {
    match state.execution_plan.as_ref().and_then(|plan| plan.next_agent()) {
        Some(agent) => DispatchState::AgentExec(agent),
        None => DispatchState::Synthesizing,
    }
}

fn update_user_context(state: &mut ConversationState, agent: AgentType) {
    let question = state
        .last_user_message()
        .map(str::to_lowercase)
        .unwrap_or_default();
    let context = &mut state.user_context;

    match agent {
        AgentType::Portfolio => {
            context.has_portfolio = Some(true);
            context.investment_stage = InvestmentStage::Current;
        }
        AgentType::News => {
            if POTENTIAL_INVESTOR_PHRASES.iter().any(|p| question.contains(p)) {
                context.investment_stage = InvestmentStage::Potential;
            }
        }
        _ => {}
    }

    context.last_agent = Some(agent);
}
