//! Thread orchestrator
//!
//! Owns the per-thread request cycle: lock, load, dispatch, save.

use crate::config::AppConfig;
use crate::execution::Dispatcher;
use crate::gemini::GeminiClient;
use crate::goals::{Goal, GoalRanking, GoalStore, NewGoal};
use crate::handlers::{HandlerTable, HttpRetriever, Retriever};
use crate::memory::ContextTrimmer;
use crate::metrics::RoutingMetrics;
use crate::models::ConversationState;
use crate::state::ThreadStore;
use crate::supervisor::Supervisor;
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct Orchestrator {
    store: Arc<dyn ThreadStore>,
    dispatcher: Dispatcher,
    goals: Arc<GoalStore>,
    metrics: RwLock<RoutingMetrics>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn ThreadStore>, dispatcher: Dispatcher, goals: Arc<GoalStore>) -> Self {
        Self {
            store,
            dispatcher,
            goals,
            metrics: RwLock::new(RoutingMetrics::new()),
        }
    }

    /// Production wiring: Gemini for the supervisor and the handlers,
    /// HTTP retrieval for education when a URL is configured.
    ///
    /// A missing API key is reported on the first generation call.
    pub fn from_config(config: &AppConfig, store: Arc<dyn ThreadStore>) -> Result<Self> {
        let api_key = config.gemini_api_key.clone().unwrap_or_default();

        let supervisor_llm = GeminiClient::new(api_key.clone(), config.gemini_model.clone())?
            .with_temperature(config.supervisor_temperature);
        let handler_llm = GeminiClient::new(api_key, config.gemini_model.clone())?
            .with_temperature(config.handler_temperature);

        let retriever: Option<Arc<dyn Retriever>> = match &config.retrieval_api_url {
            Some(url) => Some(Arc::new(HttpRetriever::new(Some(url.clone()), config.retrieval_k)?)),
            None => None,
        };

        let goals = Arc::new(GoalStore::new());
        let handlers = HandlerTable::standard(Arc::new(handler_llm), retriever, goals.clone());
        let dispatcher = Dispatcher::new(
            Supervisor::new(Arc::new(supervisor_llm)),
            handlers,
            ContextTrimmer::with_config(config.context_config()),
        )
        .with_verbose(config.verbose_handlers);

        info!(
            model = %config.gemini_model,
            retrieval = config.retrieval_api_url.is_some(),
            "Orchestrator configured"
        );

        Ok(Self::new(store, dispatcher, goals))
    }

    pub fn new_thread(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Answer one question on a thread and return the updated state.
    ///
    /// Requests on the same thread are serialized.
    pub async fn ask(&self, thread_id: &str, question: &str) -> Result<ConversationState> {
        let started = Instant::now();
        let _guard = self.store.lock(thread_id).await;

        let mut state = self.load_reconciled(thread_id).await?;
        state.begin_turn(question);

        info!(thread_id = %thread_id, history = state.messages.len(), "Handling question");

        self.dispatcher.run(thread_id, &mut state).await?;
        self.store.save(thread_id, &state).await?;

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.write().await.record(&state, latency_ms);

        debug!(
            thread_id = %thread_id,
            latency_ms,
            agents = ?state.agents_completed,
            "Question answered"
        );

        Ok(state)
    }

    pub async fn state(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        self.store.get(thread_id).await
    }

    /// Store a goal for the thread and record it in the user context.
    /// A goal without a risk tolerance inherits the thread's.
    pub async fn add_goal(&self, thread_id: &str, mut new_goal: NewGoal) -> Result<Goal> {
        let _guard = self.store.lock(thread_id).await;
        let mut state = self.load_reconciled(thread_id).await?;

        if new_goal.risk_tolerance.is_none() {
            new_goal.risk_tolerance = state.user_context.risk_tolerance;
        }

        let goal = self
            .goals
            .create(thread_id, new_goal, Utc::now().date_naive())
            .await?;

        state.user_context.active_goals.push(goal.id);
        state.user_context.risk_tolerance.get_or_insert(goal.risk_tolerance);
        self.store.save(thread_id, &state).await?;

        info!(thread_id = %thread_id, goal_id = goal.id, name = %goal.name, "Goal added");
        Ok(goal)
    }

    /// Stored state with `active_goals` limited to goals the goal store holds.
    /// Caller holds the thread lock.
    async fn load_reconciled(&self, thread_id: &str) -> Result<ConversationState> {
        let mut state = self.store.load(thread_id).await?;

        if self
            .goals
            .reconcile(thread_id, &mut state.user_context.active_goals)
            .await
        {
            warn!(
                thread_id = %thread_id,
                active_goals = ?state.user_context.active_goals,
                "Dropped goal ids unknown to the goal store"
            );
        }

        Ok(state)
    }

    pub async fn goals(&self, thread_id: &str) -> Vec<Goal> {
        self.goals.list(thread_id).await
    }

    pub async fn update_goal_progress(
        &self,
        thread_id: &str,
        goal_id: u32,
        current_savings: f64,
    ) -> Result<Goal> {
        self.goals
            .update_progress(thread_id, goal_id, current_savings)
            .await
    }

    /// Remove a goal and drop it from the user context
    pub async fn delete_goal(&self, thread_id: &str, goal_id: u32) -> Result<Goal> {
        let _guard = self.store.lock(thread_id).await;
        let stored = self.store.get(thread_id).await?.is_some();
        let mut state = self.load_reconciled(thread_id).await?;

        let goal = self.goals.delete(thread_id, goal_id).await?;

        if stored {
            state.user_context.active_goals.retain(|id| *id != goal_id);
            self.store.save(thread_id, &state).await?;
        }

        info!(thread_id = %thread_id, goal_id, "Goal deleted");
        Ok(goal)
    }

    pub async fn prioritize_goals(&self, thread_id: &str) -> Vec<GoalRanking> {
        self.goals.prioritize(thread_id, Utc::now().date_naive()).await
    }

    pub async fn metrics(&self) -> RoutingMetrics {
        self.metrics.read().await.clone()
    }
}
