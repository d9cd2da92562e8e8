//! Routing metrics
//!
//! Counts fast-path vs supervisor-path requests and keeps running latency
//! averages for each path.

use crate::models::{ConversationState, RouteKind};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoutingMetrics {
    pub total_requests: u64,
    pub fast_path_hits: u64,
    pub supervisor_path_hits: u64,
    pub multi_agent_runs: u64,
    pub avg_latency_fast_ms: f64,
    pub avg_latency_supervisor_ms: f64,
}

impl RoutingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed request
    pub fn record(&mut self, state: &ConversationState, latency_ms: f64) {
        self.total_requests += 1;

        let fast = matches!(
            state.router_decision.as_ref().map(|d| d.route),
            Some(RouteKind::Direct)
        );

        if fast {
            self.fast_path_hits += 1;
            self.avg_latency_fast_ms =
                running_average(self.avg_latency_fast_ms, self.fast_path_hits, latency_ms);
        } else {
            self.supervisor_path_hits += 1;
            self.avg_latency_supervisor_ms = running_average(
                self.avg_latency_supervisor_ms,
                self.supervisor_path_hits,
                latency_ms,
            );
        }

        if state.agents_completed.len() > 1 {
            self.multi_agent_runs += 1;
        }
    }

    pub fn fast_path_rate(&self) -> f64 {
        ratio(self.fast_path_hits, self.total_requests)
    }

    pub fn supervisor_path_rate(&self) -> f64 {
        ratio(self.supervisor_path_hits, self.total_requests)
    }
}

fn running_average(previous: f64, count: u64, sample: f64) -> f64 {
    if count <= 1 {
        return sample;
    }
    let n = count as f64;
    (previous * (n - 1.0) + sample) / n
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentType, ContextHints, RouterDecision};

    fn finished(route: RouteKind, agents: &[AgentType]) -> ConversationState {
        let decision = match route {
            RouteKind::Direct => RouterDecision::direct(
                agents[0],
                0.95,
                "pattern".into(),
                ContextHints::default(),
            ),
            RouteKind::Supervisor => {
                RouterDecision::supervisor(0.4, "keywords".into(), ContextHints::default())
            }
        };

        ConversationState {
            router_decision: Some(decision),
            agents_completed: agents.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = RoutingMetrics::new();
        assert_eq!(metrics.fast_path_rate(), 0.0);
        assert_eq!(metrics.supervisor_path_rate(), 0.0);
    }

    #[test]
    fn test_record_splits_paths() {
        let mut metrics = RoutingMetrics::new();
        metrics.record(&finished(RouteKind::Direct, &[AgentType::Portfolio]), 10.0);
        metrics.record(&finished(RouteKind::Direct, &[AgentType::Market]), 20.0);
        metrics.record(
            &finished(RouteKind::Supervisor, &[AgentType::GoalPlanning, AgentType::Portfolio]),
            300.0,
        );

        assert_eq!(metrics.total_requests, 3);
        assert_eq!(metrics.fast_path_hits, 2);
        assert_eq!(metrics.supervisor_path_hits, 1);
        assert_eq!(metrics.multi_agent_runs, 1);
        assert!((metrics.avg_latency_fast_ms - 15.0).abs() < 1e-9);
        assert!((metrics.avg_latency_supervisor_ms - 300.0).abs() < 1e-9);
        assert!((metrics.fast_path_rate() - 2.0 / 3.0).abs() < 1e-9);
    }
}
