//! Financial goal storage and calculations
//!
//! Goals belong to a conversation thread. The store is injected into the
//! goal-planning handler and the orchestrator; nothing here is global.

use crate::error::OrchestrationError;
use crate::models::RiskTolerance;
use crate::Result;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GoalPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl GoalPriority {
    fn score(&self) -> u32 {
        match self {
            GoalPriority::High => 30,
            GoalPriority::Medium => 20,
            GoalPriority::Low => 10,
        }
    }
}

/// Expected annual return for investment-based goals
pub fn expected_annual_return(risk: RiskTolerance) -> f64 {
    match risk {
        RiskTolerance::Low => 0.04,
        RiskTolerance::Medium => 0.07,
        RiskTolerance::High => 0.10,
    }
}

fn default_category() -> String {
    "Other".to_string()
}

/// Request to create a goal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGoal {
    pub name: String,
    pub target_amount: f64,
    pub target_date: NaiveDate,
    #[serde(default)]
    pub current_savings: f64,
    #[serde(default)]
    pub priority: GoalPriority,
    #[serde(default)]
    pub risk_tolerance: Option<RiskTolerance>,
    #[serde(default)]
    pub is_investment_based: bool,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub id: u32,
    pub name: String,
    pub target_amount: f64,
    pub target_date: NaiveDate,
    pub current_savings: f64,
    pub priority: GoalPriority,
    pub risk_tolerance: RiskTolerance,
    pub is_investment_based: bool,
    pub category: String,
    pub notes: String,
    pub created_at: NaiveDate,
}

impl Goal {
    pub fn remaining(&self) -> f64 {
        self.target_amount - self.current_savings
    }

    /// Percent of target saved so far
    pub fn progress_percent(&self) -> f64 {
        if self.target_amount > 0.0 {
            self.current_savings / self.target_amount * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InvestmentProjection {
    pub annual_return: f64,
    pub monthly_investment: f64,
    pub annual_investment: f64,
    pub total_contributions: f64,
    pub investment_gains: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SavingsPlan {
    pub months_left: i32,
    pub remaining: f64,
    pub monthly_simple: f64,
    pub annual_simple: f64,
    pub investment: Option<InvestmentProjection>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GoalRanking {
    pub goal_id: u32,
    pub name: String,
    pub total_score: u32,
    pub urgency_score: u32,
    pub priority_score: u32,
    pub feasibility_score: u32,
    pub months_left: i32,
    pub monthly_needed: f64,
}

/// Whole months from `start` to `end` (negative when `end` is earlier)
pub fn months_between(start: NaiveDate, end: NaiveDate) -> i32 {
    if end < start {
        return -months_between(end, start);
    }
    let mut months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    if end.day() < start.day() {
        months -= 1;
    }
    months
}

/// Monthly and annual savings needed to reach the goal by its target date
pub fn savings_plan(goal: &Goal, today: NaiveDate) -> Result<SavingsPlan> {
    let months_left = months_between(today, goal.target_date);
    if months_left <= 0 {
        return Err(OrchestrationError::GoalError(format!(
            "Target date for '{}' has passed or is less than a month away",
            goal.name
        )));
    }

    let remaining = goal.remaining();
    let monthly_simple = remaining / months_left as f64;

    let investment = if goal.is_investment_based {
        let annual_return = expected_annual_return(goal.risk_tolerance);
        let monthly_return = annual_return / 12.0;
        let growth = (1.0 + monthly_return).powi(months_left);

        // FV = PV(1+r)^n + PMT * ((1+r)^n - 1) / r, solved for PMT
        let annuity_factor = (growth - 1.0) / monthly_return;
        let monthly_investment = (goal.target_amount - goal.current_savings * growth) / annuity_factor;
        let total_contributions = goal.current_savings + monthly_investment * months_left as f64;

        Some(InvestmentProjection {
            annual_return,
            monthly_investment,
            annual_investment: monthly_investment * 12.0,
            total_contributions,
            investment_gains: goal.target_amount - total_contributions,
        })
    } else {
        None
    };

    Ok(SavingsPlan {
        months_left,
        remaining,
        monthly_simple,
        annual_simple: monthly_simple * 12.0,
        investment,
    })
}

fn rank_goal(goal: &Goal, today: NaiveDate) -> GoalRanking {
    let months_left = months_between(today, goal.target_date);

    let urgency_score = match months_left {
        m if m < 6 => 40,
        m if m < 12 => 30,
        m if m < 24 => 20,
        _ => 10,
    };

    let monthly_needed = if months_left > 0 {
        goal.remaining() / months_left as f64
    } else {
        goal.remaining()
    };

    let feasibility_score = if monthly_needed < 200.0 {
        30
    } else if monthly_needed < 500.0 {
        20
    } else if monthly_needed < 1000.0 {
        10
    } else {
        5
    };

    let priority_score = goal.priority.score();

    GoalRanking {
        goal_id: goal.id,
        name: goal.name.clone(),
        total_score: urgency_score + priority_score + feasibility_score,
        urgency_score,
        priority_score,
        feasibility_score,
        months_left,
        monthly_needed,
    }
}

/// `$1,234.56`
pub fn format_money(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

#[derive(Debug, Default)]
struct GoalSession {
    goals: Vec<Goal>,
    last_id: u32,
}

/// Goals per thread id
#[derive(Debug, Default)]
pub struct GoalStore {
    sessions: RwLock<HashMap<String, GoalSession>>,
}

impl GoalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, thread_id: &str, new_goal: NewGoal, today: NaiveDate) -> Result<Goal> {
        if new_goal.target_amount <= 0.0 {
            return Err(OrchestrationError::GoalError(
                "Target amount must be greater than 0".to_string(),
            ));
        }
        if new_goal.current_savings < 0.0 {
            return Err(OrchestrationError::GoalError(
                "Current savings cannot be negative".to_string(),
            ));
        }
        if new_goal.target_date <= today {
            return Err(OrchestrationError::GoalError(
                "Target date must be in the future".to_string(),
            ));
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(thread_id.to_string()).or_default();
        session.last_id += 1;

        let goal = Goal {
            id: session.last_id,
            name: new_goal.name,
            target_amount: new_goal.target_amount,
            target_date: new_goal.target_date,
            current_savings: new_goal.current_savings,
            priority: new_goal.priority,
            risk_tolerance: new_goal.risk_tolerance.unwrap_or(RiskTolerance::Medium),
            is_investment_based: new_goal.is_investment_based,
            category: new_goal.category,
            notes: new_goal.notes,
            created_at: today,
        };
        session.goals.push(goal.clone());

        Ok(goal)
    }

    pub async fn list(&self, thread_id: &str) -> Vec<Goal> {
        self.sessions
            .read()
            .await
            .get(thread_id)
            .map(|s| s.goals.clone())
            .unwrap_or_default()
    }

    pub async fn get(&self, thread_id: &str, goal_id: u32) -> Result<Goal> {
        self.list(thread_id)
            .await
            .into_iter()
            .find(|g| g.id == goal_id)
            .ok_or_else(|| goal_not_found(goal_id))
    }

    pub async fn update_progress(&self, thread_id: &str, goal_id: u32, current_savings: f64) -> Result<Goal> {
        if current_savings < 0.0 {
            return Err(OrchestrationError::GoalError(
                "Current savings cannot be negative".to_string(),
            ));
        }

        let mut sessions = self.sessions.write().await;
        let goal = sessions
            .get_mut(thread_id)
            .and_then(|s| s.goals.iter_mut().find(|g| g.id == goal_id))
            .ok_or_else(|| goal_not_found(goal_id))?;

        goal.current_savings = current_savings;
        Ok(goal.clone())
    }

    pub async fn delete(&self, thread_id: &str, goal_id: u32) -> Result<Goal> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(thread_id)
            .ok_or_else(|| goal_not_found(goal_id))?;

        let index = session
            .goals
            .iter()
            .position(|g| g.id == goal_id)
            .ok_or_else(|| goal_not_found(goal_id))?;

        Ok(session.goals.remove(index))
    }

    /// Goals ranked by urgency, importance and feasibility, best first
    pub async fn prioritize(&self, thread_id: &str, today: NaiveDate) -> Vec<GoalRanking> {
        let mut ranked: Vec<GoalRanking> = self
            .list(thread_id)
            .await
            .iter()
            .map(|g| rank_goal(g, today))
            .collect();
        ranked.sort_by(|a, b| b.total_score.cmp(&a.total_score));
        ranked
    }

    /// Align ids recorded in a thread's user context with the goals held here.
    ///
    /// Unknown and repeated ids are dropped, and the id counter moves past
    /// every recorded id so a new goal never reuses one. Returns whether
    /// `active_goals` changed.
    pub async fn reconcile(&self, thread_id: &str, active_goals: &mut Vec<u32>) -> bool {
        let Some(&highest) = active_goals.iter().max() else {
            return false;
        };

        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(thread_id.to_string()).or_default();
        session.last_id = session.last_id.max(highest);

        let before = active_goals.len();
        let mut seen = HashSet::new();
        active_goals.retain(|id| session.goals.iter().any(|g| g.id == *id) && seen.insert(*id));

        active_goals.len() != before
    }
}

fn goal_not_found(goal_id: u32) -> OrchestrationError {
    OrchestrationError::GoalError(format!("Goal with ID {} not found", goal_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_goal(name: &str, target_amount: f64, target_date: NaiveDate) -> NewGoal {
        NewGoal {
            name: name.to_string(),
            target_amount,
            target_date,
            current_savings: 0.0,
            priority: GoalPriority::Medium,
            risk_tolerance: None,
            is_investment_based: false,
            category: default_category(),
            notes: String::new(),
        }
    }

    #[test]
    fn test_months_between() {
        assert_eq!(months_between(date(2025, 1, 15), date(2026, 1, 15)), 12);
        assert_eq!(months_between(date(2025, 1, 31), date(2025, 2, 28)), 0);
        assert_eq!(months_between(date(2025, 1, 15), date(2025, 3, 14)), 1);
        assert_eq!(months_between(date(2026, 1, 15), date(2025, 1, 15)), -12);
    }

    #[test]
    fn test_simple_savings_plan() {
        let today = date(2025, 1, 1);
        let goal = Goal {
            id: 1,
            name: "Car".into(),
            target_amount: 12_000.0,
            target_date: date(2027, 1, 1),
            current_savings: 2_400.0,
            priority: GoalPriority::High,
            risk_tolerance: RiskTolerance::Medium,
            is_investment_based: false,
            category: "Car Purchase".into(),
            notes: String::new(),
            created_at: today,
        };

        let plan = savings_plan(&goal, today).unwrap();
        assert_eq!(plan.months_left, 24);
        assert!((plan.monthly_simple - 400.0).abs() < 1e-9);
        assert!((plan.annual_simple - 4800.0).abs() < 1e-9);
        assert!(plan.investment.is_none());
    }

    #[test]
    fn test_investment_plan_needs_less_than_simple() {
        let today = date(2025, 1, 1);
        let goal = Goal {
            id: 1,
            name: "Retirement".into(),
            target_amount: 100_000.0,
            target_date: date(2035, 1, 1),
            current_savings: 10_000.0,
            priority: GoalPriority::High,
            risk_tolerance: RiskTolerance::High,
            is_investment_based: true,
            category: "Retirement".into(),
            notes: String::new(),
            created_at: today,
        };

        let plan = savings_plan(&goal, today).unwrap();
        let projection = plan.investment.unwrap();
        assert!((projection.annual_return - 0.10).abs() < 1e-12);
        assert!(projection.monthly_investment < plan.monthly_simple);
        assert!(projection.monthly_investment > 0.0);

        // Contributions grown at the monthly rate land on the target
        let r: f64 = 0.10 / 12.0;
        let n = 120;
        let fv = 10_000.0 * (1.0 + r).powi(n)
            + projection.monthly_investment * ((1.0 + r).powi(n) - 1.0) / r;
        assert!((fv - 100_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_past_target_date_rejected() {
        let today = date(2025, 6, 1);
        let mut goal_request = new_goal("Trip", 1000.0, date(2025, 6, 20));
        goal_request.current_savings = 0.0;
        let goal = Goal {
            id: 1,
            name: goal_request.name,
            target_amount: goal_request.target_amount,
            target_date: goal_request.target_date,
            current_savings: 0.0,
            priority: GoalPriority::Low,
            risk_tolerance: RiskTolerance::Low,
            is_investment_based: false,
            category: goal_request.category,
            notes: String::new(),
            created_at: today,
        };
        assert!(savings_plan(&goal, today).is_err());
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let store = GoalStore::new();
        let today = date(2025, 1, 1);

        assert!(store.create("t", new_goal("Zero", 0.0, date(2026, 1, 1)), today).await.is_err());
        assert!(store.create("t", new_goal("Past", 100.0, today), today).await.is_err());

        let mut negative = new_goal("Negative", 100.0, date(2026, 1, 1));
        negative.current_savings = -1.0;
        assert!(store.create("t", negative, today).await.is_err());

        assert!(store.list("t").await.is_empty());
    }

    #[tokio::test]
    async fn test_goals_are_scoped_per_thread() {
        let store = GoalStore::new();
        let today = date(2025, 1, 1);

        let a = store.create("thread-a", new_goal("House", 50_000.0, date(2030, 1, 1)), today).await.unwrap();
        let b = store.create("thread-b", new_goal("Car", 10_000.0, date(2027, 1, 1)), today).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 1);
        assert_eq!(a.risk_tolerance, RiskTolerance::Medium);

        assert_eq!(store.list("thread-a").await.len(), 1);
        assert!(store.list("thread-c").await.is_empty());

        let updated = store.update_progress("thread-a", 1, 5_000.0).await.unwrap();
        assert!((updated.progress_percent() - 10.0).abs() < 1e-9);
        assert!(store.update_progress("thread-a", 99, 1.0).await.is_err());

        let deleted = store.delete("thread-b", 1).await.unwrap();
        assert_eq!(deleted.name, "Car");
        assert!(store.get("thread-b", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_prioritize_scores() {
        let store = GoalStore::new();
        let today = date(2025, 1, 1);

        // 4 months, $1,000/month, high priority: 40 + 30 + 5
        let mut urgent = new_goal("Emergency Fund", 4_000.0, date(2025, 5, 1));
        urgent.priority = GoalPriority::High;
        store.create("t", urgent, today).await.unwrap();

        // 60 months, $100/month, low priority: 10 + 10 + 30
        let mut relaxed = new_goal("Vacation", 6_000.0, date(2030, 1, 1));
        relaxed.priority = GoalPriority::Low;
        store.create("t", relaxed, today).await.unwrap();

        let ranked = store.prioritize("t", today).await;
        assert_eq!(ranked[0].name, "Emergency Fund");
        assert_eq!(ranked[0].total_score, 75);
        assert_eq!(ranked[1].total_score, 50);
        assert_eq!(ranked[1].feasibility_score, 30);
    }

    #[tokio::test]
    async fn test_reconcile_drops_unknown_ids_and_skips_past_them() {
        let store = GoalStore::new();
        let today = date(2025, 1, 1);

        // Ids recorded by an earlier process whose goals are gone
        let mut recorded = vec![1, 3, 3];
        assert!(store.reconcile("t", &mut recorded).await);
        assert!(recorded.is_empty());

        let goal = store.create("t", new_goal("House", 50_000.0, date(2030, 1, 1)), today).await.unwrap();
        assert_eq!(goal.id, 4);

        let mut recorded = vec![4, 4];
        assert!(store.reconcile("t", &mut recorded).await);
        assert_eq!(recorded, vec![4]);
        assert!(!store.reconcile("t", &mut recorded).await);

        let mut empty = Vec::new();
        assert!(!store.reconcile("other", &mut empty).await);
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0.0), "$0.00");
        assert_eq!(format_money(999.5), "$999.50");
        assert_eq!(format_money(1234567.891), "$1,234,567.89");
        assert_eq!(format_money(-42.0), "-$42.00");
    }
}
