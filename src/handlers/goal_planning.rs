//! Goal planning handler
//!
//! Grounds the generator in the thread's stored goals and their savings plans.

use super::llm::{render_prompt, system_prompt_for};
use super::{Handler, HandlerRequest};
use crate::generation::TextGenerator;
use crate::goals::{format_money, savings_plan, Goal, GoalStore};
use crate::models::AgentType;
use crate::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

pub struct GoalPlanningHandler {
    goals: Arc<GoalStore>,
    generator: Arc<dyn TextGenerator>,
}

impl GoalPlanningHandler {
    pub fn new(goals: Arc<GoalStore>, generator: Arc<dyn TextGenerator>) -> Self {
        Self { goals, generator }
    }
}

fn describe_goal(goal: &Goal, today: NaiveDate) -> String {
    let mut text = format!(
        "ID {}: {} ({})\n  Target: {} by {}\n  Progress: {} ({:.1}%)\n  Priority: {:?} | Risk: {}\n",
        goal.id,
        goal.name,
        goal.category,
        format_money(goal.target_amount),
        goal.target_date,
        format_money(goal.current_savings),
        goal.progress_percent(),
        goal.priority,
        goal.risk_tolerance,
    );

    match savings_plan(goal, today) {
        Ok(plan) => {
            text.push_str(&format!(
                "  Time left: {} months\n  Monthly required (savings only): {}\n",
                plan.months_left,
                format_money(plan.monthly_simple)
            ));
            if let Some(projection) = plan.investment {
                text.push_str(&format!(
                    "  Monthly required (invested at {:.1}%): {}\n",
                    projection.annual_return * 100.0,
                    format_money(projection.monthly_investment)
                ));
            }
        }
        Err(e) => text.push_str(&format!("  {}\n", e)),
    }

    text
}

/// Goal summary block included ahead of the transcript
pub fn describe_goals(goals: &[Goal], today: NaiveDate) -> String {
    if goals.is_empty() {
        return "## User Goals\n\nNo goals recorded yet.".to_string();
    }

    let mut text = format!("## User Goals ({} total)\n\n", goals.len());
    for goal in goals {
        text.push_str(&describe_goal(goal, today));
        text.push('\n');
    }
    text
}

#[async_trait]
impl Handler for GoalPlanningHandler {
    async fn invoke(&self, request: HandlerRequest) -> Result<String> {
        let today = Utc::now().date_naive();
        let goals = self.goals.list(&request.thread_id).await;

        let prompt = render_prompt(Some(&describe_goals(&goals, today)), &request);

        self.generator
            .generate(system_prompt_for(AgentType::GoalPlanning), &prompt)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::ScriptedGenerator;
    use crate::goals::{GoalPriority, NewGoal};
    use crate::models::{ChatMessage, RiskTolerance};

    #[test]
    fn test_describe_goals() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let goal = Goal {
            id: 3,
            name: "House".into(),
            target_amount: 60_000.0,
            target_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            current_savings: 12_000.0,
            priority: GoalPriority::High,
            risk_tolerance: RiskTolerance::Low,
            is_investment_based: true,
            category: "Home Down Payment".into(),
            notes: String::new(),
            created_at: today,
        };

        let text = describe_goals(&[goal], today);
        assert!(text.starts_with("## User Goals (1 total)"));
        assert!(text.contains("ID 3: House (Home Down Payment)"));
        assert!(text.contains("Target: $60,000.00 by 2030-01-01"));
        assert!(text.contains("Monthly required (savings only): $800.00"));
        assert!(text.contains("invested at 4.0%"));

        assert!(describe_goals(&[], today).contains("No goals recorded yet."));
    }

    #[tokio::test]
    async fn test_goals_are_read_for_the_thread() {
        let store = Arc::new(GoalStore::new());
        let today = Utc::now().date_naive();
        store
            .create(
                "thread-1",
                NewGoal {
                    name: "Emergency Fund".into(),
                    target_amount: 10_000.0,
                    target_date: today + chrono::Duration::days(800),
                    current_savings: 0.0,
                    priority: GoalPriority::High,
                    risk_tolerance: None,
                    is_investment_based: false,
                    category: "Emergency Fund".into(),
                    notes: String::new(),
                },
                today,
            )
            .await
            .unwrap();

        let generator = Arc::new(ScriptedGenerator::repeating("Save $400 a month."));
        let handler = GoalPlanningHandler::new(store, generator.clone());

        let reply = handler
            .invoke(HandlerRequest {
                thread_id: "thread-1".into(),
                messages: vec![ChatMessage::user("Am I on track?")],
                verbose: false,
            })
            .await
            .unwrap();
        assert_eq!(reply, "Save $400 a month.");

        let prompts = generator.prompts();
        assert!(prompts[0].1.contains("Emergency Fund"));
        assert!(prompts[0].1.contains("**User**: Am I on track?"));
    }
}
