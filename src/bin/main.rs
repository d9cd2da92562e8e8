use finance_agent_router::{agent::Orchestrator, config::AppConfig, state::InMemoryThreadStore};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let questions: Vec<String> = std::env::args().skip(1).collect();
    if questions.is_empty() {
        eprintln!("usage: orchestrator \"<question>\" [\"<follow-up>\" ...]");
        std::process::exit(2);
    }

    let config = AppConfig::from_env()?;
    config.require_gemini_api_key()?;

    let orchestrator = Orchestrator::from_config(&config, Arc::new(InMemoryThreadStore::new()))?;
    let thread_id = orchestrator.new_thread();

    info!(thread_id = %thread_id, questions = questions.len(), "Orchestrator starting");

    for question in &questions {
        let state = orchestrator.ask(&thread_id, question).await?;

        let route = state
            .router_decision
            .as_ref()
            .map(|d| format!("{:?} ({:.2})", d.route, d.confidence))
            .unwrap_or_default();
        let agents: Vec<&str> = state.agents_completed.iter().map(|a| a.as_str()).collect();

        println!("> {}", question);
        println!("[route: {} | agents: {}]", route, agents.join(", "));
        println!("{}\n", state.final_response.unwrap_or_default());
    }

    Ok(())
}
