use finance_agent_router::{
    agent::Orchestrator,
    api::start_server,
    config::AppConfig,
    state::{InMemoryThreadStore, PgThreadStore, ThreadStore},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;

    if config.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY not set, generation calls will fail until it is configured");
    }

    let store: Arc<dyn ThreadStore> = match &config.database_url {
        Some(url) => Arc::new(PgThreadStore::connect_lazy(url)?),
        None => {
            info!("Thread store backend: in-memory");
            Arc::new(InMemoryThreadStore::new())
        }
    };

    info!(port = config.api_port, "Financial assistant router - API server");

    let orchestrator = Arc::new(Orchestrator::from_config(&config, store)?);

    start_server(orchestrator, config.api_port).await?;

    Ok(())
}
