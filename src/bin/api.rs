use market_analyst_agent::{
    api::start_server,
    bootstrap::{build_orchestrator, init_tracing},
    config::AnalystConfig,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();
    init_tracing("info");

    let config = AnalystConfig::from_env()?;
    if config.anthropic_api_key.is_empty() {
        eprintln!("ANTHROPIC_API_KEY not set in .env");
    }

    info!("Market Analyst - API Server");
    info!("Port: {}", config.api_port);

    let orchestrator = Arc::new(build_orchestrator(&config).await?);
    info!("Orchestrator initialized, starting API server");

    start_server(orchestrator, config.api_port).await?;

    Ok(())
}
