use finance_assistant_orchestrator::{api::start_server, Orchestrator, OrchestratorConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = OrchestratorConfig::from_env()?;

    info!("🚀 Finance Assistant Orchestrator - API Server");
    info!("📍 Port: {}", config.port);
    info!("🔗 Assistant service: {}", config.assistant_base_url);

    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);

    info!("✅ Orchestration graph compiled");
    info!("📡 Starting API server...");

    start_server(orchestrator, config.port).await?;

    Ok(())
}
