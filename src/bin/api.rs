use risk_agent_orchestrator::{
    api::start_server,
    backend::GeminiBackend,
    checkpoint::{CheckpointStore, InMemoryCheckpointStore, PostgresCheckpointStore},
    graph::OrchestrationGraph,
    tools::create_default_registry,
    RuntimeConfig,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = RuntimeConfig::from_env();
    if config.gemini_api_key.is_empty() {
        eprintln!("⚠️  GEMINI_API_KEY not set in .env");
    }

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("🚀 Risk Agent Orchestrator - API Server");
    info!("📍 Port: {}", api_port);

    // Create components
    let backend = Arc::new(GeminiBackend::new(
        config.gemini_api_key.clone(),
        config.backend_timeout,
    )?
    .with_max_retries(config.backend_max_retries));
    let registry = Arc::new(create_default_registry());
    let checkpoints: Arc<dyn CheckpointStore> = match PostgresCheckpointStore::from_env() {
        Some(store) => Arc::new(store),
        None => {
            info!("Checkpoint store backend: in-memory");
            Arc::new(InMemoryCheckpointStore::new())
        }
    };

    let graph = Arc::new(OrchestrationGraph::new(
        backend,
        registry,
        checkpoints,
        config,
    ));

    info!("✅ Orchestration graph initialized");

    start_server(graph, api_port).await?;

    Ok(())
}
