use risk_agent_orchestrator::{
    backend::GeminiBackend,
    checkpoint::{CheckpointStore, InMemoryCheckpointStore, PostgresCheckpointStore},
    graph::OrchestrationGraph,
    report,
    tools::create_default_registry,
    RuntimeConfig, SessionStatus,
};
use std::sync::Arc;
use tracing::info;

const DEFAULT_QUERY: &str = "Perform a comprehensive credit and geopolitical risk assessment \
for Apple Inc. (AAPL), considering its supply chain exposure to China and Taiwan, the current \
US-China semiconductor tensions, and its financial health. Provide an integrated risk report \
with quantified risk scores.";

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

    let query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_QUERY.to_string());

    info!("Risk Agent Orchestrator starting");

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

    let graph = OrchestrationGraph::new(backend, registry, checkpoints, config);

    info!(query = %query, "Running assessment");

    let session = graph.run(&query).await?;

    println!("\n=== RISK ASSESSMENT SESSION ===");
    println!("Session ID: {}", session.session_id);
    println!("Status: {}", session.status);
    println!("Agent invocations: {}", session.global_step_count);
    println!("\nRouting trail:");
    for (i, record) in session.routing_history.iter().enumerate() {
        println!(
            "  {}: step {} -> {} ({})",
            i + 1,
            record.step_index,
            record.decision,
            record.rationale
        );
    }

    let rendered = report::render(&session);
    println!("\n{}", rendered);

    // Save report to file
    let output_dir = std::path::Path::new("output");
    std::fs::create_dir_all(output_dir)?;
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let output_path = output_dir.join(format!("risk_report_{}.md", timestamp));
    std::fs::write(&output_path, &rendered)?;
    println!("Report saved to: {}", output_path.display());

    if session.status == SessionStatus::Failed {
        eprintln!("Session failed; resume with session id {}", session.session_id);
        std::process::exit(1);
    }

    Ok(())
}
