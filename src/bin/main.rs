use ollama_tool_agent::{
    agent::ConversationEngine,
    config::AgentConfig,
    console::{Console, StdoutConsole},
    llm::OllamaClient,
    repl::{run_session, SessionEnd},
    resolver::{model_help, ModelResolver, Resolution},
    router::ToolRouter,
    tools::create_default_registry,
};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Diagnostics go to stderr so they never interleave with answers
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AgentConfig::from_env();
    info!(
        model = %config.model,
        num_ctx = config.num_ctx,
        "Ollama Tool Agent starting"
    );

    let backend = Arc::new(OllamaClient::new(&config.ollama_host)?);
    info!(host = %backend.base_url(), "Ollama client ready");
    let console = StdoutConsole;

    // Resolve the model once; it stays fixed for the whole session
    let resolver = ModelResolver::new(backend.clone());
    let candidates = config.model_candidates();
    let model = match resolver.resolve(candidates, &console).await {
        Resolution::Resolved { model, tier, .. } => {
            info!(model = %model, ?tier, "Model resolved");
            model
        }
        Resolution::Unavailable { attempts } => {
            warn!(candidates = attempts.len(), "No candidate model answered");
            console.print(&model_help(&config.model));
            std::process::exit(1);
        }
    };

    let registry = create_default_registry(&config)?;
    info!(tools = ?registry.list(), "Tools registered");
    let mut engine = ConversationEngine::new(backend, model, ToolRouter::new(registry), config.num_ctx);

    console.print(&format!("\nUsing model: {}\n", engine.model()));
    console.print("Type your question. You can also give:  path = <path/to/file.csv>\n(Type 'quit' to exit.)");

    let stdin = BufReader::new(tokio::io::stdin());
    let end = run_session(&mut engine, stdin, &console).await;

    info!(session_id = %engine.session_id(), ?end, "Session finished");
    if end == SessionEnd::ModelUnavailable {
        warn!("Session ended because the model became unavailable");
    }

    Ok(())
}
