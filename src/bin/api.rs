use chatbot_relay::{
    api::{start_server, ApiState},
    config::AppConfig,
    ConversationStore, GeminiBackend, GenerationBackend, MockBackend, PromptAssembler,
};
use std::sync::Arc;
use tracing::{info, warn};
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

    let config = AppConfig::from_env()?;

    info!("Chatbot Relay - API Server");
    info!("Bind address: {}", config.bind_address());

    let backend: Arc<dyn GenerationBackend> = match &config.gemini_api_key {
        Some(api_key) => {
            info!(model = %config.gemini_model, "Using Gemini backend");
            Arc::new(GeminiBackend::with_base_url(
                api_key.clone(),
                &config.gemini_base_url,
                &config.gemini_model,
            )?)
        }
        None => {
            warn!("GEMINI_API_KEY not set, replying with canned responses");
            Arc::new(MockBackend::new())
        }
    };

    // One store for the lifetime of the process
    let store = Arc::new(ConversationStore::new());
    let state = ApiState::new(PromptAssembler::new(store, backend));

    start_server(state, &config.bind_address(), &config.static_dir).await?;

    Ok(())
}
