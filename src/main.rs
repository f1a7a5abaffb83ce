use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use medbird::config::AppConfig;
use medbird::db::{self, queries};
use medbird::handlers;
use medbird::services::ai::groq::GroqProvider;
use medbird::services::ai::ollama::OllamaProvider;
use medbird::services::ai::SuggestionProvider;
use medbird::services::notify::console::ConsoleTransport;
use medbird::services::notify::sendgrid::SendgridTransport;
use medbird::services::notify::NotificationTransport;
use medbird::services::reminders;
use medbird::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    queries::seed_default_providers(&conn)?;

    let llm: Box<dyn SuggestionProvider> = match config.llm_provider.as_str() {
        "groq" => {
            anyhow::ensure!(
                !config.groq_api_key.is_empty(),
                "GROQ_API_KEY must be set when LLM_PROVIDER=groq"
            );
            tracing::info!("using Groq suggestion provider (model: {})", config.groq_model);
            Box::new(GroqProvider::new(
                config.groq_api_key.clone(),
                config.groq_model.clone(),
            ))
        }
        _ => {
            tracing::info!("using Ollama suggestion provider (url: {})", config.ollama_url);
            Box::new(OllamaProvider::new(
                config.ollama_url.clone(),
                "llama3.2".to_string(),
            ))
        }
    };

    let mailer: Box<dyn NotificationTransport> = if config.mail_api_key.is_empty() {
        tracing::warn!("MAIL_API_KEY not set, notifications will be logged only");
        Box::new(ConsoleTransport)
    } else {
        Box::new(SendgridTransport::new(
            config.mail_api_key.clone(),
            config.mail_from.clone(),
        ))
    };

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        llm,
        mailer,
        reminder_loop_running: AtomicBool::new(false),
    });

    if !reminders::spawn_loop(Arc::clone(&state)) {
        tracing::warn!("reminder loop already running, not starting another");
    }

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/chat", post(handlers::chat::chat))
        .route("/api/chat/reset", post(handlers::chat::reset))
        .route("/api/providers", get(handlers::providers::list_providers))
        .route("/api/bookings", get(handlers::bookings::list_bookings))
        .route("/api/reminders", get(handlers::bookings::list_reminders))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
