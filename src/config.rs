use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub llm_provider: String,
    pub groq_api_key: String,
    pub groq_model: String,
    pub ollama_url: String,
    pub mail_api_key: String,
    pub mail_from: String,
    pub reminder_poll_secs: u64,
    pub reminder_offsets_minutes: Vec<i64>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "medbird.db".to_string()),
            llm_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "ollama".to_string()),
            groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
            groq_model: env::var("GROQ_MODEL")
                .unwrap_or_else(|_| "llama-3.1-8b-instant".to_string()),
            ollama_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            mail_api_key: env::var("MAIL_API_KEY").unwrap_or_default(),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@medbird.example".to_string()),
            reminder_poll_secs: env::var("REMINDER_POLL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            reminder_offsets_minutes: parse_offsets(
                env::var("REMINDER_OFFSETS_MINUTES").ok().as_deref(),
            ),
        }
    }
}

fn parse_offsets(raw: Option<&str>) -> Vec<i64> {
    let parsed: Vec<i64> = raw
        .unwrap_or_default()
        .split(',')
        .filter_map(|p| p.trim().parse().ok())
        .filter(|m| *m > 0)
        .collect();
    if parsed.is_empty() {
        // 2 hours and 10 minutes before the appointment
        vec![120, 10]
    } else {
        parsed
    }
}
