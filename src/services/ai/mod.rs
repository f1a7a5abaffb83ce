pub mod groq;
pub mod ollama;
pub mod suggest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// The external free-text suggestion source. Implementations return the raw
/// model text; parsing into a structured suggestion happens in `suggest`.
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String>;
}
