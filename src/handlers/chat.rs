use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::services::conversation;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub finalized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Ok(Json(ChatResponse {
            reply: "Please tell me what you need help with.".to_string(),
            finalized: false,
            booking_id: None,
        }));
    }

    let session_id = match req.session_id.trim() {
        "" => "default",
        id => id,
    };

    let outcome = conversation::process_message(&state, session_id, message).await?;
    Ok(Json(ChatResponse {
        reply: outcome.reply,
        finalized: outcome.finalized,
        booking_id: outcome.booking_id,
    }))
}

#[derive(Deserialize)]
pub struct ResetRequest {
    pub session_id: String,
}

pub async fn reset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<Value>, AppError> {
    let existed = conversation::reset_conversation(&state, req.session_id.trim())?;
    Ok(Json(json!({ "reset": existed })))
}
