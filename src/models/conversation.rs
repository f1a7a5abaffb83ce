use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::booking::BookingState;

pub const SESSION_TTL_MINUTES: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub session_id: String,
    pub messages: Vec<ConversationMessage>,
    pub booking: BookingState,
    pub last_activity: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}
