use std::time::Duration;

use anyhow::Context;
use serde_json::json;
use tokio::time::timeout;

use crate::models::{BookingState, ConversationMessage, Provider, Suggestion};

use super::{Message, SuggestionProvider};

/// Hard ceiling on one suggestion call; a slow source must not stall the
/// conversation turn.
const SUGGESTION_TIMEOUT: Duration = Duration::from_secs(25);

const SYSTEM_PROMPT: &str = r#"You are MedBird, a courteous medical appointment booking assistant.
Return ONLY valid JSON (no markdown, no explanation) with this exact structure:
{
  "say": "what to show the user next, at most two sentences",
  "set": {
    "condition": "STRING",
    "visit_type": "in-person|telehealth",
    "patient_name": "STRING",
    "contact": "STRING",
    "selected_day": "Monday|Tuesday|...",
    "selected_time": "e.g. 10:00 AM",
    "duration": "e.g. 3 days",
    "severity": "Low|Medium|High|0-5",
    "allergies": "comma list",
    "medications": "free text",
    "gender": "M|F|Other|N/A",
    "dob": "YYYY-MM-DD"
  },
  "done": false
}
Omit from "set" any field you are not updating this turn.

Rules:
- If the user asks a question, answer briefly in "say" and do not set visit_type unless they explicitly choose one.
- If the user explicitly says "telehealth" (or virtual, video visit, online), set visit_type=telehealth and do not switch away unless they ask. Likewise for "in-person".
- Convert vague times like "tomorrow morning" into a concrete weekday and a time inside the working hours provided.
- Never offer days or hours outside the provided availability.
- Keep "say" short and friendly; if more information is needed, end it with exactly one clear question.
- Ask the optional clinical intake (duration, severity, allergies, medications) at most once. If the user declines or says "nothing else", never ask again.
- Map numeric severity 0-1 to Low, 2-3 to Medium, 4-5 to High.
- Do not set done until patient_name, contact, visit_type, selected_day and selected_time are all captured and the user has explicitly confirmed, or has declined the optional intake with all core details present."#;

/// One suggestion round-trip: context snapshot + live availability in, parsed
/// `{say, set, done}` out. The conversation history already contains the
/// latest user message.
pub async fn fetch_suggestion(
    llm: &dyn SuggestionProvider,
    history: &[ConversationMessage],
    booking: &BookingState,
    provider: &Provider,
    open_slots: &[String],
) -> anyhow::Result<Suggestion> {
    let availability = json!({
        "available_days": provider.available_days,
        "working_hours": provider.working_hours,
        "next_open_slots": open_slots,
    });
    let context = json!({
        "booking": booking,
        "provider": {
            "id": provider.id,
            "name": provider.name,
            "specialty": provider.specialty,
            "location": provider.location,
        },
    });
    let system = format!("{SYSTEM_PROMPT}\n\nAvailability:\n{availability}\n\nContext:\n{context}");

    let messages: Vec<Message> = history
        .iter()
        .map(|m| Message {
            role: m.role.clone(),
            content: m.content.clone(),
        })
        .collect();

    let response = timeout(SUGGESTION_TIMEOUT, llm.chat(&system, &messages))
        .await
        .context("suggestion source timed out")??;

    Ok(parse_suggestion(&response))
}

/// Total parse: structured JSON when possible, otherwise the raw text
/// becomes the assistant line with no field updates.
pub fn parse_suggestion(response: &str) -> Suggestion {
    if let Ok(suggestion) = serde_json::from_str::<Suggestion>(response) {
        return suggestion;
    }

    // Strip markdown code fences
    let cleaned = response
        .trim()
        .strip_prefix("```json")
        .or_else(|| response.trim().strip_prefix("```"))
        .unwrap_or(response.trim());
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    if let Ok(suggestion) = serde_json::from_str::<Suggestion>(cleaned) {
        return suggestion;
    }

    // Try to find a JSON object inside the response
    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            if let Ok(suggestion) = serde_json::from_str::<Suggestion>(&cleaned[start..=end]) {
                return suggestion;
            }
        }
    }

    tracing::warn!("suggestion response was not structured JSON, treating as plain text");
    Suggestion::plain(response.trim())
}
