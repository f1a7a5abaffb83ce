use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::db::queries;
use crate::models::{
    Booking, BookingState, Conversation, ConversationMessage, Provider, Severity, SuggestedFields,
    Suggestion, VisitType, SESSION_TTL_MINUTES,
};
use crate::services::ai::suggest;
use crate::services::availability;
use crate::services::reminders;
use crate::services::triage;
use crate::state::AppState;

static CONFIRM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(yes|yep|yeah|confirm|confirmed|book it|go ahead|that works|sounds good|looks good|ok|okay|that's correct|correct)\b").unwrap()
});

static DECLINE_OPTIONAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(no|nope|none|nothing else|that's it|that is all|no other)\b").unwrap()
});

static OPTIONAL_TOPIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)allerg|medicat|severity|duration").unwrap());

static TELEHEALTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(telehealth|virtual|video visit|video call|online appointment|online visit)\b")
        .unwrap()
});

static IN_PERSON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(in-person|in person|clinic visit|office visit)\b").unwrap()
});

const OPTIONAL_NUDGE: &str =
    "(Optional) Any allergies or current medications? If not, just say 'no'.";

pub struct TurnOutcome {
    pub reply: String,
    pub finalized: bool,
    pub booking_id: Option<String>,
}

/// Drive one conversation turn: bind a provider, consult the suggestion
/// source under the deterministic guards, mutate the booking and decide
/// whether to finalize. Exactly one state mutation and one reply per call.
pub async fn process_message(
    state: &Arc<AppState>,
    session_id: &str,
    message: &str,
) -> anyhow::Result<TurnOutcome> {
    let directory = {
        let db = state.db.lock().unwrap();
        queries::load_directory(&db)
    };

    let mut conv = {
        let db = state.db.lock().unwrap();
        queries::get_conversation(&db, session_id)?
    }
    .unwrap_or_else(|| new_conversation(session_id));

    conv.messages.push(ConversationMessage {
        role: "user".to_string(),
        content: message.to_string(),
    });

    let now = Utc::now().naive_utc();

    // Bind a provider once; the choice is immutable for the conversation.
    if conv.booking.provider_id.is_none() {
        if conv.booking.condition.is_none() {
            if let Some(condition) = triage::infer_condition(message) {
                conv.booking.condition = Some(condition.to_string());
            }
        }
        let lookup = conv
            .booking
            .condition
            .clone()
            .unwrap_or_else(|| message.to_string());
        let provider = triage::match_provider_for_condition(&lookup, &directory);
        conv.booking.provider_id = Some(provider.id.clone());
        conv.booking.provider_name = Some(provider.name.clone());
        conv.booking.specialty = Some(provider.specialty.clone());
        conv.booking.location = Some(provider.location.clone());
        tracing::info!(session = session_id, provider = %provider.name, "bound provider");
    }

    let provider = conv
        .booking
        .provider_id
        .as_deref()
        .and_then(|id| directory.by_id(id))
        .unwrap_or_else(|| directory.default_provider())
        .clone();

    // Honor an explicit visit-type preference before the model sees the turn.
    apply_visit_type_lock(message, &mut conv.booking);

    let booked = {
        let db = state.db.lock().unwrap();
        queries::booked_slots(&db, &provider.id).unwrap_or_default()
    };
    let open_slots = availability::next_free_slots(&provider, &booked, 6, now);

    let suggestion = match suggest::fetch_suggestion(
        state.llm.as_ref(),
        &conv.messages,
        &conv.booking,
        &provider,
        &open_slots,
    )
    .await
    {
        Ok(suggestion) => suggestion,
        Err(e) => {
            tracing::warn!(error = %e, session = session_id, "suggestion source unavailable, using fallback");
            fallback_suggestion(&conv.booking)
        }
    };

    apply_updates(&mut conv.booking, &suggestion.set, now);

    // Re-assert the user's preference in case the suggestion flipped it.
    apply_visit_type_lock(message, &mut conv.booking);

    let mut auto_finalize = false;
    if conv.booking.asked_optional && DECLINE_OPTIONAL_RE.is_match(message) {
        conv.booking.optional_declined = true;
        auto_finalize = conv.booking.is_complete();
    }

    let mut reply = if suggestion.say.trim().is_empty() {
        "OK.".to_string()
    } else {
        suggestion.say.clone()
    };

    // Surface a contact-validation failure exactly once.
    if conv.booking.invalid_contact_notice {
        reply.push_str(
            "\n\nThat contact doesn't look valid. Please double-check the email or give a 10-digit phone number.",
        );
        conv.booking.invalid_contact_notice = false;
    }

    // The optional intake may be mentioned at most once per conversation.
    if !conv.booking.asked_optional && OPTIONAL_TOPIC_RE.is_match(&reply) {
        conv.booking.asked_optional = true;
    }
    if conv.booking.optional_declined && OPTIONAL_TOPIC_RE.is_match(&reply) {
        reply = "You're all set.".to_string();
    }

    // The deterministic confirmation path is authoritative: a matching
    // phrase finalizes even when the model said done=false.
    let mut done = suggestion.done && conv.booking.is_complete();
    if !done && conv.booking.is_complete() && CONFIRM_RE.is_match(message) {
        done = true;
    }

    // One gentle optional-intake nudge once the core fields are present.
    if !done
        && !auto_finalize
        && !conv.booking.asked_optional
        && !conv.booking.optional_declined
        && conv.booking.is_complete()
        && !OPTIONAL_TOPIC_RE.is_match(&reply)
    {
        reply.push_str("\n\n");
        reply.push_str(OPTIONAL_NUDGE);
        conv.booking.asked_optional = true;
    }

    let mut outcome = TurnOutcome {
        reply,
        finalized: false,
        booking_id: None,
    };

    if (done || auto_finalize) && conv.booking.is_complete() {
        conv.booking.recompute_final_slot(now);
        match conv.booking.slot_datetime(now) {
            Some(slot_time) => {
                let booking = conv.booking.to_booking(slot_time, now);
                persist_booking(state, &booking);
                send_confirmations(state, &booking, &provider).await;
                if !reminders::spawn_loop(Arc::clone(state)) {
                    tracing::debug!("reminder loop already running");
                }

                outcome.reply = format!(
                    "Perfect! Your {} appointment with {} is confirmed for {}. You'll receive a confirmation at {}.",
                    booking.visit_type.as_str(),
                    booking.provider_name,
                    booking.appointment_slot,
                    booking.contact,
                );
                outcome.finalized = true;
                outcome.booking_id = Some(booking.id.clone());

                // fresh state for the next conversation on this session
                conv.booking = BookingState::default();
            }
            None => {
                // day or time never parsed; re-collect them instead of
                // booking a slot we cannot timestamp
                conv.booking.selected_day = None;
                conv.booking.selected_time = None;
                conv.booking.final_slot = None;
                outcome.reply = "I couldn't pin down that day and time. Could you restate them, like 'Monday 10:00 AM'?".to_string();
            }
        }
    }

    conv.messages.push(ConversationMessage {
        role: "assistant".to_string(),
        content: outcome.reply.clone(),
    });
    conv.last_activity = now;
    conv.expires_at = now + Duration::minutes(SESSION_TTL_MINUTES);

    {
        let db = state.db.lock().unwrap();
        queries::save_conversation(&db, &conv)?;
        let _ = queries::expire_old_conversations(&db);
    }

    Ok(outcome)
}

/// Drop any in-progress booking for the session.
pub fn reset_conversation(state: &Arc<AppState>, session_id: &str) -> anyhow::Result<bool> {
    let db = state.db.lock().unwrap();
    queries::delete_conversation(&db, session_id)
}

fn new_conversation(session_id: &str) -> Conversation {
    let now = Utc::now().naive_utc();
    Conversation {
        session_id: session_id.to_string(),
        messages: vec![],
        booking: BookingState::default(),
        last_activity: now,
        expires_at: now + Duration::minutes(SESSION_TTL_MINUTES),
    }
}

/// An unambiguous visit-type statement from the user wins over anything the
/// suggestion source proposes, this turn and later ones.
fn apply_visit_type_lock(user_text: &str, booking: &mut BookingState) {
    if TELEHEALTH_RE.is_match(user_text) {
        booking.visit_type = Some(VisitType::Telehealth);
        booking.visit_type_locked = true;
    } else if IN_PERSON_RE.is_match(user_text) {
        booking.visit_type = Some(VisitType::InPerson);
        booking.visit_type_locked = true;
    }
}

fn apply_updates(booking: &mut BookingState, set: &SuggestedFields, now: NaiveDateTime) {
    if let Some(v) = non_empty(&set.condition) {
        booking.condition = Some(v);
    }
    if !booking.visit_type_locked {
        if let Some(v) = set.visit_type.as_deref().and_then(VisitType::parse) {
            booking.visit_type = Some(v);
        }
    }
    if let Some(v) = non_empty(&set.patient_name) {
        booking.patient_name = Some(v);
    }
    if let Some(raw) = non_empty(&set.contact) {
        match triage::validate_contact(&raw) {
            Some(contact) => booking.contact = Some(contact),
            None => booking.invalid_contact_notice = true,
        }
    }
    if let Some(v) = non_empty(&set.selected_day) {
        booking.selected_day = Some(v);
    }
    if let Some(v) = non_empty(&set.selected_time) {
        booking.selected_time = Some(v);
    }
    if let Some(v) = non_empty(&set.duration) {
        booking.duration = Some(v);
    }
    if let Some(v) = set.severity.as_deref().and_then(Severity::parse) {
        booking.severity = Some(v);
    }
    if let Some(v) = non_empty(&set.allergies) {
        booking.allergies = Some(v);
    }
    if let Some(v) = non_empty(&set.medications) {
        booking.medications = Some(v);
    }
    if let Some(v) = non_empty(&set.gender) {
        booking.gender = Some(v);
    }
    if let Some(v) = non_empty(&set.dob) {
        booking.dob = Some(v);
    }

    booking.recompute_final_slot(now);
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Deterministic turn used whenever the suggestion source fails: ask for the
/// missing required fields in a fixed order, then for confirmation.
fn fallback_suggestion(booking: &BookingState) -> Suggestion {
    let mut missing = Vec::new();
    if booking.patient_name.is_none() {
        missing.push("your full name");
    }
    if booking.contact.is_none() {
        missing.push("your email or a 10-digit phone number");
    }
    if booking.visit_type.is_none() {
        missing.push("whether you prefer in-person or telehealth");
    }
    if booking.selected_day.is_none() || booking.selected_time.is_none() {
        missing.push("a preferred day and time");
    }
    if !missing.is_empty() {
        return Suggestion::plain(format!("Thanks! Please share {}.", missing.join(", ")));
    }
    if !booking.asked_optional && !booking.optional_declined {
        return Suggestion::plain(OPTIONAL_NUDGE);
    }
    Suggestion::plain("Say 'confirm' to finalize your booking.")
}

fn persist_booking(state: &Arc<AppState>, booking: &Booking) {
    let db = state.db.lock().unwrap();
    match queries::create_booking(&db, booking) {
        Ok(true) => {}
        Ok(false) => tracing::info!(booking = %booking.id, "identical booking already stored"),
        // the user still gets their confirmation; losing the row is logged
        Err(e) => tracing::error!(error = %e, booking = %booking.id, "failed to persist booking"),
    }
    if let Err(e) = queries::upsert_patient_profile(&db, booking) {
        tracing::warn!(error = %e, "patient profile upsert failed");
    }
    let provider_email = {
        let directory = queries::load_directory(&db);
        directory
            .by_id(&booking.provider_id)
            .and_then(|p| p.email.clone())
    };
    if let Err(e) = reminders::register_reminders(
        &db,
        booking,
        provider_email.as_deref(),
        &state.config.reminder_offsets_minutes,
    ) {
        tracing::error!(error = %e, booking = %booking.id, "failed to register reminders");
    }
}

async fn send_confirmations(state: &Arc<AppState>, booking: &Booking, provider: &Provider) {
    if booking.contact.contains('@') {
        let body = format!(
            "Hello {},\n\nYour {} appointment with {} is booked for {}.\nLocation: {}\n\n- MedBird",
            booking.patient_name,
            booking.visit_type.as_str(),
            booking.provider_name,
            booking.appointment_slot,
            booking.location,
        );
        if let Err(e) = state
            .mailer
            .send(&booking.contact, "Your Appointment Confirmation", &body)
            .await
        {
            tracing::error!(error = %e, "failed to send patient confirmation");
        }
    } else {
        tracing::info!(to = %booking.contact, slot = %booking.appointment_slot, "sms confirmation (log only)");
    }

    if let Some(email) = provider.email.as_deref() {
        let body = format!(
            "Hello {},\n\nNew appointment with {} on {}.\nCondition: {}\nVisit type: {}",
            booking.provider_name,
            booking.patient_name,
            booking.appointment_slot,
            booking.condition,
            booking.visit_type.as_str(),
        );
        if let Err(e) = state
            .mailer
            .send(email, "New Appointment Booked", &body)
            .await
        {
            tracing::error!(error = %e, "failed to send provider confirmation");
        }
    }
}
