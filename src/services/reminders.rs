use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::{Booking, Reminder};
use crate::services::notify::NotificationTransport;
use crate::state::AppState;

/// Append one reminder per offset for a finalized booking. Registering the
/// same booking again is a no-op: the store deduplicates on
/// (provider, slot, patient, kind).
pub fn register_reminders(
    conn: &Connection,
    booking: &Booking,
    provider_email: Option<&str>,
    offsets_minutes: &[i64],
) -> anyhow::Result<usize> {
    let mut added = 0;
    for &offset in offsets_minutes {
        let reminder = Reminder::for_booking(booking, provider_email, offset);
        if queries::insert_reminder(conn, &reminder)? {
            added += 1;
        }
    }
    if added > 0 {
        tracing::info!(booking = %booking.id, count = added, "registered reminders");
    }
    Ok(added)
}

/// Start the single polling loop for this process. Returns false without
/// spawning when a loop is already running.
pub fn spawn_loop(state: Arc<AppState>) -> bool {
    if state
        .reminder_loop_running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return false;
    }

    let interval = Duration::from_secs(state.config.reminder_poll_secs.max(1));
    tokio::spawn(async move {
        tracing::info!(interval_secs = interval.as_secs(), "reminder loop started");
        loop {
            if let Err(e) = tick(&state).await {
                tracing::error!(error = %e, "reminder tick failed");
            }
            tokio::time::sleep(interval).await;
        }
    });
    true
}

/// One poll tick at the current wall-clock minute.
pub async fn tick(state: &AppState) -> anyhow::Result<usize> {
    let now_minute = Utc::now().naive_utc().format("%Y-%m-%d %H:%M").to_string();
    tick_at(state, &now_minute).await
}

/// Fire every unsent reminder whose remind_at equals `now_minute`, then mark
/// it sent. The sent flag is the sole restart-safety mechanism: a relaunched
/// loop rescans the log and skips anything already flagged. A delivery
/// failure is logged and the entry still flagged, so a reminder fires at
/// most once; an outage spanning its minute skips it entirely.
pub async fn tick_at(state: &AppState, now_minute: &str) -> anyhow::Result<usize> {
    let due = {
        let db = state.db.lock().unwrap();
        queries::due_reminders(&db, now_minute)?
    };

    let mut fired = 0;
    for reminder in due {
        deliver(state.mailer.as_ref(), &reminder).await;
        {
            let db = state.db.lock().unwrap();
            queries::mark_reminder_sent(&db, reminder.id)?;
        }
        fired += 1;
    }

    if fired > 0 {
        tracing::info!(count = fired, minute = now_minute, "fired reminders");
    }
    Ok(fired)
}

async fn deliver(mailer: &dyn NotificationTransport, reminder: &Reminder) {
    if reminder.contact.contains('@') {
        let body = format!(
            "Reminder: your appointment with {} is at {}.\n- MedBird",
            reminder.provider_name, reminder.appointment_slot
        );
        if let Err(e) = mailer
            .send(&reminder.contact, "Appointment Reminder", &body)
            .await
        {
            tracing::error!(error = %e, reminder = reminder.id, "failed to send patient reminder");
        }
    } else {
        // phone contacts get a log line; SMS is out of scope
        tracing::info!(to = %reminder.contact, slot = %reminder.appointment_slot, "sms reminder (log only)");
    }

    if let Some(email) = reminder.provider_email.as_deref() {
        let body = format!(
            "Reminder: you have an appointment with {} at {}.",
            reminder.patient_name, reminder.appointment_slot
        );
        if let Err(e) = mailer
            .send(email, "Upcoming Appointment Reminder", &body)
            .await
        {
            tracing::error!(error = %e, reminder = reminder.id, "failed to send provider reminder");
        }
    }
}
