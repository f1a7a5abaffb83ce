use std::collections::HashSet;

use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    Booking, Conversation, OptionalIntake, Provider, ProviderDirectory, Reminder, Severity,
    VisitType,
};

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";
const MINUTE_FMT: &str = "%Y-%m-%d %H:%M";

// ── Conversations ──

pub fn get_conversation(conn: &Connection, session_id: &str) -> anyhow::Result<Option<Conversation>> {
    let now = Utc::now().naive_utc().format(DATETIME_FMT).to_string();
    let mut stmt = conn.prepare(
        "SELECT session_id, data, last_activity, expires_at FROM conversations
         WHERE session_id = ?1 AND expires_at > ?2",
    )?;

    let row = stmt
        .query_row(params![session_id, now], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .optional()?;

    let Some((session_id, data_json, last_activity_str, expires_at_str)) = row else {
        return Ok(None);
    };

    let data: serde_json::Value =
        serde_json::from_str(&data_json).unwrap_or_else(|_| serde_json::json!({}));
    let messages = data
        .get("messages")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    let booking = data
        .get("booking")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();

    let last_activity = NaiveDateTime::parse_from_str(&last_activity_str, DATETIME_FMT)
        .unwrap_or_else(|_| Utc::now().naive_utc());
    let expires_at = NaiveDateTime::parse_from_str(&expires_at_str, DATETIME_FMT)
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Some(Conversation {
        session_id,
        messages,
        booking,
        last_activity,
        expires_at,
    }))
}

pub fn save_conversation(conn: &Connection, conv: &Conversation) -> anyhow::Result<()> {
    let data = serde_json::json!({
        "messages": conv.messages,
        "booking": conv.booking,
    });
    let data_json = serde_json::to_string(&data)?;
    let phase = conv.booking.phase().as_str();
    let last_activity = conv.last_activity.format(DATETIME_FMT).to_string();
    let expires_at = conv.expires_at.format(DATETIME_FMT).to_string();

    conn.execute(
        "INSERT INTO conversations (session_id, data, phase, last_activity, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(session_id) DO UPDATE SET
           data = excluded.data,
           phase = excluded.phase,
           last_activity = excluded.last_activity,
           expires_at = excluded.expires_at",
        params![conv.session_id, data_json, phase, last_activity, expires_at],
    )?;
    Ok(())
}

pub fn delete_conversation(conn: &Connection, session_id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM conversations WHERE session_id = ?1",
        params![session_id],
    )?;
    Ok(count > 0)
}

pub fn expire_old_conversations(conn: &Connection) -> anyhow::Result<usize> {
    let now = Utc::now().naive_utc().format(DATETIME_FMT).to_string();
    let count = conn.execute(
        "DELETE FROM conversations WHERE expires_at <= ?1",
        params![now],
    )?;
    Ok(count)
}

// ── Providers ──

pub fn seed_default_providers(conn: &Connection) -> anyhow::Result<()> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM providers", [], |row| row.get(0))?;
    if count > 0 {
        return Ok(());
    }
    for p in ProviderDirectory::fallback().providers() {
        conn.execute(
            "INSERT OR IGNORE INTO providers (id, name, specialty, location, email, weekly_schedule)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![p.id, p.name, p.specialty, p.location, p.email, p.weekly_schedule],
        )?;
    }
    tracing::info!("seeded default provider roster");
    Ok(())
}

/// Load the provider directory; any failure or an empty table falls back to
/// the built-in roster rather than surfacing an error.
pub fn load_directory(conn: &Connection) -> ProviderDirectory {
    let loaded = (|| -> anyhow::Result<Vec<Provider>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, specialty, location, email, weekly_schedule
             FROM providers ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut providers = Vec::new();
        for row in rows {
            let (id, name, specialty, location, email, weekly_schedule) = row?;
            providers.push(Provider::new(
                &id,
                &name,
                &specialty,
                &location,
                email.as_deref(),
                &weekly_schedule,
            ));
        }
        Ok(providers)
    })();

    match loaded {
        Ok(providers) => ProviderDirectory::new(providers),
        Err(e) => {
            tracing::warn!(error = %e, "provider directory unavailable, using built-in roster");
            ProviderDirectory::fallback()
        }
    }
}

// ── Bookings ──

/// Insert a finalized booking. Returns false when an identical
/// (provider, slot, patient) booking already exists.
pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<bool> {
    let count = conn.execute(
        "INSERT OR IGNORE INTO bookings
            (id, patient_name, contact, condition, provider_id, provider_name, specialty,
             location, visit_type, appointment_slot, slot_time, selected_day, selected_time,
             duration, severity, allergies, medications, gender, dob, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
        params![
            booking.id,
            booking.patient_name,
            booking.contact,
            booking.condition,
            booking.provider_id,
            booking.provider_name,
            booking.specialty,
            booking.location,
            booking.visit_type.as_str(),
            booking.appointment_slot,
            booking.slot_time.format(MINUTE_FMT).to_string(),
            booking.selected_day,
            booking.selected_time,
            booking.intake.duration,
            booking.intake.severity.map(|s| s.as_str()),
            booking.intake.allergies,
            booking.intake.medications,
            booking.intake.gender,
            booking.intake.dob,
            booking.created_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(count > 0)
}

/// Slots already taken for a provider, in the wire format produced by the
/// availability engine.
pub fn booked_slots(conn: &Connection, provider_id: &str) -> anyhow::Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT slot_time FROM bookings WHERE provider_id = ?1")?;
    let rows = stmt.query_map(params![provider_id], |row| row.get::<_, String>(0))?;

    let mut slots = HashSet::new();
    for row in rows {
        slots.insert(row?);
    }
    Ok(slots)
}

pub fn list_bookings(conn: &Connection, limit: i64) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_name, contact, condition, provider_id, provider_name, specialty,
                location, visit_type, appointment_slot, slot_time, selected_day, selected_time,
                duration, severity, allergies, medications, gender, dob, created_at
         FROM bookings ORDER BY created_at DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], parse_booking_row)?;

    let mut bookings = Vec::new();
    for row in rows {
        bookings.push(row?);
    }
    Ok(bookings)
}

fn parse_booking_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Booking> {
    let visit_type: String = row.get(8)?;
    let slot_time: String = row.get(10)?;
    let severity: Option<String> = row.get(14)?;
    let created_at: String = row.get(19)?;

    Ok(Booking {
        id: row.get(0)?,
        patient_name: row.get(1)?,
        contact: row.get(2)?,
        condition: row.get(3)?,
        provider_id: row.get(4)?,
        provider_name: row.get(5)?,
        specialty: row.get(6)?,
        location: row.get(7)?,
        visit_type: VisitType::parse(&visit_type).unwrap_or(VisitType::InPerson),
        appointment_slot: row.get(9)?,
        slot_time: NaiveDateTime::parse_from_str(&slot_time, MINUTE_FMT)
            .unwrap_or_else(|_| Utc::now().naive_utc()),
        selected_day: row.get(11)?,
        selected_time: row.get(12)?,
        intake: OptionalIntake {
            duration: row.get(13)?,
            severity: severity.as_deref().and_then(Severity::parse),
            allergies: row.get(15)?,
            medications: row.get(16)?,
            gender: row.get(17)?,
            dob: row.get(18)?,
        },
        created_at: NaiveDateTime::parse_from_str(&created_at, DATETIME_FMT)
            .unwrap_or_else(|_| Utc::now().naive_utc()),
    })
}

// ── Patients ──

/// Best-effort patient profile upsert keyed by email or phone digits. New
/// intake details overwrite nothing that the booking left blank.
pub fn upsert_patient_profile(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    let (email, mobile) = if booking.contact.contains('@') {
        (Some(booking.contact.as_str()), None)
    } else {
        (None, Some(booking.contact.as_str()))
    };

    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM patients
             WHERE (?1 IS NOT NULL AND email = ?1) OR (?2 IS NOT NULL AND mobile = ?2)",
            params![email, mobile],
            |row| row.get(0),
        )
        .optional()?;

    let last_appointment = booking.slot_time.format("%Y-%m-%d").to_string();

    match existing {
        Some(id) => {
            conn.execute(
                "UPDATE patients SET
                    name = ?2,
                    email = COALESCE(?3, email),
                    mobile = COALESCE(?4, mobile),
                    dob = COALESCE(?5, dob),
                    gender = COALESCE(?6, gender),
                    allergies = COALESCE(?7, allergies),
                    medications = COALESCE(?8, medications),
                    symptoms = ?9,
                    last_appointment = ?10,
                    total_appointments = total_appointments + 1
                 WHERE id = ?1",
                params![
                    id,
                    booking.patient_name,
                    email,
                    mobile,
                    booking.intake.dob,
                    booking.intake.gender,
                    booking.intake.allergies,
                    booking.intake.medications,
                    booking.condition,
                    last_appointment,
                ],
            )?;
        }
        None => {
            conn.execute(
                "INSERT INTO patients
                    (id, name, email, mobile, dob, gender, allergies, medications, symptoms,
                     last_appointment, total_appointments)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1)",
                params![
                    uuid::Uuid::new_v4().to_string(),
                    booking.patient_name,
                    email,
                    mobile,
                    booking.intake.dob,
                    booking.intake.gender,
                    booking.intake.allergies,
                    booking.intake.medications,
                    booking.condition,
                    last_appointment,
                ],
            )?;
        }
    }
    Ok(())
}

// ── Reminders ──

/// Append one reminder. Returns false when the dedup key
/// (provider, slot, patient, kind) already has an entry.
pub fn insert_reminder(conn: &Connection, reminder: &Reminder) -> anyhow::Result<bool> {
    let count = conn.execute(
        "INSERT OR IGNORE INTO reminders
            (booking_id, provider_id, provider_name, provider_email, patient_name, contact,
             appointment_slot, slot_time, remind_at, kind, sent)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0)",
        params![
            reminder.booking_id,
            reminder.provider_id,
            reminder.provider_name,
            reminder.provider_email,
            reminder.patient_name,
            reminder.contact,
            reminder.appointment_slot,
            reminder.slot_time.format(MINUTE_FMT).to_string(),
            reminder.remind_at.format(MINUTE_FMT).to_string(),
            reminder.kind,
        ],
    )?;
    Ok(count > 0)
}

/// Unsent reminders whose remind_at equals the given minute.
pub fn due_reminders(conn: &Connection, now_minute: &str) -> anyhow::Result<Vec<Reminder>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_id, provider_id, provider_name, provider_email, patient_name,
                contact, appointment_slot, slot_time, remind_at, kind, sent
         FROM reminders WHERE sent = 0 AND remind_at = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![now_minute], parse_reminder_row)?;

    let mut due = Vec::new();
    for row in rows {
        due.push(row?);
    }
    Ok(due)
}

pub fn mark_reminder_sent(conn: &Connection, id: i64) -> anyhow::Result<()> {
    conn.execute("UPDATE reminders SET sent = 1 WHERE id = ?1", params![id])?;
    Ok(())
}

pub fn list_reminders(conn: &Connection, limit: i64) -> anyhow::Result<Vec<Reminder>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_id, provider_id, provider_name, provider_email, patient_name,
                contact, appointment_slot, slot_time, remind_at, kind, sent
         FROM reminders ORDER BY remind_at DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], parse_reminder_row)?;

    let mut reminders = Vec::new();
    for row in rows {
        reminders.push(row?);
    }
    Ok(reminders)
}

fn parse_reminder_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reminder> {
    let slot_time: String = row.get(8)?;
    let remind_at: String = row.get(9)?;
    let sent: i64 = row.get(11)?;

    Ok(Reminder {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        provider_id: row.get(2)?,
        provider_name: row.get(3)?,
        provider_email: row.get(4)?,
        patient_name: row.get(5)?,
        contact: row.get(6)?,
        appointment_slot: row.get(7)?,
        slot_time: NaiveDateTime::parse_from_str(&slot_time, MINUTE_FMT)
            .unwrap_or_else(|_| Utc::now().naive_utc()),
        remind_at: NaiveDateTime::parse_from_str(&remind_at, MINUTE_FMT)
            .unwrap_or_else(|_| Utc::now().naive_utc()),
        kind: row.get(10)?,
        sent: sent != 0,
    })
}
