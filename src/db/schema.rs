/// Complete database schema. Applied at startup; every statement is
/// idempotent.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    session_id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    phase TEXT NOT NULL DEFAULT 'collecting_provider',
    last_activity TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS providers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    specialty TEXT NOT NULL,
    location TEXT NOT NULL,
    email TEXT,
    weekly_schedule TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS bookings (
    id TEXT PRIMARY KEY,
    patient_name TEXT NOT NULL,
    contact TEXT NOT NULL,
    condition TEXT NOT NULL,
    provider_id TEXT NOT NULL,
    provider_name TEXT NOT NULL,
    specialty TEXT NOT NULL,
    location TEXT NOT NULL,
    visit_type TEXT NOT NULL,
    appointment_slot TEXT NOT NULL,
    slot_time TEXT NOT NULL,
    selected_day TEXT NOT NULL,
    selected_time TEXT NOT NULL,
    duration TEXT,
    severity TEXT,
    allergies TEXT,
    medications TEXT,
    gender TEXT,
    dob TEXT,
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_bookings_dedup
    ON bookings(provider_id, slot_time, patient_name);

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT,
    mobile TEXT,
    dob TEXT,
    gender TEXT,
    allergies TEXT,
    medications TEXT,
    symptoms TEXT,
    last_appointment TEXT,
    total_appointments INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS reminders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    booking_id TEXT NOT NULL,
    provider_id TEXT NOT NULL,
    provider_name TEXT NOT NULL,
    provider_email TEXT,
    patient_name TEXT NOT NULL,
    contact TEXT NOT NULL,
    appointment_slot TEXT NOT NULL,
    slot_time TEXT NOT NULL,
    remind_at TEXT NOT NULL,
    kind TEXT NOT NULL,
    sent INTEGER NOT NULL DEFAULT 0
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_reminders_dedup
    ON reminders(provider_id, slot_time, patient_name, kind);

CREATE INDEX IF NOT EXISTS idx_reminders_due ON reminders(sent, remind_at);
"#;
