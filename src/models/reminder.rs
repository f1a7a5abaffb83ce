use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::booking::Booking;

/// One scheduled notification for a booking. Rows are append-only: the
/// scheduler only ever flips `sent`, so the log doubles as an audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: i64,
    pub booking_id: String,
    pub provider_id: String,
    pub provider_name: String,
    pub provider_email: Option<String>,
    pub patient_name: String,
    pub contact: String,
    pub appointment_slot: String,
    pub slot_time: NaiveDateTime,
    pub remind_at: NaiveDateTime,
    pub kind: String,
    pub sent: bool,
}

impl Reminder {
    pub fn for_booking(
        booking: &Booking,
        provider_email: Option<&str>,
        offset_minutes: i64,
    ) -> Self {
        Self {
            id: 0,
            booking_id: booking.id.clone(),
            provider_id: booking.provider_id.clone(),
            provider_name: booking.provider_name.clone(),
            provider_email: provider_email.map(|e| e.to_string()),
            patient_name: booking.patient_name.clone(),
            contact: booking.contact.clone(),
            appointment_slot: booking.appointment_slot.clone(),
            slot_time: booking.slot_time,
            remind_at: booking.slot_time - Duration::minutes(offset_minutes),
            kind: format!("T-{offset_minutes}m"),
            sent: false,
        }
    }
}
