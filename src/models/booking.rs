use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::services::availability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisitType {
    InPerson,
    Telehealth,
}

impl VisitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitType::InPerson => "in-person",
            VisitType::Telehealth => "telehealth",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "telehealth" | "virtual" | "video" | "video visit" | "online" => {
                Some(VisitType::Telehealth)
            }
            "in-person" | "in person" | "in_person" | "clinic" | "office" => {
                Some(VisitType::InPerson)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        }
    }

    /// Accepts the words low/medium/high or a 0-5 scale (0-1 low, 2-3 medium,
    /// 4-5 high).
    pub fn parse(s: &str) -> Option<Self> {
        let t = s.trim().to_lowercase();
        match t.as_str() {
            "low" | "mild" => return Some(Severity::Low),
            "medium" | "moderate" => return Some(Severity::Medium),
            "high" | "severe" => return Some(Severity::High),
            _ => {}
        }
        match t.chars().next().and_then(|c| c.to_digit(10)) {
            Some(0 | 1) => Some(Severity::Low),
            Some(2 | 3) => Some(Severity::Medium),
            Some(4 | 5) => Some(Severity::High),
            _ => None,
        }
    }
}

/// Where the conversation currently stands, derived from field presence.
/// Fields may still fill in any order; this is a read-only view, not a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingPhase {
    CollectingProvider,
    CollectingSchedule,
    CollectingIdentity,
    AwaitingOptionalIntake,
    AwaitingConfirmation,
}

impl BookingPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingPhase::CollectingProvider => "collecting_provider",
            BookingPhase::CollectingSchedule => "collecting_schedule",
            BookingPhase::CollectingIdentity => "collecting_identity",
            BookingPhase::AwaitingOptionalIntake => "awaiting_optional_intake",
            BookingPhase::AwaitingConfirmation => "awaiting_confirmation",
        }
    }
}

/// The in-progress booking for one conversation. Serialized as JSON inside
/// the conversation row; unknown or missing fields deserialize to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingState {
    pub condition: Option<String>,
    pub provider_id: Option<String>,
    pub provider_name: Option<String>,
    pub specialty: Option<String>,
    pub location: Option<String>,
    pub visit_type: Option<VisitType>,
    pub patient_name: Option<String>,
    pub contact: Option<String>,
    pub selected_day: Option<String>,
    pub selected_time: Option<String>,
    pub final_slot: Option<String>,
    // optional clinical intake
    pub duration: Option<String>,
    pub severity: Option<Severity>,
    pub allergies: Option<String>,
    pub medications: Option<String>,
    pub gender: Option<String>,
    pub dob: Option<String>,
    // flow flags
    pub asked_optional: bool,
    pub optional_declined: bool,
    pub invalid_contact_notice: bool,
    // set when the user stated a visit-type preference in their own words;
    // a suggestion can then no longer change visit_type
    pub visit_type_locked: bool,
}

impl BookingState {
    /// Optional intake is never required here.
    pub fn is_complete(&self) -> bool {
        self.provider_id.is_some()
            && self.provider_name.is_some()
            && self.specialty.is_some()
            && self.location.is_some()
            && self.visit_type.is_some()
            && self.patient_name.is_some()
            && self.contact.is_some()
            && self.selected_day.is_some()
            && self.selected_time.is_some()
    }

    pub fn phase(&self) -> BookingPhase {
        if self.provider_id.is_none() {
            return BookingPhase::CollectingProvider;
        }
        if self.visit_type.is_none() || self.selected_day.is_none() || self.selected_time.is_none()
        {
            return BookingPhase::CollectingSchedule;
        }
        if self.patient_name.is_none() || self.contact.is_none() {
            return BookingPhase::CollectingIdentity;
        }
        if !self.asked_optional && !self.optional_declined {
            return BookingPhase::AwaitingOptionalIntake;
        }
        BookingPhase::AwaitingConfirmation
    }

    /// Rebuild the human-readable slot label from the next future occurrence
    /// of the selected weekday. No-op until both day and time are present.
    pub fn recompute_final_slot(&mut self, now: NaiveDateTime) {
        let (Some(day), Some(time)) = (self.selected_day.as_deref(), self.selected_time.as_deref())
        else {
            return;
        };
        let Some(weekday) = availability::weekday_from_name(day) else {
            return;
        };
        let date = upcoming_date(weekday, now);
        let label = format!("{day}, {} at {time}", date.format("%B %d"));
        self.final_slot = Some(label);
    }

    /// Concrete timestamp for the selected day and time, if both parse.
    pub fn slot_datetime(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let weekday = availability::weekday_from_name(self.selected_day.as_deref()?)?;
        let minute = availability::parse_clock(self.selected_time.as_deref()?)?;
        let date = upcoming_date(weekday, now);
        date.and_hms_opt(minute / 60, minute % 60, 0)
    }

    pub fn to_booking(&self, slot_time: NaiveDateTime, now: NaiveDateTime) -> Booking {
        Booking {
            id: uuid::Uuid::new_v4().to_string(),
            patient_name: self.patient_name.clone().unwrap_or_default(),
            contact: self.contact.clone().unwrap_or_default(),
            condition: self
                .condition
                .clone()
                .unwrap_or_else(|| "unspecified".to_string()),
            provider_id: self.provider_id.clone().unwrap_or_default(),
            provider_name: self.provider_name.clone().unwrap_or_default(),
            specialty: self.specialty.clone().unwrap_or_default(),
            location: self.location.clone().unwrap_or_default(),
            visit_type: self.visit_type.unwrap_or(VisitType::InPerson),
            appointment_slot: self.final_slot.clone().unwrap_or_else(|| {
                format!(
                    "{} at {}",
                    self.selected_day.clone().unwrap_or_default(),
                    self.selected_time.clone().unwrap_or_default()
                )
            }),
            slot_time,
            selected_day: self.selected_day.clone().unwrap_or_default(),
            selected_time: self.selected_time.clone().unwrap_or_default(),
            intake: OptionalIntake {
                duration: self.duration.clone(),
                severity: self.severity,
                allergies: self.allergies.clone(),
                medications: self.medications.clone(),
                gender: self.gender.clone(),
                dob: self.dob.clone(),
            },
            created_at: now,
        }
    }
}

/// Next future calendar date falling on `weekday`. A match on today rolls a
/// full week forward.
fn upcoming_date(weekday: Weekday, now: NaiveDateTime) -> NaiveDate {
    let today = now.date();
    let diff = (weekday.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);
    let days = if diff == 0 { 7 } else { diff };
    today + Duration::days(days)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionalIntake {
    pub duration: Option<String>,
    pub severity: Option<Severity>,
    pub allergies: Option<String>,
    pub medications: Option<String>,
    pub gender: Option<String>,
    pub dob: Option<String>,
}

/// The finalized booking record handed to persistence and the reminder
/// scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub patient_name: String,
    pub contact: String,
    pub condition: String,
    pub provider_id: String,
    pub provider_name: String,
    pub specialty: String,
    pub location: String,
    pub visit_type: VisitType,
    pub appointment_slot: String,
    pub slot_time: NaiveDateTime,
    pub selected_day: String,
    pub selected_time: String,
    pub intake: OptionalIntake,
    pub created_at: NaiveDateTime,
}
