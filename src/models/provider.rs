use serde::{Deserialize, Serialize};

use crate::services::availability;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub specialty: String,
    pub location: String,
    pub email: Option<String>,
    pub weekly_schedule: String,
    pub available_days: Vec<String>,
    pub working_hours: String,
}

impl Provider {
    pub fn new(
        id: &str,
        name: &str,
        specialty: &str,
        location: &str,
        email: Option<&str>,
        weekly_schedule: &str,
    ) -> Self {
        let schedule = availability::parse_weekly_schedule(weekly_schedule);
        Self {
            id: id.to_string(),
            name: name.to_string(),
            specialty: specialty.to_string(),
            location: location.to_string(),
            email: email.map(|e| e.to_string()),
            weekly_schedule: weekly_schedule.to_string(),
            available_days: availability::day_names(&schedule),
            working_hours: availability::hours_label(&schedule),
        }
    }
}

/// Collapse a free-form specialty string into one of the four roster categories.
pub fn specialty_category(specialty: &str) -> &'static str {
    let s = specialty.to_lowercase();
    if s.contains("cardio") || s.contains("cardiac") {
        "cardiology"
    } else if s.contains("derm") || s.contains("skin") {
        "dermatology"
    } else if s.contains("ortho") || s.contains("bone") {
        "orthopedics"
    } else {
        "internal medicine"
    }
}

/// Read-only provider lookup. Always holds at least one provider: an empty
/// source collapses to the built-in roster.
pub struct ProviderDirectory {
    providers: Vec<Provider>,
}

impl ProviderDirectory {
    pub fn new(providers: Vec<Provider>) -> Self {
        if providers.is_empty() {
            Self::fallback()
        } else {
            Self { providers }
        }
    }

    /// The fixed built-in roster used when no provider source is available.
    pub fn fallback() -> Self {
        Self {
            providers: vec![
                Provider::new(
                    "d001",
                    "Dr. Maya Patel",
                    "Cardiology",
                    "Downtown Clinic",
                    None,
                    "M-F 9:00am-5:00pm",
                ),
                Provider::new(
                    "d002",
                    "Dr. Alex Nguyen",
                    "Dermatology",
                    "Uptown Medical Center",
                    None,
                    "M-F 10:00am-4:00pm",
                ),
                Provider::new(
                    "d003",
                    "Dr. Sara Haddad",
                    "Orthopedics",
                    "City Ortho Hub",
                    None,
                    "M-F 8:00am-6:00pm",
                ),
                Provider::new(
                    "d004",
                    "Dr. Priya Sharma",
                    "Internal Medicine",
                    "Riverside Family Practice",
                    None,
                    "M-F 9:00am-5:00pm",
                ),
            ],
        }
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn by_id(&self, id: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn by_category(&self, category: &str) -> Option<&Provider> {
        self.providers
            .iter()
            .find(|p| specialty_category(&p.specialty) == category)
    }

    pub fn default_provider(&self) -> &Provider {
        self.by_category("internal medicine")
            .unwrap_or(&self.providers[0])
    }
}
