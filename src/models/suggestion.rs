use serde::{Deserialize, Serialize};

/// One turn's structured proposal from the external suggestion source.
/// Any field absent from `set` leaves the booking untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub say: String,
    #[serde(default)]
    pub set: SuggestedFields,
    #[serde(default)]
    pub done: bool,
}

impl Suggestion {
    /// Wrap free text that did not parse as a structured suggestion.
    pub fn plain(say: impl Into<String>) -> Self {
        Self {
            say: say.into(),
            set: SuggestedFields::default(),
            done: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestedFields {
    pub condition: Option<String>,
    pub visit_type: Option<String>,
    pub patient_name: Option<String>,
    pub contact: Option<String>,
    pub selected_day: Option<String>,
    pub selected_time: Option<String>,
    pub duration: Option<String>,
    pub severity: Option<String>,
    pub allergies: Option<String>,
    pub medications: Option<String>,
    pub gender: Option<String>,
    pub dob: Option<String>,
}
