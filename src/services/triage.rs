use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::provider::{Provider, ProviderDirectory};

/// Symptom keyword -> specialty category, checked in this order. First
/// substring hit wins.
pub const CONDITION_SPECIALTIES: &[(&str, &str)] = &[
    ("chest pain", "cardiology"),
    ("hypertension", "cardiology"),
    ("palpitations", "cardiology"),
    ("shortness of breath", "cardiology"),
    ("acne", "dermatology"),
    ("eczema", "dermatology"),
    ("rash", "dermatology"),
    ("psoriasis", "dermatology"),
    ("mole", "dermatology"),
    ("knee pain", "orthopedics"),
    ("back pain", "orthopedics"),
    ("shoulder pain", "orthopedics"),
    ("sprain", "orthopedics"),
    ("fracture", "orthopedics"),
    ("headache", "internal medicine"),
    ("fever", "internal medicine"),
    ("cold", "internal medicine"),
    ("migraine", "internal medicine"),
    ("fatigue", "internal medicine"),
    ("checkup", "internal medicine"),
    ("vomiting", "internal medicine"),
    ("nausea", "internal medicine"),
];

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
});

pub fn infer_condition(text: &str) -> Option<&'static str> {
    let t = text.to_lowercase();
    CONDITION_SPECIALTIES
        .iter()
        .find(|(condition, _)| t.contains(condition))
        .map(|(condition, _)| *condition)
}

/// Bind a provider for whatever condition the text mentions. Unknown
/// symptoms, and specialties with no provider on the roster, land on
/// internal medicine.
pub fn match_provider_for_condition<'a>(
    text: &str,
    directory: &'a ProviderDirectory,
) -> &'a Provider {
    let t = text.to_lowercase();
    for (condition, category) in CONDITION_SPECIALTIES {
        if t.contains(condition) {
            if let Some(provider) = directory.by_category(category) {
                return provider;
            }
        }
    }
    directory.default_provider()
}

/// Pull a usable contact out of free text: the first email if one appears,
/// otherwise the digits if at least ten remain. Total — never errors.
pub fn validate_contact(text: &str) -> Option<String> {
    if let Some(m) = EMAIL_RE.find(text) {
        return Some(m.as_str().to_string());
    }
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() >= 10 {
        Some(digits)
    } else {
        None
    }
}
