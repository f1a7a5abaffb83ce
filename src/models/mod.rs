pub mod booking;
pub mod conversation;
pub mod provider;
pub mod reminder;
pub mod suggestion;

pub use booking::{Booking, BookingPhase, BookingState, OptionalIntake, Severity, VisitType};
pub use conversation::{Conversation, ConversationMessage, SESSION_TTL_MINUTES};
pub use provider::{Provider, ProviderDirectory};
pub use reminder::Reminder;
pub use suggestion::{SuggestedFields, Suggestion};
