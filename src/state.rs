use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::ai::SuggestionProvider;
use crate::services::notify::NotificationTransport;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub llm: Box<dyn SuggestionProvider>,
    pub mailer: Box<dyn NotificationTransport>,
    pub reminder_loop_running: AtomicBool,
}
