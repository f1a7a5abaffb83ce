use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use chrono::NaiveDateTime;
use tower::ServiceExt;

use medbird::config::AppConfig;
use medbird::db::{self, queries};
use medbird::handlers;
use medbird::services::ai::{Message, SuggestionProvider};
use medbird::services::notify::NotificationTransport;
use medbird::state::AppState;

// ── Mock collaborators ──

/// Replays scripted suggestion-source responses in order; an exhausted
/// script behaves like an outage.
struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedLlm {
    fn new(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
        }
    }
}

#[async_trait]
impl SuggestionProvider for ScriptedLlm {
    async fn chat(&self, _system: &str, _messages: &[Message]) -> anyhow::Result<String> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("suggestion source down"))
    }
}

struct MockTransport {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl NotificationTransport for MockTransport {
    async fn send(&self, recipient: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), subject.to_string()));
        Ok(())
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        llm_provider: "ollama".to_string(),
        groq_api_key: String::new(),
        groq_model: String::new(),
        ollama_url: "http://localhost:11434".to_string(),
        mail_api_key: String::new(),
        mail_from: "no-reply@medbird.example".to_string(),
        reminder_poll_secs: 3600,
        reminder_offsets_minutes: vec![120, 10],
    }
}

fn test_state(responses: &[&str]) -> (Arc<AppState>, Arc<Mutex<Vec<(String, String)>>>) {
    let conn = db::init_db(":memory:").unwrap();
    queries::seed_default_providers(&conn).unwrap();
    let sent = Arc::new(Mutex::new(vec![]));
    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: test_config(),
        llm: Box::new(ScriptedLlm::new(responses)),
        mailer: Box::new(MockTransport {
            sent: Arc::clone(&sent),
        }),
        reminder_loop_running: AtomicBool::new(false),
    });
    (state, sent)
}

fn test_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/chat", post(handlers::chat::chat))
        .route("/api/chat/reset", post(handlers::chat::reset))
        .route("/api/providers", get(handlers::providers::list_providers))
        .route("/api/bookings", get(handlers::bookings::list_bookings))
        .route("/api/reminders", get(handlers::bookings::list_reminders))
        .with_state(state)
}

fn chat_request(session_id: &str, message: &str) -> Request<Body> {
    let payload = serde_json::json!({ "session_id": session_id, "message": message });
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("Content-Type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn body_json(res: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

const NEUTRAL: &str = r#"{"say":"Noted.","set":{},"done":false}"#;

const FILL_CORE: &str = r#"{"say":"I have you down for Monday at 10:00 AM.","set":{"patient_name":"John Smith","contact":"john@example.com","selected_day":"Monday","selected_time":"10:00 AM"},"done":false}"#;

// ── Tests ──

#[tokio::test]
async fn test_health() {
    let (state, _) = test_state(&[]);
    let app = test_app(state);

    let res = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_provider_roster_with_availability_preview() {
    let (state, _) = test_state(&[]);
    let app = test_app(state);

    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/providers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let json = body_json(res).await;
    let providers = json["providers"].as_array().unwrap();
    assert_eq!(providers.len(), 4);

    let cardio = providers
        .iter()
        .find(|p| p["specialty"] == "Cardiology")
        .unwrap();
    assert_eq!(cardio["name"], "Dr. Maya Patel");
    assert_eq!(cardio["working_hours"], "9:00 AM - 5:00 PM");
    assert_eq!(cardio["available_days"].as_array().unwrap().len(), 5);
    // live preview: open weekday slots exist
    assert!(!cardio["next_open_slots"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_full_booking_flow() {
    let (state, sent) = test_state(&[FILL_CORE, NEUTRAL]);

    // Turn 1: symptoms, explicit telehealth preference, model fills core fields
    let app = test_app(state.clone());
    let res = app
        .oneshot(chat_request(
            "s1",
            "I have chest pain and want a telehealth visit. I'm John Smith, john@example.com, Monday 10am.",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["finalized"], false);
    // one-time optional intake nudge
    assert!(json["reply"].as_str().unwrap().contains("allergies"));

    // Turn 2: declining the optional intake completes the booking
    let app = test_app(state.clone());
    let res = app
        .oneshot(chat_request("s1", "no, nothing else"))
        .await
        .unwrap();
    let json = body_json(res).await;
    assert_eq!(json["finalized"], true);
    assert!(json["booking_id"].is_string());
    assert!(json["reply"].as_str().unwrap().contains("confirmed"));

    // The booking landed with the cardiology provider, telehealth locked in
    let app = test_app(state.clone());
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/bookings")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(res).await;
    let bookings = json["bookings"].as_array().unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0]["specialty"], "Cardiology");
    assert_eq!(bookings[0]["visit_type"], "telehealth");
    assert_eq!(bookings[0]["patient_name"], "John Smith");
    assert_eq!(bookings[0]["condition"], "chest pain");

    // Both reminder offsets registered, none sent yet
    let app = test_app(state.clone());
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/reminders")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(res).await;
    let reminders = json["reminders"].as_array().unwrap();
    assert_eq!(reminders.len(), 2);
    let kinds: Vec<&str> = reminders.iter().map(|r| r["kind"].as_str().unwrap()).collect();
    assert!(kinds.contains(&"T-120m"));
    assert!(kinds.contains(&"T-10m"));
    assert!(reminders.iter().all(|r| r["sent"] == false));

    // Confirmation email reached the patient
    assert!(sent
        .lock()
        .unwrap()
        .iter()
        .any(|(to, subject)| to == "john@example.com" && subject.contains("Confirmation")));
}

#[tokio::test]
async fn test_booked_slot_disappears_from_availability() {
    let (state, _) = test_state(&[FILL_CORE, NEUTRAL]);

    let app = test_app(state.clone());
    app.oneshot(chat_request(
        "s1",
        "chest pain, telehealth, John Smith, john@example.com, Monday 10am",
    ))
    .await
    .unwrap();
    let app = test_app(state.clone());
    app.oneshot(chat_request("s1", "no, that's it"))
        .await
        .unwrap();

    let app = test_app(state.clone());
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/bookings")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(res).await;
    let slot_time = json["bookings"][0]["slot_time"].as_str().unwrap().to_string();
    let booked_slot = NaiveDateTime::parse_from_str(&slot_time, "%Y-%m-%dT%H:%M:%S")
        .unwrap()
        .format("%Y-%m-%d %H:%M")
        .to_string();

    let app = test_app(state.clone());
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/providers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(res).await;
    let cardio = json["providers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["specialty"] == "Cardiology")
        .unwrap()
        .clone();
    let open: Vec<&str> = cardio["next_open_slots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s.as_str().unwrap())
        .collect();
    assert!(!open.contains(&booked_slot.as_str()));
}

#[tokio::test]
async fn test_suggestion_outage_still_answers() {
    let (state, _) = test_state(&[]);
    let app = test_app(state);

    let res = app
        .oneshot(chat_request("s1", "I need an appointment for a fever"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["finalized"], false);
    assert!(json["reply"].as_str().unwrap().contains("Please share"));
}

#[tokio::test]
async fn test_empty_message_is_prompted() {
    let (state, _) = test_state(&[]);
    let app = test_app(state);

    let res = app.oneshot(chat_request("s1", "   ")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert!(json["reply"].as_str().unwrap().contains("tell me"));
}

#[tokio::test]
async fn test_reset_clears_session() {
    let (state, _) = test_state(&[NEUTRAL]);

    let app = test_app(state.clone());
    app.oneshot(chat_request("s1", "I have a rash")).await.unwrap();

    let app = test_app(state.clone());
    let payload = serde_json::json!({ "session_id": "s1" });
    let res = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/chat/reset")
                .header("Content-Type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["reset"], true);

    let db = state.db.lock().unwrap();
    assert!(queries::get_conversation(&db, "s1").unwrap().is_none());
}
