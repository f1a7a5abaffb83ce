use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::db::queries;
use crate::errors::AppError;
use crate::services::availability;
use crate::state::AppState;

/// Roster with a live availability preview per provider.
pub async fn list_providers(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let db = state.db.lock().unwrap();
    let directory = queries::load_directory(&db);
    let now = Utc::now().naive_utc();

    let roster: Vec<Value> = directory
        .providers()
        .iter()
        .map(|p| {
            let booked = queries::booked_slots(&db, &p.id).unwrap_or_default();
            let slots = availability::next_free_slots(p, &booked, 6, now);
            json!({
                "id": p.id,
                "name": p.name,
                "specialty": p.specialty,
                "location": p.location,
                "available_days": p.available_days,
                "working_hours": p.working_hours,
                "next_open_slots": slots,
            })
        })
        .collect();

    Ok(Json(json!({ "providers": roster })))
}
