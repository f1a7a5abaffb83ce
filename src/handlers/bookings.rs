use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::db::queries;
use crate::errors::AppError;
use crate::state::AppState;

pub async fn list_bookings(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let bookings = {
        let db = state.db.lock().unwrap();
        queries::list_bookings(&db, 100)?
    };
    Ok(Json(json!({ "bookings": bookings })))
}

pub async fn list_reminders(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let reminders = {
        let db = state.db.lock().unwrap();
        queries::list_reminders(&db, 100)?
    };
    Ok(Json(json!({ "reminders": reminders })))
}
