use axum::{extract::State, response::Json};
use serde_json::{Value, json};

use crate::server::AppState;

pub async fn health(State(app): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "authorized": app.controller.is_authorized().await,
        "polling": app.controller.is_polling(),
    }))
}
