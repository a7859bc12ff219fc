use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::{
    error::AppResult,
    services::stats::{database_health, DatabaseHealth},
    state::AppState,
};

pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

pub async fn database(State(state): State<AppState>) -> AppResult<Json<DatabaseHealth>> {
    Ok(Json(database_health(state.store.as_ref()).await?))
}

pub async fn tmdb(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "configured": state.tmdb.is_some(),
        "api_url": state.config.tmdb_api_url,
    }))
}
