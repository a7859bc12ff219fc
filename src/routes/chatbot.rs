use axum::{extract::State, Json};

use crate::{
    error::{AppError, AppResult},
    models::{ChatRequest, ChatResponse},
    routes::extract::AppJson,
    services::Chatbot,
    state::AppState,
};

pub async fn chat(
    State(state): State<AppState>,
    AppJson(request): AppJson<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    let message = request
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Message is required".into()))?;

    let reply = Chatbot::new(state.store.as_ref()).reply(message).await?;
    Ok(Json(reply))
}
