use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    middleware::AdminUser,
    services::stats::{store_stats, StoreStats},
    state::AppState,
};

pub async fn stats(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> AppResult<Json<StoreStats>> {
    tracing::info!(user_id = %admin.id, "Serving admin stats");
    Ok(Json(store_stats(state.store.as_ref()).await?))
}
