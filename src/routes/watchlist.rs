use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    middleware::CurrentUser,
    models::{WatchlistEntry, WatchlistItem},
    routes::extract::{AppJson, AppQuery},
    state::AppState,
};

pub async fn get_watchlist(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<WatchlistEntry>>> {
    Ok(Json(state.catalog().watchlist(&user.id).await?))
}

pub async fn add_to_watchlist(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(item): AppJson<WatchlistItem>,
) -> AppResult<(StatusCode, Json<WatchlistEntry>)> {
    let entry = state.catalog().add_to_watchlist(&user.id, &item).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn remove_from_watchlist(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(item): AppQuery<WatchlistItem>,
) -> AppResult<StatusCode> {
    state.catalog().remove_from_watchlist(&user.id, &item).await?;
    Ok(StatusCode::NO_CONTENT)
}
