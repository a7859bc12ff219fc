use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    routes::extract::AppQuery,
    services::{IngestionPipeline, SyncOptions, SyncSummary},
    state::AppState,
};

/// Optional per-run overrides of the configured page counts
#[derive(Debug, Default, Deserialize)]
pub struct SyncQuery {
    pub movie_pages: Option<u32>,
    pub tv_pages: Option<u32>,
    pub people_pages: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub summary: SyncSummary,
}

/// Runs the full ingestion pipeline and reports what it wrote
pub async fn run_sync(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<SyncQuery>,
) -> AppResult<Json<SyncResponse>> {
    let tmdb = state
        .tmdb
        .clone()
        .ok_or_else(|| AppError::MissingConfig("TMDB_API_KEY is not configured".into()))?;

    let mut options = SyncOptions::from_config(&state.config);
    if let Some(pages) = params.movie_pages {
        options.movie_pages = pages;
    }
    if let Some(pages) = params.tv_pages {
        options.tv_pages = pages;
    }
    if let Some(pages) = params.people_pages {
        options.people_pages = pages;
    }

    let summary = IngestionPipeline::new(tmdb, state.store.clone(), options)
        .run()
        .await;

    Ok(Json(SyncResponse {
        success: true,
        summary,
    }))
}
