use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{
    error::AppResult,
    models::{
        CollectionDetails, ContentType, Movie, MovieDetails, Page, PersonDetails, Review,
        SearchResults, TvShow, TvShowDetails,
    },
    routes::extract::{AppPath, AppQuery},
    services::catalog::ListParams,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
}

pub async fn list_movies(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListParams>,
) -> AppResult<Json<Page<Movie>>> {
    Ok(Json(state.catalog().movies(&params).await?))
}

pub async fn get_movie(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<MovieDetails>> {
    Ok(Json(state.catalog().movie(id).await?))
}

pub async fn movie_reviews(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<Vec<Review>>> {
    Ok(Json(state.catalog().reviews(ContentType::Movie, id).await?))
}

pub async fn list_tv_shows(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListParams>,
) -> AppResult<Json<Page<TvShow>>> {
    Ok(Json(state.catalog().tv_shows(&params).await?))
}

pub async fn get_tv_show(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<TvShowDetails>> {
    Ok(Json(state.catalog().tv_show(id).await?))
}

pub async fn get_person(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<PersonDetails>> {
    Ok(Json(state.catalog().person(id).await?))
}

pub async fn get_collection(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<CollectionDetails>> {
    Ok(Json(state.catalog().collection(id).await?))
}

/// Handler for the cross-catalog search endpoint
pub async fn search(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<SearchQuery>,
) -> AppResult<Json<SearchResults>> {
    Ok(Json(state.catalog().search(&params.q).await?))
}
