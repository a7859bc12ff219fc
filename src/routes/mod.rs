use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    middleware::{make_span_with_request_id, request_id_middleware},
    state::AppState,
};

pub mod admin;
pub mod catalog;
pub mod chatbot;
pub mod extract;
pub mod health;
pub mod sync;
pub mod watchlist;

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
}

/// Routes under /api
fn api_routes() -> Router<AppState> {
    Router::new()
        // Health
        .route("/health/database", get(health::database))
        .route("/health/tmdb", get(health::tmdb))
        // Ingestion
        .route("/sync", get(sync::run_sync))
        // Chatbot
        .route("/chatbot", post(chatbot::chat))
        // Catalog
        .route("/movies", get(catalog::list_movies))
        .route("/movies/:id", get(catalog::get_movie))
        .route("/movies/:id/reviews", get(catalog::movie_reviews))
        .route("/tv", get(catalog::list_tv_shows))
        .route("/tv/:id", get(catalog::get_tv_show))
        .route("/people/:id", get(catalog::get_person))
        .route("/collections/:id", get(catalog::get_collection))
        .route("/search", get(catalog::search))
        // Watchlist
        .route(
            "/watchlist",
            get(watchlist::get_watchlist)
                .post(watchlist::add_to_watchlist)
                .delete(watchlist::remove_from_watchlist),
        )
        // Admin
        .route("/admin/stats", get(admin::stats))
}
