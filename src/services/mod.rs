pub mod catalog;
pub mod chatbot;
pub mod ingestion;
pub mod sample_data;
pub mod stats;
pub mod tmdb;

pub use catalog::Catalog;
pub use chatbot::Chatbot;
pub use ingestion::{IngestionPipeline, SyncOptions, SyncSummary, Visited};
pub use tmdb::{TmdbApi, TmdbClient};
