//! One-shot ingestion run from the command line.
//!
//! Uses the same configuration as the server and prints the run summary as
//! JSON on stdout.

use std::sync::Arc;

use movie_discovery::{
    config::Config,
    db,
    services::{IngestionPipeline, SyncOptions, TmdbClient},
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing(telemetry::DEFAULT_FILTER)?;

    let config = Config::from_env()?;
    let tmdb = TmdbClient::from_config(reqwest::Client::new(), &config)
        .ok_or_else(|| anyhow::anyhow!("TMDB_API_KEY must be set to seed the database"))?;
    let store = db::connect(&config).await?;

    let pipeline = IngestionPipeline::new(Arc::new(tmdb), store, SyncOptions::from_config(&config));
    let summary = pipeline.run().await;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
