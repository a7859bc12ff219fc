use movie_discovery::{config::Config, create_router, db, telemetry, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing(telemetry::DEFAULT_FILTER)?;

    let config = Config::from_env()?;
    let address = config.bind_address();

    let store = db::connect(&config).await?;
    tracing::info!(backend = store.backend(), "Store ready");

    let app = create_router(AppState::from_config(config, store));

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Server running on http://{}", address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}
