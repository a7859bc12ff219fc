use std::sync::Arc;

use crate::{
    config::Config,
    db::Store,
    services::{Catalog, TmdbApi, TmdbClient},
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    /// `None` when no TMDB key is configured
    pub tmdb: Option<Arc<dyn TmdbApi>>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>, tmdb: Option<Arc<dyn TmdbApi>>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            tmdb,
        }
    }

    /// Wires the real TMDB client when an API key is configured
    pub fn from_config(config: Config, store: Arc<dyn Store>) -> Self {
        let tmdb = TmdbClient::from_config(reqwest::Client::new(), &config)
            .map(|client| Arc::new(client) as Arc<dyn TmdbApi>);
        if tmdb.is_none() {
            tracing::warn!("TMDB_API_KEY is not set; sync is disabled");
        }
        Self::new(config, store, tmdb)
    }

    pub fn catalog(&self) -> Catalog<'_> {
        Catalog::new(self.store.as_ref())
    }
}
