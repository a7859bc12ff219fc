use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::{
    db::{Store, Table},
    error::{AppError, AppResult},
};

#[derive(Debug, Serialize)]
pub struct StoreStats {
    pub backend: &'static str,
    pub tables: BTreeMap<&'static str, u64>,
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
    pub status: &'static str,
    pub backend: &'static str,
    pub latency_ms: u64,
}

/// Row counts for every table
pub async fn store_stats(store: &dyn Store) -> AppResult<StoreStats> {
    let mut tables = BTreeMap::new();
    for table in Table::ALL {
        tables.insert(table.as_str(), store.table(table).count().await?);
    }
    Ok(StoreStats {
        backend: store.backend(),
        tables,
    })
}

/// Round-trips a trivial statement; failure maps to `Unavailable`
pub async fn database_health(store: &dyn Store) -> AppResult<DatabaseHealth> {
    let start = Instant::now();
    if let Err(e) = store.ping().await {
        tracing::error!(backend = store.backend(), error = %e, "Database health check failed");
        return Err(AppError::Unavailable(format!("Database unreachable: {}", e)));
    }
    Ok(DatabaseHealth {
        status: "healthy",
        backend: store.backend(),
        latency_ms: start.elapsed().as_millis() as u64,
    })
}
