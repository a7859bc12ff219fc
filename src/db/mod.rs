pub mod memory;
pub mod postgres;
pub mod query;
pub mod schema;
pub mod sql;
pub mod store;

use std::sync::Arc;

use crate::config::Config;

pub use memory::MemoryStore;
pub use postgres::{create_pool, run_migrations, PgStore};
pub use query::{to_row, Order, QueryBuilder, SqlValue};
pub use schema::Table;
pub use store::{Row, Store};

/// Opens the configured backend: Postgres, or the in-memory store when
/// `USE_MOCK_DB` is set
pub async fn connect(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    if config.use_mock_db {
        tracing::warn!("USE_MOCK_DB is set; data lives in memory and is lost on exit");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let pool = create_pool(config).await?;
    if config.run_migrations {
        run_migrations(&pool).await?;
    }
    Ok(Arc::new(PgStore::new(pool)))
}
