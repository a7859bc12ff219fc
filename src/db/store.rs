use serde_json::{Map, Value};

use crate::db::query::{Query, QueryBuilder};
use crate::db::schema::Table;
use crate::error::AppResult;

/// One materialized row, keyed by column name
pub type Row = Map<String, Value>;

/// Relational backend behind the query builder
///
/// Callers never use these methods directly: they start from [`Store::table`] and
/// let the builder validate identifiers before anything reaches the backend.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Starts a query against one table
    fn table(&self, table: Table) -> QueryBuilder<'_>;

    async fn select(&self, query: &Query) -> AppResult<Vec<Row>>;

    async fn count(&self, query: &Query) -> AppResult<u64>;

    async fn insert(&self, table: Table, rows: &[Row]) -> AppResult<u64>;

    async fn upsert(&self, table: Table, rows: &[Row]) -> AppResult<u64>;

    async fn update(&self, query: &Query, values: &Row) -> AppResult<u64>;

    async fn delete(&self, query: &Query) -> AppResult<u64>;

    /// Cheap round trip used by health checks
    async fn ping(&self) -> AppResult<()>;

    /// Backend name for logging and health output
    fn backend(&self) -> &'static str;
}
