use std::time::Duration;

use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row as _};

use crate::config::Config;
use crate::db::query::{Query, QueryBuilder, SqlValue};
use crate::db::schema::Table;
use crate::db::sql::{self, Statement};
use crate::db::store::{Row, Store};
use crate::error::{AppError, AppResult};

/// Creates a PostgreSQL connection pool
///
/// The pool is the only state shared between requests; its size and timeouts
/// come from configuration.
pub async fn create_pool(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .idle_timeout(Some(Duration::from_secs(config.database_idle_timeout_secs)))
        .connect(&config.database_url)
        .await?;

    Ok(pool)
}

/// Applies the bundled schema migrations
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

fn bind_params(mut query: PgQuery<'_>, params: Vec<SqlValue>) -> PgQuery<'_> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(b) => query.bind(b),
            SqlValue::Int(i) => query.bind(i),
            SqlValue::Float(f) => query.bind(f),
            SqlValue::Text(s) => query.bind(s),
        };
    }
    query
}

fn map_write_error(table: Table, err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(format!("Duplicate key in {}", table))
        }
        _ => AppError::Database(err),
    }
}

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn execute(&self, table: Table, statement: Statement) -> AppResult<u64> {
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "Executing statement");
        let result = bind_params(sqlx::query(&statement.sql), statement.params)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(table, e))?;
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl Store for PgStore {
    fn table(&self, table: Table) -> QueryBuilder<'_> {
        QueryBuilder::new(self, table)
    }

    async fn select(&self, query: &Query) -> AppResult<Vec<Row>> {
        let statement = sql::render_select(query)?;
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "Executing select");

        let rows = bind_params(sqlx::query(&statement.sql), statement.params)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                let Json(value): Json<Value> = row.try_get(0)?;
                match value {
                    Value::Object(map) => Ok(map),
                    other => Err(AppError::Internal(format!(
                        "select returned a non-object row: {}",
                        other
                    ))),
                }
            })
            .collect()
    }

    async fn count(&self, query: &Query) -> AppResult<u64> {
        let statement = sql::render_count(query)?;
        let row = bind_params(sqlx::query(&statement.sql), statement.params)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get(0)?;
        Ok(count.max(0) as u64)
    }

    async fn insert(&self, table: Table, rows: &[Row]) -> AppResult<u64> {
        let statement = sql::render_insert(table, rows)?;
        self.execute(table, statement).await
    }

    async fn upsert(&self, table: Table, rows: &[Row]) -> AppResult<u64> {
        let mut affected = 0;
        for group in sql::group_by_columns(table, rows) {
            let statement = sql::render_upsert(table, &group)?;
            affected += self.execute(table, statement).await?;
        }
        Ok(affected)
    }

    async fn update(&self, query: &Query, values: &Row) -> AppResult<u64> {
        let statement = sql::render_update(query, values)?;
        self.execute(query.table, statement).await
    }

    async fn delete(&self, query: &Query) -> AppResult<u64> {
        let statement = sql::render_delete(query)?;
        self.execute(query.table, statement).await
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
