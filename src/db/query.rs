use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::db::schema::Table;
use crate::db::store::{Row, Store};
use crate::error::{AppError, AppResult};

/// A value bound to a placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn to_json(&self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(b) => Value::Bool(*b),
            SqlValue::Int(i) => Value::from(*i),
            SqlValue::Float(f) => Value::from(*f),
            SqlValue::Text(s) => Value::String(s.clone()),
        }
    }

    /// Converts a JSON field of a row into a bindable value
    pub fn from_json(value: &Value) -> AppResult<Self> {
        Ok(match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Int(i),
                None => SqlValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => SqlValue::Text(s.clone()),
            other => {
                return Err(AppError::InvalidInput(format!(
                    "Unsupported column value: {}",
                    other
                )))
            }
        })
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v.into())
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Int(v.into())
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
}

impl CompareOp {
    pub fn sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Neq => "<>",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Like => "LIKE",
            CompareOp::ILike => "ILIKE",
        }
    }
}

/// One accumulated predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        column: String,
        op: CompareOp,
        value: SqlValue,
    },
    In {
        column: String,
        values: Vec<SqlValue>,
    },
    IsNull {
        column: String,
        negated: bool,
    },
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Filter::Compare { column, .. } | Filter::In { column, .. } | Filter::IsNull { column, .. } => column,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub order: Order,
}

/// Accumulated query state, independent of any backend
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: Table,
    /// Empty means every column
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            columns: Vec::new(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Checks every identifier the query references against the table allow-list
    pub fn validate(&self) -> AppResult<()> {
        for column in &self.columns {
            self.table.column(column)?;
        }
        for filter in &self.filters {
            self.table.column(filter.column())?;
        }
        for order in &self.order_by {
            self.table.column(&order.column)?;
        }
        Ok(())
    }
}

/// Checks that every key of a row to be written is an allow-listed column
pub fn validate_row(table: Table, row: &Row) -> AppResult<()> {
    if row.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "Empty row for table {}",
            table
        )));
    }
    for key in row.keys() {
        table.column(key)?;
    }
    Ok(())
}

/// Serializes a typed record into a row
pub fn to_row<T: Serialize>(value: &T) -> AppResult<Row> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::Internal(format!(
            "Expected an object row, got {}",
            other
        ))),
    }
}

/// Chainable query over one table.
///
/// Filter and ordering methods consume and return the builder; terminal
/// methods consume it for good, so a builder can only be executed once.
///
/// ```rust,no_run
/// # async fn demo(store: &dyn movie_discovery::db::Store) -> movie_discovery::error::AppResult<()> {
/// use movie_discovery::db::{Order, Table};
/// let top = store
///     .table(Table::Movies)
///     .select("id, title, rating")
///     .gte("rating", 7.5)
///     .order("rating", Order::Desc)
///     .limit(10)
///     .execute()
///     .await?;
/// # Ok(()) }
/// ```
#[must_use = "a query does nothing until a terminal method is awaited"]
pub struct QueryBuilder<'a> {
    store: &'a dyn Store,
    query: Query,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(store: &'a dyn Store, table: Table) -> Self {
        Self {
            store,
            query: Query::new(table),
        }
    }

    /// Restricts the returned columns; `"*"` selects everything
    pub fn select(mut self, columns: &str) -> Self {
        self.query.columns = columns
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != "*")
            .map(str::to_string)
            .collect();
        self
    }

    fn compare(mut self, column: &str, op: CompareOp, value: SqlValue) -> Self {
        self.query.filters.push(Filter::Compare {
            column: column.to_string(),
            op,
            value,
        });
        self
    }

    pub fn eq(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(column, CompareOp::Eq, value.into())
    }

    pub fn neq(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(column, CompareOp::Neq, value.into())
    }

    pub fn gt(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(column, CompareOp::Gt, value.into())
    }

    pub fn gte(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(column, CompareOp::Gte, value.into())
    }

    pub fn lt(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(column, CompareOp::Lt, value.into())
    }

    pub fn lte(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(column, CompareOp::Lte, value.into())
    }

    pub fn like(self, column: &str, pattern: impl Into<String>) -> Self {
        self.compare(column, CompareOp::Like, SqlValue::Text(pattern.into()))
    }

    /// Case-insensitive `LIKE`
    pub fn ilike(self, column: &str, pattern: impl Into<String>) -> Self {
        self.compare(column, CompareOp::ILike, SqlValue::Text(pattern.into()))
    }

    pub fn in_list<V, I>(mut self, column: &str, values: I) -> Self
    where
        V: Into<SqlValue>,
        I: IntoIterator<Item = V>,
    {
        self.query.filters.push(Filter::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.query.filters.push(Filter::IsNull {
            column: column.to_string(),
            negated: false,
        });
        self
    }

    pub fn not_null(mut self, column: &str) -> Self {
        self.query.filters.push(Filter::IsNull {
            column: column.to_string(),
            negated: true,
        });
        self
    }

    pub fn order(mut self, column: &str, order: Order) -> Self {
        self.query.order_by.push(OrderBy {
            column: column.to_string(),
            order,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Inclusive row range, `range(0, 9)` being the first ten rows
    pub fn range(mut self, from: u64, to: u64) -> Self {
        self.query.offset = Some(from);
        self.query.limit = Some(to.saturating_sub(from) + 1);
        self
    }

    /// The accumulated query, for inspection
    pub fn query(&self) -> &Query {
        &self.query
    }

    pub async fn execute(self) -> AppResult<Vec<Row>> {
        self.query.validate()?;
        self.store.select(&self.query).await
    }

    pub async fn execute_as<T: DeserializeOwned>(self) -> AppResult<Vec<T>> {
        self.execute()
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(Value::Object(row)).map_err(AppError::from))
            .collect()
    }

    /// First matching row, or `NotFound`
    pub async fn single(self) -> AppResult<Row> {
        let table = self.query.table;
        self.limit(1)
            .execute()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("No matching row in {}", table)))
    }

    pub async fn single_as<T: DeserializeOwned>(self) -> AppResult<T> {
        let row = self.single().await?;
        Ok(serde_json::from_value(Value::Object(row))?)
    }

    pub async fn count(self) -> AppResult<u64> {
        self.query.validate()?;
        self.store.count(&self.query).await
    }

    /// Plain insert; an existing primary key is a `Conflict`
    pub async fn insert(self, rows: Vec<Row>) -> AppResult<u64> {
        for row in &rows {
            validate_row(self.query.table, row)?;
        }
        if rows.is_empty() {
            return Ok(0);
        }
        self.store.insert(self.query.table, &rows).await
    }

    /// Insert-or-update keyed by the table's primary key
    pub async fn upsert(self, rows: Vec<Row>) -> AppResult<u64> {
        for row in &rows {
            validate_row(self.query.table, row)?;
        }
        if rows.is_empty() {
            return Ok(0);
        }
        self.store.upsert(self.query.table, &rows).await
    }

    pub async fn update(self, values: Row) -> AppResult<u64> {
        self.query.validate()?;
        validate_row(self.query.table, &values)?;
        require_filters(&self.query, "update")?;
        self.store.update(&self.query, &values).await
    }

    pub async fn delete(self) -> AppResult<u64> {
        self.query.validate()?;
        require_filters(&self.query, "delete")?;
        self.store.delete(&self.query).await
    }
}

fn require_filters(query: &Query, operation: &str) -> AppResult<()> {
    if query.filters.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "Refusing to {} every row of {}",
            operation, query.table
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .table(Table::Movies)
            .upsert(vec![
                row(json!({"id": 5, "title": "Heat", "rating": 8.3})),
                row(json!({"id": 6, "title": "Ronin", "rating": 7.2})),
                row(json!({"id": 7, "title": "Collateral", "rating": 7.6})),
                row(json!({"id": 8, "title": "Thief", "rating": null})),
            ])
            .await
            .unwrap();
        store
    }

    #[test]
    fn test_select_parses_column_list() {
        let store = MemoryStore::new();
        let builder = store.table(Table::Movies).select(" id, title ,rating ");
        assert_eq!(builder.query().columns, vec!["id", "title", "rating"]);

        let builder = store.table(Table::Movies).select("*");
        assert!(builder.query().columns.is_empty());
    }

    #[test]
    fn test_filters_accumulate_in_call_order() {
        let store = MemoryStore::new();
        let builder = store
            .table(Table::Movies)
            .eq("id", 5)
            .gte("rating", 7.0)
            .ilike("title", "%he%");
        let columns: Vec<&str> = builder.query().filters.iter().map(Filter::column).collect();
        assert_eq!(columns, vec!["id", "rating", "title"]);
    }

    #[test]
    fn test_range_is_inclusive() {
        let store = MemoryStore::new();
        let builder = store.table(Table::Movies).range(10, 19);
        assert_eq!(builder.query().offset, Some(10));
        assert_eq!(builder.query().limit, Some(10));
    }

    #[tokio::test]
    async fn test_eq_limit_returns_exactly_one_row() {
        let store = seeded().await;
        let rows = store
            .table(Table::Movies)
            .select("*")
            .eq("id", 5)
            .limit(1)
            .execute()
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(5));
        assert_eq!(rows[0]["title"], json!("Heat"));
    }

    #[tokio::test]
    async fn test_order_desc_is_non_increasing() {
        let store = seeded().await;
        let rows = store
            .table(Table::Movies)
            .order("rating", Order::Desc)
            .execute()
            .await
            .unwrap();
        let ratings: Vec<Option<f64>> = rows.iter().map(|r| r["rating"].as_f64()).collect();
        assert_eq!(ratings, vec![Some(8.3), Some(7.6), Some(7.2), None]);
    }

    #[tokio::test]
    async fn test_unknown_column_fails_at_terminal() {
        let store = seeded().await;
        let err = store
            .table(Table::Movies)
            .eq("1=1; --", 1)
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_single_not_found() {
        let store = seeded().await;
        let err = store.table(Table::Movies).eq("id", 999).single().await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_without_filter_is_rejected() {
        let store = seeded().await;
        let err = store.table(Table::Movies).delete().await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(store.table(Table::Movies).count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_update_then_count() {
        let store = seeded().await;
        let updated = store
            .table(Table::Movies)
            .lt("rating", 7.5)
            .update(row(json!({"status": "Archived"})))
            .await
            .unwrap();
        assert_eq!(updated, 1);
        let archived = store
            .table(Table::Movies)
            .eq("status", "Archived")
            .count()
            .await
            .unwrap();
        assert_eq!(archived, 1);
    }

    #[test]
    fn test_option_into_sql_value() {
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some("x")), SqlValue::Text("x".into()));
        assert_eq!(SqlValue::from_json(&json!(2.5)).unwrap(), SqlValue::Float(2.5));
        assert!(SqlValue::from_json(&json!([1])).is_err());
    }
}
