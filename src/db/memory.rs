use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::Value;
use tokio::sync::RwLock;

use crate::db::query::{CompareOp, Filter, Order, Query, QueryBuilder};
use crate::db::schema::Table;
use crate::db::sql::key_of;
use crate::db::store::{Row, Store};
use crate::error::{AppError, AppResult};

/// In-process store evaluating queries over JSON rows.
///
/// Serves as the development fallback when no database is configured, and
/// follows Postgres semantics where they show: comparisons against NULL never
/// match and NULLs sort last.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<Table, BTreeMap<String, Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// SQL `LIKE` with `%` and `_` wildcards and `\` as the escape character
fn like_matches(text: &[char], pattern: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some(('\\', [escaped, rest @ ..])) => {
            text.first() == Some(escaped) && like_matches(&text[1..], rest)
        }
        Some(('%', rest)) => (0..=text.len()).any(|i| like_matches(&text[i..], rest)),
        Some(('_', rest)) => !text.is_empty() && like_matches(&text[1..], rest),
        Some((c, rest)) => text.first() == Some(c) && like_matches(&text[1..], rest),
    }
}

fn like(cell: &Value, pattern: &str, case_insensitive: bool) -> bool {
    let Value::String(text) = cell else {
        return false;
    };
    let (text, pattern) = if case_insensitive {
        (text.to_lowercase(), pattern.to_lowercase())
    } else {
        (text.clone(), pattern.to_string())
    };
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    like_matches(&text, &pattern)
}

fn matches(row: &Row, filter: &Filter) -> bool {
    let cell = row.get(filter.column()).unwrap_or(&Value::Null);
    match filter {
        Filter::IsNull { negated, .. } => cell.is_null() != *negated,
        Filter::In { values, .. } => values
            .iter()
            .any(|v| compare_values(cell, &v.to_json()) == Some(Ordering::Equal)),
        Filter::Compare { op, value, .. } => {
            let value = value.to_json();
            if cell.is_null() || value.is_null() {
                return false;
            }
            match op {
                CompareOp::Like => like(cell, value.as_str().unwrap_or_default(), false),
                CompareOp::ILike => like(cell, value.as_str().unwrap_or_default(), true),
                _ => match compare_values(cell, &value) {
                    Some(ordering) => match op {
                        CompareOp::Eq => ordering == Ordering::Equal,
                        CompareOp::Neq => ordering != Ordering::Equal,
                        CompareOp::Gt => ordering == Ordering::Greater,
                        CompareOp::Gte => ordering != Ordering::Less,
                        CompareOp::Lt => ordering == Ordering::Less,
                        CompareOp::Lte => ordering != Ordering::Greater,
                        CompareOp::Like | CompareOp::ILike => false,
                    },
                    None => false,
                },
            }
        }
    }
}

fn order_rows(rows: &mut [Row], query: &Query) {
    rows.sort_by(|a, b| {
        for order in &query.order_by {
            let x = a.get(&order.column).unwrap_or(&Value::Null);
            let y = b.get(&order.column).unwrap_or(&Value::Null);
            let ordering = match (x.is_null(), y.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => {
                    let natural = compare_values(x, y).unwrap_or(Ordering::Equal);
                    match order.order {
                        Order::Asc => natural,
                        Order::Desc => natural.reverse(),
                    }
                }
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

impl MemoryStore {
    async fn matching(&self, query: &Query) -> Vec<Row> {
        let tables = self.tables.read().await;
        tables
            .get(&query.table)
            .map(|rows| {
                rows.values()
                    .filter(|row| query.filters.iter().all(|f| matches(row, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    fn table(&self, table: Table) -> QueryBuilder<'_> {
        QueryBuilder::new(self, table)
    }

    async fn select(&self, query: &Query) -> AppResult<Vec<Row>> {
        let mut rows = self.matching(query).await;
        order_rows(&mut rows, query);

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        let rows = rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| {
                if query.columns.is_empty() {
                    row
                } else {
                    query
                        .columns
                        .iter()
                        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                        .collect()
                }
            })
            .collect();
        Ok(rows)
    }

    async fn count(&self, query: &Query) -> AppResult<u64> {
        Ok(self.matching(query).await.len() as u64)
    }

    async fn insert(&self, table: Table, rows: &[Row]) -> AppResult<u64> {
        let mut tables = self.tables.write().await;
        let existing = tables.entry(table).or_default();
        let mut batch = HashSet::with_capacity(rows.len());
        for row in rows {
            let key = key_of(table, row);
            if existing.contains_key(&key) || !batch.insert(key.clone()) {
                return Err(AppError::Conflict(format!("Duplicate key in {}: {}", table, key)));
            }
        }
        for row in rows {
            existing.insert(key_of(table, row), row.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn upsert(&self, table: Table, rows: &[Row]) -> AppResult<u64> {
        let mut tables = self.tables.write().await;
        let existing = tables.entry(table).or_default();
        for row in rows {
            let stored = existing.entry(key_of(table, row)).or_default();
            for (column, value) in row {
                stored.insert(column.clone(), value.clone());
            }
        }
        Ok(rows.len() as u64)
    }

    async fn update(&self, query: &Query, values: &Row) -> AppResult<u64> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(&query.table) else {
            return Ok(0);
        };
        let mut updated = 0;
        for row in rows.values_mut() {
            if query.filters.iter().all(|f| matches(row, f)) {
                for (column, value) in values {
                    row.insert(column.clone(), value.clone());
                }
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete(&self, query: &Query) -> AppResult<u64> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(&query.table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|_, row| !query.filters.iter().all(|f| matches(row, f)));
        Ok((before - rows.len()) as u64)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_like_wildcards() {
        assert!(like(&json!("The Dark Knight"), "%Dark%", false));
        assert!(!like(&json!("The Dark Knight"), "%dark%", false));
        assert!(like(&json!("The Dark Knight"), "%dark%", true));
        assert!(like(&json!("Heat"), "H_at", false));
        assert!(!like(&json!(12), "%1%", false));
    }

    #[test]
    fn test_like_escaped_wildcards_are_literal() {
        assert!(like(&json!("100% Wolf"), "%100\\%%", false));
        assert!(!like(&json!("1000 Wolves"), "%100\\%%", false));
        assert!(like(&json!("snake_case"), "%e\\_c%", false));
        assert!(!like(&json!("snakeXcase"), "%e\\_c%", false));
        assert!(like(&json!("C:\\temp"), "C:\\\\%", false));
    }

    #[tokio::test]
    async fn test_upsert_merges_and_is_idempotent() {
        let store = MemoryStore::new();
        let full = row(json!({"id": 1, "name": "Sigourney Weaver", "biography": "bio"}));
        let minimal = row(json!({"id": 1, "name": "Sigourney Weaver", "department": "Acting"}));

        store.table(Table::People).upsert(vec![full.clone()]).await.unwrap();
        store.table(Table::People).upsert(vec![minimal.clone()]).await.unwrap();
        store.table(Table::People).upsert(vec![minimal]).await.unwrap();

        let rows = store.table(Table::People).execute().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["biography"], json!("bio"));
        assert_eq!(rows[0]["department"], json!("Acting"));
    }

    #[tokio::test]
    async fn test_insert_conflict() {
        let store = MemoryStore::new();
        let entry = row(json!({"user_id": "u1", "content_type": "movie", "content_id": 3}));
        store.table(Table::Watchlist).insert(vec![entry.clone()]).await.unwrap();
        let err = store.table(Table::Watchlist).insert(vec![entry]).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_insert_duplicate_within_batch_conflicts() {
        let store = MemoryStore::new();
        let entry = row(json!({"user_id": "u1", "content_type": "movie", "content_id": 3}));
        let other = row(json!({"user_id": "u1", "content_type": "tv", "content_id": 3}));

        let err = store
            .table(Table::Watchlist)
            .insert(vec![entry.clone(), other, entry])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.table(Table::Watchlist).count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_in_list_offset_and_projection() {
        let store = MemoryStore::new();
        let rows = (1..=5)
            .map(|i| row(json!({"id": i, "title": format!("Movie {}", i), "popularity": i * 10})))
            .collect();
        store.table(Table::Movies).upsert(rows).await.unwrap();

        let rows = store
            .table(Table::Movies)
            .select("id")
            .in_list("id", [2, 3, 4, 9])
            .order("popularity", Order::Desc)
            .range(1, 2)
            .execute()
            .await
            .unwrap();
        let ids: Vec<i64> = rows.iter().filter_map(|r| r["id"].as_i64()).collect();
        assert_eq!(ids, vec![3, 2]);
        assert_eq!(rows[0].len(), 1);
    }

    #[tokio::test]
    async fn test_null_comparisons_never_match() {
        let store = MemoryStore::new();
        store
            .table(Table::Movies)
            .upsert(vec![row(json!({"id": 1, "rating": null}))])
            .await
            .unwrap();
        let below = store.table(Table::Movies).lt("rating", 5.0).count().await.unwrap();
        let missing = store.table(Table::Movies).is_null("rating").count().await.unwrap();
        assert_eq!(below, 0);
        assert_eq!(missing, 1);
    }

    #[tokio::test]
    async fn test_delete_matching() {
        let store = MemoryStore::new();
        let rows = vec![
            row(json!({"movie_id": 1, "genre_id": 28})),
            row(json!({"movie_id": 1, "genre_id": 12})),
            row(json!({"movie_id": 2, "genre_id": 28})),
        ];
        store.table(Table::MovieGenres).upsert(rows).await.unwrap();
        let deleted = store.table(Table::MovieGenres).eq("movie_id", 1).delete().await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.table(Table::MovieGenres).count().await.unwrap(), 1);
    }
}
