use std::collections::BTreeMap;

use crate::db::query::{validate_row, Filter, Order, Query, SqlValue};
use crate::db::schema::{ColumnDef, Table};
use crate::db::store::Row;
use crate::error::AppResult;

/// A rendered statement and its bound values, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Hands out `$n::type` placeholders in accumulation order
#[derive(Default)]
struct Binder {
    params: Vec<SqlValue>,
}

impl Binder {
    fn bind(&mut self, value: &SqlValue, column: &ColumnDef) -> String {
        if value.is_null() {
            return "NULL".to_string();
        }
        self.params.push(value.clone());
        format!("${}::{}", self.params.len(), column.sql_type.cast())
    }
}

fn ident(name: &str) -> String {
    format!("\"{}\"", name)
}

fn where_clause(query: &Query, binder: &mut Binder) -> AppResult<String> {
    if query.filters.is_empty() {
        return Ok(String::new());
    }

    let mut clauses = Vec::with_capacity(query.filters.len());
    for filter in &query.filters {
        let column = query.table.column(filter.column())?;
        let clause = match filter {
            Filter::Compare { op, value, .. } => {
                format!("{} {} {}", ident(column.name), op.sql(), binder.bind(value, column))
            }
            Filter::In { values, .. } if values.is_empty() => "FALSE".to_string(),
            Filter::In { values, .. } => {
                let placeholders: Vec<String> =
                    values.iter().map(|v| binder.bind(v, column)).collect();
                format!("{} IN ({})", ident(column.name), placeholders.join(", "))
            }
            Filter::IsNull { negated: false, .. } => format!("{} IS NULL", ident(column.name)),
            Filter::IsNull { negated: true, .. } => format!("{} IS NOT NULL", ident(column.name)),
        };
        clauses.push(clause);
    }

    Ok(format!(" WHERE {}", clauses.join(" AND ")))
}

/// `SELECT` returning one JSON object per row.
///
/// The object is built at the same level as `ORDER BY`, so rows come back in
/// the requested order.
pub fn render_select(query: &Query) -> AppResult<Statement> {
    query.validate()?;
    let mut binder = Binder::default();

    let table = ident(query.table.as_str());
    let columns = if query.columns.is_empty() {
        format!("row_to_json({})", table)
    } else {
        let pairs = query
            .columns
            .iter()
            .map(|c| {
                query
                    .table
                    .column(c)
                    .map(|def| format!("'{}', {}", def.name, ident(def.name)))
            })
            .collect::<AppResult<Vec<_>>>()?;
        format!("json_build_object({})", pairs.join(", "))
    };

    let mut sql = format!("SELECT {} FROM {}", columns, table);
    sql.push_str(&where_clause(query, &mut binder)?);

    if !query.order_by.is_empty() {
        let orders: Vec<String> = query
            .order_by
            .iter()
            .map(|o| {
                let direction = match o.order {
                    Order::Asc => "ASC",
                    Order::Desc => "DESC",
                };
                format!("{} {} NULLS LAST", ident(&o.column), direction)
            })
            .collect();
        sql.push_str(&format!(" ORDER BY {}", orders.join(", ")));
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    if let Some(offset) = query.offset {
        sql.push_str(&format!(" OFFSET {}", offset));
    }

    Ok(Statement {
        sql,
        params: binder.params,
    })
}

pub fn render_count(query: &Query) -> AppResult<Statement> {
    query.validate()?;
    let mut binder = Binder::default();
    let mut sql = format!("SELECT COUNT(*) FROM {}", ident(query.table.as_str()));
    sql.push_str(&where_clause(query, &mut binder)?);
    Ok(Statement {
        sql,
        params: binder.params,
    })
}

/// Columns present in any of the rows, in schema order
fn row_columns(table: Table, rows: &[Row]) -> Vec<&'static ColumnDef> {
    table
        .columns()
        .iter()
        .filter(|c| rows.iter().any(|r| r.contains_key(c.name)))
        .collect()
}

fn values_clause(
    columns: &[&'static ColumnDef],
    rows: &[Row],
    binder: &mut Binder,
) -> AppResult<String> {
    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let mut placeholders = Vec::with_capacity(columns.len());
        for column in columns {
            let value = match row.get(column.name) {
                Some(v) => SqlValue::from_json(v)?,
                None => SqlValue::Null,
            };
            placeholders.push(binder.bind(&value, column));
        }
        tuples.push(format!("({})", placeholders.join(", ")));
    }
    Ok(tuples.join(", "))
}

fn column_list(columns: &[&'static ColumnDef]) -> String {
    columns
        .iter()
        .map(|c| ident(c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_insert(table: Table, rows: &[Row]) -> AppResult<Statement> {
    for row in rows {
        validate_row(table, row)?;
    }
    let columns = row_columns(table, rows);
    let mut binder = Binder::default();
    let values = values_clause(&columns, rows, &mut binder)?;
    Ok(Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES {}",
            ident(table.as_str()),
            column_list(&columns),
            values
        ),
        params: binder.params,
    })
}

/// `INSERT .. ON CONFLICT (pk) DO UPDATE` over the columns the rows carry.
///
/// Rows should share one column set (see [`group_by_columns`]); a column missing
/// from some rows would otherwise be written as NULL for them.
pub fn render_upsert(table: Table, rows: &[Row]) -> AppResult<Statement> {
    let mut statement = render_insert(table, rows)?;
    let key = table.primary_key();
    let updates: Vec<String> = row_columns(table, rows)
        .into_iter()
        .filter(|c| !key.contains(&c.name))
        .map(|c| format!("{} = EXCLUDED.{}", ident(c.name), ident(c.name)))
        .collect();

    let conflict = key.iter().map(|k| ident(k)).collect::<Vec<_>>().join(", ");
    if updates.is_empty() {
        statement
            .sql
            .push_str(&format!(" ON CONFLICT ({}) DO NOTHING", conflict));
    } else {
        statement.sql.push_str(&format!(
            " ON CONFLICT ({}) DO UPDATE SET {}",
            conflict,
            updates.join(", ")
        ));
    }
    Ok(statement)
}

/// `UPDATE`; filter values are numbered before the SET values
pub fn render_update(query: &Query, values: &Row) -> AppResult<Statement> {
    query.validate()?;
    validate_row(query.table, values)?;
    let mut binder = Binder::default();
    let where_sql = where_clause(query, &mut binder)?;

    let mut assignments = Vec::with_capacity(values.len());
    for column in query.table.columns() {
        if let Some(value) = values.get(column.name) {
            let value = SqlValue::from_json(value)?;
            assignments.push(format!("{} = {}", ident(column.name), binder.bind(&value, column)));
        }
    }

    Ok(Statement {
        sql: format!(
            "UPDATE {} SET {}{}",
            ident(query.table.as_str()),
            assignments.join(", "),
            where_sql
        ),
        params: binder.params,
    })
}

pub fn render_delete(query: &Query) -> AppResult<Statement> {
    query.validate()?;
    let mut binder = Binder::default();
    let where_sql = where_clause(query, &mut binder)?;
    Ok(Statement {
        sql: format!("DELETE FROM {}{}", ident(query.table.as_str()), where_sql),
        params: binder.params,
    })
}

/// Primary-key string of a row, used to collapse duplicates within a batch
pub fn key_of(table: Table, row: &Row) -> String {
    table
        .primary_key()
        .iter()
        .map(|k| row.get(*k).map(|v| v.to_string()).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("|")
}

/// Splits rows by their column set and keeps the last row per primary key.
///
/// Postgres rejects an upsert that touches the same key twice in one statement.
pub fn group_by_columns(table: Table, rows: &[Row]) -> Vec<Vec<Row>> {
    let mut groups: BTreeMap<Vec<String>, BTreeMap<String, Row>> = BTreeMap::new();
    for row in rows {
        let mut columns: Vec<String> = row.keys().cloned().collect();
        columns.sort();
        groups
            .entry(columns)
            .or_default()
            .insert(key_of(table, row), row.clone());
    }
    groups
        .into_values()
        .map(|by_key| by_key.into_values().collect())
        .collect()
}
