//! `SQLite` implementation of QueryExecutor.

use std::sync::{Mutex, MutexGuard};

use record_store::{
    ConnectionConfig, Delete, Fields, Filter, ID_COLUMN, Order, Query, QueryExecutor, Record,
    RepositoryConnection, SchemaStatus, StoreError, TableSchema, Update, Value,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params_from_iter};
use tracing::debug;

use crate::bind::{bind_fields, build_insert_sql, quote_ident, record_from_row, to_sql_value};
use crate::config::{SqliteConfig, open_connection};
use crate::migrate;

/// A single `SQLite` connection behind a mutex.
///
/// Every executor call holds the lock for exactly one statement (or the one
/// schema transaction), which makes each call atomic at the row-set level.
#[derive(Debug)]
pub struct SqlitePool(Mutex<Connection>);

impl SqlitePool {
    /// Wrap an already opened connection.
    pub fn new(connection: Connection) -> Self {
        Self(Mutex::new(connection))
    }

    pub fn open(config: &SqliteConfig) -> Result<Self, StoreError> {
        Ok(Self::new(open_connection(config)?))
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::open(&SqliteConfig::in_memory())
    }

    /// Run `f` with exclusive access to the underlying connection.
    pub fn with_connection<R>(
        &self,
        f: impl FnOnce(&mut Connection) -> rusqlite::Result<R>,
    ) -> Result<R, StoreError> {
        let mut connection = self.lock()?;
        Ok(f(&mut *connection)?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.0
            .lock()
            .map_err(|_| StoreError::StorageError("connection lock poisoned".to_string()))
    }
}

/// Build a WHERE clause from filters, numbering parameters from `start_param`.
///
/// Equality with NULL becomes `IS NULL` (`IS NOT NULL` for `Ne`) and binds nothing.
fn build_where_clause(filters: &[Filter], start_param: usize) -> String {
    if filters.is_empty() {
        return String::new();
    }

    let mut clauses = Vec::new();
    let mut param_idx = start_param;

    fn binary(field: &str, op: &str, param_idx: &mut usize) -> String {
        let c = format!("{} {} ?{}", quote_ident(field), op, *param_idx);
        *param_idx += 1;
        c
    }

    for filter in filters {
        let clause = match filter {
            Filter::Eq(field, Value::Null) => format!("{} IS NULL", quote_ident(field)),
            Filter::Ne(field, Value::Null) => format!("{} IS NOT NULL", quote_ident(field)),
            Filter::Eq(field, _) => binary(field, "=", &mut param_idx),
            Filter::Ne(field, _) => binary(field, "!=", &mut param_idx),
            Filter::Gt(field, _) => binary(field, ">", &mut param_idx),
            Filter::Gte(field, _) => binary(field, ">=", &mut param_idx),
            Filter::Lt(field, _) => binary(field, "<", &mut param_idx),
            Filter::Lte(field, _) => binary(field, "<=", &mut param_idx),
            Filter::Like(field, _) => binary(field, "LIKE", &mut param_idx),
            Filter::In(_, values) if values.is_empty() => "0".to_string(),
            Filter::In(field, values) => {
                let placeholders: Vec<String> = (param_idx..param_idx + values.len())
                    .map(|i| format!("?{}", i))
                    .collect();
                param_idx += values.len();
                format!("{} IN ({})", quote_ident(field), placeholders.join(", "))
            }
            Filter::IsNull(field) => format!("{} IS NULL", quote_ident(field)),
            Filter::IsNotNull(field) => format!("{} IS NOT NULL", quote_ident(field)),
        };
        clauses.push(clause);
    }

    format!(" WHERE {}", clauses.join(" AND "))
}

/// Bind filter values in clause order.
fn bind_filters(args: &mut Vec<SqlValue>, filters: &[Filter]) {
    for filter in filters {
        match filter {
            Filter::Eq(_, Value::Null) | Filter::Ne(_, Value::Null) => {}
            Filter::Eq(_, value)
            | Filter::Ne(_, value)
            | Filter::Gt(_, value)
            | Filter::Gte(_, value)
            | Filter::Lt(_, value)
            | Filter::Lte(_, value) => {
                args.push(to_sql_value(value));
            }
            Filter::Like(_, pattern) => args.push(SqlValue::Text(pattern.clone())),
            Filter::In(_, values) => args.extend(values.iter().map(to_sql_value)),
            Filter::IsNull(_) | Filter::IsNotNull(_) => {
                // No binding needed
            }
        }
    }
}

/// Build ORDER BY clause. Without explicit keys rows come back in id order.
fn build_order_clause(order_by: &[(String, Order)]) -> String {
    if order_by.is_empty() {
        return format!(" ORDER BY {} ASC", quote_ident(ID_COLUMN));
    }

    let clauses: Vec<String> = order_by
        .iter()
        .map(|(field, order)| {
            let dir = match order {
                Order::Asc => "ASC",
                Order::Desc => "DESC",
            };
            format!("{} {}", quote_ident(field), dir)
        })
        .collect();

    format!(" ORDER BY {}", clauses.join(", "))
}

fn build_select_sql(query: &Query) -> String {
    let where_clause = build_where_clause(&query.filters, 1);
    let order_clause = build_order_clause(&query.order_by);
    let mut sql = format!(
        "SELECT * FROM {}{}{}",
        quote_ident(&query.table),
        where_clause,
        order_clause
    );
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    sql
}

fn build_update_sql(update: &Update) -> (String, Vec<SqlValue>) {
    let (columns, mut args) = bind_fields(&update.values);
    let assignments: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{} = ?{}", quote_ident(column), i + 1))
        .collect();
    let where_clause = build_where_clause(&update.filters, columns.len() + 1);
    bind_filters(&mut args, &update.filters);
    let sql = format!(
        "UPDATE {} SET {}{}",
        quote_ident(&update.table),
        assignments.join(", "),
        where_clause
    );
    (sql, args)
}

impl QueryExecutor for SqlitePool {
    fn ensure_table(&self, schema: &TableSchema) -> Result<SchemaStatus, StoreError> {
        let mut connection = self.lock()?;
        migrate::ensure_table(&mut *connection, schema)
    }

    fn fetch(&self, query: &Query) -> Result<Vec<Record>, StoreError> {
        let sql = build_select_sql(query);
        let mut args = Vec::new();
        bind_filters(&mut args, &query.filters);
        debug!(%sql, "fetch");

        let connection = self.lock()?;
        let mut stmt = connection.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(args.iter()))?;

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(record_from_row(row, &columns)?);
        }
        Ok(records)
    }

    fn insert(&self, table: &str, values: &Fields) -> Result<i64, StoreError> {
        let (columns, args) = bind_fields(values);
        let sql = build_insert_sql(table, &columns);
        debug!(%sql, "insert");

        let connection = self.lock()?;
        connection.execute(&sql, params_from_iter(args.iter()))?;
        Ok(connection.last_insert_rowid())
    }

    fn update(&self, update: &Update) -> Result<u64, StoreError> {
        if update.values.is_empty() {
            return Ok(0);
        }
        let (sql, args) = build_update_sql(update);
        debug!(%sql, "update");

        let connection = self.lock()?;
        let rows = connection.execute(&sql, params_from_iter(args.iter()))?;
        Ok(rows as u64)
    }

    fn delete(&self, delete: &Delete) -> Result<u64, StoreError> {
        let where_clause = build_where_clause(&delete.filters, 1);
        let sql = format!("DELETE FROM {}{}", quote_ident(&delete.table), where_clause);
        let mut args = Vec::new();
        bind_filters(&mut args, &delete.filters);
        debug!(%sql, "delete");

        let connection = self.lock()?;
        let rows = connection.execute(&sql, params_from_iter(args.iter()))?;
        Ok(rows as u64)
    }
}

impl RepositoryConnection for SqlitePool {
    fn connect(config: impl Into<ConnectionConfig>) -> Result<Self, StoreError> {
        Self::open(&SqliteConfig::new(config))
    }

    fn initialize(&self, schema: &TableSchema) -> Result<SchemaStatus, StoreError> {
        self.ensure_table(schema)
    }
}
