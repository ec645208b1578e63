//! Conversion between record values and `SQLite` values.

use record_store::{Fields, ID_COLUMN, Record, StoreError, Value};
use rusqlite::Row;
use rusqlite::types::{Value as SqlValue, ValueRef};

/// Quote an identifier for use in generated SQL.
///
/// Table and column names are validated against the schema before they get
/// here; quoting keeps keywords such as `order` usable as column names.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a text literal for use in DDL defaults.
pub(crate) fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

pub(crate) fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(n) => SqlValue::Integer(*n),
        Value::Float(f) => SqlValue::Real(*f),
        Value::String(s) => SqlValue::Text(s.clone()),
    }
}

pub(crate) fn from_sql_value(column: &str, value: ValueRef<'_>) -> Result<Value, StoreError> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(n) => Ok(Value::Int(n)),
        ValueRef::Real(f) => Ok(Value::Float(f)),
        ValueRef::Text(bytes) => Ok(Value::String(String::from_utf8_lossy(bytes).into_owned())),
        ValueRef::Blob(_) => Err(StoreError::StorageError(format!(
            "column {} holds a blob",
            column
        ))),
    }
}

/// Build INSERT SQL for a table with the given columns.
pub(crate) fn build_insert_sql(table: &str, columns: &[&str]) -> String {
    if columns.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table));
    }
    let cols: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        cols.join(", "),
        placeholders.join(", ")
    )
}

/// Column names and bound values of a field map, in matching order.
pub(crate) fn bind_fields(fields: &Fields) -> (Vec<&str>, Vec<SqlValue>) {
    fields
        .iter()
        .map(|(column, value)| (column, to_sql_value(value)))
        .unzip()
}

/// Map a `SELECT *` row to a record.
///
/// `columns` are the statement's column names in row order.
pub(crate) fn record_from_row(row: &Row<'_>, columns: &[String]) -> Result<Record, StoreError> {
    let mut id = None;
    let mut fields = Fields::new();
    for (idx, column) in columns.iter().enumerate() {
        let value = row.get_ref(idx)?;
        if column == ID_COLUMN {
            id = match value {
                ValueRef::Integer(n) => Some(n),
                _ => None,
            };
        } else {
            fields.insert(column.clone(), from_sql_value(column, value)?);
        }
    }
    let id = id.ok_or_else(|| {
        StoreError::StorageError(format!("row has no integer {} column", ID_COLUMN))
    })?;
    Ok(Record::new(id, fields))
}
