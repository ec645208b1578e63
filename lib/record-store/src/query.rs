//! Database-agnostic query model for record stores.
//!
//! This module provides the query abstraction that backends translate into
//! their own statements. Queries always target a single table.

use serde::{Deserialize, Serialize};

use crate::{Fields, Record, SchemaStatus, StoreError, TableSchema};

/// An untyped field value, as supplied by callers and read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Filter conditions for queries.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// field = value
    Eq(String, Value),
    /// field != value
    Ne(String, Value),
    /// field > value
    Gt(String, Value),
    /// field >= value
    Gte(String, Value),
    /// field < value
    Lt(String, Value),
    /// field <= value
    Lte(String, Value),
    /// field IN (values)
    In(String, Vec<Value>),
    /// field LIKE pattern
    Like(String, String),
    /// field IS NULL
    IsNull(String),
    /// field IS NOT NULL
    IsNotNull(String),
}

impl Filter {
    /// The column this filter references.
    pub fn field(&self) -> &str {
        match self {
            Filter::Eq(field, _)
            | Filter::Ne(field, _)
            | Filter::Gt(field, _)
            | Filter::Gte(field, _)
            | Filter::Lt(field, _)
            | Filter::Lte(field, _)
            | Filter::In(field, _)
            | Filter::Like(field, _)
            | Filter::IsNull(field)
            | Filter::IsNotNull(field) => field,
        }
    }
}

/// Sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Caller-supplied selection: filters and sort order.
///
/// On an item path the filters are replaced by the implicit `id = ?`
/// filter; the sort order is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub filters: Vec<Filter>,
    pub order_by: Vec<(String, Order)>,
}

impl Selection {
    /// Select everything in table order.
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a filter condition.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add an equality filter (shorthand for Filter::Eq).
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(field.into(), value.into()))
    }

    /// Add a greater-than filter.
    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Gt(field.into(), value.into()))
    }

    /// Add a greater-than-or-equal filter.
    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Gte(field.into(), value.into()))
    }

    /// Add a less-than filter.
    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Lt(field.into(), value.into()))
    }

    /// Add a less-than-or-equal filter.
    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Lte(field.into(), value.into()))
    }

    /// Add an IN filter.
    pub fn r#in<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filter(Filter::In(field.into(), values))
    }

    /// Add an order-by clause.
    pub fn order_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.order_by.push((field.into(), order));
        self
    }

    /// Every column name referenced by filters or sort keys.
    pub fn referenced_fields(&self) -> impl Iterator<Item = &str> {
        self.filters
            .iter()
            .map(Filter::field)
            .chain(self.order_by.iter().map(|(field, _)| field.as_str()))
    }
}

/// A SELECT against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// The table to query.
    pub table: String,
    /// Filter conditions, joined with AND.
    pub filters: Vec<Filter>,
    /// Order by clauses.
    pub order_by: Vec<(String, Order)>,
    /// Maximum number of results.
    pub limit: Option<u64>,
}

impl Query {
    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Apply a caller selection.
    pub fn select(mut self, selection: Selection) -> Self {
        self.filters = selection.filters;
        self.order_by = selection.order_by;
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(field.into(), value.into()))
    }

    pub fn order_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.order_by.push((field.into(), order));
        self
    }

    /// Set the maximum number of results.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// An UPDATE against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: String,
    /// Columns to set. Never empty when handed to an executor.
    pub values: Fields,
    pub filters: Vec<Filter>,
}

impl Update {
    pub fn for_table(table: impl Into<String>, values: Fields) -> Self {
        Self {
            table: table.into(),
            values,
            filters: Vec::new(),
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = filters;
        self
    }
}

/// A DELETE against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    /// The table to delete from.
    pub table: String,
    /// Filter conditions. Empty deletes every row.
    pub filters: Vec<Filter>,
}

impl Delete {
    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
        }
    }

    /// Add a filter condition.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = filters;
        self
    }

    /// Add an equality filter (shorthand).
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(field.into(), value.into()))
    }
}

/// Trait for executing queries against a database backend.
///
/// Every method runs to completion on the calling thread. Callers that must
/// not block are responsible for offloading.
pub trait QueryExecutor: Send + Sync {
    /// Create the table if absent, or drop and recreate it when the stored
    /// schema version differs from `schema.version`.
    fn ensure_table(&self, schema: &TableSchema) -> Result<SchemaStatus, StoreError>;

    /// Execute a SELECT query and return results.
    fn fetch(&self, query: &Query) -> Result<Vec<Record>, StoreError>;

    /// Execute a SELECT query and return at most one result.
    fn fetch_optional(&self, query: &Query) -> Result<Option<Record>, StoreError> {
        let limited = query.clone().limit(1);
        Ok(self.fetch(&limited)?.into_iter().next())
    }

    /// Insert a row and return its newly assigned id.
    fn insert(&self, table: &str, values: &Fields) -> Result<i64, StoreError>;

    /// Execute an UPDATE and return the number of rows affected.
    fn update(&self, update: &Update) -> Result<u64, StoreError>;

    /// Execute a DELETE and return the number of rows affected.
    fn delete(&self, delete: &Delete) -> Result<u64, StoreError>;
}
