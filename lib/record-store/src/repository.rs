//! Connection configuration and backend initialization.
//!
//! - `ConnectionConfig`: where the embedded database lives
//! - `RepositoryConnection`: opening a backend and preparing a table

use std::path::PathBuf;

use crate::{SchemaStatus, StoreError, TableSchema};

/// Connection target for embedded database backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionConfig {
    /// Private in-memory database, discarded when the connection closes.
    Memory,
    /// Database file, created when absent.
    Path(PathBuf),
}

impl From<&str> for ConnectionConfig {
    fn from(target: &str) -> Self {
        if target == ":memory:" {
            ConnectionConfig::Memory
        } else {
            ConnectionConfig::Path(PathBuf::from(target))
        }
    }
}

impl From<String> for ConnectionConfig {
    fn from(target: String) -> Self {
        ConnectionConfig::from(target.as_str())
    }
}

impl From<PathBuf> for ConnectionConfig {
    fn from(path: PathBuf) -> Self {
        ConnectionConfig::Path(path)
    }
}

impl From<&std::path::Path> for ConnectionConfig {
    fn from(path: &std::path::Path) -> Self {
        ConnectionConfig::Path(path.to_path_buf())
    }
}

/// Trait for database connection and initialization.
///
/// Backends implement their own connection and schema logic. The store runs
/// `initialize` lazily through [`crate::QueryExecutor::ensure_table`]; calling
/// it up front is only needed to surface schema errors early.
pub trait RepositoryConnection: Sized + Send + Sync {
    /// Connect to the database using the provided configuration.
    fn connect(config: impl Into<ConnectionConfig>) -> Result<Self, StoreError>;

    /// Create or recreate the table described by `schema`.
    fn initialize(&self, schema: &TableSchema) -> Result<SchemaStatus, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_target_is_recognized() {
        assert_eq!(ConnectionConfig::from(":memory:"), ConnectionConfig::Memory);
        assert_eq!(
            ConnectionConfig::from("shelter.db"),
            ConnectionConfig::Path(PathBuf::from("shelter.db"))
        );
    }
}
