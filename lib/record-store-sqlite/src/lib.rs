//! `SQLite` implementation for record-store.
//!
//! This crate provides the embedded-database backend: [`SqlitePool`]
//! implements `QueryExecutor`, and the table behind a store is created (or
//! destructively recreated on a schema version change) the first time the
//! store reaches storage.
//!
//! # Usage
//!
//! ```text
//! use record_store::{Fields, StoreConfig, TableSchema};
//! use record_store_sqlite::{SqliteConfig, open_store};
//!
//! let store = open_store(
//!     &SqliteConfig::new("shelter.db"),
//!     StoreConfig::new("eu.id2go.pets", TableSchema::pets()),
//! )?;
//! let id = store.create(
//!     Fields::new()
//!         .with("name", "Rex")
//!         .with("breed", "Labrador")
//!         .with("gender", 1)
//!         .with("weight", 10),
//! )?;
//! ```

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod bind;
mod config;
mod executor;
mod migrate;

pub use config::{DEFAULT_BUSY_TIMEOUT_MS, JournalMode, SqliteConfig};
pub use executor::SqlitePool;
pub use migrate::{SCHEMA_TABLE, create_table_sql};

// Re-export core types for convenience
pub use record_store::{
    ConnectionConfig, Delete, FieldKind, FieldSpec, Fields, Filter, ObserverId, Order, Query,
    QueryExecutor, Record, RecordStore, RepositoryConnection, ResourcePath, Route, Router,
    SchemaStatus, Selection, StoreConfig, StoreError, TableSchema, Update, ValidationError, Value,
};

/// A record store backed by `SQLite`.
pub type SqliteRecordStore = RecordStore<SqlitePool>;

/// Open the database described by `sqlite` and build a store over it.
///
/// The table is not touched until the first operation that needs it.
pub fn open_store(sqlite: &SqliteConfig, config: StoreConfig) -> Result<SqliteRecordStore, StoreError> {
    let pool = SqlitePool::open(sqlite)?;
    RecordStore::from_config(pool, config)
}
