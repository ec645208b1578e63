//! Record Store - URI-routed, schema-validated single-table storage.
//!
//! This crate provides the backend-agnostic half of a record store: one table
//! described by configuration data, addressed through resource paths, with
//! validated create/read/update/delete and synchronous change notification.
//!
//! # Core Concepts
//!
//! - **Collection**: every record of the table, addressed as
//!   `scheme://authority/collection`.
//! - **Record**: one row, addressed as `scheme://authority/collection/{id}`.
//!   The id is assigned by storage and never reused or rewritten.
//! - **Schema**: field kinds plus required, non-negative and classification
//!   constraints, checked before storage is touched.
//! - **Change notification**: after a successful mutation, observers of the
//!   affected path are called with that path and re-query as needed.
//!
//! # Types
//!
//! - [`RecordStore`]: routing, validation, CRUD and notification over a
//!   [`QueryExecutor`]
//! - [`TableSchema`] / [`FieldSpec`]: the table description
//! - [`Router`] / [`ResourcePath`]: the immutable routing table
//! - [`ChangeNotifier`]: observer registry
//!
//! # Schema versions
//!
//! Changing [`TableSchema::version`] is destructive: backends drop the table
//! and recreate it, losing every stored row.

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod error;
mod notify;
mod query;
mod record;
mod repository;
mod resource;
mod schema;
mod store;

/// Primary key column of every table.
pub const ID_COLUMN: &str = "id";

pub use error::{StoreError, ValidationError};
pub use notify::{ChangeNotifier, ObserverId};
pub use query::{Delete, Filter, Order, Query, QueryExecutor, Selection, Update, Value};
pub use record::{Fields, Record};
pub use repository::{ConnectionConfig, RepositoryConnection};
pub use resource::{DEFAULT_SCHEME, ResourcePath, Route, Router, StoreConfig};
pub use schema::{FieldKind, FieldSpec, SchemaStatus, TableSchema, pets, stock};
pub use store::RecordStore;
