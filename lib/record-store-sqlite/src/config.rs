//! Connection settings and connection opening.

use std::time::Duration;

use record_store::{ConnectionConfig, StoreError};
use rusqlite::{Connection, OpenFlags};

/// Default busy timeout (ms).
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// `SQLite` journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    Delete,
    Wal,
    Memory,
}

impl JournalMode {
    pub fn pragma_value(self) -> &'static str {
        match self {
            JournalMode::Delete => "DELETE",
            JournalMode::Wal => "WAL",
            JournalMode::Memory => "MEMORY",
        }
    }
}

/// Settings for [`crate::SqlitePool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    pub connection: ConnectionConfig,
    pub journal_mode: JournalMode,
    pub busy_timeout_ms: u64,
}

impl SqliteConfig {
    /// WAL for database files, in-memory journaling for in-memory databases.
    pub fn new(connection: impl Into<ConnectionConfig>) -> Self {
        let connection = connection.into();
        let journal_mode = match connection {
            ConnectionConfig::Memory => JournalMode::Memory,
            ConnectionConfig::Path(_) => JournalMode::Wal,
        };
        Self {
            connection,
            journal_mode,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(ConnectionConfig::Memory)
    }

    pub fn journal_mode(mut self, journal_mode: JournalMode) -> Self {
        self.journal_mode = journal_mode;
        self
    }

    pub fn busy_timeout_ms(mut self, busy_timeout_ms: u64) -> Self {
        self.busy_timeout_ms = busy_timeout_ms;
        self
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Opens a connection and applies the configured pragmas.
pub(crate) fn open_connection(config: &SqliteConfig) -> Result<Connection, StoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = match &config.connection {
        ConnectionConfig::Memory => Connection::open_in_memory_with_flags(flags)?,
        ConnectionConfig::Path(path) => {
            if path.is_dir() {
                return Err(StoreError::StorageError(format!(
                    "store path {} is a directory",
                    path.display()
                )));
            }
            Connection::open_with_flags(path, flags)?
        }
    };
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

fn apply_pragmas(connection: &Connection, config: &SqliteConfig) -> Result<(), StoreError> {
    connection.execute_batch(&format!(
        "PRAGMA journal_mode = {};",
        config.journal_mode.pragma_value()
    ))?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    Ok(())
}
