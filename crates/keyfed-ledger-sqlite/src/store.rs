// crates/keyfed-ledger-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Batch Tag Ledger
// Description: Durable BatchTagLedger backed by SQLite WAL.
// Purpose: Persist upload cursors with single-row atomic commits.
// Dependencies: keyfed-core, rusqlite, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`BatchTagLedger`] using `SQLite`. Each
//! federation direction owns one row in the `federation_cursor` table; a
//! commit is a transactional UPSERT of that row with last-writer-wins
//! semantics, durable before the engine proceeds to the next page. Loads
//! fail closed when the stored cursor does not decode.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use keyfed_core::BatchTagLedger;
use keyfed_core::LedgerError;
use keyfed_core::StateTableKey;
use keyfed_core::UploadCursor;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the ledger.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum accepted size of one stored cursor document.
const MAX_CURSOR_BYTES: usize = 64 * 1024;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteLedgerConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` ledger errors.
#[derive(Debug, Error)]
pub enum SqliteLedgerError {
    /// Ledger I/O error.
    #[error("sqlite ledger io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite ledger db error: {0}")]
    Db(String),
    /// Stored cursor is corrupted or undecodable.
    #[error("sqlite ledger corruption: {0}")]
    Corrupt(String),
    /// Ledger schema version mismatch.
    #[error("sqlite ledger version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid ledger data.
    #[error("sqlite ledger invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteLedgerError> for LedgerError {
    fn from(error: SqliteLedgerError) -> Self {
        match error {
            SqliteLedgerError::Io(message) => Self::Io(message),
            SqliteLedgerError::Db(message) | SqliteLedgerError::VersionMismatch(message) => {
                Self::Store(message)
            }
            SqliteLedgerError::Corrupt(message) | SqliteLedgerError::Invalid(message) => {
                Self::Corrupt(message)
            }
        }
    }
}

// ============================================================================
// SECTION: Ledger
// ============================================================================

/// `SQLite`-backed batch tag ledger with WAL support.
#[derive(Clone)]
pub struct SqliteLedger {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    /// Opens an `SQLite`-backed ledger.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteLedgerError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: SqliteLedgerConfig) -> Result<Self, SqliteLedgerError> {
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Loads the cursor row for the given state table key.
    fn load_cursor(&self, table: &StateTableKey) -> Result<Option<UploadCursor>, SqliteLedgerError> {
        let guard = self
            .connection
            .lock()
            .map_err(|_| SqliteLedgerError::Db("mutex poisoned".to_string()))?;
        let document: Option<String> = guard
            .query_row(
                "SELECT cursor_json FROM federation_cursor WHERE table_key = ?1",
                params![table.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
        drop(guard);
        let Some(document) = document else {
            return Ok(None);
        };
        if document.len() > MAX_CURSOR_BYTES {
            return Err(SqliteLedgerError::Corrupt(format!(
                "cursor document for {} exceeds size limit",
                table.as_str()
            )));
        }
        let cursor: UploadCursor = serde_json::from_str(&document)
            .map_err(|err| SqliteLedgerError::Corrupt(err.to_string()))?;
        Ok(Some(cursor))
    }

    /// Durably replaces the cursor row inside one transaction.
    fn commit_cursor(
        &self,
        table: &StateTableKey,
        cursor: &UploadCursor,
    ) -> Result<(), SqliteLedgerError> {
        if table.as_str().trim().is_empty() {
            return Err(SqliteLedgerError::Invalid("table key must not be empty".to_string()));
        }
        let document = serde_json::to_string(cursor)
            .map_err(|err| SqliteLedgerError::Invalid(err.to_string()))?;
        if document.len() > MAX_CURSOR_BYTES {
            return Err(SqliteLedgerError::Invalid("cursor document exceeds size limit".to_string()));
        }
        let mut guard = self
            .connection
            .lock()
            .map_err(|_| SqliteLedgerError::Db("mutex poisoned".to_string()))?;
        let tx = guard.transaction().map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
        tx.execute(
            "INSERT INTO federation_cursor (table_key, cursor_json) VALUES (?1, ?2) ON \
             CONFLICT(table_key) DO UPDATE SET cursor_json = excluded.cursor_json",
            params![table.as_str(), document],
        )
        .map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
        tx.commit().map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
        drop(guard);
        Ok(())
    }
}

impl BatchTagLedger for SqliteLedger {
    fn load(&self, table: &StateTableKey) -> Result<Option<UploadCursor>, LedgerError> {
        self.load_cursor(table).map_err(LedgerError::from)
    }

    fn commit(&self, table: &StateTableKey, cursor: &UploadCursor) -> Result<(), LedgerError> {
        self.commit_cursor(table, cursor).map_err(LedgerError::from)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the ledger exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteLedgerError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteLedgerError::Io("ledger path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteLedgerError::Io(err.to_string()))
}

/// Opens an `SQLite` connection with durable defaults.
fn open_connection(config: &SqliteLedgerConfig) -> Result<Connection, SqliteLedgerError> {
    if config.path.exists() && config.path.is_dir() {
        return Err(SqliteLedgerError::Invalid(
            "ledger path must be a file, not a directory".to_string(),
        ));
    }
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteLedgerConfig,
) -> Result<(), SqliteLedgerError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteLedgerError> {
    let tx = connection.transaction().map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS ledger_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM ledger_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO ledger_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS federation_cursor (
                    table_key TEXT PRIMARY KEY,
                    cursor_json TEXT NOT NULL
                );",
            )
            .map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteLedgerError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
    Ok(())
}
