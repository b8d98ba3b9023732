// crates/pce-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Cognition Store
// Description: Durable CognitionStore backed by SQLite WAL.
// Purpose: Persist state, logs, approvals, and transcript with one writer.
// Dependencies: pce-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements the durable [`CognitionStore`] using `SQLite`. One
//! connection owns the file, guarded by a mutex; write-ahead logging is
//! enabled so readers never block the writer. The transcript cursor rides the
//! `AUTOINCREMENT` rowid, which keeps it strictly monotonic and gap-free per
//! store instance. Loads fail closed on malformed rows.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use pce_core::ApprovalId;
use pce_core::ApprovalRecord;
use pce_core::CciSnapshot;
use pce_core::CognitionStore;
use pce_core::CompletedAction;
use pce_core::NormalizedEvent;
use pce_core::StateSnapshot;
use pce_core::StoreError;
use pce_core::Timestamp;
use pce_core::CciComponents;
use pce_core::CorrelationId;
use pce_core::DecisionId;
use pce_core::TranscriptEntry;
use pce_core::TranscriptItem;
use pce_core::TranscriptKind;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Key of the single live state row.
const STATE_ROW_KEY: &str = "snapshot";

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

/// Configuration for the `SQLite` cognition store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
}

impl SqliteStoreConfig {
    /// Builds a config with defaults for the given database path.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Write contention surfaced after the busy timeout.
    #[error("sqlite store busy: {0}")]
    Busy(String),
    /// Store corruption or malformed persisted rows.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Busy(message) => Self::Conflict(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::Invalid(message),
        }
    }
}

/// Maps a rusqlite error, classifying busy/locked as write contention.
fn map_db_error(error: &rusqlite::Error) -> SqliteStoreError {
    if let rusqlite::Error::SqliteFailure(failure, _) = error {
        if matches!(
            failure.code,
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
        ) {
            return SqliteStoreError::Busy(error.to_string());
        }
    }
    SqliteStoreError::Db(error.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed cognition store with WAL support.
#[derive(Clone)]
pub struct SqliteCognitionStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteCognitionStore {
    /// Opens an `SQLite`-backed cognition store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        ensure_parent_dir(&config.path)?;
        let connection = open_connection(config)?;
        initialize_schema(&connection)?;
        Ok(Self { connection: Arc::new(Mutex::new(connection)) })
    }

    /// Locks the connection, mapping poisoning into a store error.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("store mutex poisoned".to_string()))
    }
}

/// Creates the parent directory of the database file when missing.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    }
    Ok(())
}

/// Opens the connection and applies pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let connection =
        Connection::open(&config.path).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| map_db_error(&err))?;
    connection
        .pragma_update(None, "journal_mode", config.journal_mode.pragma_value())
        .map_err(|err| map_db_error(&err))?;
    connection
        .pragma_update(None, "synchronous", "normal")
        .map_err(|err| map_db_error(&err))?;
    Ok(connection)
}

/// Creates tables and verifies the schema version.
fn initialize_schema(connection: &Connection) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS state (
                key TEXT PRIMARY KEY,
                json BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS events (
                event_id TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                source TEXT NOT NULL,
                ts INTEGER NOT NULL,
                json BLOB NOT NULL
            );
            CREATE TABLE IF NOT EXISTS actions (
                action_id TEXT PRIMARY KEY,
                decision_id TEXT NOT NULL,
                ts INTEGER NOT NULL,
                json BLOB NOT NULL
            );
            CREATE TABLE IF NOT EXISTS cci (
                ts INTEGER PRIMARY KEY,
                cci REAL NOT NULL,
                components_json BLOB NOT NULL
            );
            CREATE TABLE IF NOT EXISTS approvals (
                approval_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                json BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                resolved_at INTEGER
            );
            CREATE TABLE IF NOT EXISTS transcript (
                cursor INTEGER PRIMARY KEY AUTOINCREMENT,
                ts INTEGER NOT NULL,
                kind TEXT NOT NULL,
                agent TEXT,
                correlation_id TEXT NOT NULL,
                decision_id TEXT,
                payload_json BLOB NOT NULL
            );",
        )
        .map_err(|err| map_db_error(&err))?;

    let version: Option<String> = connection
        .query_row("SELECT value FROM meta WHERE key = 'schema_version'", [], |row| row.get(0))
        .optional()
        .map_err(|err| map_db_error(&err))?;
    match version {
        Some(found) if found != SCHEMA_VERSION.to_string() => {
            Err(SqliteStoreError::VersionMismatch(format!(
                "found {found}, expected {SCHEMA_VERSION}"
            )))
        }
        Some(_) => Ok(()),
        None => {
            connection
                .execute(
                    "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)",
                    params![SCHEMA_VERSION.to_string()],
                )
                .map_err(|err| map_db_error(&err))?;
            Ok(())
        }
    }
}

/// Serializes a value into canonical JSON bytes for a blob column.
fn to_blob<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, SqliteStoreError> {
    serde_json::to_vec(value).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))
}

/// Deserializes a blob column, failing closed on malformed rows.
fn from_blob<T: serde::de::DeserializeOwned>(blob: &[u8]) -> Result<T, SqliteStoreError> {
    serde_json::from_slice(blob).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))
}

impl CognitionStore for SqliteCognitionStore {
    fn load_state(&self) -> Result<StateSnapshot, StoreError> {
        let guard = self.lock()?;
        let row: Option<Vec<u8>> = guard
            .query_row("SELECT json FROM state WHERE key = ?1", params![STATE_ROW_KEY], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|err| map_db_error(&err))?;
        match row {
            Some(blob) => Ok(from_blob(&blob)?),
            None => Ok(StateSnapshot::new()),
        }
    }

    fn save_state(&self, state: &StateSnapshot) -> Result<(), StoreError> {
        let blob = to_blob(state)?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO state (key, json, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET json = ?2, updated_at = ?3",
                params![STATE_ROW_KEY, blob, Timestamp::now().as_millis()],
            )
            .map_err(|err| map_db_error(&err))?;
        Ok(())
    }

    fn append_event(&self, event: &NormalizedEvent) -> Result<(), StoreError> {
        let blob = to_blob(event)?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO events (event_id, type, source, ts, json)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    event.event_id.as_str(),
                    event.event_type,
                    event.source,
                    event.ts.as_millis(),
                    blob
                ],
            )
            .map_err(|err| map_db_error(&err))?;
        Ok(())
    }

    fn append_action(&self, action: &CompletedAction) -> Result<(), StoreError> {
        let blob = to_blob(action)?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO actions (action_id, decision_id, ts, json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    action.action_id.as_str(),
                    action.decision_id.as_str(),
                    action.completed_at.as_millis(),
                    blob
                ],
            )
            .map_err(|err| map_db_error(&err))?;
        Ok(())
    }

    fn recent_actions(&self, limit: usize) -> Result<Vec<CompletedAction>, StoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare("SELECT json FROM actions ORDER BY ts DESC, action_id DESC LIMIT ?1")
            .map_err(|err| map_db_error(&err))?;
        let rows = statement
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .map_err(|err| map_db_error(&err))?;
        let mut actions = Vec::new();
        for row in rows {
            let blob = row.map_err(|err| map_db_error(&err))?;
            actions.push(from_blob::<CompletedAction>(&blob)?);
        }
        actions.reverse();
        Ok(actions)
    }

    fn append_cci(&self, snapshot: &CciSnapshot) -> Result<(), StoreError> {
        let blob = to_blob(&snapshot.components)?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO cci (ts, cci, components_json) VALUES (?1, ?2, ?3)
                 ON CONFLICT(ts) DO UPDATE SET cci = ?2, components_json = ?3",
                params![snapshot.ts.as_millis(), snapshot.cci, blob],
            )
            .map_err(|err| map_db_error(&err))?;
        Ok(())
    }

    fn cci_history(&self, limit: usize) -> Result<Vec<CciSnapshot>, StoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare("SELECT ts, cci, components_json FROM cci ORDER BY ts DESC LIMIT ?1")
            .map_err(|err| map_db_error(&err))?;
        let rows = statement
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?, row.get::<_, Vec<u8>>(2)?))
            })
            .map_err(|err| map_db_error(&err))?;
        let mut history = Vec::new();
        for row in rows {
            let (ts, cci, blob) = row.map_err(|err| map_db_error(&err))?;
            history.push(CciSnapshot {
                ts: Timestamp::from_millis(ts),
                cci,
                components: from_blob::<CciComponents>(&blob)?,
            });
        }
        history.reverse();
        Ok(history)
    }

    fn put_approval(&self, record: &ApprovalRecord) -> Result<(), StoreError> {
        let blob = to_blob(record)?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO approvals (approval_id, status, json, created_at, resolved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(approval_id) DO UPDATE SET
                    status = ?2, json = ?3, resolved_at = ?5",
                params![
                    record.approval_id.as_str(),
                    record.status.label(),
                    blob,
                    record.created_at.as_millis(),
                    record.resolved_at.map(|ts| ts.as_millis()),
                ],
            )
            .map_err(|err| map_db_error(&err))?;
        Ok(())
    }

    fn approval(&self, id: &ApprovalId) -> Result<Option<ApprovalRecord>, StoreError> {
        let guard = self.lock()?;
        let row: Option<Vec<u8>> = guard
            .query_row(
                "SELECT json FROM approvals WHERE approval_id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| map_db_error(&err))?;
        match row {
            Some(blob) => Ok(Some(from_blob(&blob)?)),
            None => Ok(None),
        }
    }

    fn approvals(&self) -> Result<Vec<ApprovalRecord>, StoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare("SELECT json FROM approvals ORDER BY created_at ASC, approval_id ASC")
            .map_err(|err| map_db_error(&err))?;
        let rows = statement
            .query_map([], |row| row.get::<_, Vec<u8>>(0))
            .map_err(|err| map_db_error(&err))?;
        let mut records = Vec::new();
        for row in rows {
            let blob = row.map_err(|err| map_db_error(&err))?;
            records.push(from_blob::<ApprovalRecord>(&blob)?);
        }
        Ok(records)
    }

    fn append_transcript(&self, entry: &TranscriptEntry) -> Result<TranscriptItem, StoreError> {
        let payload = to_blob(&entry.payload)?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO transcript (ts, kind, agent, correlation_id, decision_id, payload_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.ts.as_millis(),
                    entry.kind.label(),
                    entry.agent,
                    entry.correlation_id.as_str(),
                    entry.decision_id.as_ref().map(DecisionId::as_str),
                    payload,
                ],
            )
            .map_err(|err| map_db_error(&err))?;
        let cursor = guard.last_insert_rowid();
        Ok(TranscriptItem::from_entry(
            u64::try_from(cursor).unwrap_or(0),
            entry.clone(),
        ))
    }

    fn transcript_since(
        &self,
        cursor: u64,
        limit: usize,
    ) -> Result<Vec<TranscriptItem>, StoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(
                "SELECT cursor, ts, kind, agent, correlation_id, decision_id, payload_json
                 FROM transcript WHERE cursor > ?1 ORDER BY cursor ASC LIMIT ?2",
            )
            .map_err(|err| map_db_error(&err))?;
        let rows = statement
            .query_map(
                params![
                    i64::try_from(cursor).unwrap_or(i64::MAX),
                    i64::try_from(limit).unwrap_or(i64::MAX)
                ],
                |row| {
                Ok(TranscriptRow {
                    cursor: row.get(0)?,
                    ts: row.get(1)?,
                    kind: row.get(2)?,
                    agent: row.get(3)?,
                    correlation_id: row.get(4)?,
                    decision_id: row.get(5)?,
                    payload: row.get(6)?,
                })
            })
            .map_err(|err| map_db_error(&err))?;
        let mut items = Vec::new();
        for row in rows {
            let row = row.map_err(|err| map_db_error(&err))?;
            items.push(row.into_item()?);
        }
        Ok(items)
    }

    fn latest_cursor(&self) -> Result<u64, StoreError> {
        let guard = self.lock()?;
        let cursor: Option<i64> = guard
            .query_row("SELECT MAX(cursor) FROM transcript", [], |row| row.get(0))
            .map_err(|err| map_db_error(&err))?;
        Ok(cursor.and_then(|value| u64::try_from(value).ok()).unwrap_or(0))
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Raw transcript row before JSON decoding.
struct TranscriptRow {
    /// Assigned cursor.
    cursor: i64,
    /// Entry timestamp (unix ms).
    ts: i64,
    /// Kind label.
    kind: String,
    /// Optional agent attribution.
    agent: Option<String>,
    /// Correlation identifier.
    correlation_id: String,
    /// Optional decision identifier.
    decision_id: Option<String>,
    /// Payload JSON bytes.
    payload: Vec<u8>,
}

impl TranscriptRow {
    /// Decodes the row into a transcript item, failing closed on bad rows.
    fn into_item(self) -> Result<TranscriptItem, SqliteStoreError> {
        let kind: TranscriptKind =
            serde_json::from_value(serde_json::Value::String(self.kind.clone()))
                .map_err(|_| SqliteStoreError::Corrupt(format!("unknown kind: {}", self.kind)))?;
        Ok(TranscriptItem {
            cursor: u64::try_from(self.cursor).unwrap_or(0),
            ts: Timestamp::from_millis(self.ts),
            kind,
            agent: self.agent,
            payload: from_blob(&self.payload)?,
            correlation_id: CorrelationId::new(self.correlation_id),
            decision_id: self.decision_id.map(DecisionId::new),
        })
    }
}
