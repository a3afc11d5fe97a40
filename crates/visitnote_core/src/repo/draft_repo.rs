//! Draft repository contract and SQLite implementation.

use crate::config::EngineConfig;
use crate::db::{open_draft_db, open_draft_db_in_memory, DbError};
use crate::model::note_data::NoteData;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Key used when no per-visit key is known.
pub const DEFAULT_DRAFT_KEY: &str = "templateData";

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("invalid persisted draft data: {0}")]
    InvalidData(String),
    #[error("draft serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One stored draft.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftRecord {
    /// Stable per key across overwrites.
    pub draft_uuid: Uuid,
    pub key: String,
    pub data: NoteData,
    pub saved_at: DateTime<Utc>,
}

/// Local draft persistence.
pub trait DraftStore: Send + Sync {
    /// Inserts or replaces the draft stored under `key`.
    fn put_draft(&self, key: &str, data: &NoteData) -> RepoResult<DraftRecord>;
    fn get_draft(&self, key: &str) -> RepoResult<Option<DraftRecord>>;
    /// Returns whether a draft existed.
    fn delete_draft(&self, key: &str) -> RepoResult<bool>;
}

/// SQLite-backed draft store; one connection guarded by a mutex.
pub struct SqliteDraftStore {
    conn: Mutex<Connection>,
}

impl SqliteDraftStore {
    /// Wraps a migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Ok(Self::new(open_draft_db(path)?))
    }

    pub fn open_in_memory() -> RepoResult<Self> {
        Ok(Self::new(open_draft_db_in_memory()?))
    }

    /// Opens the configured draft file, or an in-memory store when unset.
    pub fn from_config(config: &EngineConfig) -> RepoResult<Self> {
        match config.draft_db_path.as_deref() {
            Some(path) => Self::open(path),
            None => Self::open_in_memory(),
        }
    }

    fn select(conn: &Connection, key: &str) -> RepoResult<Option<DraftRecord>> {
        let row = conn
            .query_row(
                "SELECT draft_key, draft_uuid, payload, saved_at
                 FROM local_drafts
                 WHERE draft_key = ?1;",
                params![key],
                read_raw_row,
            )
            .optional()?;
        row.map(RawDraftRow::into_record).transpose()
    }
}

impl DraftStore for SqliteDraftStore {
    fn put_draft(&self, key: &str, data: &NoteData) -> RepoResult<DraftRecord> {
        let key = normalize_key(key)?;
        let payload = serde_json::to_string(data)?;
        let saved_at = Utc::now().timestamp_millis();

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO local_drafts (draft_key, draft_uuid, payload, saved_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(draft_key) DO UPDATE SET
                payload = excluded.payload,
                saved_at = excluded.saved_at;",
            params![key, Uuid::new_v4().to_string(), payload, saved_at],
        )?;

        Self::select(&conn, key)?.ok_or_else(|| {
            RepoError::InvalidData(format!("draft `{key}` missing right after upsert"))
        })
    }

    fn get_draft(&self, key: &str) -> RepoResult<Option<DraftRecord>> {
        let key = normalize_key(key)?;
        let conn = self.conn.lock();
        Self::select(&conn, key)
    }

    fn delete_draft(&self, key: &str) -> RepoResult<bool> {
        let key = normalize_key(key)?;
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM local_drafts WHERE draft_key = ?1;",
            params![key],
        )?;
        Ok(removed > 0)
    }
}

fn normalize_key(key: &str) -> RepoResult<&str> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(RepoError::InvalidData("draft key cannot be empty".to_string()));
    }
    Ok(trimmed)
}

struct RawDraftRow {
    key: String,
    uuid: String,
    payload: String,
    saved_at: i64,
}

fn read_raw_row(row: &Row<'_>) -> rusqlite::Result<RawDraftRow> {
    Ok(RawDraftRow {
        key: row.get("draft_key")?,
        uuid: row.get("draft_uuid")?,
        payload: row.get("payload")?,
        saved_at: row.get("saved_at")?,
    })
}

impl RawDraftRow {
    fn into_record(self) -> RepoResult<DraftRecord> {
        let draft_uuid = Uuid::parse_str(&self.uuid).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid uuid value `{}` in local_drafts.draft_uuid",
                self.uuid
            ))
        })?;
        let payload: serde_json::Value = serde_json::from_str(&self.payload)?;
        if !payload.is_object() {
            return Err(RepoError::InvalidData(format!(
                "draft `{}` payload is not a JSON object",
                self.key
            )));
        }
        let saved_at = DateTime::<Utc>::from_timestamp_millis(self.saved_at).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid saved_at value `{}` in local_drafts.saved_at",
                self.saved_at
            ))
        })?;
        Ok(DraftRecord {
            draft_uuid,
            key: self.key,
            data: NoteData::from_value(payload),
            saved_at,
        })
    }
}
