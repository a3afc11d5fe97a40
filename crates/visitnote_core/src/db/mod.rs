//! SQLite bootstrap for the local draft store.
//!
//! # Responsibility
//! - Open and configure SQLite connections holding local note drafts.
//! - Apply schema migrations in deterministic order.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Draft reads/writes never happen before migrations succeed.

use thiserror::Error;

pub mod migrations;
mod open;

pub use open::{open_draft_db, open_draft_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("draft database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}
