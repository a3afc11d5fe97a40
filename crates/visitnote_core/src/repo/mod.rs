//! Local persistence for note drafts.
//!
//! # Responsibility
//! - Keep the last-resort local copy of in-progress note data.
//! - Isolate SQLite details from the data store and orchestrator.
//!
//! # Invariants
//! - One draft row per draft key; writes are upserts.
//! - Persisted payloads always decode back into `NoteData`.

pub mod draft_repo;
