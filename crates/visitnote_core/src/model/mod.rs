//! Domain model for templates, in-progress note data and persisted notes.
//!
//! # Invariants
//! - Section name is the join key between template descriptor, renderer
//!   binding and stored note data.
//! - Section payloads are opaque JSON owned by their renderer; the engine
//!   only inspects them through the completion heuristic.

pub mod completion;
pub mod note_data;
pub mod template;
pub mod visit_note;
