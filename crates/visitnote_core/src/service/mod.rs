//! Note-composition services.
//!
//! # Responsibility
//! - Resolve templates, own in-progress note data, validate and submit.
//! - Convert component-local failures into typed errors at each boundary.
//!
//! # Invariants
//! - Section name is the only join key between template, renderer and data.
//! - In-memory mutation never implies durability; persistence is explicit.

pub mod form_orchestrator;
pub mod persistence_gateway;
pub mod section_data_store;
pub mod template_resolver;
pub mod validation;
