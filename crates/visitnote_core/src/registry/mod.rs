//! Section kinds and renderer bindings.
//!
//! This is the single seam where section types are introduced: name-based
//! dispatch happens only in [`section_kind::SectionKind::from_section_name`].

pub mod section_kind;
pub mod section_registry;
