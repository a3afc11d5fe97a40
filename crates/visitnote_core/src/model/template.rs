//! Resolved note template model.
//!
//! # Invariants
//! - A `TemplateDefinition` is immutable once resolved for a `TemplateKey`.
//! - `section_name` values are unique within one template.

use crate::registry::section_kind::SectionKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// Discipline + note type pair a template is declared for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateKey {
    pub discipline: String,
    pub note_type: String,
}

impl TemplateKey {
    pub fn new(discipline: impl Into<String>, note_type: impl Into<String>) -> Self {
        Self {
            discipline: discipline.into(),
            note_type: note_type.into(),
        }
    }

    /// Both parts must be non-blank before a fetch is attempted.
    pub fn is_complete(&self) -> bool {
        !self.discipline.trim().is_empty() && !self.note_type.trim().is_empty()
    }
}

impl Display for TemplateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.discipline, self.note_type)
    }
}

/// One section entry of a resolved template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDescriptor {
    /// Server-side section identifier, normalized to text.
    pub id: String,
    pub section_name: String,
    /// Renderer kind resolved from `section_name`; `None` when unmapped.
    pub kind: Option<SectionKind>,
    pub is_required: bool,
    pub description: Option<String>,
    /// Opaque; interpreted by the bound renderer only.
    pub form_schema: Option<Value>,
    pub has_static_image: bool,
    pub static_image_url: Option<String>,
}

/// Ordered, validated template for one discipline + note type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    pub template_id: String,
    /// Display name, `"<discipline> <note_type>"`.
    pub name: String,
    pub discipline: String,
    pub note_type: String,
    pub is_active: bool,
    pub sections: Vec<SectionDescriptor>,
}

impl TemplateDefinition {
    pub fn key(&self) -> TemplateKey {
        TemplateKey::new(self.discipline.clone(), self.note_type.clone())
    }

    pub fn section(&self, section_name: &str) -> Option<&SectionDescriptor> {
        self.sections
            .iter()
            .find(|section| section.section_name == section_name)
    }

    pub fn has_section(&self, section_name: &str) -> bool {
        self.section(section_name).is_some()
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections
            .iter()
            .map(|section| section.section_name.as_str())
    }

    /// Sections whose name maps to a known renderer kind.
    pub fn resolvable_sections(&self) -> impl Iterator<Item = &SectionDescriptor> {
        self.sections.iter().filter(|section| section.kind.is_some())
    }
}
