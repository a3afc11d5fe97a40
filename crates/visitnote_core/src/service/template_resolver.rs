//! Template resolution state machine.
//!
//! # Responsibility
//! - Fetch the template for a `(discipline, note_type)` pair when enabled.
//! - Validate the document structure before exposing a definition.
//! - Discard responses for a pair or request that is no longer current.
//!
//! # Invariants
//! - Structural rejections surface as `Failed(INVALID_TEMPLATE_STRUCTURE)`;
//!   transport failures surface as `Failed(<status - body | message>)`.
//! - Only the most recent request generation may write the state.
//! - There is no fallback template; a failed pair stays failed until retried.

use crate::client::record_service::TemplateSource;
use crate::logging::redact_for_log;
use crate::model::note_data::id_to_text;
use crate::model::template::{SectionDescriptor, TemplateDefinition, TemplateKey};
use crate::registry::section_kind::SectionKind;
use log::{info, warn};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

pub const INVALID_TEMPLATE_STRUCTURE: &str = "Invalid template structure received";

const REQUIRED_FIELDS: [&str; 4] = ["id", "discipline", "note_type", "sections"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateStructureError {
    #[error("template document is not an object")]
    NotAnObject,
    #[error("template missing required field: {0}")]
    MissingField(&'static str),
    #[error("template sections must be an array")]
    SectionsNotArray,
    #[error("section at index {0} is not an object")]
    SectionNotAnObject(usize),
    #[error("section at index {0} is missing an id")]
    SectionMissingId(usize),
    #[error("section at index {0} is missing a section_name")]
    SectionMissingName(usize),
    #[error("duplicate section name: {0}")]
    DuplicateSectionName(String),
    #[error("template has no resolvable sections")]
    NoResolvableSections,
}

/// Observable resolver state.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionState {
    /// Disabled or no complete key yet.
    Idle,
    Loading,
    Resolved(Arc<TemplateDefinition>),
    Failed(String),
}

impl ResolutionState {
    pub fn template(&self) -> Option<&Arc<TemplateDefinition>> {
        match self {
            Self::Resolved(template) => Some(template),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Parses and structurally validates one raw template document.
pub fn parse_template(document: &Value) -> Result<TemplateDefinition, TemplateStructureError> {
    let object = document
        .as_object()
        .ok_or(TemplateStructureError::NotAnObject)?;
    for field in REQUIRED_FIELDS {
        if !is_present(object.get(field)) {
            return Err(TemplateStructureError::MissingField(field));
        }
    }

    let template_id = object
        .get("id")
        .and_then(id_to_text)
        .ok_or(TemplateStructureError::MissingField("id"))?;
    let discipline = required_text(object, "discipline")?;
    let note_type = required_text(object, "note_type")?;
    let is_active = object
        .get("is_active")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    let raw_sections = object
        .get("sections")
        .and_then(Value::as_array)
        .ok_or(TemplateStructureError::SectionsNotArray)?;

    let mut seen = BTreeSet::new();
    let mut sections = Vec::with_capacity(raw_sections.len());
    for (index, raw) in raw_sections.iter().enumerate() {
        let section = parse_section(index, raw)?;
        if !seen.insert(section.section_name.clone()) {
            return Err(TemplateStructureError::DuplicateSectionName(
                section.section_name,
            ));
        }
        sections.push(section);
    }

    let unresolved: Vec<&str> = sections
        .iter()
        .filter(|section| section.kind.is_none())
        .map(|section| section.section_name.as_str())
        .collect();
    if !unresolved.is_empty() {
        warn!(
            "event=template_parse module=resolver status=partial unresolved_count={} unresolved={}",
            unresolved.len(),
            redact_for_log(&unresolved.join("|"))
        );
    }
    if unresolved.len() == sections.len() {
        return Err(TemplateStructureError::NoResolvableSections);
    }

    Ok(TemplateDefinition {
        template_id,
        name: format!("{discipline} {note_type}"),
        discipline,
        note_type,
        is_active,
        sections,
    })
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.trim().is_empty(),
        Some(_) => true,
    }
}

fn required_text(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<String, TemplateStructureError> {
    object
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or(TemplateStructureError::MissingField(field))
}

fn parse_section(index: usize, raw: &Value) -> Result<SectionDescriptor, TemplateStructureError> {
    let object = raw
        .as_object()
        .ok_or(TemplateStructureError::SectionNotAnObject(index))?;
    let id = object
        .get("id")
        .and_then(id_to_text)
        .ok_or(TemplateStructureError::SectionMissingId(index))?;
    let section_name = object
        .get("section_name")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .ok_or(TemplateStructureError::SectionMissingName(index))?
        .to_string();
    let text = |field: &str| {
        object
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    Ok(SectionDescriptor {
        id,
        kind: SectionKind::from_section_name(&section_name),
        section_name,
        is_required: object
            .get("is_required")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        description: text("description"),
        form_schema: object.get("form_schema").filter(|v| !v.is_null()).cloned(),
        has_static_image: object
            .get("has_static_image")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        static_image_url: text("static_image_url"),
    })
}

struct ResolverShared {
    key: Option<TemplateKey>,
    enabled: bool,
    generation: u64,
    state: ResolutionState,
}

/// Resolves templates from a [`TemplateSource`], one pair at a time.
pub struct TemplateConfigResolver {
    source: Arc<dyn TemplateSource>,
    shared: Mutex<ResolverShared>,
}

impl TemplateConfigResolver {
    pub fn new(source: Arc<dyn TemplateSource>) -> Self {
        Self {
            source,
            shared: Mutex::new(ResolverShared {
                key: None,
                enabled: false,
                generation: 0,
                state: ResolutionState::Idle,
            }),
        }
    }

    pub fn state(&self) -> ResolutionState {
        self.shared.lock().state.clone()
    }

    pub fn template(&self) -> Option<Arc<TemplateDefinition>> {
        self.shared.lock().state.template().cloned()
    }

    pub fn key(&self) -> Option<TemplateKey> {
        self.shared.lock().key.clone()
    }

    /// Applies new inputs; fetches when enabled and the pair changed or
    /// `enabled` just turned on.
    ///
    /// Resolves once the fetch it started settles, returning the state at
    /// that moment (which a newer request may already own).
    pub async fn configure(&self, key: TemplateKey, enabled: bool) -> ResolutionState {
        let generation = {
            let mut shared = self.shared.lock();
            let key_changed = shared.key.as_ref() != Some(&key);
            let turned_on = enabled && !shared.enabled;
            shared.enabled = enabled;

            if key_changed {
                shared.key = Some(key.clone());
                shared.generation += 1;
                shared.state = ResolutionState::Idle;
            }
            if !enabled || !key.is_complete() || !(key_changed || turned_on) {
                return shared.state.clone();
            }
            Self::begin(&mut shared)
        };
        self.fetch(generation, key).await
    }

    /// Re-issues the fetch for the current pair.
    pub async fn refresh(&self) -> ResolutionState {
        let (generation, key) = {
            let mut shared = self.shared.lock();
            let Some(key) = shared.key.clone().filter(TemplateKey::is_complete) else {
                return shared.state.clone();
            };
            if !shared.enabled {
                return shared.state.clone();
            }
            (Self::begin(&mut shared), key)
        };
        self.fetch(generation, key).await
    }

    /// Drops the current pair and any outstanding response.
    pub fn reset(&self) {
        let mut shared = self.shared.lock();
        shared.key = None;
        shared.enabled = false;
        shared.generation += 1;
        shared.state = ResolutionState::Idle;
    }

    fn begin(shared: &mut ResolverShared) -> u64 {
        shared.generation += 1;
        shared.state = ResolutionState::Loading;
        shared.generation
    }

    async fn fetch(&self, generation: u64, key: TemplateKey) -> ResolutionState {
        let started_at = Instant::now();
        info!(
            "event=template_resolve module=resolver status=start key={} generation={}",
            key, generation
        );

        let outcome = match self.source.fetch_template(&key).await {
            Ok(document) => match parse_template(&document) {
                Ok(template) => {
                    info!(
                        "event=template_resolve module=resolver status=ok key={} sections={} duration_ms={}",
                        key,
                        template.sections.len(),
                        started_at.elapsed().as_millis()
                    );
                    ResolutionState::Resolved(Arc::new(template))
                }
                Err(err) => {
                    warn!(
                        "event=template_resolve module=resolver status=error key={} error_code=invalid_structure error={}",
                        key, err
                    );
                    ResolutionState::Failed(INVALID_TEMPLATE_STRUCTURE.to_string())
                }
            },
            Err(err) => {
                warn!(
                    "event=template_resolve module=resolver status=error key={} error_code=transport error={}",
                    key,
                    redact_for_log(&err.to_string())
                );
                ResolutionState::Failed(err.to_string())
            }
        };

        let mut shared = self.shared.lock();
        if shared.generation != generation || shared.key.as_ref() != Some(&key) {
            info!(
                "event=template_resolve module=resolver status=skipped reason=stale key={} generation={} current_generation={}",
                key, generation, shared.generation
            );
            return shared.state.clone();
        }
        shared.state = outcome.clone();
        outcome
    }
}
