//! Section renderer registry.
//!
//! # Responsibility
//! - Bind each [`SectionKind`] to the renderer that edits its payload.
//! - Resolve server-declared section names to a binding plus display icon.
//!
//! # Invariants
//! - At most one renderer per kind.
//! - Unknown names resolve to `None` with a logged diagnostic; they never
//!   fail the caller.

use crate::model::template::SectionDescriptor;
use crate::registry::section_kind::SectionKind;
use log::warn;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SectionRegistryError {
    #[error("renderer already registered for section kind: {}", .0.as_str())]
    DuplicateKind(SectionKind),
}

/// Mutation and action callbacks handed to a renderer.
///
/// Renderers never touch note data directly; every edit goes through
/// `on_change` with the section's full replacement payload.
pub trait SectionEvents {
    fn on_change(&self, payload: Value);
    fn on_open_test(&self, test_name: &str);
    fn on_open_diagnosis(&self);
}

/// Per-section configuration derived from the template descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionConfig {
    pub kind: SectionKind,
    pub icon: &'static str,
    pub descriptor: SectionDescriptor,
}

impl SectionConfig {
    pub fn is_required(&self) -> bool {
        self.descriptor.is_required
    }

    pub fn form_schema(&self) -> Option<&Value> {
        self.descriptor.form_schema.as_ref()
    }
}

/// Everything a renderer receives for one draw.
pub struct SectionProps<'a> {
    pub section_name: &'a str,
    /// This section's slice of note data; `Value::Null` when not yet edited.
    pub data: &'a Value,
    pub config: &'a SectionConfig,
    pub events: &'a dyn SectionEvents,
    pub read_only: bool,
    pub status_message: Option<&'a str>,
}

/// Capability that displays and edits one section's opaque payload.
pub trait SectionRenderer: Send + Sync {
    fn render(&self, props: &SectionProps<'_>);
}

/// Resolved renderer for one section name.
#[derive(Clone)]
pub struct RendererBinding {
    pub kind: SectionKind,
    pub icon: &'static str,
    pub renderer: Arc<dyn SectionRenderer>,
}

impl Debug for RendererBinding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererBinding")
            .field("kind", &self.kind)
            .field("icon", &self.icon)
            .finish_non_exhaustive()
    }
}

/// Kind-keyed renderer table.
#[derive(Default)]
pub struct SectionRegistry {
    renderers: BTreeMap<SectionKind, Arc<dyn SectionRenderer>>,
}

impl SectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the renderer for one kind.
    pub fn register(
        &mut self,
        kind: SectionKind,
        renderer: Arc<dyn SectionRenderer>,
    ) -> Result<(), SectionRegistryError> {
        if self.renderers.contains_key(&kind) {
            return Err(SectionRegistryError::DuplicateKind(kind));
        }
        self.renderers.insert(kind, renderer);
        Ok(())
    }

    /// Binds `renderer` to every kind that has no renderer yet.
    pub fn register_fallback(&mut self, renderer: Arc<dyn SectionRenderer>) {
        for kind in SectionKind::ALL {
            self.renderers
                .entry(kind)
                .or_insert_with(|| Arc::clone(&renderer));
        }
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = SectionKind> + '_ {
        self.renderers.keys().copied()
    }

    /// Resolves a declared section name to its binding.
    pub fn resolve(&self, section_name: &str) -> Option<RendererBinding> {
        let Some(kind) = SectionKind::from_section_name(section_name) else {
            warn!(
                "event=section_resolve module=registry status=skipped reason=unknown_name section_name={}",
                crate::logging::redact_for_log(section_name)
            );
            return None;
        };
        let binding = self.resolve_kind(kind);
        if binding.is_none() {
            warn!(
                "event=section_resolve module=registry status=skipped reason=no_renderer kind={}",
                kind.as_str()
            );
        }
        binding
    }

    pub fn resolve_kind(&self, kind: SectionKind) -> Option<RendererBinding> {
        self.renderers.get(&kind).map(|renderer| RendererBinding {
            kind,
            icon: kind.icon(),
            renderer: Arc::clone(renderer),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{SectionProps, SectionRegistry, SectionRegistryError, SectionRenderer};
    use crate::registry::section_kind::{SectionKind, DEFAULT_SECTION_ICON};
    use std::sync::Arc;

    struct NoopRenderer;

    impl SectionRenderer for NoopRenderer {
        fn render(&self, _props: &SectionProps<'_>) {}
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = SectionRegistry::new();
        registry
            .register(SectionKind::Vitals, Arc::new(NoopRenderer))
            .expect("first registration");
        let err = registry
            .register(SectionKind::Vitals, Arc::new(NoopRenderer))
            .expect_err("duplicate must fail");
        assert_eq!(err, SectionRegistryError::DuplicateKind(SectionKind::Vitals));
        assert!(err.to_string().contains("vitals"));
    }

    #[test]
    fn resolve_returns_binding_with_icon() {
        let mut registry = SectionRegistry::new();
        registry
            .register(SectionKind::Vitals, Arc::new(NoopRenderer))
            .expect("register vitals");
        registry
            .register(SectionKind::Sensory, Arc::new(NoopRenderer))
            .expect("register sensory");

        let vitals = registry.resolve("Vitals").expect("vitals binding");
        assert_eq!(vitals.kind, SectionKind::Vitals);
        assert_eq!(vitals.icon, "fas fa-heartbeat");
        assert_eq!(
            registry.resolve("Sensory").expect("sensory binding").icon,
            DEFAULT_SECTION_ICON
        );
    }

    #[test]
    fn unknown_name_or_unbound_kind_resolves_to_none() {
        let mut registry = SectionRegistry::new();
        registry
            .register(SectionKind::Vitals, Arc::new(NoopRenderer))
            .expect("register vitals");
        assert!(registry.resolve("Aquatic Therapy").is_none());
        assert!(registry.resolve("Pain").is_none());
    }

    #[test]
    fn fallback_fills_only_missing_kinds() {
        let mut registry = SectionRegistry::new();
        registry
            .register(SectionKind::Pain, Arc::new(NoopRenderer))
            .expect("register pain");
        registry.register_fallback(Arc::new(NoopRenderer));
        assert_eq!(registry.len(), SectionKind::ALL.len());
        assert!(registry.resolve("Goals").is_some());
    }
}
