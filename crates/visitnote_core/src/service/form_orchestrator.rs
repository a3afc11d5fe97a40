//! Navigable editing surface over one note.
//!
//! # Responsibility
//! - Drive template resolution and expose `ResolvingTemplate`,
//!   `TemplateFailed`, `Ready` and `Closed` phases.
//! - Intersect template sections with registry bindings into navigation.
//! - Own the active-section pointer and hand renderers their data slice.
//! - Run submit and close against the data store and persistence gateway.
//!
//! # Invariants
//! - Sections without a renderer binding never appear in navigation.
//! - A failed submit leaves the editor `Ready` with data untouched.
//! - Read-only mode turns every renderer callback into a no-op.
//! - Once `Closed`, no autosave can fire and no edit is accepted.

use crate::client::record_service::{RecordServiceClient, TemplateSource, VisitNoteApi};
use crate::model::completion::{section_is_complete, CompletionStats};
use crate::model::note_data::{id_to_text, NoteData};
use crate::model::template::{TemplateDefinition, TemplateKey};
use crate::model::visit_note::PersistedNote;
use crate::registry::section_kind::SectionKind;
use crate::registry::section_registry::{
    RendererBinding, SectionConfig, SectionEvents, SectionProps, SectionRegistry,
};
use crate::repo::draft_repo::{DraftStore, RepoError, DEFAULT_DRAFT_KEY};
use crate::service::persistence_gateway::{CompletionHook, PersistenceGateway, SubmitError};
use crate::service::section_data_store::{
    AutosaveConfig, PersistenceFailure, SaveOutcome, SectionDataStore,
};
use crate::service::template_resolver::{ResolutionState, TemplateConfigResolver};
use log::{debug, info, warn};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Shown when a template resolves but none of its sections has a renderer.
pub const NO_RENDERABLE_SECTIONS: &str = "No renderable sections for this template";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CloseError {
    #[error("editor has unsaved changes")]
    UnsavedChanges,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorPhase {
    ResolvingTemplate,
    TemplateFailed(String),
    Ready,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Edit,
    /// Print/preview rendering; callbacks are disabled.
    ReadOnly,
}

/// One entry of the section navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    pub name: String,
    pub kind: SectionKind,
    pub icon: &'static str,
    pub required: bool,
    pub completed: bool,
    pub active: bool,
}

/// Host actions triggered from inside a section.
pub trait SectionActionHandler: Send + Sync {
    fn open_test(&self, section_name: &str, test_name: &str);
    fn open_diagnosis(&self, section_name: &str);
}

/// What the editor is opened on.
#[derive(Debug, Clone)]
pub struct EditorContext {
    pub key: TemplateKey,
    pub initial_data: NoteData,
    pub existing_note_id: Option<String>,
    pub mode: RenderMode,
    pub autosave: AutosaveConfig,
}

impl EditorContext {
    pub fn new(key: TemplateKey, initial_data: NoteData) -> Self {
        Self {
            key,
            initial_data,
            existing_note_id: None,
            mode: RenderMode::Edit,
            autosave: AutosaveConfig::default(),
        }
    }

    /// Context for editing a note already stored by the service.
    pub fn from_persisted(key: TemplateKey, note: &PersistedNote) -> Self {
        Self {
            existing_note_id: note.note_id(),
            ..Self::new(key, NoteData::from(note.to_initial_data()))
        }
    }

    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_autosave(mut self, autosave: AutosaveConfig) -> Self {
        self.autosave = autosave;
        self
    }

    /// `visit:<visit_id>:<discipline>:<note_type>`, or the shared default
    /// key when the data carries no visit identifier.
    pub fn draft_key(&self) -> String {
        match self.initial_data.visit_id().and_then(id_to_text) {
            Some(visit_id) => format!(
                "visit:{}:{}:{}",
                visit_id, self.key.discipline, self.key.note_type
            ),
            None => DEFAULT_DRAFT_KEY.to_string(),
        }
    }
}

/// Collaborators shared by editors.
#[derive(Clone)]
pub struct EditorServices {
    pub templates: Arc<dyn TemplateSource>,
    pub notes: Arc<dyn VisitNoteApi>,
    /// Used by the endpoint autosave strategy.
    pub http: RecordServiceClient,
    pub drafts: Arc<dyn DraftStore>,
    pub registry: Arc<SectionRegistry>,
    pub completion_hook: Option<Arc<dyn CompletionHook>>,
    pub actions: Option<Arc<dyn SectionActionHandler>>,
}

impl EditorServices {
    /// Services backed by one record-service client.
    pub fn from_client(
        client: RecordServiceClient,
        drafts: Arc<dyn DraftStore>,
        registry: Arc<SectionRegistry>,
    ) -> Self {
        let shared = Arc::new(client.clone());
        Self {
            templates: shared.clone(),
            notes: shared,
            http: client,
            drafts,
            registry,
            completion_hook: None,
            actions: None,
        }
    }
}

struct NavEntry {
    binding: RendererBinding,
    config: SectionConfig,
}

impl NavEntry {
    fn name(&self) -> &str {
        &self.config.descriptor.section_name
    }
}

struct EditEvents<'a> {
    store: &'a SectionDataStore,
    section_name: &'a str,
    actions: Option<&'a dyn SectionActionHandler>,
}

impl SectionEvents for EditEvents<'_> {
    fn on_change(&self, payload: Value) {
        self.store.update_section(self.section_name, payload);
    }

    fn on_open_test(&self, test_name: &str) {
        match self.actions {
            Some(actions) => actions.open_test(self.section_name, test_name),
            None => debug!("event=section_action module=orchestrator status=skipped action=open_test"),
        }
    }

    fn on_open_diagnosis(&self) {
        match self.actions {
            Some(actions) => actions.open_diagnosis(self.section_name),
            None => debug!(
                "event=section_action module=orchestrator status=skipped action=open_diagnosis"
            ),
        }
    }
}

struct ReadOnlyEvents;

impl SectionEvents for ReadOnlyEvents {
    fn on_change(&self, _payload: Value) {}

    fn on_open_test(&self, _test_name: &str) {}

    fn on_open_diagnosis(&self) {}
}

/// Composition of resolver, registry, data store and gateway.
pub struct FormOrchestrator {
    key: TemplateKey,
    existing_note_id: Option<String>,
    mode: RenderMode,
    phase: EditorPhase,
    registry: Arc<SectionRegistry>,
    drafts: Arc<dyn DraftStore>,
    actions: Option<Arc<dyn SectionActionHandler>>,
    resolver: TemplateConfigResolver,
    gateway: PersistenceGateway,
    store: SectionDataStore,
    nav: Vec<NavEntry>,
    active: Option<String>,
}

impl FormOrchestrator {
    /// Builds an editor in `ResolvingTemplate`; call [`Self::open`] next.
    pub fn new(context: EditorContext, services: EditorServices) -> Self {
        let draft_key = context.draft_key();
        let EditorContext {
            key,
            initial_data,
            existing_note_id,
            mode,
            autosave,
        } = context;
        let autosave = AutosaveConfig {
            enabled: autosave.enabled && mode == RenderMode::Edit,
            draft_key,
            ..autosave
        };

        let mut gateway = PersistenceGateway::new(services.notes);
        if let Some(hook) = services.completion_hook {
            gateway = gateway.with_completion_hook(hook);
        }

        Self {
            key,
            existing_note_id,
            mode,
            phase: EditorPhase::ResolvingTemplate,
            registry: services.registry,
            drafts: Arc::clone(&services.drafts),
            actions: services.actions,
            resolver: TemplateConfigResolver::new(services.templates),
            gateway,
            store: SectionDataStore::new(initial_data, autosave, services.http, services.drafts),
            nav: Vec::new(),
            active: None,
        }
    }

    /// Resolves the template and builds navigation.
    pub async fn open(&mut self) -> EditorPhase {
        if self.phase == EditorPhase::Closed {
            return self.phase.clone();
        }
        self.phase = EditorPhase::ResolvingTemplate;
        let state = self.resolver.configure(self.key.clone(), true).await;
        self.apply_resolution(state)
    }

    /// Manual retry after `TemplateFailed`.
    pub async fn retry(&mut self) -> EditorPhase {
        if self.phase == EditorPhase::Closed {
            return self.phase.clone();
        }
        self.phase = EditorPhase::ResolvingTemplate;
        let state = self.resolver.refresh().await;
        self.apply_resolution(state)
    }

    /// Switches discipline/note type; note data is kept.
    pub async fn change_template(&mut self, key: TemplateKey) -> EditorPhase {
        if self.phase == EditorPhase::Closed {
            return self.phase.clone();
        }
        self.key = key;
        self.open().await
    }

    fn apply_resolution(&mut self, state: ResolutionState) -> EditorPhase {
        self.nav.clear();
        self.active = None;
        self.phase = match state {
            ResolutionState::Resolved(template) => self.build_navigation(&template),
            ResolutionState::Failed(reason) => EditorPhase::TemplateFailed(reason),
            ResolutionState::Idle | ResolutionState::Loading => EditorPhase::ResolvingTemplate,
        };
        self.phase.clone()
    }

    fn build_navigation(&mut self, template: &TemplateDefinition) -> EditorPhase {
        for descriptor in &template.sections {
            let Some(binding) = self.registry.resolve(&descriptor.section_name) else {
                continue;
            };
            let config = SectionConfig {
                kind: binding.kind,
                icon: binding.icon,
                descriptor: descriptor.clone(),
            };
            self.nav.push(NavEntry { binding, config });
        }

        let Some(first) = self.nav.first() else {
            warn!(
                "event=editor_open module=orchestrator status=error key={} error_code=no_renderable_sections",
                self.key
            );
            return EditorPhase::TemplateFailed(NO_RENDERABLE_SECTIONS.to_string());
        };
        self.active = Some(first.name().to_string());
        info!(
            "event=editor_open module=orchestrator status=ok key={} sections={} dropped={}",
            self.key,
            self.nav.len(),
            template.sections.len() - self.nav.len()
        );
        EditorPhase::Ready
    }

    pub fn phase(&self) -> &EditorPhase {
        &self.phase
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn key(&self) -> &TemplateKey {
        &self.key
    }

    pub fn existing_note_id(&self) -> Option<&str> {
        self.existing_note_id.as_deref()
    }

    pub fn template(&self) -> Option<Arc<TemplateDefinition>> {
        self.resolver.template()
    }

    pub fn store(&self) -> &SectionDataStore {
        &self.store
    }

    pub fn active_section(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn navigation(&self) -> Vec<NavItem> {
        let data = self.store.data();
        self.nav
            .iter()
            .map(|entry| NavItem {
                name: entry.name().to_string(),
                kind: entry.binding.kind,
                icon: entry.binding.icon,
                required: entry.config.is_required(),
                completed: data.get(entry.name()).is_some_and(section_is_complete),
                active: self.active.as_deref() == Some(entry.name()),
            })
            .collect()
    }

    /// Aggregate completion over all template sections.
    pub fn progress(&self) -> CompletionStats {
        let template = self.resolver.template();
        self.store.completion_stats(template.as_deref())
    }

    /// Moves the active pointer; `false` for names not in navigation.
    pub fn select_section(&mut self, section_name: &str) -> bool {
        if !self.nav.iter().any(|entry| entry.name() == section_name) {
            return false;
        }
        self.active = Some(section_name.to_string());
        true
    }

    /// Renders the active section; `false` when nothing is renderable.
    pub fn render_active(&self) -> bool {
        match self.active.as_deref() {
            Some(name) => self.render_section(name),
            None => false,
        }
    }

    /// Renders every navigable section in order (print/preview).
    pub fn render_all(&self) -> usize {
        self.nav
            .iter()
            .filter(|entry| self.render_entry(entry))
            .count()
    }

    pub fn render_section(&self, section_name: &str) -> bool {
        self.nav
            .iter()
            .find(|entry| entry.name() == section_name)
            .is_some_and(|entry| self.render_entry(entry))
    }

    fn render_entry(&self, entry: &NavEntry) -> bool {
        if self.phase != EditorPhase::Ready {
            return false;
        }
        let data = self.store.section(entry.name()).unwrap_or(Value::Null);
        let status = self.store.status_message();
        let edit_events;
        let events: &dyn SectionEvents = match self.mode {
            RenderMode::Edit => {
                edit_events = EditEvents {
                    store: &self.store,
                    section_name: entry.name(),
                    actions: self.actions.as_deref(),
                };
                &edit_events
            }
            RenderMode::ReadOnly => &ReadOnlyEvents,
        };
        entry.binding.renderer.render(&SectionProps {
            section_name: entry.name(),
            data: &data,
            config: &entry.config,
            events,
            read_only: self.mode == RenderMode::ReadOnly,
            status_message: status.as_deref(),
        });
        true
    }

    /// Host-side edit of one section; ignored when read-only or closed.
    pub fn update_section(&self, section_name: &str, payload: Value) -> bool {
        if self.mode == RenderMode::ReadOnly || self.phase == EditorPhase::Closed {
            return false;
        }
        self.store.update_section(section_name, payload);
        true
    }

    /// Explicit save through the configured strategy.
    pub async fn save(&self) -> Result<SaveOutcome, PersistenceFailure> {
        self.store.save().await
    }

    /// Submits the note; on success deletes the local draft and closes.
    pub async fn submit(&mut self) -> Result<PersistedNote, SubmitError> {
        match self.phase {
            EditorPhase::Ready => {}
            EditorPhase::Closed => return Err(SubmitError::NotReady("editor is closed")),
            _ => return Err(SubmitError::NotReady("template is not resolved")),
        }
        if self.mode == RenderMode::ReadOnly {
            return Err(SubmitError::NotReady("editor is read-only"));
        }
        let template = self
            .resolver
            .template()
            .ok_or(SubmitError::NotReady("template is not resolved"))?;

        let data = self.store.data();
        let note = self
            .gateway
            .submit(&data, &template, self.existing_note_id.as_deref())
            .await?;

        if let Err(err) = self.drafts.delete_draft(self.store.draft_key()) {
            warn!(
                "event=draft_delete module=orchestrator status=error error={}",
                err
            );
        }
        if self.existing_note_id.is_none() {
            self.existing_note_id = note.note_id();
        }
        // Persisted remotely; nothing left for dispose to write locally.
        self.store.reset(data);
        self.shutdown();
        Ok(note)
    }

    /// Closes the editor.
    ///
    /// A dirty editor only closes with `discard_unsaved`; its data then goes
    /// to the local draft store on disposal.
    pub fn close(&mut self, discard_unsaved: bool) -> Result<(), CloseError> {
        if self.phase == EditorPhase::Closed {
            return Ok(());
        }
        if self.store.is_dirty() && !discard_unsaved {
            return Err(CloseError::UnsavedChanges);
        }
        self.shutdown();
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Err(err) = self.store.dispose() {
            warn!(
                "event=editor_close module=orchestrator status=error error={}",
                err
            );
        }
        self.resolver.reset();
        self.nav.clear();
        self.active = None;
        self.phase = EditorPhase::Closed;
        info!("event=editor_close module=orchestrator status=ok key={}", self.key);
    }

    /// Merges the local draft for this editor into the store.
    pub fn restore_local_draft(&self) -> Result<bool, RepoError> {
        if self.phase == EditorPhase::Closed {
            return Ok(false);
        }
        let Some(record) = self.drafts.get_draft(self.store.draft_key())? else {
            return Ok(false);
        };
        info!(
            "event=draft_restore module=orchestrator status=ok draft_uuid={} keys={}",
            record.draft_uuid,
            record.data.len()
        );
        self.store.update(record.data);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::{EditorContext, RenderMode};
    use crate::model::note_data::NoteData;
    use crate::model::template::TemplateKey;
    use crate::model::visit_note::PersistedNote;
    use crate::repo::draft_repo::DEFAULT_DRAFT_KEY;
    use serde_json::json;

    #[test]
    fn draft_key_uses_visit_and_template() {
        let context = EditorContext::new(
            TemplateKey::new("PT", "Initial Evaluation"),
            NoteData::from_value(json!({"visit_id": 42})),
        );
        assert_eq!(context.draft_key(), "visit:42:PT:Initial Evaluation");

        let anonymous = EditorContext::new(TemplateKey::new("PT", "Eval"), NoteData::new());
        assert_eq!(anonymous.draft_key(), DEFAULT_DRAFT_KEY);
    }

    #[test]
    fn persisted_note_seeds_context() {
        let note: PersistedNote = serde_json::from_value(json!({
            "id": 7,
            "visit_id": "v1",
            "sections_data": {"Vitals": {"heartRate": "80"}}
        }))
        .expect("note");
        let context = EditorContext::from_persisted(TemplateKey::new("PT", "Eval"), &note)
            .with_mode(RenderMode::ReadOnly);
        assert_eq!(context.existing_note_id.as_deref(), Some("7"));
        assert_eq!(
            context.initial_data.get("Vitals"),
            Some(&json!({"heartRate": "80"}))
        );
        assert_eq!(context.initial_data.get("visit_id"), Some(&json!("v1")));
        assert_eq!(context.mode, RenderMode::ReadOnly);
    }
}
