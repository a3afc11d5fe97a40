//! Core engine for schema-driven clinical visit notes.
//!
//! Resolves a server-declared note template into an ordered set of section
//! editors, owns the in-progress note data (dirty tracking, debounced
//! autosave, completion scoring) and governs the submit lifecycle against the
//! record-keeping service.

pub mod client;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod registry;
pub mod repo;
pub mod service;

pub use client::record_service::{
    RecordServiceClient, TemplateSource, TransportError, TransportResult, VisitNoteApi,
};
pub use config::{ConfigError, EngineConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::completion::{completion_stats, section_is_complete, CompletionStats};
pub use model::note_data::NoteData;
pub use model::template::{SectionDescriptor, TemplateDefinition, TemplateKey};
pub use model::visit_note::{
    CreateVisitNoteRequest, NoteRequest, PersistedNote, UpdateVisitNoteRequest,
};
pub use registry::section_kind::{SectionKind, DEFAULT_SECTION_ICON};
pub use registry::section_registry::{
    RendererBinding, SectionConfig, SectionEvents, SectionProps, SectionRegistry,
    SectionRegistryError, SectionRenderer,
};
pub use repo::draft_repo::{
    DraftRecord, DraftStore, RepoError, RepoResult, SqliteDraftStore, DEFAULT_DRAFT_KEY,
};
pub use service::form_orchestrator::{
    CloseError, EditorContext, EditorPhase, EditorServices, FormOrchestrator, NavItem,
    RenderMode, SectionActionHandler,
};
pub use service::persistence_gateway::{
    CompletionHook, PersistenceGateway, SubmissionSummary, SubmitError,
};
pub use service::section_data_store::{
    AutosaveConfig, NoteUpdate, PersistenceFailure, SaveHandler, SaveOutcome, SaveStrategy,
    SectionDataStore,
};
pub use service::template_resolver::{
    parse_template, ResolutionState, TemplateConfigResolver, TemplateStructureError,
    INVALID_TEMPLATE_STRUCTURE,
};
pub use service::validation::{validate, ValidationReport};
