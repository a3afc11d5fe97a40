//! Terminal create-or-update of a visit note.
//!
//! # Responsibility
//! - Gate submission on validation errors (warnings never block).
//! - Filter note data down to template sections before dispatch.
//! - Branch between create (`POST`) and update (`PUT`) on `existing_id`.
//! - Report success to an optional completion hook.
//!
//! # Invariants
//! - Request payloads only carry keys that are template section names.
//! - Submission is never retried automatically.
//! - A failing completion hook never fails an already-persisted note.

use crate::client::record_service::{TransportError, VisitNoteApi};
use crate::logging::redact_for_log;
use crate::model::completion::{completion_stats, CompletionStats};
use crate::model::note_data::NoteData;
use crate::model::template::TemplateDefinition;
use crate::model::visit_note::{
    CreateVisitNoteRequest, NoteRequest, PersistedNote, UpdateVisitNoteRequest,
};
use crate::service::validation::{validate, ValidationReport};
use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("note data failed validation in {} section(s)", .0.errors.len())]
    Validation(ValidationReport),
    #[error("note data has no visit identifier (visit_id or id)")]
    MissingVisitId,
    #[error("Failed to create note: {0}")]
    Create(#[source] TransportError),
    #[error("Failed to update note: {0}")]
    Update(#[source] TransportError),
    #[error("editor not ready: {0}")]
    NotReady(&'static str),
}

/// What the completion hook learns about a successful submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionSummary {
    pub template: Arc<TemplateDefinition>,
    pub validation: ValidationReport,
    pub completion: CompletionStats,
    /// Submitted notes are always marked completed.
    pub is_completed: bool,
}

/// Caller hook invoked after the service accepted a note.
#[async_trait]
pub trait CompletionHook: Send + Sync {
    async fn on_submitted(
        &self,
        note: &PersistedNote,
        summary: &SubmissionSummary,
    ) -> anyhow::Result<()>;
}

pub struct PersistenceGateway {
    api: Arc<dyn VisitNoteApi>,
    completion_hook: Option<Arc<dyn CompletionHook>>,
}

impl PersistenceGateway {
    pub fn new(api: Arc<dyn VisitNoteApi>) -> Self {
        Self {
            api,
            completion_hook: None,
        }
    }

    pub fn with_completion_hook(mut self, hook: Arc<dyn CompletionHook>) -> Self {
        self.completion_hook = Some(hook);
        self
    }

    /// Builds the request a submit would send, without sending it.
    ///
    /// A blank `existing_id` counts as absent.
    pub fn build_request(
        data: &NoteData,
        template: &TemplateDefinition,
        existing_id: Option<&str>,
    ) -> Result<NoteRequest, SubmitError> {
        let sections_data = data.sections_for(template);
        if let Some(note_id) = existing_id.map(str::trim).filter(|id| !id.is_empty()) {
            return Ok(NoteRequest::Update {
                note_id: note_id.to_string(),
                body: UpdateVisitNoteRequest { sections_data },
            });
        }
        let visit_id = data.visit_id().ok_or(SubmitError::MissingVisitId)?.clone();
        Ok(NoteRequest::Create(CreateVisitNoteRequest {
            visit_id,
            sections_data,
        }))
    }

    /// Validates, dispatches and reports one submission.
    pub async fn submit(
        &self,
        data: &NoteData,
        template: &Arc<TemplateDefinition>,
        existing_id: Option<&str>,
    ) -> Result<PersistedNote, SubmitError> {
        let started_at = Instant::now();
        let validation = validate(data, template);
        if !validation.is_valid {
            warn!(
                "event=note_submit module=gateway status=error error_code=validation invalid_sections={}",
                validation.errors.len()
            );
            return Err(SubmitError::Validation(validation));
        }

        let request = Self::build_request(data, template, existing_id)?;
        let (path, result) = match &request {
            NoteRequest::Create(body) => (
                "create",
                self.api.create_note(body).await.map_err(SubmitError::Create),
            ),
            NoteRequest::Update { note_id, body } => (
                "update",
                self.api
                    .update_note(note_id, body)
                    .await
                    .map_err(SubmitError::Update),
            ),
        };
        let note = match result {
            Ok(note) => note,
            Err(err) => {
                warn!(
                    "event=note_submit module=gateway status=error path={} duration_ms={} error={}",
                    path,
                    started_at.elapsed().as_millis(),
                    redact_for_log(&err.to_string())
                );
                return Err(err);
            }
        };
        info!(
            "event=note_submit module=gateway status=ok path={} sections={} duration_ms={}",
            path,
            request.sections_data().len(),
            started_at.elapsed().as_millis()
        );

        if let Some(hook) = self.completion_hook.as_ref() {
            let summary = SubmissionSummary {
                template: Arc::clone(template),
                completion: completion_stats(data, Some(template.as_ref())),
                validation,
                is_completed: true,
            };
            if let Err(err) = hook.on_submitted(&note, &summary).await {
                warn!(
                    "event=completion_hook module=gateway status=error error={}",
                    redact_for_log(&format!("{err:#}"))
                );
            }
        }
        Ok(note)
    }

    /// Stored note for a visit, if any.
    pub async fn load_for_visit(
        &self,
        visit_id: &str,
    ) -> Result<Option<PersistedNote>, TransportError> {
        let note = self.api.get_note_for_visit(visit_id).await?;
        info!(
            "event=note_load module=gateway status=ok found={}",
            note.is_some()
        );
        Ok(note)
    }
}
