//! Working-copy owner for one open note.
//!
//! # Responsibility
//! - Apply edits synchronously and track dirtiness per edit revision.
//! - Persist through endpoint, callback or local-draft strategy.
//! - Run the debounced autosave timer and transient status messages.
//!
//! # Invariants
//! - Every edit bumps `revision`; a save clears `dirty` only when no edit
//!   happened since the save captured its snapshot.
//! - At most one armed autosave timer exists; each edit re-arms it.
//! - No autosave fires after `dispose`.
//! - Disposal while dirty writes the current data to the local draft store
//!   before returning.

use crate::client::record_service::{RecordServiceClient, TransportError};
use crate::model::completion::{completion_stats, section_is_complete, CompletionStats};
use crate::model::note_data::NoteData;
use crate::model::template::TemplateDefinition;
use crate::repo::draft_repo::{DraftRecord, DraftStore, RepoError, DEFAULT_DRAFT_KEY};
use crate::service::validation::{validate, ValidationReport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

pub const STATUS_SAVING: &str = "Saving...";
pub const STATUS_AUTOSAVED: &str = "Autosaved";
pub const STATUS_SAVE_FAILED: &str = "Save failed";
pub const SUCCESS_STATUS_TTL: Duration = Duration::from_secs(3);
pub const FAILURE_STATUS_TTL: Duration = Duration::from_secs(5);
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_millis(30_000);

/// Caller-supplied persistence callback.
#[async_trait]
pub trait SaveHandler: Send + Sync {
    async fn save(&self, data: &NoteData) -> anyhow::Result<Value>;
}

/// Autosave and save-strategy settings.
#[derive(Clone)]
pub struct AutosaveConfig {
    pub enabled: bool,
    /// Quiet period after the last edit.
    pub interval: Duration,
    /// HTTP endpoint (absolute or base-relative); highest priority strategy.
    pub endpoint: Option<String>,
    pub on_save: Option<Arc<dyn SaveHandler>>,
    /// Local draft key for the fallback strategy and disposal writes.
    pub draft_key: String,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: DEFAULT_AUTOSAVE_INTERVAL,
            endpoint: None,
            on_save: None,
            draft_key: DEFAULT_DRAFT_KEY.to_string(),
        }
    }
}

impl Debug for AutosaveConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutosaveConfig")
            .field("enabled", &self.enabled)
            .field("interval", &self.interval)
            .field("endpoint", &self.endpoint)
            .field("on_save", &self.on_save.is_some())
            .field("draft_key", &self.draft_key)
            .finish()
    }
}

/// One edit applied by [`SectionDataStore::update`].
pub enum NoteUpdate {
    /// Shallow merge of the given keys.
    Merge(NoteData),
    /// Pure function of the previous data. Must not call back into the store.
    Transform(Box<dyn FnOnce(NoteData) -> NoteData + Send>),
}

impl NoteUpdate {
    pub fn transform<F>(f: F) -> Self
    where
        F: FnOnce(NoteData) -> NoteData + Send + 'static,
    {
        Self::Transform(Box::new(f))
    }
}

impl From<NoteData> for NoteUpdate {
    fn from(value: NoteData) -> Self {
        Self::Merge(value)
    }
}

#[derive(Debug, Error)]
pub enum PersistenceFailure {
    #[error("autosave endpoint failed: {0}")]
    Endpoint(#[from] TransportError),
    #[error("save callback failed: {0}")]
    Callback(String),
    #[error("local draft write failed: {0}")]
    LocalDraft(#[from] RepoError),
    #[error("data store already disposed")]
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStrategy {
    Endpoint,
    Callback,
    LocalDraft,
}

impl SaveStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Endpoint => "endpoint",
            Self::Callback => "callback",
            Self::LocalDraft => "local_draft",
        }
    }
}

/// Result of one successful persistence call.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub strategy: SaveStrategy,
    pub result: Value,
    pub saved_at: DateTime<Utc>,
    /// False when an edit landed while the save was in flight.
    pub dirty_cleared: bool,
}

#[derive(Clone, Copy)]
enum SaveTrigger {
    Manual,
    Autosave,
}

impl SaveTrigger {
    fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Autosave => "autosave",
        }
    }
}

struct StoreState {
    data: NoteData,
    dirty: bool,
    revision: u64,
    in_flight: usize,
    last_saved: Option<DateTime<Utc>>,
    status: Option<String>,
    status_generation: u64,
    timer: Option<JoinHandle<()>>,
    timer_generation: u64,
    disposed: bool,
}

impl StoreState {
    fn cancel_timer(&mut self) {
        self.timer_generation += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct StoreInner {
    config: AutosaveConfig,
    client: RecordServiceClient,
    drafts: Arc<dyn DraftStore>,
    state: Mutex<StoreState>,
}

/// Owner of in-progress note data.
pub struct SectionDataStore {
    inner: Arc<StoreInner>,
}

impl SectionDataStore {
    pub fn new(
        initial: NoteData,
        config: AutosaveConfig,
        client: RecordServiceClient,
        drafts: Arc<dyn DraftStore>,
    ) -> Self {
        debug!(
            "event=data_store_open module=data_store status=ok autosave={} interval_ms={} keys={}",
            config.enabled,
            config.interval.as_millis(),
            initial.len()
        );
        Self {
            inner: Arc::new(StoreInner {
                config,
                client,
                drafts,
                state: Mutex::new(StoreState {
                    data: initial,
                    dirty: false,
                    revision: 0,
                    in_flight: 0,
                    last_saved: None,
                    status: None,
                    status_generation: 0,
                    timer: None,
                    timer_generation: 0,
                    disposed: false,
                }),
            }),
        }
    }

    /// Applies one edit, marks dirty and re-arms autosave.
    ///
    /// Ignored once the store is disposed.
    pub fn update(&self, update: impl Into<NoteUpdate>) {
        let mut state = self.inner.state.lock();
        if state.disposed {
            warn!("event=data_store_update module=data_store status=skipped reason=disposed");
            return;
        }
        match update.into() {
            NoteUpdate::Merge(partial) => state.data.merge(partial),
            NoteUpdate::Transform(transform) => {
                let previous = std::mem::take(&mut state.data);
                state.data = transform(previous);
            }
        }
        state.dirty = true;
        state.revision += 1;
        self.inner.arm_autosave(&mut state);
    }

    /// Replaces one section's payload wholesale.
    pub fn update_section(&self, section_name: &str, payload: Value) {
        let mut partial = NoteData::new();
        partial.insert(section_name, payload);
        self.update(partial);
    }

    /// Persists the current data.
    pub async fn save(&self) -> Result<SaveOutcome, PersistenceFailure> {
        self.inner.persist(None, SaveTrigger::Manual).await
    }

    /// Persists `data` instead of the current working copy.
    pub async fn save_with(&self, data: NoteData) -> Result<SaveOutcome, PersistenceFailure> {
        self.inner.persist(Some(data), SaveTrigger::Manual).await
    }

    /// Replaces data and clears dirty state, pending autosave and status.
    pub fn reset(&self, data: NoteData) {
        let mut state = self.inner.state.lock();
        state.data = data;
        state.dirty = false;
        state.revision += 1;
        state.cancel_timer();
        state.status = None;
        state.status_generation += 1;
    }

    pub fn validate(&self, template: &TemplateDefinition) -> ValidationReport {
        validate(&self.inner.state.lock().data, template)
    }

    pub fn completion_stats(&self, template: Option<&TemplateDefinition>) -> CompletionStats {
        completion_stats(&self.inner.state.lock().data, template)
    }

    pub fn section_completed(&self, section_name: &str) -> bool {
        self.inner
            .state
            .lock()
            .data
            .get(section_name)
            .is_some_and(section_is_complete)
    }

    pub fn data(&self) -> NoteData {
        self.inner.state.lock().data.clone()
    }

    pub fn section(&self, section_name: &str) -> Option<Value> {
        self.inner.state.lock().data.get(section_name).cloned()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.state.lock().dirty
    }

    pub fn is_saving(&self) -> bool {
        self.inner.state.lock().in_flight > 0
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().last_saved
    }

    pub fn status_message(&self) -> Option<String> {
        self.inner.state.lock().status.clone()
    }

    pub fn autosave_pending(&self) -> bool {
        self.inner.state.lock().timer.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    pub fn draft_key(&self) -> &str {
        &self.inner.config.draft_key
    }

    pub fn config(&self) -> &AutosaveConfig {
        &self.inner.config
    }

    /// Stops autosave and, when dirty, writes the data to the local draft.
    ///
    /// Idempotent; later calls return `Ok(None)`.
    pub fn dispose(&self) -> Result<Option<DraftRecord>, PersistenceFailure> {
        let pending = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return Ok(None);
            }
            state.disposed = true;
            state.cancel_timer();
            state.status_generation += 1;
            state.dirty.then(|| state.data.clone())
        };

        let Some(data) = pending else {
            debug!("event=data_store_dispose module=data_store status=ok dirty=false");
            return Ok(None);
        };
        match self.inner.drafts.put_draft(&self.inner.config.draft_key, &data) {
            Ok(record) => {
                info!(
                    "event=data_store_dispose module=data_store status=ok dirty=true draft_uuid={}",
                    record.draft_uuid
                );
                Ok(Some(record))
            }
            Err(err) => {
                warn!(
                    "event=data_store_dispose module=data_store status=error dirty=true error={}",
                    err
                );
                Err(err.into())
            }
        }
    }
}

impl Drop for SectionDataStore {
    fn drop(&mut self) {
        // Errors are already logged by dispose.
        let _ = self.dispose();
    }
}

impl StoreInner {
    fn arm_autosave(self: &Arc<Self>, state: &mut StoreState) {
        state.cancel_timer();
        if !self.config.enabled || !state.dirty {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            debug!("event=autosave_arm module=data_store status=skipped reason=no_runtime");
            return;
        };

        let generation = state.timer_generation;
        let interval = self.config.interval;
        let weak: Weak<StoreInner> = Arc::downgrade(self);
        state.timer = Some(handle.spawn(async move {
            tokio::time::sleep(interval).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            {
                let mut state = inner.state.lock();
                if state.disposed || state.timer_generation != generation {
                    return;
                }
                // Detach: a later edit must not abort a save already running.
                state.timer = None;
                if !state.dirty {
                    return;
                }
            }
            // Failures are logged and reported through the status message.
            let _ = inner.persist(None, SaveTrigger::Autosave).await;
        }));
    }

    async fn persist(
        self: &Arc<Self>,
        explicit: Option<NoteData>,
        trigger: SaveTrigger,
    ) -> Result<SaveOutcome, PersistenceFailure> {
        let started_at = Instant::now();
        let (snapshot, revision) = {
            let mut state = self.state.lock();
            if state.disposed {
                return Err(PersistenceFailure::Disposed);
            }
            state.in_flight += 1;
            self.set_status(&mut state, STATUS_SAVING, None);
            let snapshot = explicit.unwrap_or_else(|| state.data.clone());
            (snapshot, state.revision)
        };

        let result = self.write(&snapshot).await;

        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        match result {
            Ok((strategy, value)) => {
                let saved_at = Utc::now();
                state.last_saved = Some(saved_at);
                let dirty_cleared = state.revision == revision;
                if dirty_cleared {
                    state.dirty = false;
                    state.cancel_timer();
                }
                self.set_status(&mut state, STATUS_AUTOSAVED, Some(SUCCESS_STATUS_TTL));
                info!(
                    "event=note_save module=data_store status=ok trigger={} strategy={} dirty_cleared={} duration_ms={}",
                    trigger.as_str(),
                    strategy.as_str(),
                    dirty_cleared,
                    started_at.elapsed().as_millis()
                );
                Ok(SaveOutcome {
                    strategy,
                    result: value,
                    saved_at,
                    dirty_cleared,
                })
            }
            Err(err) => {
                self.set_status(&mut state, STATUS_SAVE_FAILED, Some(FAILURE_STATUS_TTL));
                warn!(
                    "event=note_save module=data_store status=error trigger={} duration_ms={} error={}",
                    trigger.as_str(),
                    started_at.elapsed().as_millis(),
                    crate::logging::redact_for_log(&err.to_string())
                );
                Err(err)
            }
        }
    }

    async fn write(&self, data: &NoteData) -> Result<(SaveStrategy, Value), PersistenceFailure> {
        if let Some(endpoint) = self.config.endpoint.as_deref() {
            let body = Value::Object(data.as_map().clone());
            let response = self.client.post_json(endpoint, &body).await?;
            return Ok((SaveStrategy::Endpoint, response));
        }
        if let Some(handler) = self.config.on_save.as_ref() {
            let response = handler
                .save(data)
                .await
                .map_err(|err| PersistenceFailure::Callback(format!("{err:#}")))?;
            return Ok((SaveStrategy::Callback, response));
        }
        let record = self.drafts.put_draft(&self.config.draft_key, data)?;
        Ok((
            SaveStrategy::LocalDraft,
            json!({"success": true, "timestamp": record.saved_at.to_rfc3339()}),
        ))
    }

    /// Sets the status message; `ttl` schedules its expiry.
    fn set_status(self: &Arc<Self>, state: &mut StoreState, message: &str, ttl: Option<Duration>) {
        state.status_generation += 1;
        state.status = Some(message.to_string());
        let Some(ttl) = ttl else {
            return;
        };
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        let generation = state.status_generation;
        let weak = Arc::downgrade(self);
        handle.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(inner) = weak.upgrade() {
                let mut state = inner.state.lock();
                if state.status_generation == generation {
                    state.status = None;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{AutosaveConfig, NoteUpdate, SaveStrategy, SectionDataStore};
    use crate::client::record_service::RecordServiceClient;
    use crate::model::note_data::NoteData;
    use crate::repo::draft_repo::{DraftStore, SqliteDraftStore, DEFAULT_DRAFT_KEY};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn store_with(config: AutosaveConfig) -> (SectionDataStore, Arc<SqliteDraftStore>) {
        let drafts = Arc::new(SqliteDraftStore::open_in_memory().expect("draft store"));
        let client = RecordServiceClient::new("http://localhost:8000", Duration::from_secs(5))
            .expect("client");
        let store = SectionDataStore::new(
            NoteData::from_value(json!({"visit_id": "v1"})),
            config,
            client,
            drafts.clone(),
        );
        (store, drafts)
    }

    #[test]
    fn updates_merge_and_mark_dirty_without_runtime() {
        let (store, _) = store_with(AutosaveConfig {
            enabled: true,
            ..AutosaveConfig::default()
        });
        assert!(!store.is_dirty());

        store.update_section("Vitals", json!({"heartRate": "72"}));
        store.update(NoteUpdate::transform(|mut data| {
            data.insert("Pain", json!({"level": 2}));
            data
        }));

        assert!(store.is_dirty());
        assert!(!store.autosave_pending());
        let data = store.data();
        assert_eq!(data.get("visit_id"), Some(&json!("v1")));
        assert_eq!(data.get("Vitals"), Some(&json!({"heartRate": "72"})));
        assert_eq!(data.get("Pain"), Some(&json!({"level": 2})));
    }

    #[tokio::test]
    async fn local_fallback_save_clears_dirty_and_reports_success() {
        let (store, drafts) = store_with(AutosaveConfig::default());
        store.update_section("Vitals", json!({"heartRate": "72"}));

        let outcome = store.save().await.expect("save should succeed");
        assert_eq!(outcome.strategy, SaveStrategy::LocalDraft);
        assert_eq!(outcome.result["success"], json!(true));
        assert!(outcome.result["timestamp"].is_string());
        assert!(outcome.dirty_cleared);
        assert!(!store.is_dirty());
        assert!(store.last_saved().is_some());
        assert_eq!(store.status_message().as_deref(), Some("Autosaved"));

        let draft = drafts
            .get_draft(DEFAULT_DRAFT_KEY)
            .expect("read draft")
            .expect("draft written");
        assert_eq!(draft.data.get("Vitals"), Some(&json!({"heartRate": "72"})));
    }

    #[test]
    fn reset_replaces_data_and_clears_dirty() {
        let (store, _) = store_with(AutosaveConfig::default());
        store.update_section("Vitals", json!({"heartRate": "72"}));
        store.reset(NoteData::from_value(json!({"Pain": {"level": 1}})));
        assert!(!store.is_dirty());
        assert!(store.section("Vitals").is_none());
        assert!(store.section_completed("Pain"));
    }

    #[test]
    fn dispose_while_dirty_writes_local_draft_once() {
        let (store, drafts) = store_with(AutosaveConfig {
            draft_key: "visit:v1:PT:Evaluation".to_string(),
            ..AutosaveConfig::default()
        });
        store.update_section("Balance", json!({"sitting": "Good"}));

        let record = store.dispose().expect("dispose").expect("draft written");
        assert_eq!(record.key, "visit:v1:PT:Evaluation");
        assert!(store.dispose().expect("second dispose").is_none());
        assert!(store.is_disposed());

        store.update_section("Balance", json!({"sitting": "Poor"}));
        assert_eq!(store.section("Balance"), Some(json!({"sitting": "Good"})));
        assert!(drafts
            .get_draft("visit:v1:PT:Evaluation")
            .expect("read")
            .is_some());
    }

    #[test]
    fn dispose_while_clean_writes_nothing() {
        let (store, drafts) = store_with(AutosaveConfig::default());
        assert!(store.dispose().expect("dispose").is_none());
        assert!(drafts.get_draft(DEFAULT_DRAFT_KEY).expect("read").is_none());
    }
}
