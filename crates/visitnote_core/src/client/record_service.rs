//! HTTP client for the record-keeping service.
//!
//! # Responsibility
//! - Fetch raw template documents (`GET /templates/{discipline}/{note_type}`).
//! - Create, update and load visit notes (`/visit-notes/...`).
//! - Convert every non-2xx response into [`TransportError::Status`] carrying
//!   the HTTP status and the server body verbatim.
//!
//! # Invariants
//! - Path segments are percent-encoded; note types may contain spaces.
//! - Response bodies are never logged unredacted.

use crate::config::EngineConfig;
use crate::logging::redact_for_log;
use crate::model::template::TemplateKey;
use crate::model::visit_note::{CreateVisitNoteRequest, PersistedNote, UpdateVisitNoteRequest};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid service url `{0}`")]
    InvalidUrl(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{status} - {body}")]
    Status { status: u16, body: String },
    #[error("undecodable response body: {0}")]
    Decode(String),
}

impl TransportError {
    /// HTTP status for non-2xx failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Source of raw template documents.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn fetch_template(&self, key: &TemplateKey) -> TransportResult<Value>;
}

/// Visit-note endpoints used by the persistence gateway.
#[async_trait]
pub trait VisitNoteApi: Send + Sync {
    async fn create_note(&self, body: &CreateVisitNoteRequest) -> TransportResult<PersistedNote>;

    async fn update_note(
        &self,
        note_id: &str,
        body: &UpdateVisitNoteRequest,
    ) -> TransportResult<PersistedNote>;

    /// Stored note for a visit; `None` when the service answers 404.
    async fn get_note_for_visit(&self, visit_id: &str) -> TransportResult<Option<PersistedNote>>;
}

/// `reqwest`-backed client bound to one service base URL.
#[derive(Debug, Clone)]
pub struct RecordServiceClient {
    http: reqwest::Client,
    base_url: Url,
}

impl RecordServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> TransportResult<Self> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|_| TransportError::InvalidUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidUrl(base_url.to_string()));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &EngineConfig) -> TransportResult<Self> {
        Self::new(&config.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL extended by percent-encoded path segments.
    pub fn endpoint(&self, segments: &[&str]) -> TransportResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// POSTs a JSON body to an absolute URL or a path relative to the base.
    pub async fn post_json(&self, target: &str, body: &Value) -> TransportResult<Value> {
        let url = self.resolve_target(target)?;
        self.send_json(Method::POST, url, Some(body)).await
    }

    fn resolve_target(&self, target: &str) -> TransportResult<Url> {
        let target = target.trim();
        if let Ok(absolute) = Url::parse(target) {
            return Ok(absolute);
        }
        let segments: Vec<&str> = target.trim_start_matches('/').split('/').collect();
        self.endpoint(&segments)
    }

    async fn send_json<B>(&self, method: Method, url: Url, body: Option<&B>) -> TransportResult<Value>
    where
        B: Serialize + ?Sized + Sync,
    {
        debug!(
            "event=http_request module=client status=start method={} path={}",
            method,
            url.path()
        );
        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                "event=http_request module=client status=error method={} path={} http_status={} body={}",
                method,
                url.path(),
                status.as_u16(),
                redact_for_log(&body)
            );
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        debug!(
            "event=http_request module=client status=ok method={} path={} http_status={}",
            method,
            url.path(),
            status.as_u16()
        );
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|err| TransportError::Decode(err.to_string()))
    }
}

fn decode_note(value: Value) -> TransportResult<PersistedNote> {
    serde_json::from_value(value).map_err(|err| TransportError::Decode(err.to_string()))
}

#[async_trait]
impl TemplateSource for RecordServiceClient {
    async fn fetch_template(&self, key: &TemplateKey) -> TransportResult<Value> {
        let url = self.endpoint(&["templates", &key.discipline, &key.note_type])?;
        self.send_json::<Value>(Method::GET, url, None).await
    }
}

#[async_trait]
impl VisitNoteApi for RecordServiceClient {
    async fn create_note(&self, body: &CreateVisitNoteRequest) -> TransportResult<PersistedNote> {
        let url = self.endpoint(&["visit-notes", ""])?;
        decode_note(self.send_json(Method::POST, url, Some(body)).await?)
    }

    async fn update_note(
        &self,
        note_id: &str,
        body: &UpdateVisitNoteRequest,
    ) -> TransportResult<PersistedNote> {
        let url = self.endpoint(&["visit-notes", note_id])?;
        decode_note(self.send_json(Method::PUT, url, Some(body)).await?)
    }

    async fn get_note_for_visit(&self, visit_id: &str) -> TransportResult<Option<PersistedNote>> {
        let url = self.endpoint(&["visit-notes", visit_id])?;
        match self.send_json::<Value>(Method::GET, url, None).await {
            Ok(value) => decode_note(value).map(Some),
            Err(TransportError::Status { status, .. })
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
