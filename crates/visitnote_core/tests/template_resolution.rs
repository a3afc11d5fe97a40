use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use visitnote_core::{
    ResolutionState, TemplateConfigResolver, TemplateKey, TemplateSource, TransportError,
    TransportResult, INVALID_TEMPLATE_STRUCTURE,
};

fn template_document(key: &TemplateKey) -> Value {
    json!({
        "id": format!("{}-{}", key.discipline, key.note_type),
        "discipline": key.discipline,
        "note_type": key.note_type,
        "is_active": true,
        "sections": [
            {"id": 1, "section_name": "Vitals", "is_required": true},
            {"id": 2, "section_name": "Pain", "is_required": false}
        ]
    })
}

#[derive(Default)]
struct CountingSource {
    calls: AtomicUsize,
}

#[async_trait]
impl TemplateSource for CountingSource {
    async fn fetch_template(&self, key: &TemplateKey) -> TransportResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(template_document(key))
    }
}

struct FixedSource(fn(&TemplateKey) -> TransportResult<Value>);

#[async_trait]
impl TemplateSource for FixedSource {
    async fn fetch_template(&self, key: &TemplateKey) -> TransportResult<Value> {
        (self.0)(key)
    }
}

/// Holds `PT` fetches until released.
#[derive(Default)]
struct GatedSource {
    started: Notify,
    release: Notify,
    calls: Mutex<Vec<TemplateKey>>,
}

#[async_trait]
impl TemplateSource for GatedSource {
    async fn fetch_template(&self, key: &TemplateKey) -> TransportResult<Value> {
        self.calls.lock().unwrap().push(key.clone());
        if key.discipline == "PT" {
            self.started.notify_one();
            self.release.notified().await;
        }
        Ok(template_document(key))
    }
}

fn resolved_discipline(state: &ResolutionState) -> &str {
    match state {
        ResolutionState::Resolved(template) => &template.discipline,
        other => panic!("expected resolved state, got {other:?}"),
    }
}

#[tokio::test]
async fn disabled_or_incomplete_inputs_do_not_fetch() {
    let source = Arc::new(CountingSource::default());
    let resolver = TemplateConfigResolver::new(source.clone());

    let state = resolver.configure(TemplateKey::new("PT", "Evaluation"), false).await;
    assert_eq!(state, ResolutionState::Idle);
    let state = resolver.configure(TemplateKey::new("PT", " "), true).await;
    assert_eq!(state, ResolutionState::Idle);
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn enabling_fetches_once_and_refresh_refetches() {
    let source = Arc::new(CountingSource::default());
    let resolver = TemplateConfigResolver::new(source.clone());
    let key = TemplateKey::new("PT", "Evaluation");

    resolver.configure(key.clone(), false).await;
    let state = resolver.configure(key.clone(), true).await;
    assert_eq!(resolved_discipline(&state), "PT");
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    resolver.configure(key.clone(), true).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    let state = resolver.refresh().await;
    assert_eq!(resolved_discipline(&state), "PT");
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);

    let template = resolver.template().unwrap();
    assert_eq!(template.name, "PT Evaluation");
    assert_eq!(template.template_id, "PT-Evaluation");
}

#[tokio::test]
async fn structural_rejection_is_distinct_from_transport_failure() {
    let invalid = TemplateConfigResolver::new(Arc::new(FixedSource(|_| {
        Ok(json!({"id": 1, "discipline": "PT", "note_type": "Eval", "sections": "Vitals"}))
    })));
    let state = invalid.configure(TemplateKey::new("PT", "Eval"), true).await;
    assert_eq!(
        state,
        ResolutionState::Failed(INVALID_TEMPLATE_STRUCTURE.to_string())
    );

    let offline = TemplateConfigResolver::new(Arc::new(FixedSource(|_| {
        Err(TransportError::Status {
            status: 500,
            body: "boom".to_string(),
        })
    })));
    let state = offline.configure(TemplateKey::new("PT", "Eval"), true).await;
    assert_eq!(state, ResolutionState::Failed("500 - boom".to_string()));
    assert!(offline.template().is_none());
}

#[tokio::test]
async fn stale_response_does_not_overwrite_newer_pair() {
    let source = Arc::new(GatedSource::default());
    let resolver = TemplateConfigResolver::new(source.clone());

    let first = resolver.configure(TemplateKey::new("PT", "Evaluation"), true);
    let switch = async {
        source.started.notified().await;
        let state = resolver
            .configure(TemplateKey::new("OT", "Evaluation"), true)
            .await;
        source.release.notify_one();
        state
    };
    let (first_state, switched_state) = tokio::join!(first, switch);

    assert_eq!(resolved_discipline(&switched_state), "OT");
    assert_eq!(resolved_discipline(&first_state), "OT");
    assert_eq!(resolved_discipline(&resolver.state()), "OT");
    assert_eq!(resolver.key(), Some(TemplateKey::new("OT", "Evaluation")));
    assert_eq!(source.calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn reset_discards_resolution() {
    let resolver = TemplateConfigResolver::new(Arc::new(CountingSource::default()));
    resolver
        .configure(TemplateKey::new("ST", "Daily Note"), true)
        .await;
    assert!(resolver.template().is_some());

    resolver.reset();
    assert_eq!(resolver.state(), ResolutionState::Idle);
    assert!(resolver.key().is_none());
}
