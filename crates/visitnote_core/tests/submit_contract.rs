use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use visitnote_core::{
    parse_template, NoteData, PersistenceGateway, RecordServiceClient, SubmitError,
    TemplateDefinition,
};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn vitals_template() -> Arc<TemplateDefinition> {
    Arc::new(
        parse_template(&json!({
            "id": 1,
            "discipline": "PT",
            "note_type": "Evaluation",
            "sections": [{"id": 1, "section_name": "Vitals", "is_required": true}]
        }))
        .unwrap(),
    )
}

fn gateway(server: &MockServer) -> PersistenceGateway {
    let client = RecordServiceClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
    PersistenceGateway::new(Arc::new(client))
}

fn note_data() -> NoteData {
    NoteData::from_value(json!({
        "Vitals": {"heartRate": "72"},
        "visit_id": "v1",
        "staff_id": 12
    }))
}

#[tokio::test]
async fn create_path_posts_only_template_sections() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/visit-notes/"))
        .and(body_json(json!({
            "visit_id": "v1",
            "sections_data": {"Vitals": {"heartRate": "72"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "visit_id": "v1"})))
        .expect(1)
        .mount(&server)
        .await;

    let note = gateway(&server)
        .submit(&note_data(), &vitals_template(), None)
        .await
        .unwrap();
    assert_eq!(note.note_id().as_deref(), Some("1"));
}

#[tokio::test]
async fn update_path_puts_sections_without_visit() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/visit-notes/n1"))
        .and(body_json(json!({"sections_data": {"Vitals": {"heartRate": "72"}}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "n1"})))
        .expect(1)
        .mount(&server)
        .await;

    let note = gateway(&server)
        .submit(&note_data(), &vitals_template(), Some("n1"))
        .await
        .unwrap();
    assert_eq!(note.note_id().as_deref(), Some("n1"));
}

#[tokio::test]
async fn server_rejection_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/visit-notes/"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "Visit already has a note"})),
        )
        .mount(&server)
        .await;

    let err = gateway(&server)
        .submit(&note_data(), &vitals_template(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::Create(_)));
    let message = err.to_string();
    assert!(message.contains("400"));
    assert!(message.contains("Visit already has a note"));
}

#[tokio::test]
async fn load_for_visit_returns_none_on_404() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/visit-notes/v77"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(gateway(&server).load_for_visit("v77").await.unwrap().is_none());
}
