//! Request/response shapes for the visit-note endpoints.

use crate::model::note_data::id_to_text;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `POST /visit-notes/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateVisitNoteRequest {
    /// Kept as received (string or number) from note data.
    pub visit_id: Value,
    pub sections_data: Map<String, Value>,
}

/// Body of `PUT /visit-notes/{noteId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateVisitNoteRequest {
    pub sections_data: Map<String, Value>,
}

/// Terminal write the gateway is about to issue.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteRequest {
    Create(CreateVisitNoteRequest),
    Update {
        note_id: String,
        body: UpdateVisitNoteRequest,
    },
}

impl NoteRequest {
    pub fn sections_data(&self) -> &Map<String, Value> {
        match self {
            Self::Create(body) => &body.sections_data,
            Self::Update { body, .. } => &body.sections_data,
        }
    }
}

/// Server-side representation of a stored visit note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedNote {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub visit_id: Value,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub sections_data: Option<Map<String, Value>>,
    #[serde(default)]
    pub therapist_name: Option<String>,
}

impl PersistedNote {
    pub fn note_id(&self) -> Option<String> {
        id_to_text(&self.id)
    }

    /// Stored sections merged with visit metadata, ready to seed an editor.
    pub fn to_initial_data(&self) -> Map<String, Value> {
        let mut data = self.sections_data.clone().unwrap_or_default();
        if !self.visit_id.is_null() {
            data.insert("visit_id".to_string(), self.visit_id.clone());
        }
        data
    }
}
