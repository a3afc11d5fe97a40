//! Working copy of one note's data.
//!
//! # Invariants
//! - Keys are section names or visit metadata (`visit_id`, `id`, ...).
//! - Keys outside a template's section list are preserved untouched; they are
//!   excluded from validation, completion scoring and submission payloads.

use crate::model::template::TemplateDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Mapping from section name to opaque section payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteData(Map<String, Value>);

impl NoteData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds from caller-supplied JSON; anything but an object yields empty data.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shallow merge: every key of `partial` overwrites the same key here.
    pub fn merge(&mut self, partial: NoteData) {
        for (key, value) in partial.0 {
            self.0.insert(key, value);
        }
    }

    /// Source visit identifier: `visit_id`, falling back to `id`.
    ///
    /// Null and blank-string values count as absent.
    pub fn visit_id(&self) -> Option<&Value> {
        ["visit_id", "id"]
            .into_iter()
            .filter_map(|key| self.0.get(key))
            .find(|value| match value {
                Value::Null => false,
                Value::String(text) => !text.trim().is_empty(),
                _ => true,
            })
    }

    /// Copies out only the entries whose key is a section of `template`.
    pub fn sections_for(&self, template: &TemplateDefinition) -> Map<String, Value> {
        self.0
            .iter()
            .filter(|(key, _)| template.has_section(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for NoteData {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

/// Renders a JSON identifier (string or number) as plain text.
pub fn id_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
