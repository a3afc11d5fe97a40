//! Section completion heuristic and aggregate stats.
//!
//! A section counts as completed when at least one leaf of its payload holds
//! a value: non-blank string, `true`, non-zero number or non-empty array.
//! Nested objects are inspected one level deep. Payloads that are not JSON
//! objects never count as completed.

use crate::model::note_data::NoteData;
use crate::model::template::TemplateDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Derived progress counters; never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionStats {
    pub total: usize,
    pub completed: usize,
    /// `round(100 * completed / total)`, `0` when `total == 0`.
    pub percentage: u8,
}

impl CompletionStats {
    pub fn from_counts(completed: usize, total: usize) -> Self {
        if total == 0 {
            return Self::default();
        }
        let completed = completed.min(total);
        // Integer round-half-up of 100 * completed / total.
        let percentage = (completed * 200 + total) / (total * 2);
        Self {
            total,
            completed,
            percentage: u8::try_from(percentage).unwrap_or(100),
        }
    }
}

/// Whether one section payload has any filled leaf.
pub fn section_is_complete(payload: &Value) -> bool {
    match payload {
        Value::Object(fields) => fields.values().any(|value| match value {
            Value::Object(nested) => nested.values().any(leaf_has_value),
            other => leaf_has_value(other),
        }),
        _ => false,
    }
}

/// Completion over every section declared by `template`.
///
/// Returns zeroed stats when no template is resolved.
pub fn completion_stats(data: &NoteData, template: Option<&TemplateDefinition>) -> CompletionStats {
    let Some(template) = template else {
        return CompletionStats::default();
    };
    let total = template.sections.len();
    let completed = template
        .section_names()
        .filter(|name| data.get(name).is_some_and(section_is_complete))
        .count();
    CompletionStats::from_counts(completed, total)
}

pub(crate) fn leaf_has_value(value: &Value) -> bool {
    match value {
        Value::String(text) => !text.trim().is_empty(),
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) | Value::Null => false,
    }
}
