//! Structural validation of note data against a resolved template.

use crate::model::completion::leaf_has_value;
use crate::model::note_data::NoteData;
use crate::model::template::TemplateDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const INVALID_SECTION_DATA: &str = "Invalid section data";
pub const NO_VALUES_ENTERED: &str = "No values entered";

/// Per-section validation outcome. Warnings never affect `is_valid`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: BTreeMap<String, String>,
    pub warnings: BTreeMap<String, String>,
    pub is_valid: bool,
}

/// Validates every data key that names a section of `template`.
///
/// Payloads that are neither objects nor arrays are errors; array entries are
/// checked as positional fields. Payloads without any filled leaf are
/// warnings. Keys outside the template are ignored.
pub fn validate(data: &NoteData, template: &TemplateDefinition) -> ValidationReport {
    let mut errors = BTreeMap::new();
    let mut warnings = BTreeMap::new();

    for (key, payload) in data.iter() {
        if !template.has_section(key) {
            continue;
        }
        match payload {
            Value::Object(fields) => {
                let fields = fields.iter().map(|(name, value)| (name.clone(), value));
                if let Some(message) = empty_fields_warning(fields) {
                    warnings.insert(key.to_string(), message);
                }
            }
            Value::Array(items) => {
                let fields = items
                    .iter()
                    .enumerate()
                    .map(|(index, value)| (index.to_string(), value));
                if let Some(message) = empty_fields_warning(fields) {
                    warnings.insert(key.to_string(), message);
                }
            }
            _ => {
                errors.insert(key.to_string(), INVALID_SECTION_DATA.to_string());
            }
        }
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

fn empty_fields_warning<'a, I>(fields: I) -> Option<String>
where
    I: Iterator<Item = (String, &'a Value)>,
{
    let mut empty = Vec::new();
    for (name, value) in fields {
        if field_has_value(value) {
            return None;
        }
        empty.push(name);
    }
    if empty.is_empty() {
        return Some(NO_VALUES_ENTERED.to_string());
    }
    Some(format!("Empty fields: {}", empty.join(", ")))
}

fn field_has_value(value: &Value) -> bool {
    match value {
        Value::Object(nested) => nested.values().any(leaf_has_value),
        other => leaf_has_value(other),
    }
}
