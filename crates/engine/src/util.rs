//! Internal helpers for input normalization.
//!
//! These utilities are **not** part of the public API.

use uuid::Uuid;

use crate::{EngineError, ResultEngine};

pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Caller supplied id, or a fresh one.
pub(crate) fn id_or_new(value: Option<&str>, label: &str) -> ResultEngine<String> {
    match value {
        Some(id) => {
            let id = id.trim();
            if id.is_empty() {
                return Err(EngineError::Validation(format!("{label} id must not be empty")));
            }
            Ok(id.to_string())
        }
        None => Ok(Uuid::new_v4().to_string()),
    }
}
