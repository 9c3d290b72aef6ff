//! Truncation-tolerant recovery of a streamed JSON array of objects.
//!
//! Tool arguments arrive token by token, so the `elements` string is usually
//! an unterminated array. Recovery cuts at the last `}` and closes the array.
//! A `}` inside a string value is not disambiguated; when the cut lands there
//! the re-parse fails and nothing is recovered for that chunk.

use serde_json::Value;

/// Recover the longest parseable prefix of a JSON array of objects.
///
/// Returns an empty vector for anything that is not (the beginning of) an
/// array. Never fails.
pub fn recover_elements(input: &str) -> Vec<Value> {
    let trimmed = input.trim();
    if !trimmed.starts_with('[') {
        return Vec::new();
    }

    if let Ok(values) = serde_json::from_str::<Vec<Value>>(trimmed) {
        return values;
    }

    let Some(last_brace) = trimmed.rfind('}') else {
        return Vec::new();
    };

    let mut repaired = String::with_capacity(last_brace + 2);
    repaired.push_str(&trimmed[..=last_brace]);
    repaired.push(']');

    match serde_json::from_str::<Vec<Value>>(&repaired) {
        Ok(values) => values,
        Err(e) => {
            tracing::trace!(error = %e, "partial element array not yet recoverable");
            Vec::new()
        }
    }
}

/// Recover elements for a partial chunk, dropping the trailing element.
///
/// The last recovered object may still be receiving fields, so it is never
/// rendered until a later chunk (or the final input) confirms it.
pub fn recover_settled_elements(input: &str) -> Vec<Value> {
    let mut values = recover_elements(input);
    values.pop();
    values
}
