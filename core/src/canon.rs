//! Canonical JSON bytes: the one serializer for every persisted document.
//!
//! The container index, definitions documents and history documents all pass
//! through [`canonical_json_bytes`], so two logically equal documents are
//! byte-identical on disk and inside archives.
//!
//! # Canonicalization rules
//!
//! 1. Object keys are sorted lexicographically (byte order).
//! 2. Compact form, no insignificant whitespace.
//! 3. Numbers must be integers; floats are rejected.

use serde::Serialize;
use thiserror::Error;

/// Error type for canonical JSON serialization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonError {
    /// The value could not be represented as JSON at all.
    #[error("value is not representable as JSON: {detail}")]
    NotJson { detail: String },
    /// A JSON number was not an integer.
    #[error("non-integer number in canonical JSON: {raw}")]
    NonIntegerNumber { raw: String },
}

/// Produce canonical JSON bytes for any serializable value.
///
/// # Errors
///
/// Returns [`CanonError`] if the value does not serialize to JSON or
/// contains a non-integer number.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CanonError> {
    let value = serde_json::to_value(value).map_err(|e| CanonError::NotJson {
        detail: e.to_string(),
    })?;
    reject_non_integers(&value)?;
    // serde_json's default map is a BTreeMap, so keys serialize sorted.
    serde_json::to_vec(&value).map_err(|e| CanonError::NotJson {
        detail: e.to_string(),
    })
}

fn reject_non_integers(value: &serde_json::Value) -> Result<(), CanonError> {
    match value {
        serde_json::Value::Number(n) if n.is_f64() => Err(CanonError::NonIntegerNumber {
            raw: n.to_string(),
        }),
        serde_json::Value::Array(items) => items.iter().try_for_each(reject_non_integers),
        serde_json::Value::Object(map) => map.values().try_for_each(reject_non_integers),
        _ => Ok(()),
    }
}
