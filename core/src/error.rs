//! Configuration errors raised while building identities and containers.

use thiserror::Error;

/// Invalid configuration: a malformed identity or a container that would
/// violate its own invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A required identity field is empty.
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },
    /// An identity field contains characters that would break its canonical
    /// string or canonical archive path.
    #[error("invalid value for `{field}`: {value:?}")]
    InvalidField { field: &'static str, value: String },
    /// A migration path with this name already exists in the container.
    #[error("migration path name must be unique: {name}")]
    DuplicatePath { name: String },
}

/// Error reading or writing one of the JSON documents (defs, history, index).
#[derive(Debug, Error)]
pub enum DocumentError {
    /// I/O failure on the document file.
    #[error("I/O error on {path}: {detail}")]
    Io { path: String, detail: String },
    /// The document is not valid JSON for its schema.
    #[error("document parse error: {detail}")]
    Parse { detail: String },
    /// The document declares a schema version this build does not understand.
    #[error("unsupported schema_version {found:?}, expected {expected:?}")]
    SchemaVersion {
        expected: &'static str,
        found: String,
    },
    /// Canonical JSON serialization failed.
    #[error(transparent)]
    Canon(#[from] crate::canon::CanonError),
}
