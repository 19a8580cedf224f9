//! Migration definitions: the ordered identity list for one path.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::atomic::write_atomic;
use crate::canon::canonical_json_bytes;
use crate::error::DocumentError;
use crate::identity::UnitIdentity;

/// Schema tag carried by the definitions document.
pub const DEFS_SCHEMA_VERSION: &str = "defs.v1";

/// Ordered unit identities for one migration path, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationDefs {
    pub defs: Vec<UnitIdentity>,
}

#[derive(Serialize, Deserialize)]
struct DefsDocument {
    schema_version: String,
    defs: Vec<UnitIdentity>,
}

impl MigrationDefs {
    #[must_use]
    pub fn new(defs: Vec<UnitIdentity>) -> Self {
        Self { defs }
    }

    /// Parse a definitions document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Parse`] for malformed JSON or invalid
    /// identities, and [`DocumentError::SchemaVersion`] for an unknown tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        let doc: DefsDocument = serde_json::from_slice(bytes).map_err(|e| DocumentError::Parse {
            detail: e.to_string(),
        })?;
        if doc.schema_version != DEFS_SCHEMA_VERSION {
            return Err(DocumentError::SchemaVersion {
                expected: DEFS_SCHEMA_VERSION,
                found: doc.schema_version,
            });
        }
        Ok(Self { defs: doc.defs })
    }

    /// Canonical JSON form of this document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Canon`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        canonical_json_bytes(&DefsDocument {
            schema_version: DEFS_SCHEMA_VERSION.to_string(),
            defs: self.defs.clone(),
        })
        .map_err(DocumentError::from)
    }

    /// # Errors
    ///
    /// Returns [`DocumentError`] on I/O or parse failure.
    pub fn read(path: &Path) -> Result<Self, DocumentError> {
        let bytes = std::fs::read(path).map_err(|e| DocumentError::Io {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        Self::from_bytes(&bytes)
    }

    /// # Errors
    ///
    /// Returns [`DocumentError`] on serialization or I/O failure.
    pub fn write(&self, path: &Path) -> Result<(), DocumentError> {
        write_atomic(path, &self.to_bytes()?)
    }
}
