//! Migration history: caller-owned records of which units have run.
//!
//! The runner never persists history. Hosts keep a [`MigrationHistory`],
//! update it from run-listener callbacks, and store it however they like;
//! [`read_history`] / [`write_history`] cover the JSON document form.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::atomic::write_atomic;
use crate::canon::canonical_json_bytes;
use crate::error::DocumentError;
use crate::identity::UnitIdentity;

/// Schema tag carried by the history document.
pub const HISTORY_SCHEMA_VERSION: &str = "history.v1";

/// One attempted or applied migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    /// Millisecond-precision instant the attempt started.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub identity: UnitIdentity,
}

impl Migration {
    /// A record stamped with the current time, truncated to milliseconds so
    /// it survives a document round-trip unchanged.
    #[must_use]
    pub fn now(identity: UnitIdentity) -> Self {
        Self {
            timestamp: Utc::now().trunc_subsecs(3),
            identity,
        }
    }
}

/// Ordered list of migration records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationHistory {
    migrations: Vec<Migration>,
}

impl MigrationHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, migration: Migration) {
        self.migrations.push(migration);
    }

    /// Remove the first record equal to `migration`. Returns whether one was removed.
    pub fn remove(&mut self, migration: &Migration) -> bool {
        match self.migrations.iter().position(|m| m == migration) {
            Some(index) => {
                self.migrations.remove(index);
                true
            }
            None => false,
        }
    }

    /// Whether any record matches `identity` (by identity equality, not position).
    #[must_use]
    pub fn contains(&self, identity: &UnitIdentity) -> bool {
        self.migrations.iter().any(|m| &m.identity == identity)
    }

    /// The set of identities present in this history.
    #[must_use]
    pub fn executed(&self) -> HashSet<UnitIdentity> {
        self.migrations.iter().map(|m| m.identity.clone()).collect()
    }

    #[must_use]
    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

impl FromIterator<Migration> for MigrationHistory {
    fn from_iter<I: IntoIterator<Item = Migration>>(iter: I) -> Self {
        Self {
            migrations: iter.into_iter().collect(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct HistoryDocument {
    schema_version: String,
    migrations: Vec<Migration>,
}

/// Parse a history document from bytes.
///
/// # Errors
///
/// Returns [`DocumentError::Parse`] or [`DocumentError::SchemaVersion`].
pub fn parse_history(bytes: &[u8]) -> Result<MigrationHistory, DocumentError> {
    let doc: HistoryDocument = serde_json::from_slice(bytes).map_err(|e| DocumentError::Parse {
        detail: e.to_string(),
    })?;
    if doc.schema_version != HISTORY_SCHEMA_VERSION {
        return Err(DocumentError::SchemaVersion {
            expected: HISTORY_SCHEMA_VERSION,
            found: doc.schema_version,
        });
    }
    Ok(MigrationHistory {
        migrations: doc.migrations,
    })
}

/// Serialize a history document as canonical JSON.
///
/// # Errors
///
/// Returns [`DocumentError::Canon`] if serialization fails.
pub fn history_bytes(history: &MigrationHistory) -> Result<Vec<u8>, DocumentError> {
    let doc = HistoryDocument {
        schema_version: HISTORY_SCHEMA_VERSION.to_string(),
        migrations: history.migrations.clone(),
    };
    Ok(canonical_json_bytes(&doc)?)
}

/// Read a history document. A missing file reads as an empty history.
///
/// # Errors
///
/// Returns [`DocumentError`] on I/O or parse failure.
pub fn read_history(path: &Path) -> Result<MigrationHistory, DocumentError> {
    match std::fs::read(path) {
        Ok(bytes) => parse_history(&bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(MigrationHistory::new()),
        Err(e) => Err(DocumentError::Io {
            path: path.display().to_string(),
            detail: e.to_string(),
        }),
    }
}

/// Write a history document.
///
/// # Errors
///
/// Returns [`DocumentError`] on serialization or I/O failure.
pub fn write_history(path: &Path, history: &MigrationHistory) -> Result<(), DocumentError> {
    write_atomic(path, &history_bytes(history)?)
}
