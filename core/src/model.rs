//! The packaged index: `MigrationPackage`, `MigrationPath`, `MigrationContainer`.
//!
//! Built once by the packager and written as the `container-index` entry of
//! an archive. After that the runner only reads it.

use serde::{Deserialize, Serialize};

use crate::canon::canonical_json_bytes;
use crate::error::{ConfigurationError, DocumentError};
use crate::identity::UnitIdentity;

/// Schema tag carried by the serialized container index.
pub const CONTAINER_SCHEMA_VERSION: &str = "container.v1";

/// Resolved execution metadata for one packaged unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    /// Name of the single entry point providing the handler capability.
    pub handler: String,
    /// Canonical archive paths of the unit and its dependency closure,
    /// primary unit first.
    pub classpath: Vec<String>,
}

/// One unit inside a migration path.
///
/// `resources` is `None` for units outside the packaging window: they are
/// kept for record-keeping but cannot be executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPackage {
    pub identity: UnitIdentity,
    #[serde(default)]
    pub resources: Option<Resources>,
}

impl MigrationPackage {
    #[must_use]
    pub fn new(identity: UnitIdentity, resources: Option<Resources>) -> Self {
        Self {
            identity,
            resources,
        }
    }

    /// Whether this package carries resources and can be executed.
    #[must_use]
    pub fn is_executable(&self) -> bool {
        self.resources.is_some()
    }
}

/// A named, ordered upgrade lineage. Order is the execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPath {
    pub name: String,
    pub packages: Vec<MigrationPackage>,
}

impl MigrationPath {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packages: Vec::new(),
        }
    }

    pub fn push(&mut self, package: MigrationPackage) {
        self.packages.push(package);
    }
}

/// The archive index: every migration path, names unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationContainer {
    paths: Vec<MigrationPath>,
}

#[derive(Serialize, Deserialize)]
struct ContainerDocument {
    schema_version: String,
    paths: Vec<MigrationPath>,
}

impl MigrationContainer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::DuplicatePath`] if a path with the same
    /// name already exists.
    pub fn add(&mut self, path: MigrationPath) -> Result<(), ConfigurationError> {
        if self.contains(&path.name) {
            return Err(ConfigurationError::DuplicatePath { name: path.name });
        }
        self.paths.push(path);
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&MigrationPath> {
        self.paths.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn paths(&self) -> &[MigrationPath] {
        &self.paths
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    /// Serialize as the canonical `container-index` document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Canon`] if canonical serialization fails.
    pub fn to_index_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        let doc = ContainerDocument {
            schema_version: CONTAINER_SCHEMA_VERSION.to_string(),
            paths: self.paths.clone(),
        };
        Ok(canonical_json_bytes(&doc)?)
    }

    /// Parse a `container-index` document.
    ///
    /// Duplicate path names are rejected the same way [`MigrationContainer::add`]
    /// rejects them.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Parse`] for malformed JSON or duplicate names,
    /// and [`DocumentError::SchemaVersion`] for an unknown schema tag.
    pub fn from_index_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        let doc: ContainerDocument =
            serde_json::from_slice(bytes).map_err(|e| DocumentError::Parse {
                detail: e.to_string(),
            })?;
        if doc.schema_version != CONTAINER_SCHEMA_VERSION {
            return Err(DocumentError::SchemaVersion {
                expected: CONTAINER_SCHEMA_VERSION,
                found: doc.schema_version,
            });
        }
        let mut container = Self::new();
        for path in doc.paths {
            container.add(path).map_err(|e| DocumentError::Parse {
                detail: e.to_string(),
            })?;
        }
        Ok(container)
    }
}
