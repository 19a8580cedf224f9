//! Unit file layout: entry-point descriptors, capabilities, and the
//! optional dependency list.
//!
//! ```text
//! entry/<name>.json      EntryPointDescriptor
//! unit-classpath.json    { "schema_version": "unit-classpath.v1", "dependencies": [identity...] }
//! <anything else>        programs and resources, extracted verbatim
//! ```

use std::path::Path;

use migrant_archive::{validate_entry_name, ArchiveReader};
use migrant_core::canon::canonical_json_bytes;
use migrant_core::error::DocumentError;
use migrant_core::identity::UnitIdentity;
use serde::{Deserialize, Serialize};

use crate::error::ScopeError;

/// Capability implemented by migration handlers.
pub const CAPABILITY_MIGRATION_HANDLER: &str = "migrant.migration-handler.v1";

/// Capability implemented by payload adapters.
pub const CAPABILITY_PAYLOAD_ADAPTER: &str = "migrant.payload-adapter.v1";

/// Directory holding entry-point descriptors.
pub const ENTRY_DIR: &str = "entry";

/// Entry holding the unit's transitive dependency identities.
pub const UNIT_CLASSPATH_ENTRY: &str = "unit-classpath.json";

/// Schema tag of [`UNIT_CLASSPATH_ENTRY`].
pub const UNIT_CLASSPATH_SCHEMA_VERSION: &str = "unit-classpath.v1";

/// Declares one entry point: which capabilities it provides and how to run it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPointDescriptor {
    #[serde(default)]
    pub provides: Vec<String>,
    /// Entry path of the program, relative to the scope root.
    pub program: String,
    /// Absolute path of an interpreter to run `program` with.
    #[serde(default)]
    pub interpreter: Option<String>,
    /// Entry point that turns the raw payload into this handler's input.
    #[serde(default)]
    pub payload_adapter: Option<String>,
}

impl EntryPointDescriptor {
    /// A handler run through `interpreter`.
    #[must_use]
    pub fn handler(program: impl Into<String>, interpreter: Option<&str>) -> Self {
        Self {
            provides: vec![CAPABILITY_MIGRATION_HANDLER.to_string()],
            program: program.into(),
            interpreter: interpreter.map(str::to_string),
            payload_adapter: None,
        }
    }

    /// A payload adapter run through `interpreter`.
    #[must_use]
    pub fn adapter(program: impl Into<String>, interpreter: Option<&str>) -> Self {
        Self {
            provides: vec![CAPABILITY_PAYLOAD_ADAPTER.to_string()],
            program: program.into(),
            interpreter: interpreter.map(str::to_string),
            payload_adapter: None,
        }
    }

    #[must_use]
    pub fn with_payload_adapter(mut self, adapter: impl Into<String>) -> Self {
        self.payload_adapter = Some(adapter.into());
        self
    }

    #[must_use]
    pub fn provides(&self, capability: &str) -> bool {
        self.provides.iter().any(|c| c == capability)
    }

    /// Parse and check a descriptor named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Descriptor`] for malformed JSON, a program path
    /// that could leave the scope root, or a relative interpreter path.
    pub fn parse(name: &str, bytes: &[u8]) -> Result<Self, ScopeError> {
        let descriptor: Self =
            serde_json::from_slice(bytes).map_err(|e| ScopeError::Descriptor {
                name: name.to_string(),
                detail: e.to_string(),
            })?;
        descriptor.check(name)?;
        Ok(descriptor)
    }

    fn check(&self, name: &str) -> Result<(), ScopeError> {
        let invalid = |detail: String| ScopeError::Descriptor {
            name: name.to_string(),
            detail,
        };
        validate_entry_name(&self.program).map_err(|e| invalid(e.to_string()))?;
        if let Some(interpreter) = &self.interpreter {
            if !Path::new(interpreter).is_absolute() {
                return Err(invalid(format!(
                    "interpreter {interpreter:?} is not an absolute path"
                )));
            }
        }
        if let Some(adapter) = &self.payload_adapter {
            validate_entry_point_name(adapter).map_err(|e| invalid(e.to_string()))?;
        }
        Ok(())
    }

    /// Canonical JSON bytes of this descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Canon`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        Ok(canonical_json_bytes(self)?)
    }
}

/// Entry points are named by a single path segment.
///
/// # Errors
///
/// Returns [`ScopeError::Descriptor`] if `name` is empty, contains `/`, or
/// is otherwise not a valid entry name.
pub fn validate_entry_point_name(name: &str) -> Result<(), ScopeError> {
    let invalid = |detail: String| ScopeError::Descriptor {
        name: name.to_string(),
        detail,
    };
    if name.contains('/') {
        return Err(invalid("entry point names are a single segment".into()));
    }
    validate_entry_name(name).map_err(|e| invalid(e.to_string()))
}

/// Archive entry name of the descriptor for entry point `name`.
#[must_use]
pub fn descriptor_entry(name: &str) -> String {
    format!("{ENTRY_DIR}/{name}.json")
}

/// Entry point named by a descriptor entry, if `entry` is one.
#[must_use]
pub fn entry_point_name(entry: &str) -> Option<&str> {
    let name = entry
        .strip_prefix(ENTRY_DIR)?
        .strip_prefix('/')?
        .strip_suffix(".json")?;
    (!name.is_empty() && !name.contains('/')).then_some(name)
}

/// Entry points declared by an open unit file, in archive order.
#[must_use]
pub fn declared_entry_points(reader: &ArchiveReader) -> Vec<String> {
    reader
        .entries()
        .iter()
        .filter_map(|e| entry_point_name(&e.name))
        .map(str::to_string)
        .collect()
}

#[derive(Serialize, Deserialize)]
struct UnitClasspathDocument {
    schema_version: String,
    dependencies: Vec<UnitIdentity>,
}

/// Canonical JSON bytes of a unit dependency list.
///
/// # Errors
///
/// Returns [`DocumentError::Canon`] if serialization fails.
pub fn unit_classpath_bytes(dependencies: &[UnitIdentity]) -> Result<Vec<u8>, DocumentError> {
    Ok(canonical_json_bytes(&UnitClasspathDocument {
        schema_version: UNIT_CLASSPATH_SCHEMA_VERSION.to_string(),
        dependencies: dependencies.to_vec(),
    })?)
}

/// Parse a unit dependency list.
///
/// # Errors
///
/// Returns [`DocumentError::Parse`] or [`DocumentError::SchemaVersion`].
pub fn parse_unit_classpath(bytes: &[u8]) -> Result<Vec<UnitIdentity>, DocumentError> {
    let doc: UnitClasspathDocument =
        serde_json::from_slice(bytes).map_err(|e| DocumentError::Parse {
            detail: e.to_string(),
        })?;
    if doc.schema_version != UNIT_CLASSPATH_SCHEMA_VERSION {
        return Err(DocumentError::SchemaVersion {
            expected: UNIT_CLASSPATH_SCHEMA_VERSION,
            found: doc.schema_version,
        });
    }
    Ok(doc.dependencies)
}

/// Dependency identities recorded in a unit file. `None` if the unit
/// carries no `unit-classpath.json`.
///
/// # Errors
///
/// Returns [`ScopeError`] if the file is not a valid archive or the entry
/// does not parse.
pub fn read_unit_classpath(unit: &Path) -> Result<Option<Vec<UnitIdentity>>, ScopeError> {
    let mut reader = ArchiveReader::open(unit)?;
    if !reader.contains(UNIT_CLASSPATH_ENTRY) {
        return Ok(None);
    }
    let bytes = reader.read_entry(UNIT_CLASSPATH_ENTRY)?;
    Ok(Some(parse_unit_classpath(&bytes)?))
}
