//! `UnitIdentity` and `ResolvedDependency`.
//!
//! A unit identity is the `(group, artifact, version, type, classifier)` tuple
//! naming one deployable artifact. Its canonical string form is
//! `group:artifact:type:version:classifier`; equality, ordering and hashing
//! are defined by that string alone.
//!
//! Identity fields also become archive path segments
//! (`group/artifact/version/artifact[-classifier]-version.type`), so the
//! constructor rejects anything that could escape or collapse a segment.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Default artifact type when none is declared.
pub const DEFAULT_TYPE: &str = "archive";

/// Immutable identity of one migration unit or dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "IdentityFields", into = "IdentityFields")]
pub struct UnitIdentity {
    group: String,
    artifact: String,
    version: String,
    kind: String,
    classifier: Option<String>,
    canonical: String,
}

/// Wire form of an identity. Deserialization goes through
/// [`UnitIdentity::new`] so documents cannot smuggle in invalid fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityFields {
    pub group: String,
    pub artifact: String,
    pub version: String,
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    #[serde(default)]
    pub classifier: Option<String>,
}

fn default_type() -> String {
    DEFAULT_TYPE.to_string()
}

impl UnitIdentity {
    /// Build an identity, validating every field.
    ///
    /// An empty classifier is normalized to `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingField`] for an empty required
    /// field and [`ConfigurationError::InvalidField`] for a field containing
    /// `:`, `/` or `\`, or equal to `.` / `..`.
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
        classifier: Option<String>,
    ) -> Result<Self, ConfigurationError> {
        let group = required("group", group.into())?;
        let artifact = required("artifact", artifact.into())?;
        let version = required("version", version.into())?;
        let kind = required("type", kind.into())?;
        let classifier = match classifier {
            Some(c) if c.is_empty() => None,
            Some(c) => Some(segment("classifier", c)?),
            None => None,
        };

        let canonical = format!(
            "{group}:{artifact}:{kind}:{version}:{}",
            classifier.as_deref().unwrap_or("")
        );

        Ok(Self {
            group,
            artifact,
            version,
            kind,
            classifier,
            canonical,
        })
    }

    /// Shorthand for an identity with the default type and no classifier.
    ///
    /// # Errors
    ///
    /// Same as [`UnitIdentity::new`].
    pub fn simple(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        Self::new(group, artifact, version, DEFAULT_TYPE, None)
    }

    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    #[must_use]
    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The artifact type (`"archive"` unless declared otherwise).
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    /// `group:artifact:type:version:classifier`, with an absent classifier
    /// rendered as an empty trailing token.
    #[must_use]
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Canonical archive path: `group/artifact/version/artifact[-classifier]-version.type`.
    #[must_use]
    pub fn canonical_path(&self) -> String {
        let mut path = format!(
            "{}/{}/{}/{}",
            self.group, self.artifact, self.version, self.artifact
        );
        if let Some(classifier) = &self.classifier {
            path.push('-');
            path.push_str(classifier);
        }
        path.push('-');
        path.push_str(&self.version);
        path.push('.');
        path.push_str(&self.kind);
        path
    }
}

fn required(field: &'static str, value: String) -> Result<String, ConfigurationError> {
    if value.is_empty() {
        return Err(ConfigurationError::MissingField { field });
    }
    segment(field, value)
}

fn segment(field: &'static str, value: String) -> Result<String, ConfigurationError> {
    let bad = value == "."
        || value == ".."
        || value.contains([':', '/', '\\'])
        || value.chars().any(char::is_control);
    if bad {
        return Err(ConfigurationError::InvalidField { field, value });
    }
    Ok(value)
}

impl PartialEq for UnitIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for UnitIdentity {}

impl Hash for UnitIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for UnitIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UnitIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl std::fmt::Display for UnitIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl TryFrom<IdentityFields> for UnitIdentity {
    type Error = ConfigurationError;

    fn try_from(fields: IdentityFields) -> Result<Self, Self::Error> {
        Self::new(
            fields.group,
            fields.artifact,
            fields.version,
            fields.kind,
            fields.classifier,
        )
    }
}

impl From<UnitIdentity> for IdentityFields {
    fn from(id: UnitIdentity) -> Self {
        Self {
            group: id.group,
            artifact: id.artifact,
            version: id.version,
            kind: id.kind,
            classifier: id.classifier,
        }
    }
}

/// An identity resolved to a file on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
    identity: UnitIdentity,
    file: PathBuf,
}

impl ResolvedDependency {
    #[must_use]
    pub fn new(identity: UnitIdentity, file: impl Into<PathBuf>) -> Self {
        Self {
            identity,
            file: file.into(),
        }
    }

    #[must_use]
    pub fn identity(&self) -> &UnitIdentity {
        &self.identity
    }

    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Canonical archive path of this dependency's identity.
    #[must_use]
    pub fn canonical_path(&self) -> String {
        self.identity.canonical_path()
    }
}
