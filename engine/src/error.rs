//! Engine error taxonomy.
//!
//! Packager errors abort the in-progress `add`/`write`; run errors abort the
//! `run` call after listeners have been told. Nothing is retried.

use migrant_archive::ArchiveError;
use migrant_core::error::{ConfigurationError, DocumentError};
use migrant_core::identity::UnitIdentity;
use migrant_scope::ScopeError;
use thiserror::Error;

/// A unit or one of its dependencies could not be located.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("cannot locate {identity} (looked for {location})")]
    NotFound {
        identity: UnitIdentity,
        location: String,
    },
    #[error("cannot read dependency list of {identity}: {detail}")]
    Classpath {
        identity: UnitIdentity,
        detail: String,
    },
    /// Resolver backends outside this crate report their own failures here.
    #[error("resolver failed for {identity}: {detail}")]
    Backend {
        identity: UnitIdentity,
        detail: String,
    },
}

/// A unit did not declare exactly one handler entry point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerDiscoveryError {
    #[error("no implementation of the migration handler capability found in {identity}")]
    NoImplementation { identity: UnitIdentity },
    #[error("{identity} has multiple migration handler implementations: {candidates:?}")]
    MultipleImplementations {
        identity: UnitIdentity,
        candidates: Vec<String>,
    },
}

/// Failure while packaging.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    HandlerDiscovery(#[from] HandlerDiscoveryError),
    #[error("cannot inspect {identity}")]
    Scope {
        identity: UnitIdentity,
        #[source]
        source: ScopeError,
    },
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("I/O error {context}: {detail}")]
    Io { context: String, detail: String },
}

/// Failure while running.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no migration path named {name:?} in this archive")]
    NotFound { name: String },
    #[error("{identity} is outside the packaged window and has no resources to execute")]
    MissingResource { identity: UnitIdentity },
    #[error("migration {identity} failed:\n{diagnostic}")]
    ExecutionFailure {
        identity: UnitIdentity,
        diagnostic: String,
    },
    #[error("cannot build an isolated scope for {identity}")]
    Scope {
        identity: UnitIdentity,
        #[source]
        source: ScopeError,
    },
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("I/O error {context}: {detail}")]
    Io { context: String, detail: String },
}
