//! Scope, invocation and bridge errors.
//!
//! [`BridgeError`] never crosses back to the host as a typed value: the
//! bridge renders it, with its whole source chain, into a diagnostic string.

use migrant_archive::ArchiveError;
use migrant_core::error::DocumentError;
use thiserror::Error;

/// Failure building, reading or tearing down a scope or unit file.
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("I/O error {context}: {detail}")]
    Io { context: String, detail: String },
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    /// No descriptor for this entry point exists inside the scope root.
    #[error("entry point {name:?} is not visible in this scope")]
    UnknownEntryPoint { name: String },
    /// The descriptor exists but is malformed.
    #[error("entry point {name:?} has an invalid descriptor: {detail}")]
    Descriptor { name: String, detail: String },
    /// Unit assembly violated the single-handler rule.
    #[error("unit must declare exactly one migration handler, found {found}: {candidates:?}")]
    HandlerCount {
        found: usize,
        candidates: Vec<String>,
    },
}

impl ScopeError {
    pub(crate) fn io(context: impl Into<String>, e: &std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            detail: e.to_string(),
        }
    }
}

/// Failure running one entry-point program.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("failed to start {entry:?}: {detail}")]
    Spawn { entry: String, detail: String },
    #[error("I/O error talking to {entry:?}: {detail}")]
    Pipe { entry: String, detail: String },
    #[error("{entry:?} exited with {status}\n--- stderr ---\n{stderr}")]
    Exit {
        entry: String,
        status: String,
        stderr: String,
    },
}

/// Failure inside the execution bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("cannot load handler {name:?}")]
    Load {
        name: String,
        #[source]
        source: ScopeError,
    },
    #[error("{name:?} does not provide the migration handler capability")]
    NotAHandler { name: String },
    #[error("cannot load payload adapter {adapter:?} declared by {handler:?}")]
    LoadAdapter {
        handler: String,
        adapter: String,
        #[source]
        source: ScopeError,
    },
    #[error("{adapter:?} does not provide the payload adapter capability")]
    NotAnAdapter { adapter: String },
    #[error("payload adapter {adapter:?} failed")]
    Adapter {
        adapter: String,
        #[source]
        source: InvocationError,
    },
    #[error("handler {name:?} failed")]
    Handler {
        name: String,
        #[source]
        source: InvocationError,
    },
    #[error("panic while executing {name:?}: {detail}")]
    Panicked { name: String, detail: String },
}
