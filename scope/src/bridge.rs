//! The execution bridge: the one fixed-shape call into a scope.
//!
//! `execute(scope, handler, payload)` loads the handler from the scope,
//! resolves its payload adapter once, runs the adapter (if any) and then
//! the handler. Success is `None`. Every failure, including a panic on the
//! host side of the call, comes back as `Some(diagnostic)`: a plain string
//! carrying the whole error chain and the program's stderr. No typed error
//! crosses the boundary.

use std::error::Error as _;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::BridgeError;
use crate::scope::{EntryPoint, ModuleScope};
use crate::unit::{CAPABILITY_MIGRATION_HANDLER, CAPABILITY_PAYLOAD_ADAPTER};

/// How a handler's input is derived from the raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadAdapter {
    /// The handler receives the payload bytes unchanged.
    Passthrough,
    /// The named entry point transforms the payload first.
    Entry(String),
}

impl PayloadAdapter {
    /// The adapter a handler declares, defaulting to passthrough.
    #[must_use]
    pub fn declared_by(handler: &EntryPoint) -> Self {
        match &handler.descriptor.payload_adapter {
            Some(name) => Self::Entry(name.clone()),
            None => Self::Passthrough,
        }
    }

    fn adapt(
        &self,
        scope: &ModuleScope,
        handler: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>, BridgeError> {
        let Self::Entry(name) = self else {
            return Ok(payload.to_vec());
        };
        let adapter = scope.load(name).map_err(|source| BridgeError::LoadAdapter {
            handler: handler.to_string(),
            adapter: name.clone(),
            source,
        })?;
        if !adapter.provides(CAPABILITY_PAYLOAD_ADAPTER) {
            return Err(BridgeError::NotAnAdapter {
                adapter: name.clone(),
            });
        }
        scope
            .invoke(&adapter, payload)
            .map_err(|source| BridgeError::Adapter {
                adapter: name.clone(),
                source,
            })
    }
}

/// Run `handler_name` inside `scope` with `payload`.
///
/// Returns `None` on success and `Some(diagnostic)` on any failure.
#[must_use]
pub fn execute(scope: &ModuleScope, handler_name: &str, payload: &[u8]) -> Option<String> {
    let outcome = catch_unwind(AssertUnwindSafe(|| run_handler(scope, handler_name, payload)));
    let err = match outcome {
        Ok(Ok(())) => return None,
        Ok(Err(err)) => err,
        Err(panic) => BridgeError::Panicked {
            name: handler_name.to_string(),
            detail: panic_message(panic.as_ref()),
        },
    };
    Some(render_diagnostic(&err))
}

fn run_handler(scope: &ModuleScope, handler_name: &str, payload: &[u8]) -> Result<(), BridgeError> {
    let handler = scope
        .load(handler_name)
        .map_err(|source| BridgeError::Load {
            name: handler_name.to_string(),
            source,
        })?;
    if !handler.provides(CAPABILITY_MIGRATION_HANDLER) {
        return Err(BridgeError::NotAHandler {
            name: handler_name.to_string(),
        });
    }

    let adapter = PayloadAdapter::declared_by(&handler);
    let input = adapter.adapt(scope, handler_name, payload)?;

    scope
        .invoke(&handler, &input)
        .map_err(|source| BridgeError::Handler {
            name: handler_name.to_string(),
            source,
        })?;
    Ok(())
}

/// The error followed by each of its sources, one per line.
#[must_use]
pub fn render_diagnostic(err: &BridgeError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("\ncaused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
