//! Migrant Scope: unit files, the sandboxed module scope, and the
//! execution bridge.
//!
//! A unit is a container archive whose `entry/<name>.json` descriptors
//! declare entry points. A [`scope::ModuleScope`] is a disposable arena
//! built from a closed set of files: it extracts them into a private root,
//! resolves entry points only from that root, and runs their programs with
//! a cleared environment. The [`bridge`] is the one fixed-shape call that
//! crosses into a scope and reports the outcome back as plain data.
//!
//! # Module Dependency Direction
//!
//! `error` ← `unit` ← `builder`, `scope` ← `bridge`

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bridge;
pub mod builder;
pub mod error;
pub mod scope;
pub mod unit;

pub use bridge::{execute, PayloadAdapter};
pub use builder::UnitBuilder;
pub use error::{BridgeError, InvocationError, ScopeError};
pub use scope::{EntryPoint, ModuleScope, ScopeConfig, ScopeMember};
pub use unit::{EntryPointDescriptor, CAPABILITY_MIGRATION_HANDLER, CAPABILITY_PAYLOAD_ADAPTER};
