//! Migrant Core: identity and data model for packaged migrations.
//!
//! Pure value types shared by every other crate in the workspace:
//!
//! - [`identity::UnitIdentity`] -- canonical `group:artifact:type:version:classifier` identity
//! - [`identity::ResolvedDependency`] -- identity + local file, with its canonical archive path
//! - [`model`] -- `MigrationPackage`, `MigrationPath`, `MigrationContainer` (the archive index)
//! - [`history`] -- caller-owned history records and the history document
//! - [`defs`] -- the per-path definitions document consumed by the packager
//!
//! # Module Dependency Direction
//!
//! `hash`, `canon`, `error` ← `identity` ← `model`, `history`, `defs`
//!
//! No file I/O lives here except the small document read/write helpers,
//! which all route through [`canon::canonical_json_bytes`] and replace files
//! atomically.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

mod atomic;
pub mod canon;
pub mod defs;
pub mod error;
pub mod hash;
pub mod history;
pub mod identity;
pub mod model;
