//! Migrant Engine: packaging migration units into archives and replaying
//! the pending ones against a caller-owned history.
//!
//! - [`resolver`] -- the pluggable `DependencyResolver` contract and a local
//!   repository implementation
//! - [`packager`] -- resolves a trailing window of each path, discovers each
//!   unit's single handler, deduplicates files, writes the archive
//! - [`runner`] -- opens an archive, computes pending units, materializes
//!   their files and executes each one in a fresh module scope
//! - [`listener`] -- run observer hooks and the transactional history listener
//!
//! Execution is strictly sequential. Nothing here retries.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod listener;
pub mod packager;
pub mod resolver;
pub mod runner;

pub use error::{HandlerDiscoveryError, PackageError, ResolutionError, RunError};
pub use listener::{HistoryListener, ListenerId, RunListener};
pub use migrant_core::history::{read_history, write_history};
pub use packager::{Packager, PackagerConfig, Window};
pub use resolver::{DependencyResolver, LocalRepositoryResolver, ResolvedUnit};
pub use runner::{Runner, RunnerConfig};
