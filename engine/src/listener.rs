//! Run observer hooks.
//!
//! Hooks run synchronously on the caller's thread, each at most once per
//! attempted unit: `pre_migration` before execution, then exactly one of
//! `post_migration` or `migration_failure`.

use std::sync::{Arc, Mutex, PoisonError};

use migrant_core::history::{Migration, MigrationHistory};

use crate::error::RunError;

/// Observer of unit execution.
pub trait RunListener {
    fn pre_migration(&mut self, migration: &Migration);
    fn post_migration(&mut self, migration: &Migration);
    fn migration_failure(&mut self, migration: &Migration, cause: &RunError);
}

/// Handle returned by `Runner::add_listener`, used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Keeps a shared history in step with a run: records each unit before it
/// executes and takes the record back out if it fails.
#[derive(Debug, Clone, Default)]
pub struct HistoryListener {
    history: Arc<Mutex<MigrationHistory>>,
}

impl HistoryListener {
    #[must_use]
    pub fn new(history: Arc<Mutex<MigrationHistory>>) -> Self {
        Self { history }
    }

    /// The shared history this listener writes to.
    #[must_use]
    pub fn history(&self) -> Arc<Mutex<MigrationHistory>> {
        Arc::clone(&self.history)
    }
}

impl RunListener for HistoryListener {
    fn pre_migration(&mut self, migration: &Migration) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(migration.clone());
    }

    fn post_migration(&mut self, _migration: &Migration) {}

    fn migration_failure(&mut self, migration: &Migration, _cause: &RunError) {
        let removed = self
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(migration);
        if !removed {
            tracing::warn!(unit = %migration.identity, "failed migration was not in history");
        }
    }
}
